use async_trait::async_trait;
use awc::http::header;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::item::{CloudItem, ProviderKind};
use crate::provider::auth::Credentials;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const FILE_FIELDS: &str = "id,name,mimeType,size,parents";

/// 远程目录中的一个条目
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Drive 以字符串返回大小，文件夹和 Google 文档没有该字段
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RemoteEntry {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn size_bytes(&self) -> u64 {
        self.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0)
    }

    pub fn to_cloud_item(&self) -> CloudItem {
        let name = if self.name.is_empty() { "NoName" } else { self.name.as_str() };
        CloudItem::new(self.id.clone(), name, self.size_bytes(), ProviderKind::GoogleDrive)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPage {
    #[serde(default)]
    files: Vec<RemoteEntry>,
    next_page_token: Option<String>,
}

/// 一个文件夹的内容，文件夹与文件分开
#[derive(Debug, Clone, Default)]
pub struct FolderListing {
    pub folders: Vec<RemoteEntry>,
    pub files: Vec<RemoteEntry>,
}

impl FolderListing {
    pub fn from_entries(entries: Vec<RemoteEntry>) -> Self {
        let (folders, files) = entries.into_iter().partition(RemoteEntry::is_folder);
        Self { folders, files }
    }
}

/// 远程目录查询
#[async_trait(?Send)]
pub trait RemoteListing {
    /// `folder_id` 为空表示根目录
    async fn list_folder(&self, folder_id: &str) -> Result<FolderListing, DownloadError>;

    async fn file_metadata(&self, file_id: &str) -> Result<RemoteEntry, DownloadError>;
}

pub struct GoogleDriveListing {
    api_base: Url,
    credentials: Credentials,
    page_size: u32,
    client: awc::Client,
}

impl GoogleDriveListing {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self, DownloadError> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| DownloadError::Config(format!("无效的 api_base {}: {}", config.api_base, e)))?;
        let client = awc::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .add_default_header((header::USER_AGENT, config.user_agent.clone()))
            .finish();
        Ok(Self {
            api_base,
            credentials,
            page_size: config.page_size,
            client,
        })
    }

    fn files_url(&self, file_id: Option<&str>) -> Result<Url, DownloadError> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DownloadError::Config(format!("api_base 不能作为基础地址: {}", self.api_base)))?;
            segments.pop_if_empty().extend(["drive", "v3", "files"]);
            if let Some(id) = file_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    pub fn list_url(&self, folder_id: &str, page_token: Option<&str>) -> Result<Url, DownloadError> {
        let mut url = self.files_url(None)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &folder_query(folder_id))
                .append_pair("pageSize", &self.page_size.to_string())
                .append_pair("fields", &format!("nextPageToken,files({})", FILE_FIELDS));
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &Url) -> Result<T, DownloadError> {
        let token = self.credentials.access_token().ok_or(DownloadError::NotAuthenticated)?;
        let mut response = self
            .client
            .get(url.as_str())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        let status = response.status();
        if status == awc::http::StatusCode::UNAUTHORIZED {
            return Err(DownloadError::NotAuthenticated);
        }
        let body = response
            .body()
            .limit(16 * 1024 * 1024)
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(DownloadError::ServerError(format!(
                "{}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// 根目录列出所有未删除的文件，子目录按父目录过滤
pub fn folder_query(folder_id: &str) -> String {
    if folder_id.is_empty() {
        "trashed=false".to_string()
    } else {
        format!("'{}' in parents and trashed=false", folder_id.replace('\'', "\\'"))
    }
}

#[async_trait(?Send)]
impl RemoteListing for GoogleDriveListing {
    async fn list_folder(&self, folder_id: &str) -> Result<FolderListing, DownloadError> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.list_url(folder_id, page_token.as_deref())?;
            let page: FileListPage = self.get_json(&url).await?;
            log::debug!("目录 {:?} 本页 {} 个条目", folder_id, page.files.len());
            entries.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(FolderListing::from_entries(entries))
    }

    async fn file_metadata(&self, file_id: &str) -> Result<RemoteEntry, DownloadError> {
        let mut url = self.files_url(Some(file_id))?;
        url.query_pairs_mut().append_pair("fields", FILE_FIELDS);
        self.get_json(&url).await
    }
}

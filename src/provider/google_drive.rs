use awc::http::header;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::item::ProviderKind;
use crate::core::transfer::{CancelHandle, TransferReporter};
use crate::provider::auth::Credentials;
use crate::provider::staging::StagingFile;
use crate::provider::{FetchRequest, Provider};

const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Google Drive 下载后端
#[derive(Debug, Clone)]
pub struct GoogleDriveProvider {
    api_base: Url,
    credentials: Credentials,
    staging_dir: PathBuf,
    timeout: Duration,
    user_agent: String,
}

impl GoogleDriveProvider {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self, DownloadError> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| DownloadError::Config(format!("无效的 api_base {}: {}", config.api_base, e)))?;
        Ok(Self {
            api_base,
            credentials,
            staging_dir: config.staging_path(),
            timeout: Duration::from_secs(config.timeout),
            user_agent: config.user_agent.clone(),
        })
    }

    /// `files/{id}?alt=media`
    pub fn media_url(&self, file_id: &str) -> Result<Url, DownloadError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| DownloadError::Config(format!("api_base 不能作为基础地址: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["drive", "v3", "files", file_id]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    pub fn staging_path(&self, file_id: &str) -> PathBuf {
        let safe: String = file_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.staging_dir.join(format!("{}.download", safe))
    }
}

impl Provider for GoogleDriveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    fn fetch(&self, request: FetchRequest, reporter: TransferReporter) -> Result<CancelHandle, DownloadError> {
        let token = self
            .credentials
            .access_token()
            .ok_or(DownloadError::NotAuthenticated)?
            .to_string();
        let url = self.media_url(&request.item.id)?;
        let staging = self.staging_path(&request.item.id);
        let cancel = CancelHandle::new();

        let task_cancel = cancel.clone();
        let timeout = self.timeout;
        let user_agent = self.user_agent.clone();
        actix::spawn(async move {
            let client = awc::Client::builder()
                .timeout(timeout)
                .add_default_header((header::USER_AGENT, user_agent))
                .finish();
            let item_size = Some(request.item.size).filter(|n| *n > 0);
            let result = match download_media(&client, &url, &token, item_size, &staging, &reporter, &task_cancel).await {
                Ok(file) => file.persist(&request.destination),
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                if !e.is_cancelled() {
                    log::error!("下载 {} 失败: {}", request.item.id, e);
                }
            }
            reporter.complete(result);
        });
        Ok(cancel)
    }
}

/// 执行一次媒体下载，写入临时文件
///
/// `item_size` 是列表里的文件大小，传输层没有给出总长度时用它判断哪一块是最后一块。
async fn download_media(
    client: &awc::Client,
    url: &Url,
    token: &str,
    item_size: Option<u64>,
    staging: &Path,
    reporter: &TransferReporter,
    cancel: &CancelHandle,
) -> Result<StagingFile, DownloadError> {
    let mut response = tokio::select! {
        _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
        response = client.get(url.as_str()).bearer_auth(token).send() => {
            response.map_err(|e| DownloadError::Network(e.to_string()))?
        }
    };

    let status = response.status();
    if status == awc::http::StatusCode::UNAUTHORIZED || status == awc::http::StatusCode::FORBIDDEN {
        return Err(DownloadError::NotAuthenticated);
    }
    if !status.is_success() {
        return Err(DownloadError::ServerError(format!("{} 返回 {}", reporter.file_id(), status)));
    }

    // 分块传输时没有 Content-Length；压缩传输时它是压缩后的长度，与写入的字节数无关
    let encoded = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| !v.eq_ignore_ascii_case("identity"));
    let expected = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|_| !encoded);
    let total = expected.or(item_size);

    let mut file = StagingFile::create(staging, WRITE_BUFFER_SIZE)?;
    loop {
        let next: Option<Result<Bytes, _>> = tokio::select! {
            _ = cancel.cancelled() => {
                file.discard();
                return Err(DownloadError::Cancelled);
            }
            next = response.next() => next,
        };
        let bytes = match next {
            None => break,
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                file.discard();
                return Err(DownloadError::Network(format!("网络流错误: {}", e)));
            }
        };
        if let Err(e) = file.write(&bytes) {
            file.discard();
            return Err(e);
        }
        let written = file.len();
        // 写满的那一块交给完成回调，保证完成事件发出时文件已经在库里
        if total.map_or(true, |total| written < total) {
            reporter.progress(written, expected);
        }
    }

    if let Some(total) = expected {
        if file.len() != total {
            let actual = file.len();
            file.discard();
            return Err(DownloadError::SizeMismatch { expected: total, actual });
        }
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{DownloadEvent, EventFilter};
    use crate::core::item::CloudItem;
    use crate::core::DownloadCenter;
    use crate::library::LocalLibrary;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::{mpsc, oneshot};

    fn provider(api_base: &str) -> GoogleDriveProvider {
        let mut config = Config::default();
        config.api_base = api_base.to_string();
        config.download_dir = "/data/lib".to_string();
        GoogleDriveProvider::new(&config, Credentials::new(Some("token".to_string()))).unwrap()
    }

    #[test]
    fn test_media_url() {
        let p = provider("https://www.googleapis.com");
        assert_eq!(
            p.media_url("1AbC-xyz").unwrap().as_str(),
            "https://www.googleapis.com/drive/v3/files/1AbC-xyz?alt=media"
        );

        let p = provider("http://127.0.0.1:8080/proxy/");
        assert_eq!(
            p.media_url("id/with/slash").unwrap().as_str(),
            "http://127.0.0.1:8080/proxy/drive/v3/files/id%2Fwith%2Fslash?alt=media"
        );
    }

    #[test]
    fn test_staging_path_is_hidden_and_safe() {
        let p = provider("https://www.googleapis.com");
        let path = p.staging_path("../x");
        assert_eq!(path, PathBuf::from("/data/lib/.staging/___x.download"));
    }

    #[test]
    fn test_invalid_api_base() {
        let mut config = Config::default();
        config.api_base = "::".to_string();
        assert!(GoogleDriveProvider::new(&config, Credentials::default()).is_err());
    }

    /// 本地 HTTP 服务：读完请求头后依次发送各段，每段前等待给定毫秒数
    async fn serve(parts: Vec<(u64, &'static [u8])>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = oneshot::channel();
        actix::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = request_tx.send(String::from_utf8_lossy(&request).into_owned());
            for (delay_ms, part) in parts {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                if socket.write_all(part).await.is_err() {
                    return;
                }
            }
            let _ = socket.flush().await;
        });
        (format!("http://{}", addr), request_rx)
    }

    /// 完成事件附带发布时目标文件是否已存在
    type Seen = Arc<Mutex<Vec<(DownloadEvent, bool)>>>;

    struct Fixture {
        center: DownloadCenter,
        library: LocalLibrary,
        seen: Seen,
        terminal: mpsc::UnboundedReceiver<DownloadEvent>,
        _dir: tempfile::TempDir,
    }

    fn fixture(api_base: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.api_base = api_base.to_string();
        config.download_dir = dir.path().to_str().unwrap().to_string();
        config.timeout = 5;

        let library = LocalLibrary::from_config(&config);
        library.ensure_dirs().unwrap();
        let provider = GoogleDriveProvider::new(&config, Credentials::new(Some("t0ken".to_string()))).unwrap();
        let center = DownloadCenter::start(library.clone(), vec![Arc::new(provider)]);

        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (tx, terminal) = mpsc::unbounded_channel();
        center.subscribe(EventFilter::all(), move |event| {
            let landed = match event {
                DownloadEvent::Finished { path, .. } => path.exists(),
                _ => false,
            };
            sink.lock().unwrap().push((event.clone(), landed));
            if event.is_terminal() {
                let _ = tx.send(event.clone());
            }
        });
        Fixture { center, library, seen, terminal, _dir: dir }
    }

    fn drive_item(size: u64) -> CloudItem {
        CloudItem::new("x", "x.bin", size, ProviderKind::GoogleDrive)
    }

    async fn wait_terminal(f: &mut Fixture) -> DownloadEvent {
        tokio::time::timeout(Duration::from_secs(5), f.terminal.recv())
            .await
            .expect("等待终止事件超时")
            .unwrap()
    }

    fn staging_is_empty(f: &Fixture) -> bool {
        std::fs::read_dir(f.library.staging()).unwrap().next().is_none()
    }

    #[actix::test]
    async fn test_download_lands_before_finished() {
        let (base, request) = serve(vec![(
            0,
            &b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world"[..],
        )])
        .await;
        let mut f = fixture(&base);
        f.center.start_download(drive_item(11)).await.unwrap();

        let event = wait_terminal(&mut f).await;
        let destination = f.library.root().join("x.bin");
        assert_eq!(event, DownloadEvent::Finished { file_id: "x".to_string(), path: destination.clone() });
        assert_eq!(std::fs::read(&destination).unwrap(), b"hello world");
        assert!(staging_is_empty(&f));
        assert!(f.seen.lock().unwrap().last().unwrap().1);

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /drive/v3/files/x?alt=media "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer t0ken"));
    }

    #[actix::test]
    async fn test_chunked_download_finishes_after_rename() {
        let (base, _) = serve(vec![
            (0, &b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nhello\r\n"[..]),
            (100, &b"5\r\nworld\r\n0\r\n\r\n"[..]),
        ])
        .await;
        let mut f = fixture(&base);
        f.center.start_download(drive_item(10)).await.unwrap();

        assert!(matches!(wait_terminal(&mut f).await, DownloadEvent::Finished { .. }));
        let seen = f.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, DownloadEvent::Progress { file_id: "x".to_string(), value: 0.5 });
        // 完成事件发布时文件必须已经移入本地库
        assert!(matches!(seen[1].0, DownloadEvent::Finished { .. }));
        assert!(seen[1].1);
    }

    #[actix::test]
    async fn test_truncated_body_fails_without_leaving_files() {
        let (base, _) = serve(vec![(
            0,
            &b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\nhello"[..],
        )])
        .await;
        let mut f = fixture(&base);
        f.center.start_download(drive_item(10)).await.unwrap();

        assert!(matches!(wait_terminal(&mut f).await, DownloadEvent::Failed { .. }));
        assert!(f.library.list_completed().unwrap().is_empty());
        assert!(staging_is_empty(&f));
        assert!(!f.center.is_downloading("x").await.unwrap());
    }

    #[actix::test]
    async fn test_unauthorized_maps_to_not_authenticated() {
        let (base, _) = serve(vec![(
            0,
            &b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"[..],
        )])
        .await;
        let mut f = fixture(&base);
        f.center.start_download(drive_item(10)).await.unwrap();

        let event = wait_terminal(&mut f).await;
        assert_eq!(
            event,
            DownloadEvent::Failed { file_id: "x".to_string(), reason: DownloadError::NotAuthenticated.to_string() }
        );
        assert!(f.library.list_completed().unwrap().is_empty());
    }

    #[actix::test]
    async fn test_cancel_mid_stream_discards_staging() {
        // 第二块永远不会在测试期间到达
        let (base, _) = serve(vec![
            (0, &b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nhello\r\n"[..]),
            (60_000, &b"5\r\nworld\r\n0\r\n\r\n"[..]),
        ])
        .await;
        let mut f = fixture(&base);
        let item = drive_item(10);
        f.center.start_download(item.clone()).await.unwrap();

        // 等第一块写入临时文件
        let staging = f.library.staging().join("x.download");
        for _ in 0..250 {
            if !f.seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(staging.exists());

        assert!(f.center.stop_downloading(item).await.unwrap());
        assert_eq!(wait_terminal(&mut f).await, DownloadEvent::Canceled { file_id: "x".to_string() });

        for _ in 0..250 {
            if !staging.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!staging.exists());
        assert!(f.library.list_completed().unwrap().is_empty());

        // 后台任务的取消回调已过期，不会再有事件
        tokio::time::sleep(Duration::from_millis(100)).await;
        let seen = f.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0].0, DownloadEvent::Progress { .. }));
        assert_eq!(seen[1].0, DownloadEvent::Canceled { file_id: "x".to_string() });
    }
}

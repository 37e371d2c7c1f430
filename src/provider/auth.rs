use crate::config::Config;

pub const ACCESS_TOKEN_ENV: &str = "GDRIVE_ACCESS_TOKEN";

/// Google Drive 访问凭据
#[derive(Clone, Default)]
pub struct Credentials {
    access_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            access_token: access_token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        }
    }

    /// 环境变量优先于配置文件
    pub fn resolve(config: &Config) -> Self {
        let from_env = std::env::var(ACCESS_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        Self::new(from_env.or_else(|| Some(config.access_token.clone())))
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

// 不在日志里泄露令牌
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_is_unauthenticated() {
        assert!(!Credentials::new(Some("   ".to_string())).is_authenticated());
        assert!(!Credentials::new(None).is_authenticated());

        let creds = Credentials::new(Some(" ya29.token ".to_string()));
        assert_eq!(creds.access_token(), Some("ya29.token"));
        assert!(!format!("{:?}", creds).contains("ya29"));
    }
}

/// OAuth2 客户端密钥读取模块
///
/// 读取 Google Cloud Console 下载的 `credentials.json`，
/// 支持 `installed`（桌面应用）和 `web` 两种格式
use serde::Deserialize;
use std::path::Path;

use crate::error::{AuthError, AuthResult};

/// Google 默认授权端点
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google 默认 Token 端点
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 客户端密钥
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    /// Google OAuth2 客户端 ID
    pub client_id: String,

    /// Google OAuth2 客户端密钥
    pub client_secret: String,

    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// 密钥文件外层结构
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// 从文件加载客户端密钥
    ///
    /// # Errors
    /// - 文件不存在或无法读取
    /// - JSON 格式错误
    /// - 既没有 `installed` 也没有 `web` 段
    pub fn from_file(path: &Path) -> AuthResult<Self> {
        let fail = |reason: String| AuthError::ClientSecret {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let file: ClientSecretFile =
            serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?;

        file.installed
            .or(file.web)
            .ok_or_else(|| fail("缺少 installed 或 web 段".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_installed_secret() {
        let file = write_temp(
            r#"{
                "installed": {
                    "client_id": "test-client-id.apps.googleusercontent.com",
                    "project_id": "google-os",
                    "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                    "token_uri": "https://oauth2.googleapis.com/token",
                    "client_secret": "test-secret",
                    "redirect_uris": ["http://localhost"]
                }
            }"#,
        );

        let secret = ClientSecret::from_file(file.path()).unwrap();
        assert_eq!(secret.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(secret.client_secret, "test-secret");
        assert_eq!(secret.redirect_uris, vec!["http://localhost"]);
    }

    #[test]
    fn test_web_secret_uses_default_uris() {
        let file = write_temp(r#"{"web": {"client_id": "id", "client_secret": "secret"}}"#);

        let secret = ClientSecret::from_file(file.path()).unwrap();
        assert_eq!(secret.auth_uri, DEFAULT_AUTH_URI);
        assert_eq!(secret.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_missing_file() {
        let err = ClientSecret::from_file(Path::new("/nonexistent/credentials.json")).unwrap_err();
        assert!(matches!(err, AuthError::ClientSecret { .. }));
    }

    #[test]
    fn test_missing_section() {
        let file = write_temp(r#"{"other": {}}"#);
        let err = ClientSecret::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("installed"));
    }
}

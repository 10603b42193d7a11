/// 凭据数据结构
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::client_secret::{ClientSecret, DEFAULT_TOKEN_URI};

/// Token 刷新阈值（提前多少分钟视为过期）
pub const REFRESH_THRESHOLD_MINUTES: i64 = 5;

/// OAuth2 授权结果
///
/// 序列化格式与 Google "authorized user" JSON 一致，
/// 其他 Google 工具生成的 token.json 可以直接读取
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// 访问令牌
    #[serde(default)]
    pub token: Option<String>,

    /// 刷新令牌
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    pub client_id: String,

    pub client_secret: String,

    /// 用户已授予的 Scope
    #[serde(default)]
    pub scopes: Vec<String>,

    /// 访问令牌过期时间（UTC），缺失表示不过期
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl Credential {
    /// 由授权流程结果创建凭据
    pub fn issued(
        secret: &ClientSecret,
        access_token: String,
        refresh_token: Option<String>,
        expires_in_seconds: i64,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            token: Some(access_token),
            refresh_token,
            token_uri: secret.token_uri.clone(),
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            scopes,
            expiry: Some(Utc::now() + Duration::seconds(expires_in_seconds)),
        }
    }

    /// 检查 Token 是否已过期（含提前刷新阈值）
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= Utc::now() + Duration::minutes(REFRESH_THRESHOLD_MINUTES),
            None => false,
        }
    }

    /// 有访问令牌且未过期
    pub fn is_valid(&self) -> bool {
        self.token.is_some() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// 是否包含全部所需 Scope
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope.as_ref()))
    }

    /// 刷新成功后原地更新访问令牌
    ///
    /// 响应中没有新 refresh_token 时保留原值
    pub fn update_access_token(
        &mut self,
        new_token: String,
        new_refresh_token: Option<String>,
        expires_in_seconds: i64,
    ) {
        self.token = Some(new_token);
        if new_refresh_token.is_some() {
            self.refresh_token = new_refresh_token;
        }
        self.expiry = Some(Utc::now() + Duration::seconds(expires_in_seconds));
    }

    pub fn access_token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_credential(scopes: &[&str], expires_in_seconds: i64) -> Credential {
        Credential {
            token: Some("ya29.test-access-token".to_string()),
            refresh_token: Some("1//test-refresh-token".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "test-client-id".to_string(),
            client_secret: "test-secret".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expiry: Some(Utc::now() + Duration::seconds(expires_in_seconds)),
        }
    }

    #[test]
    fn test_expiry_threshold() {
        assert!(!test_credential(&[], 3600).is_expired());
        // 4 分钟后过期，落在 5 分钟阈值内
        assert!(test_credential(&[], 240).is_expired());
        assert!(test_credential(&[], -3600).is_expired());
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let mut credential = test_credential(&[], -3600);
        credential.expiry = None;
        assert!(!credential.is_expired());
        assert!(credential.is_valid());
    }

    #[test]
    fn test_missing_token_is_invalid() {
        let mut credential = test_credential(&[], 3600);
        credential.token = None;
        assert!(!credential.is_valid());
    }

    #[test]
    fn test_has_scopes() {
        let credential = test_credential(&["a", "b", "c"], 3600);
        assert!(credential.has_scopes(&["a", "c"]));
        assert!(credential.has_scopes::<&str>(&[]));
        assert!(!credential.has_scopes(&["a", "d"]));
    }

    #[test]
    fn test_update_keeps_refresh_token() {
        let mut credential = test_credential(&[], -60);
        credential.update_access_token("new-token".to_string(), None, 3600);

        assert_eq!(credential.access_token(), "new-token");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//test-refresh-token"));
        assert!(credential.is_valid());
    }

    #[test]
    fn test_reads_authorized_user_json() {
        let json = r#"{
            "token": "ya29.abc",
            "refresh_token": "1//xyz",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2030-01-01T00:00:00.123456Z"
        }"#;

        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token(), "ya29.abc");
        assert!(credential.has_scopes(&["https://www.googleapis.com/auth/gmail.readonly"]));
        assert!(credential.is_valid());
    }
}

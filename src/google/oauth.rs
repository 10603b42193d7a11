/// Google OAuth2 安装应用授权流程
///
/// 授权码流程（带 PKCE），通过本地回环服务器接收回调
use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret as OAuthClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Header, Response, Server};
use tokio::sync::oneshot;
use url::Url;

use crate::config::Settings;
use crate::config::client_secret::ClientSecret;
use crate::error::{AuthError, AuthResult};
use crate::google::types::Credential;

/// Token 响应缺少 expires_in 时的默认有效期（秒）
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>授权成功 - Google OS</title></head>
<body>
    <h1>授权成功</h1>
    <p>The authentication flow has completed. You may close this window.</p>
</body>
</html>"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>授权失败 - Google OS</title></head>
<body>
    <h1>授权失败</h1>
    <p>Authorization was not granted. Please return to the terminal.</p>
</body>
</html>"#;

/// 交互式授权流程
///
/// 凭据缺失、Scope 不足或刷新失败时由 `CredentialStore` 调用
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self, scopes: &[String]) -> AuthResult<Credential>;
}

/// 回环回调结果
type CallbackResult = Result<(AuthorizationCode, CsrfToken), String>;

/// 安装应用流程（等价于 run_local_server(port=0)）
#[derive(Debug, Clone)]
pub struct InstalledAppFlow {
    credentials_file: PathBuf,
    open_browser: bool,
    callback_timeout: Duration,
}

impl InstalledAppFlow {
    pub fn new(credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: credentials_file.into(),
            open_browser: false,
            callback_timeout: Duration::from_secs(300),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            credentials_file: settings.secrets.credentials_file.clone(),
            open_browser: settings.auth.open_browser,
            callback_timeout: Duration::from_secs(settings.auth.callback_timeout_secs),
        }
    }
}

#[async_trait]
impl AuthorizationFlow for InstalledAppFlow {
    /// 执行授权
    ///
    /// 1. 读取客户端密钥
    /// 2. 启动本地服务器（系统分配端口）
    /// 3. 生成授权 URL 并打印（可选打开浏览器）
    /// 4. 等待回调并验证 CSRF state
    /// 5. 交换 Token
    async fn authorize(&self, scopes: &[String]) -> AuthResult<Credential> {
        tracing::info!("🔐 开始 OAuth2 授权流程");

        let secret = ClientSecret::from_file(&self.credentials_file)?;

        let server = Arc::new(
            Server::http("127.0.0.1:0")
                .map_err(|e| AuthError::Flow(format!("无法启动本地服务器: {}", e)))?,
        );
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| AuthError::Flow("本地服务器未绑定 TCP 端口".to_string()))?;
        let redirect_uri = format!("http://localhost:{}/", port);
        tracing::info!("✅ 本地服务器启动成功: {}", redirect_uri);

        let client = build_client(&secret, &redirect_uri)?;
        let (auth_url, csrf_state, pkce_verifier) = build_auth_url(&client, scopes);
        tracing::debug!("授权 URL: {}", auth_url);

        println!(
            "Please visit this URL to authorize this application: {}",
            auth_url
        );
        if self.open_browser {
            if let Err(e) = webbrowser::open(auth_url.as_str()) {
                tracing::warn!("无法打开浏览器，请手动复制上方 URL: {}", e);
            }
        }

        let (code_tx, code_rx) = oneshot::channel();
        let listener = Arc::clone(&server);
        let server_handle = std::thread::spawn(move || wait_for_callback(&listener, port, code_tx));

        let callback = tokio::time::timeout(self.callback_timeout, code_rx).await;
        // 超时或已收到回调都需要让监听线程退出
        server.unblock();
        if server_handle.join().is_err() {
            tracing::warn!("回调服务器线程 panic");
        }

        let (code, received_state) = callback
            .map_err(|_| AuthError::Flow("授权超时：用户未在规定时间内完成授权".to_string()))?
            .map_err(|_| AuthError::Flow("本地服务器未收到回调".to_string()))?
            .map_err(AuthError::Flow)?;
        tracing::info!("✅ 收到授权回调");

        if received_state.secret() != csrf_state.secret() {
            return Err(AuthError::Flow("CSRF 验证失败：state 不匹配".to_string()));
        }

        let token_response = client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        tracing::info!("✅ Token 交换成功");
        Ok(credential_from_response(&secret, &token_response, scopes))
    }
}

/// 构建 OAuth2 客户端
pub(crate) fn build_client(secret: &ClientSecret, redirect_uri: &str) -> AuthResult<BasicClient> {
    let invalid = |e: url::ParseError| AuthError::Flow(format!("无效的 OAuth2 地址: {}", e));

    Ok(BasicClient::new(
        ClientId::new(secret.client_id.clone()),
        Some(OAuthClientSecret::new(secret.client_secret.clone())),
        AuthUrl::new(secret.auth_uri.clone()).map_err(invalid)?,
        Some(TokenUrl::new(secret.token_uri.clone()).map_err(invalid)?),
    )
    .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string()).map_err(invalid)?))
}

/// 生成授权 URL
///
/// 请求 offline access 并强制 consent，确保返回 refresh_token
fn build_auth_url(client: &BasicClient, scopes: &[String]) -> (Url, CsrfToken, PkceCodeVerifier) {
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().map(|s| Scope::new(s.clone())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge)
        .url();

    (auth_url, csrf_state, pkce_verifier)
}

/// 等待浏览器回调
///
/// 忽略不带 code / error 的请求（例如 favicon），直到收到回调或被 unblock
fn wait_for_callback(server: &Server, port: u16, code_tx: oneshot::Sender<CallbackResult>) {
    for request in server.incoming_requests() {
        let url_str = format!("http://localhost:{}{}", port, request.url());
        tracing::debug!("收到请求: {}", url_str);

        let outcome = match parse_callback(&url_str) {
            Some(outcome) => outcome,
            None => {
                let _ = request.respond(Response::empty(404));
                continue;
            }
        };

        let page = if outcome.is_ok() { SUCCESS_HTML } else { ERROR_HTML };
        let response = Response::from_string(page).with_header(html_header());
        if let Err(e) = request.respond(response) {
            tracing::warn!("返回回调页面失败: {}", e);
        }

        let _ = code_tx.send(outcome);
        return;
    }
}

/// 解析回调 URL
///
/// 返回 `None` 表示这不是授权回调
fn parse_callback(url_str: &str) -> Option<CallbackResult> {
    let parsed = Url::parse(url_str).ok()?;
    let params: HashMap<_, _> = parsed.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        tracing::error!("用户拒绝授权: {}", error);
        return Some(Err(format!("用户拒绝授权: {}", error)));
    }

    let code = params.get("code")?;
    let state = params
        .get("state")
        .map(|s| CsrfToken::new(s.clone()))
        .unwrap_or_else(|| CsrfToken::new(String::new()));

    Some(Ok((AuthorizationCode::new(code.clone()), state)))
}

fn html_header() -> Header {
    Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
        .expect("静态 Content-Type header")
}

/// 由 Token 响应构造凭据
///
/// 响应里没有 scope 字段时，视为授予了全部请求的 Scope
pub(crate) fn credential_from_response(
    secret: &ClientSecret,
    response: &BasicTokenResponse,
    requested_scopes: &[String],
) -> Credential {
    let scopes = response
        .scopes()
        .map(|granted| granted.iter().map(|s| s.as_str().to_string()).collect())
        .unwrap_or_else(|| requested_scopes.to_vec());

    let expires_in = response
        .expires_in()
        .unwrap_or(Duration::from_secs(DEFAULT_EXPIRES_IN_SECS))
        .as_secs() as i64;

    Credential::issued(
        secret,
        response.access_token().secret().to_string(),
        response.refresh_token().map(|t| t.secret().to_string()),
        expires_in,
        scopes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> ClientSecret {
        serde_json::from_str(r#"{"client_id": "test-id", "client_secret": "test-secret"}"#).unwrap()
    }

    #[test]
    fn test_auth_url_contains_pkce_and_offline_access() {
        let client = build_client(&test_secret(), "http://localhost:8765/").unwrap();
        let scopes = vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()];

        let (url, state, _) = build_auth_url(&client, &scopes);
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["client_id"], "test-id");
        assert_eq!(params["redirect_uri"], "http://localhost:8765/");
        assert_eq!(params["scope"], scopes[0]);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(&params["state"], state.secret());
    }

    #[test]
    fn test_parse_callback_with_code() {
        let outcome = parse_callback("http://localhost:8765/?state=abc&code=4/0Ab&scope=x")
            .unwrap()
            .unwrap();
        assert_eq!(outcome.0.secret(), "4/0Ab");
        assert_eq!(outcome.1.secret(), "abc");
    }

    #[test]
    fn test_parse_callback_with_error() {
        let outcome = parse_callback("http://localhost:8765/?error=access_denied").unwrap();
        assert!(outcome.unwrap_err().contains("access_denied"));
    }

    #[test]
    fn test_parse_callback_ignores_other_requests() {
        assert!(parse_callback("http://localhost:8765/favicon.ico").is_none());
    }

    #[test]
    fn test_credential_from_response_defaults_scopes() {
        let response: BasicTokenResponse = serde_json::from_str(
            r#"{"access_token": "ya29.new", "token_type": "Bearer", "refresh_token": "1//r"}"#,
        )
        .unwrap();
        let requested = vec!["scope-a".to_string()];

        let credential = credential_from_response(&test_secret(), &response, &requested);
        assert_eq!(credential.access_token(), "ya29.new");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(credential.scopes, requested);
        assert!(credential.is_valid());
    }

    #[tokio::test]
    async fn test_missing_client_secret_fails() {
        let flow = InstalledAppFlow::new("/nonexistent/credentials.json");
        let err = flow.authorize(&[]).await.unwrap_err();
        assert!(matches!(err, AuthError::ClientSecret { .. }));
    }
}

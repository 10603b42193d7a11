/// Access Token 刷新模块
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};

use crate::config::client_secret::DEFAULT_AUTH_URI;
use crate::error::{AuthError, AuthResult};
use crate::google::types::Credential;

/// Token 响应缺少 expires_in 时的默认有效期（秒）
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// 使用 Refresh Token 原地刷新 Access Token
///
/// 只尝试一次，不重试
///
/// # Errors
/// - 凭据没有 Refresh Token
/// - Token 端点拒绝（invalid_grant：已过期或被撤销）
/// - 网络请求失败
pub async fn refresh_credential(credential: &mut Credential) -> AuthResult<()> {
    let refresh_token = credential
        .refresh_token
        .clone()
        .ok_or_else(|| AuthError::TokenExchange("凭据中没有 refresh_token".to_string()))?;

    tracing::debug!("开始刷新 Access Token: {}", credential.token_uri);

    let invalid = |e: url::ParseError| AuthError::TokenExchange(format!("无效的 Token 地址: {}", e));
    let client = BasicClient::new(
        ClientId::new(credential.client_id.clone()),
        Some(ClientSecret::new(credential.client_secret.clone())),
        AuthUrl::new(DEFAULT_AUTH_URI.to_string()).map_err(invalid)?,
        Some(TokenUrl::new(credential.token_uri.clone()).map_err(invalid)?),
    );

    let token_response = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .map_err(|e| {
            let error_msg = e.to_string();
            if format!("{:?}", e).contains("invalid_grant") {
                tracing::error!("❌ Token 刷新失败 [已过期或被撤销]: {}", error_msg);
            }
            AuthError::TokenExchange(format!("Refresh Token 交换失败: {}", error_msg))
        })?;

    let expires_in = token_response
        .expires_in()
        .unwrap_or(std::time::Duration::from_secs(DEFAULT_EXPIRES_IN_SECS))
        .as_secs() as i64;

    credential.update_access_token(
        token_response.access_token().secret().to_string(),
        token_response.refresh_token().map(|t| t.secret().to_string()),
        expires_in,
    );

    tracing::info!("✅ Access Token 刷新成功（新的过期时间: {:?}）", credential.expiry);
    Ok(())
}

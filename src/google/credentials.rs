/// 凭据生命周期管理
///
/// `CredentialStore` 负责 加载 → 刷新 → 重新授权 → 持久化，
/// `CredentialManager` 在其之上缓存凭据并保证同一时间只有一个刷新在进行
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::storage::TokenFile;
use crate::error::AuthResult;
use crate::google::oauth::AuthorizationFlow;
use crate::google::token::refresh_credential;
use crate::google::types::Credential;

pub struct CredentialStore {
    token_file: TokenFile,
    scopes: Vec<String>,
    flow: Arc<dyn AuthorizationFlow>,
}

impl CredentialStore {
    pub fn new<S: AsRef<str>>(
        token_file: TokenFile,
        scopes: &[S],
        flow: Arc<dyn AuthorizationFlow>,
    ) -> Self {
        Self {
            token_file,
            scopes: scopes.iter().map(|s| s.as_ref().to_string()).collect(),
            flow,
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// 获取可用凭据
    ///
    /// - 文件损坏：忽略，按不存在处理
    /// - Scope 不足：按不存在处理
    /// - 有效：原样返回，不写文件
    /// - 过期且有 Refresh Token：刷新一次，失败则重新授权
    /// - 不存在：执行授权流程
    ///
    /// 新获得或刷新后的凭据都会先写入 Token 文件再返回
    ///
    /// # Errors
    /// - 授权流程失败（例如缺少客户端密钥文件）
    /// - Token 文件写入失败
    pub async fn obtain(&self) -> AuthResult<Credential> {
        let loaded = match self.token_file.load() {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("⚠️ 加载 Token 失败，忽略已有文件: {}", e);
                None
            }
        };

        let loaded = loaded.filter(|credential| {
            let sufficient = credential.has_scopes(&self.scopes);
            if !sufficient {
                tracing::info!("已保存的 Token 缺少所需 Scope，需要重新授权");
            }
            sufficient
        });

        if let Some(credential) = &loaded {
            if credential.is_valid() {
                tracing::debug!("使用已保存的有效 Token");
                return Ok(credential.clone());
            }
        }

        let refreshed = match loaded {
            Some(mut credential) if credential.can_refresh() => {
                match refresh_credential(&mut credential).await {
                    Ok(()) => Some(credential),
                    Err(e) => {
                        tracing::warn!("⚠️ 刷新 Token 失败，重新授权: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        let credential = match refreshed {
            Some(credential) => credential,
            None => self.flow.authorize(&self.scopes).await?,
        };

        self.token_file.save(&credential)?;
        tracing::info!("✅ Token 已保存: {}", self.token_file.path().display());

        Ok(credential)
    }

    /// 删除已保存的 Token，下次 `obtain()` 将重新授权
    pub fn forget(&self) -> AuthResult<()> {
        self.token_file.remove()
    }
}

/// 进程内共享的凭据管理器
///
/// 首次调用时才获取凭据，失败会在下次调用时重试。
/// 持锁期间完成刷新，并发调用方等待同一结果
pub struct CredentialManager {
    store: CredentialStore,
    cached: Mutex<Option<Credential>>,
}

impl CredentialManager {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    pub async fn credential(&self) -> AuthResult<Credential> {
        let mut cached = self.cached.lock().await;

        if let Some(credential) = cached.as_ref().filter(|c| c.is_valid()) {
            return Ok(credential.clone());
        }

        let credential = self.store.obtain().await?;
        *cached = Some(credential.clone());
        Ok(credential)
    }

    /// 退出登录：清空缓存并删除 Token 文件
    pub async fn sign_out(&self) -> AuthResult<()> {
        let mut cached = self.cached.lock().await;
        *cached = None;
        self.store.forget()?;
        tracing::info!("👋 已退出登录");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::google::types::tests::test_credential;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

    /// 记录调用次数的授权流程
    struct CountingFlow {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingFlow {
        fn new(fail: bool) -> Arc<Self> {
            Self::slow(fail, Duration::ZERO)
        }

        fn slow(fail: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthorizationFlow for CountingFlow {
        async fn authorize(&self, scopes: &[String]) -> AuthResult<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AuthError::Flow("no client secret".to_string()));
            }
            let mut credential = test_credential(&[], 3600);
            credential.token = Some("ya29.from-flow".to_string());
            credential.scopes = scopes.to_vec();
            Ok(credential)
        }
    }

    fn store_for(token_path: &Path, flow: Arc<CountingFlow>) -> CredentialStore {
        CredentialStore::new(TokenFile::new(token_path), &[SCOPE], flow)
    }

    async fn mock_token_endpoint(status: u16) -> MockServer {
        let mock_server = MockServer::start().await;
        let body = if status == 200 {
            json!({"access_token": "ya29.refreshed", "expires_in": 3599, "token_type": "Bearer"})
        } else {
            json!({"error": "invalid_grant"})
        };
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_valid_token_skips_flow() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        TokenFile::new(&token_path).save(&test_credential(&[SCOPE], 3600)).unwrap();
        let modified = std::fs::metadata(&token_path).unwrap().modified().unwrap();

        let flow = CountingFlow::new(false);
        let credential = store_for(&token_path, flow.clone()).obtain().await.unwrap();

        assert_eq!(credential.access_token(), "ya29.test-access-token");
        assert_eq!(flow.calls(), 0);
        assert_eq!(std::fs::metadata(&token_path).unwrap().modified().unwrap(), modified);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_persists() {
        let mock_server = mock_token_endpoint(200).await;
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let mut expired = test_credential(&[SCOPE], -3600);
        expired.token_uri = format!("{}/token", mock_server.uri());
        TokenFile::new(&token_path).save(&expired).unwrap();

        let flow = CountingFlow::new(false);
        let credential = store_for(&token_path, flow.clone()).obtain().await.unwrap();

        assert_eq!(credential.access_token(), "ya29.refreshed");
        assert_eq!(flow.calls(), 0);
        let persisted = TokenFile::new(&token_path).load().unwrap().unwrap();
        assert_eq!(persisted.access_token(), "ya29.refreshed");
        assert!(persisted.is_valid());
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_flow() {
        let mock_server = mock_token_endpoint(400).await;
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let mut expired = test_credential(&[SCOPE], -3600);
        expired.token_uri = format!("{}/token", mock_server.uri());
        TokenFile::new(&token_path).save(&expired).unwrap();

        let flow = CountingFlow::new(false);
        let credential = store_for(&token_path, flow.clone()).obtain().await.unwrap();

        assert_eq!(credential.access_token(), "ya29.from-flow");
        assert_eq!(flow.calls(), 1);
        let persisted = TokenFile::new(&token_path).load().unwrap().unwrap();
        assert_eq!(persisted.access_token(), "ya29.from-flow");
    }

    #[tokio::test]
    async fn test_missing_token_runs_flow() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("secrets/token.json");

        let flow = CountingFlow::new(false);
        let credential = store_for(&token_path, flow.clone()).obtain().await.unwrap();

        assert_eq!(flow.calls(), 1);
        assert_eq!(credential.scopes, vec![SCOPE.to_string()]);
        assert!(token_path.exists());
    }

    #[tokio::test]
    async fn test_malformed_token_treated_as_absent() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(&token_path, "garbage").unwrap();

        let flow = CountingFlow::new(false);
        store_for(&token_path, flow.clone()).obtain().await.unwrap();

        assert_eq!(flow.calls(), 1);
        assert!(TokenFile::new(&token_path).load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insufficient_scopes_treated_as_absent() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        TokenFile::new(&token_path)
            .save(&test_credential(&["https://www.googleapis.com/auth/drive.readonly"], 3600))
            .unwrap();

        let flow = CountingFlow::new(false);
        let credential = store_for(&token_path, flow.clone()).obtain().await.unwrap();

        assert_eq!(flow.calls(), 1);
        assert!(credential.has_scopes(&[SCOPE]));
    }

    #[tokio::test]
    async fn test_flow_failure_is_auth_error() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");

        let err = store_for(&token_path, CountingFlow::new(true))
            .obtain()
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Flow(_)));
        assert!(!token_path.exists());
    }

    #[tokio::test]
    async fn test_manager_caches_credential() {
        let dir = tempdir().unwrap();
        let flow = CountingFlow::new(false);
        let manager =
            CredentialManager::new(store_for(&dir.path().join("token.json"), flow.clone()));

        manager.credential().await.unwrap();
        manager.credential().await.unwrap();

        assert_eq!(flow.calls(), 1);
    }

    #[tokio::test]
    async fn test_manager_retries_after_failure() {
        let dir = tempdir().unwrap();
        let flow = CountingFlow::new(true);
        let manager =
            CredentialManager::new(store_for(&dir.path().join("token.json"), flow.clone()));

        assert!(manager.credential().await.is_err());
        assert!(manager.credential().await.is_err());

        assert_eq!(flow.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_manager_single_flight_under_concurrency() {
        let dir = tempdir().unwrap();
        let flow = CountingFlow::slow(false, Duration::from_millis(100));
        let manager = Arc::new(CredentialManager::new(store_for(
            &dir.path().join("token.json"),
            flow.clone(),
        )));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.credential().await })
            })
            .collect();

        for handle in handles {
            let credential = handle.await.unwrap().unwrap();
            assert_eq!(credential.access_token(), "ya29.from-flow");
        }
        assert_eq!(flow.calls(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_clears_cache_and_file() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let flow = CountingFlow::new(false);
        let manager = CredentialManager::new(store_for(&token_path, flow.clone()));

        manager.credential().await.unwrap();
        assert!(token_path.exists());

        manager.sign_out().await.unwrap();
        assert!(!token_path.exists());

        manager.credential().await.unwrap();
        assert_eq!(flow.calls(), 2);
    }
}

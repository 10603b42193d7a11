/// Google 模块 - OAuth2 凭据与 API 调用
pub mod api;
pub mod credentials;
pub mod oauth;
pub mod services;
pub mod token;
pub mod types;

// 重新导出常用类型
pub use api::{ApiClientFactory, DASHBOARD_SCOPES, ResourceFamily, SCRIPT_SCOPES};
pub use credentials::{CredentialManager, CredentialStore};
pub use oauth::{AuthorizationFlow, InstalledAppFlow};
pub use types::Credential;

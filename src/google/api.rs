/// Google API 客户端构造
///
/// `ApiClientFactory` 根据凭据为每类资源构造客户端，只做构造，不发请求
use serde::de::DeserializeOwned;

use crate::config::ApiEndpoints;
use crate::error::{RemoteCallError, RemoteResult};
use crate::google::services::{
    CalendarClient, DriveClient, GmailClient, ProfileClient, TasksClient,
};
use crate::google::types::Credential;
use crate::utils::http_client;

pub const GMAIL_READONLY: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const CALENDAR_READONLY: &str = "https://www.googleapis.com/auth/calendar.readonly";
pub const DRIVE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const USERINFO_PROFILE: &str = "https://www.googleapis.com/auth/userinfo.profile";
pub const TASKS_READONLY: &str = "https://www.googleapis.com/auth/tasks.readonly";

/// fetch-gmail 脚本所需 Scope
pub const SCRIPT_SCOPES: &[&str] = &[GMAIL_READONLY];

/// Dashboard 所需 Scope
pub const DASHBOARD_SCOPES: &[&str] = &[
    GMAIL_READONLY,
    CALENDAR_READONLY,
    DRIVE_READONLY,
    USERINFO_PROFILE,
    TASKS_READONLY,
];

/// 资源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFamily {
    Mail,
    Calendar,
    Drive,
    Profile,
    Tasks,
}

impl ResourceFamily {
    /// 访问该类资源所需的 Scope
    pub fn scope(self) -> &'static str {
        match self {
            ResourceFamily::Mail => GMAIL_READONLY,
            ResourceFamily::Calendar => CALENDAR_READONLY,
            ResourceFamily::Drive => DRIVE_READONLY,
            ResourceFamily::Profile => USERINFO_PROFILE,
            ResourceFamily::Tasks => TASKS_READONLY,
        }
    }
}

/// 携带 Access Token 的 REST 客户端
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    access_token: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// GET 请求并解析 JSON
    ///
    /// # Errors
    /// - 请求发送失败
    /// - 非 2xx 状态码（401 通常表示 Token 已失效）
    /// - 响应不是预期的 JSON 结构
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!("GET {}", url);

        let response = http_client::get_client()
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                tracing::warn!("API 返回 401，Token 可能已失效: {}", url);
            }
            return Err(RemoteCallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RemoteCallError::Decode(e.to_string()))
    }
}

/// 按资源类别构造客户端
#[derive(Debug, Clone, Default)]
pub struct ApiClientFactory {
    endpoints: ApiEndpoints,
}

impl ApiClientFactory {
    pub fn new(endpoints: ApiEndpoints) -> Self {
        Self { endpoints }
    }

    /// 为指定资源类别构造 REST 客户端
    ///
    /// Token 无效只会在首次请求时以 `RemoteCallError` 暴露
    pub fn client_for(&self, family: ResourceFamily, credential: &Credential) -> RestClient {
        if !credential.has_scopes(&[family.scope()]) {
            tracing::warn!("凭据缺少 {:?} 所需 Scope: {}", family, family.scope());
        }

        let base_url = match family {
            ResourceFamily::Mail => &self.endpoints.gmail,
            ResourceFamily::Calendar => &self.endpoints.calendar,
            ResourceFamily::Drive => &self.endpoints.drive,
            ResourceFamily::Profile => &self.endpoints.userinfo,
            ResourceFamily::Tasks => &self.endpoints.tasks,
        };

        RestClient::new(base_url.as_str(), credential.access_token())
    }

    pub fn gmail(&self, credential: &Credential) -> GmailClient {
        GmailClient::new(self.client_for(ResourceFamily::Mail, credential))
    }

    pub fn calendar(&self, credential: &Credential) -> CalendarClient {
        CalendarClient::new(self.client_for(ResourceFamily::Calendar, credential))
    }

    pub fn drive(&self, credential: &Credential) -> DriveClient {
        DriveClient::new(self.client_for(ResourceFamily::Drive, credential))
    }

    pub fn profile(&self, credential: &Credential) -> ProfileClient {
        ProfileClient::new(self.client_for(ResourceFamily::Profile, credential))
    }

    pub fn tasks(&self, credential: &Credential) -> TasksClient {
        TasksClient::new(self.client_for(ResourceFamily::Tasks, credential))
    }
}

/// Dashboard HTTP 服务
///
/// 基于 tiny_http 的单线程服务：主线程逐个接收请求，
/// 通过 tokio 运行时阻塞执行对应处理器
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tiny_http::{Header, Method, Response, Server};

use crate::error::{RemoteCallError, RemoteResult};
use crate::google::api::ApiClientFactory;
use crate::google::credentials::CredentialManager;
use crate::handlers;

/// Dashboard 路由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Profile,
    Gmail,
    Calendar,
    Drive,
    Documents,
    Meetings,
    Tasks,
    Logout,
}

impl Route {
    /// 按路径匹配路由，忽略查询字符串
    pub fn parse(url: &str) -> Option<Self> {
        let path = url.split('?').next().unwrap_or(url);
        match path {
            "/api/profile" => Some(Route::Profile),
            "/api/gmail" => Some(Route::Gmail),
            "/api/calendar" => Some(Route::Calendar),
            "/api/drive" => Some(Route::Drive),
            "/api/documents" => Some(Route::Documents),
            "/api/meetings" => Some(Route::Meetings),
            "/api/tasks" => Some(Route::Tasks),
            "/api/logout" => Some(Route::Logout),
            _ => None,
        }
    }

    /// 路由接受的方法，只有退出登录会修改状态
    pub fn method(self) -> Method {
        match self {
            Route::Logout => Method::Post,
            _ => Method::Get,
        }
    }
}

/// 处理结果（状态码 + JSON）
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::json(status, json!({ "error": message }))
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    /// 转换为 tiny_http 响应，附带 CORS 头
    pub fn into_http(self) -> Response<std::io::Cursor<Vec<u8>>> {
        let is_preflight = self.body.is_none();
        let mut response = match self.body {
            Some(body) => Response::from_string(body.to_string())
                .with_header(header("Content-Type", "application/json")),
            None => Response::from_data(Vec::new()),
        }
        .with_status_code(self.status)
        .with_header(header("Access-Control-Allow-Origin", "*"));

        if is_preflight {
            response.add_header(header("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
            response.add_header(header(
                "Access-Control-Allow-Headers",
                "Content-Type, Authorization",
            ));
        }
        response
    }
}

fn header(name: &str, value: &str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("静态 header 合法")
}

/// Dashboard 后端
pub struct Dashboard {
    credentials: CredentialManager,
    clients: ApiClientFactory,
}

impl Dashboard {
    pub fn new(credentials: CredentialManager, clients: ApiClientFactory) -> Self {
        Self {
            credentials,
            clients,
        }
    }

    /// 启动时尝试获取凭据
    ///
    /// 失败只记录日志，错误推迟到首次 API 调用时返回
    pub async fn warm_up(&self) {
        match self.credentials.credential().await {
            Ok(_) => tracing::info!("✅ 凭据就绪"),
            Err(e) => tracing::warn!("⚠️ 启动时获取凭据失败，将在首次请求时重试: {}", e),
        }
    }

    /// 分发单个请求
    pub async fn dispatch(&self, method: &Method, url: &str) -> ApiResponse {
        if *method == Method::Options {
            return ApiResponse::no_content();
        }

        let Some(route) = Route::parse(url) else {
            return ApiResponse::error(404, "Not Found");
        };

        if *method != route.method() {
            return ApiResponse::error(405, "Method Not Allowed");
        }

        match self.handle(route).await {
            Ok(body) => ApiResponse::json(200, body),
            Err(e) => {
                tracing::error!("❌ {:?} 处理失败: {}", route, e);
                ApiResponse::error(500, e.to_string())
            }
        }
    }

    async fn handle(&self, route: Route) -> RemoteResult<Value> {
        let clients = &self.clients;
        // 退出登录不需要凭据，其余路由按需获取
        let credential = || self.credentials.credential();

        match route {
            Route::Profile => {
                to_json(handlers::profile(&clients.profile(&credential().await?)).await?)
            }
            Route::Gmail => {
                to_json(handlers::inbox_messages(&clients.gmail(&credential().await?)).await?)
            }
            Route::Calendar => {
                let calendar = clients.calendar(&credential().await?);
                to_json(handlers::upcoming_events(&calendar, Utc::now()).await?)
            }
            Route::Drive => {
                to_json(handlers::recent_files(&clients.drive(&credential().await?)).await?)
            }
            Route::Documents => {
                to_json(handlers::recent_documents(&clients.drive(&credential().await?)).await?)
            }
            Route::Meetings => {
                let calendar = clients.calendar(&credential().await?);
                to_json(handlers::upcoming_meetings(&calendar, Utc::now()).await?)
            }
            Route::Tasks => {
                to_json(handlers::task_board(&clients.tasks(&credential().await?)).await?)
            }
            Route::Logout => {
                self.credentials.sign_out().await?;
                Ok(json!({ "success": true }))
            }
        }
    }
}

fn to_json<T: Serialize>(records: T) -> RemoteResult<Value> {
    serde_json::to_value(records).map_err(|e| RemoteCallError::Decode(e.to_string()))
}

/// 请求循环，直到服务器关闭
pub fn serve(dashboard: &Dashboard, server: &Server, rt: &tokio::runtime::Runtime) {
    for request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let response = rt.block_on(dashboard.dispatch(&method, &url));
        tracing::info!("{} {} -> {}", method, url, response.status);

        if let Err(e) = request.respond(response.into_http()) {
            tracing::warn!("写入响应失败: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/api/gmail"), Some(Route::Gmail));
        assert_eq!(Route::parse("/api/drive?foo=bar"), Some(Route::Drive));
        assert_eq!(Route::parse("/api/profile"), Some(Route::Profile));
        assert_eq!(Route::parse("/api/documents"), Some(Route::Documents));
        assert_eq!(Route::parse("/api/meetings"), Some(Route::Meetings));
        assert_eq!(Route::parse("/api/tasks"), Some(Route::Tasks));
        assert_eq!(Route::parse("/api/logout"), Some(Route::Logout));
        assert_eq!(Route::parse("/api/calendar/"), None);
        assert_eq!(Route::parse("/"), None);
    }

    #[test]
    fn test_route_methods() {
        assert_eq!(Route::Gmail.method(), Method::Get);
        assert_eq!(Route::Tasks.method(), Method::Get);
        assert_eq!(Route::Logout.method(), Method::Post);
    }

    #[test]
    fn test_error_body() {
        let response = ApiResponse::error(500, "boom");
        assert_eq!(response.status, 500);
        assert_eq!(response.body, Some(json!({"error": "boom"})));
    }

    #[test]
    fn test_into_http_sets_cors() {
        let response = ApiResponse::json(200, json!([])).into_http();
        assert_eq!(response.status_code().0, 200);
        assert!(
            response
                .headers()
                .iter()
                .any(|h| h.field.equiv("Access-Control-Allow-Origin") && h.value.as_str() == "*")
        );
    }

    #[test]
    fn test_preflight_headers() {
        let response = ApiResponse::no_content().into_http();
        assert_eq!(response.status_code().0, 204);
        assert!(
            response
                .headers()
                .iter()
                .any(|h| h.field.equiv("Access-Control-Allow-Methods"))
        );
    }
}

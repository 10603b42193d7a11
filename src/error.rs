/// 错误类型定义
///
/// 只区分两类错误：
/// - `AuthError`：凭据无法获取或刷新
/// - `RemoteCallError`：调用 Google API 过程中的任何失败
use std::path::PathBuf;
use thiserror::Error;

/// 凭据相关错误
#[derive(Error, Debug)]
pub enum AuthError {
    /// 客户端密钥文件缺失或格式错误
    #[error("无法读取客户端密钥文件 {path}: {reason}")]
    ClientSecret { path: PathBuf, reason: String },

    /// 授权流程未能完成（用户拒绝、超时、CSRF 不匹配等）
    #[error("授权流程失败: {0}")]
    Flow(String),

    /// 授权码或 Refresh Token 交换失败
    #[error("Token 交换失败: {0}")]
    TokenExchange(String),

    /// Token 文件读写失败
    #[error("Token 持久化失败 {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Token 序列化失败
    #[error("Token 序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 远程调用错误
///
/// 处理器边界只关心错误消息本身，不区分网络 / 鉴权 / 配额
#[derive(Error, Debug)]
pub enum RemoteCallError {
    /// 调用前获取凭据失败
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// 请求发送失败或响应体读取失败
    #[error("请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// API 返回非成功状态码
    #[error("API 返回错误 {status}: {body}")]
    Status { status: u16, body: String },

    /// 响应 JSON 结构不符合预期
    #[error("解析响应失败: {0}")]
    Decode(String),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

pub type RemoteResult<T> = std::result::Result<T, RemoteCallError>;

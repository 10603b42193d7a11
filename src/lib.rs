//! Google OS：Google 账户 Dashboard 后端与 Gmail 拉取脚本
//!
//! 凭据生命周期（`google::credentials`）→ 客户端构造（`google::api`）→
//! 请求处理（`handlers`），单向调用

pub mod config;
pub mod error;
pub mod google;
pub mod handlers;
pub mod server;
pub mod utils;

pub use error::{AuthError, RemoteCallError};

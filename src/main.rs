//! Dashboard 后端入口
//!
//! 提供 `/api/profile`、`/api/gmail`、`/api/calendar`、`/api/drive` 等只读接口，
//! 以及 `POST /api/logout`

use anyhow::{Context, Result};
use std::sync::Arc;

use google_os::config::Settings;
use google_os::config::storage::TokenFile;
use google_os::google::{
    ApiClientFactory, CredentialManager, CredentialStore, DASHBOARD_SCOPES, InstalledAppFlow,
};
use google_os::server::{self, Dashboard};

fn main() -> Result<()> {
    // 1. 初始化日志
    init_logger()?;

    // 2. 加载配置
    let settings = Settings::load().context("加载配置失败")?;

    // 3. 创建 Tokio 运行时（用于 async OAuth2 与 API 调用）
    let rt = tokio::runtime::Runtime::new()?;

    // 4. 组装凭据管理与客户端工厂
    let flow = InstalledAppFlow::from_settings(&settings);
    let store = CredentialStore::new(
        TokenFile::new(&settings.secrets.dashboard_token_file),
        DASHBOARD_SCOPES,
        Arc::new(flow),
    );
    let dashboard = Dashboard::new(
        CredentialManager::new(store),
        ApiClientFactory::new(settings.endpoints.clone()),
    );

    // 5. 启动时尝试授权（失败推迟到首次请求）
    rt.block_on(dashboard.warm_up());

    // 6. 启动 HTTP 服务
    let addr = settings.server.bind_addr();
    let server = tiny_http::Server::http(&addr)
        .map_err(|e| anyhow::anyhow!("无法启动 HTTP 服务 {}: {}", addr, e))?;
    tracing::info!("🚀 Dashboard 后端已启动: http://{}", addr);

    server::serve(&dashboard, &server, &rt);

    Ok(())
}

/// 初始化日志系统
fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "google_os=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

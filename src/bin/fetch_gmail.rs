//! 拉取最近 5 封邮件并打印发件人与主题

use anyhow::{Context, Result};
use std::sync::Arc;

use google_os::config::Settings;
use google_os::config::storage::TokenFile;
use google_os::google::{ApiClientFactory, CredentialStore, InstalledAppFlow, SCRIPT_SCOPES};
use google_os::handlers;

/// 打印的邮件条数
const MESSAGE_LIMIT: u32 = 5;

fn main() -> Result<()> {
    init_logger()?;

    let settings = Settings::load().context("加载配置失败")?;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(run(settings))
}

async fn run(settings: Settings) -> Result<()> {
    let store = CredentialStore::new(
        TokenFile::new(&settings.secrets.token_file),
        SCRIPT_SCOPES,
        Arc::new(InstalledAppFlow::from_settings(&settings)),
    );

    // 凭据获取失败直接退出
    let credential = store.obtain().await.context("获取 Gmail 凭据失败")?;

    let gmail = ApiClientFactory::new(settings.endpoints).gmail(&credential);
    let summaries = handlers::latest_messages(&gmail, MESSAGE_LIMIT)
        .await
        .context("获取邮件失败")?;

    println!("{}", handlers::render_summaries(&summaries));
    Ok(())
}

/// 日志写到 stderr，stdout 只输出邮件列表
fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "google_os=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

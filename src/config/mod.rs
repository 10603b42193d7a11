use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod client_secret;
pub mod storage;

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "GOOGLE_OS_CONFIG";

/// 应用配置
///
/// 加载优先级（从高到低）：
/// 1. 环境变量 `GOOGLE_OS_*`
/// 2. 配置文件（`GOOGLE_OS_CONFIG` 或 `<config_dir>/GoogleOS/config.toml`）
/// 3. 默认值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub secrets: SecretsConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub endpoints: ApiEndpoints,
}

/// 密钥与 Token 文件位置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Google Cloud 下载的客户端密钥 JSON
    pub credentials_file: PathBuf,

    /// fetch-gmail 脚本使用的 Token 文件
    pub token_file: PathBuf,

    /// Dashboard 使用的 Token 文件（Scope 更多，单独存放）
    pub dashboard_token_file: PathBuf,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from(".agent/secrets/credentials.json"),
            token_file: PathBuf::from(".agent/secrets/token.json"),
            dashboard_token_file: PathBuf::from(".agent/secrets/token_dashboard.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 授权流程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 是否自动打开浏览器（默认只打印授权 URL）
    pub open_browser: bool,

    /// 等待浏览器回调的超时时间（秒）
    pub callback_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            open_browser: false,
            callback_timeout_secs: 300,
        }
    }
}

/// Google API 基础地址（测试时可指向 mock 服务器）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub gmail: String,
    pub calendar: String,
    pub drive: String,
    pub userinfo: String,
    pub tasks: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            gmail: "https://gmail.googleapis.com/gmail/v1".to_string(),
            calendar: "https://www.googleapis.com/calendar/v3".to_string(),
            drive: "https://www.googleapis.com/drive/v3".to_string(),
            userinfo: "https://www.googleapis.com/oauth2/v2".to_string(),
            tasks: "https://tasks.googleapis.com/tasks/v1".to_string(),
        }
    }
}

impl Settings {
    /// 加载配置
    ///
    /// 配置文件不存在时使用默认值，不会自动创建
    pub fn load() -> Result<Self> {
        let mut settings = match config_path() {
            Some(path) if path.exists() => {
                tracing::info!("✅ 从配置文件加载: {}", path.display());
                Self::from_file(&path)?
            }
            _ => {
                tracing::debug!("未找到配置文件，使用默认配置");
                Self::default()
            }
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 用环境变量覆盖配置项
    ///
    /// `lookup` 一般是 `std::env::var`，测试中可以传入固定表
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GOOGLE_OS_CREDENTIALS_FILE") {
            self.secrets.credentials_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("GOOGLE_OS_TOKEN_FILE") {
            self.secrets.token_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("GOOGLE_OS_DASHBOARD_TOKEN_FILE") {
            self.secrets.dashboard_token_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("GOOGLE_OS_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("GOOGLE_OS_PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("GOOGLE_OS_PORT 不是有效端口: {}", v))?;
        }
        if let Some(v) = lookup("GOOGLE_OS_OPEN_BROWSER") {
            self.auth.open_browser =
                matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }
}

/// 获取配置文件路径
///
/// 优先使用 `GOOGLE_OS_CONFIG`，否则为 `<config_dir>/GoogleOS/config.toml`
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("GoogleOS").join("config.toml"))
}

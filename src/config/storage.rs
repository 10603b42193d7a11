/// Token 文件存储模块
///
/// 负责将凭据以 JSON 格式持久化到本地文件
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{AuthError, AuthResult};
use crate::google::types::Credential;

/// 单个 Token 文件
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载凭据
    ///
    /// # Returns
    /// 文件不存在时返回 `Ok(None)`
    ///
    /// # Errors
    /// - 文件无法读取
    /// - JSON 格式错误（文件可能损坏）
    pub fn load(&self) -> AuthResult<Option<Credential>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Token 文件不存在: {}", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(AuthError::Storage {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let credential: Credential = serde_json::from_str(&content)?;
        tracing::debug!("成功加载 Token: {}", self.path.display());
        Ok(Some(credential))
    }

    /// 保存凭据（覆盖写入）
    ///
    /// 父目录不存在时自动创建，Unix 下文件权限设为 0600
    pub fn save(&self, credential: &Credential) -> AuthResult<()> {
        let storage_err = |source| AuthError::Storage {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }

        let content = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, content).map_err(storage_err)?;
        secure_token_file(&self.path).map_err(storage_err)?;

        tracing::debug!("Token 已保存到: {}", self.path.display());
        Ok(())
    }

    /// 删除 Token 文件，文件不存在视为成功
    pub fn remove(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Token 文件已删除: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AuthError::Storage {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// 仅所有者可读写
#[cfg(unix)]
fn secure_token_file(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn secure_token_file(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

//! # 应用状态守卫
//!
//! 记录当前已加载的项目文件，供删除等破坏性操作在执行前查询。
//!
//! ## 持久化
//! 状态保存在 db 目录下的 `app-state.json`，服务重启后据此恢复上次加载的项目。
//! `in_memory()` 构造的实例不落盘，供测试使用。
//!
//! ## 线程安全
//! 使用 `std::sync::RwLock` 保存状态快照，锁不会跨越 `.await` 持有：
//! `record_load` 先将新状态写入磁盘，成功后才更新内存，
//! 因此落盘失败时内存中的状态保持不变。

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{ProjectError, Result};
use crate::models::app_state::AppState;

pub struct AppStateGate {
    state: RwLock<AppState>,
    /// 状态文件路径；为 `None` 时仅保存在内存中
    path: Option<PathBuf>,
}

impl AppStateGate {
    /// 创建不落盘的空状态
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(AppState::default()),
            path: None,
        }
    }

    /// 从状态文件加载
    ///
    /// 文件不存在时返回空状态；文件损坏时记录警告并返回空状态，
    /// 下一次成功加载项目时会覆盖损坏的文件。
    ///
    /// # 错误
    /// 文件存在但无法读取时返回错误
    pub async fn load(path: &Path) -> Result<Self> {
        let state = match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("应用状态文件 {} 解析失败，已重置: {}", path.display(), e);
                AppState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppState::default(),
            Err(e) => {
                return Err(ProjectError::Io(format!("读取应用状态文件失败: {}", e)));
            }
        };

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path.to_path_buf()),
        })
    }

    /// 当前状态快照
    pub fn get(&self) -> AppState {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// 当前已加载的项目文件名
    pub fn last_loaded_project(&self) -> Option<String> {
        self.get().last_loaded_project
    }

    /// 指定文件是否为当前已加载的项目
    pub fn is_loaded(&self, filename: &str) -> bool {
        self.last_loaded_project().as_deref() == Some(filename)
    }

    /// 记录一次成功的项目加载
    ///
    /// # 错误
    /// 状态文件写入失败时返回错误，此时内存中的状态不变
    pub async fn record_load(&self, filename: &str) -> Result<()> {
        let next = AppState {
            last_loaded_project: Some(filename.to_string()),
        };

        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ProjectError::Io(format!("创建 db 目录失败: {}", e)))?;
            }
            let content = serde_json::to_string_pretty(&next)?;
            tokio::fs::write(path, content)
                .await
                .map_err(|e| ProjectError::Io(format!("写入应用状态文件失败: {}", e)))?;
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| ProjectError::Io("应用状态锁已损坏".to_string()))?;
        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_record_load() {
        let gate = AppStateGate::in_memory();
        assert_eq!(gate.last_loaded_project(), None);

        gate.record_load("show.json").await.unwrap();
        assert!(gate.is_loaded("show.json"));
        assert!(!gate.is_loaded("other.json"));
    }

    #[tokio::test]
    async fn test_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("app-state.json");

        let gate = AppStateGate::load(&path).await.unwrap();
        assert_eq!(gate.get(), AppState::default());
        gate.record_load("show.json").await.unwrap();

        let reloaded = AppStateGate::load(&path).await.unwrap();
        assert_eq!(reloaded.last_loaded_project().as_deref(), Some("show.json"));
    }

    #[tokio::test]
    async fn test_corrupt_file_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app-state.json");
        std::fs::write(&path, "{not json").unwrap();

        let gate = AppStateGate::load(&path).await.unwrap();
        assert_eq!(gate.last_loaded_project(), None);
    }
}

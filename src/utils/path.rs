//! # 路径工具函数
//!
//! 提供与数据目录相关的工具函数，包括：
//! - 获取 Ontime 默认数据目录路径
//! - 由数据目录推导项目目录（`projects/`）、db 目录（`db/`）和服务配置文件路径

use std::path::{Path, PathBuf};

/// 项目目录名：每个项目一个 `.json` 文件
pub const PROJECTS_DIR_NAME: &str = "projects";

/// db 目录名：存放应用状态（当前已加载的项目引用）
pub const DB_DIR_NAME: &str = "db";

/// 服务配置文件名
pub const SERVER_CONFIG_FILE: &str = "server-config.json";

/// 应用状态文件名
pub const APP_STATE_FILE: &str = "app-state.json";

/// 获取 Ontime 默认数据目录的绝对路径
///
/// 使用 `dirs` crate 获取跨平台的用户数据目录，在其下创建 `ontime` 子目录。
///
/// # 返回值
/// - Windows: `C:\Users\username\AppData\Roaming\ontime`
/// - macOS: `/Users/username/Library/Application Support/ontime`
/// - Linux: `/home/username/.local/share/ontime`
///
/// # 错误
/// 如果无法确定用户数据目录（如无 HOME 环境变量），返回错误信息。
pub fn get_default_data_path() -> Result<PathBuf, String> {
    let data = dirs::data_dir().ok_or_else(|| "无法获取用户数据目录".to_string())?;
    Ok(data.join("ontime"))
}

/// 项目目录：`<data>/projects`
pub fn projects_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(PROJECTS_DIR_NAME)
}

/// db 目录：`<data>/db`
pub fn db_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_DIR_NAME)
}

/// 应用状态文件：`<data>/db/app-state.json`
pub fn app_state_path(data_dir: &Path) -> PathBuf {
    db_dir(data_dir).join(APP_STATE_FILE)
}

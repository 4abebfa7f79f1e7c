//! # 应用状态数据模型
//!
//! 对应 db 目录下的 `app-state.json`，记录服务重启后应恢复的项目文件。

use serde::{Deserialize, Serialize};

/// 应用状态快照
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface AppState {
///   lastLoadedProject: string | null;
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// 最近一次成功加载的项目文件名；为 `None` 表示尚未加载任何项目
    #[serde(default)]
    pub last_loaded_project: Option<String>,
}

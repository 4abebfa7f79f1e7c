//! # Ontime Server - 项目文件服务核心初始化模块
//!
//! 本模块负责服务的完整初始化流程，包括：
//! - 初始化日志（`env_logger`，默认 info 级别，可通过 `RUST_LOG` 覆盖）
//! - 加载服务配置（默认值 → `server-config.json` → 环境变量）
//! - 准备数据目录，恢复应用状态和上次加载的项目
//! - 启动 HTTP 服务
//!
//! ## 模块结构
//! - `routes/` - HTTP 路由与处理函数（接口层）
//! - `models/` - 数据模型（对应前端 TypeScript 类型）
//! - `services/` - 核心业务逻辑（文件名策略、仓库、应用状态、项目存储）
//! - `utils/` - 通用工具函数
//! - `config` - 服务配置
//! - `error` - 统一错误类型
//! - `server` - hyper 服务器

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod utils;

use std::sync::Arc;

use config::ServerConfig;
use routes::ApiState;
use services::app_state::AppStateGate;
use services::project_store::ProjectStore;
use services::repository::FsProjectRepository;

/// 服务启动函数
///
/// 完成以下工作：
/// 1. 初始化日志
/// 2. 加载配置
/// 3. 创建 `projects/` 与 `db/` 目录
/// 4. 从 `db/app-state.json` 恢复应用状态，并加载上次的项目（没有时创建默认项目）
/// 5. 启动 HTTP 服务，直到进程退出
///
/// # 错误
/// 任何一步失败都返回错误信息，由 `main` 打印后退出
pub async fn run() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::load().await?;
    log::info!("数据目录: {}", config.data_dir.display());

    let projects_dir = config.projects_dir();
    tokio::fs::create_dir_all(&projects_dir)
        .await
        .map_err(|e| format!("创建项目目录失败: {}", e))?;

    let gate = AppStateGate::load(&config.app_state_path())
        .await
        .map_err(|e| e.to_string())?;
    let store = ProjectStore::new(FsProjectRepository::new(projects_dir), Arc::new(gate));
    store.initialize().await.map_err(|e| e.to_string())?;

    let state = Arc::new(ApiState::new(store, config.max_upload_bytes));
    server::serve(config.socket_addr()?, state).await
}

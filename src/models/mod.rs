//! # 数据模型模块
//!
//! 定义了与前端 TypeScript 类型一一对应的 Rust 数据结构。
//! 所有结构体均派生 `Serialize` 和 `Deserialize`，用于 HTTP JSON 传输和项目文件读写。
//! - `project` - 项目文件（DatabaseModel）、补丁、项目列表和项目信息的数据结构
//! - `app_state` - 应用状态（当前已加载的项目文件）的数据结构

pub mod app_state;
pub mod project;

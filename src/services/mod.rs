//! # 业务逻辑服务模块
//!
//! 包含核心业务逻辑的实现，与 HTTP 路由层解耦：
//! - `filename` - 项目文件名策略：扩展名补全、去重、合法性与操作校验
//! - `file_guard` - 文件写入守卫：路径验证 + 原子写入
//! - `repository` - 项目文件仓库：文件系统实现与内存实现
//! - `app_state` - 应用状态守卫：记录当前已加载的项目
//! - `project_store` - 项目存储：列表、创建、复制、重命名、删除、加载、上传、补丁

pub mod app_state;
pub mod file_guard;
pub mod filename;
pub mod project_store;
pub mod repository;

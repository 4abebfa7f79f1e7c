//! # 项目存储服务
//!
//! 项目文件管理的业务核心，组合以下三个部分：
//! - `ProjectRepository` - 项目文件的字节存取（文件系统或内存）
//! - `AppStateGate` - 当前已加载项目的记录，删除前必须查询
//! - 内存中的活动项目（`DatabaseModel`），即前端正在操作的项目
//!
//! ## 单写者约束
//! 所有修改类操作（创建、重命名、复制、删除、加载、上传、补丁）都先获取
//! `active` 上的 `tokio::sync::Mutex`，同一时刻只有一个请求在修改项目目录或活动项目，
//! 两个并发的补丁 / 加载请求不会互相覆盖。
//!
//! ## 不做部分应用
//! 加载和补丁都先在副本上完成解析与校验，并写入磁盘，全部成功后才替换内存中的活动项目；
//! 任何一步失败时活动项目和应用状态保持原样。

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{ProjectError, Result};
use crate::models::project::{
    DatabaseModel, DatabaseModelPatch, ProjectData, ProjectFileListResponse, ProjectInfo,
};
use crate::services::app_state::AppStateGate;
use crate::services::filename::{self, FileOperation};
use crate::services::repository::ProjectRepository;

/// 首次启动时创建的默认项目文件名
pub const DEFAULT_PROJECT_FILE: &str = "db.json";

/// 未提供标题时新建项目使用的文件名
const UNTITLED_PROJECT: &str = "untitled";

/// 应用项目文件时的选项（来自上传请求的查询参数）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyOptions {
    /// 为 true 时只替换活动项目的 rundown 和 customFields，保留其余设置
    pub only_rundown: bool,
}

pub struct ProjectStore<R: ProjectRepository> {
    repo: R,
    gate: Arc<AppStateGate>,
    active: Mutex<DatabaseModel>,
}

impl<R: ProjectRepository> ProjectStore<R> {
    /// 以空的活动项目创建存储；调用 [`ProjectStore::initialize`] 恢复上次加载的项目
    pub fn new(repo: R, gate: Arc<AppStateGate>) -> Self {
        Self {
            repo,
            gate,
            active: Mutex::new(DatabaseModel::default()),
        }
    }

    pub fn gate(&self) -> &AppStateGate {
        &self.gate
    }

    /// 启动时恢复活动项目
    ///
    /// 依次尝试：
    /// 1. 应用状态中记录的上次加载的项目
    /// 2. 默认项目文件 `db.json`
    /// 3. 以默认内容新建一个项目文件（文件名在 `db.json` 基础上去重）
    ///
    /// # 返回值
    /// 最终加载的项目文件名
    pub async fn initialize(&self) -> Result<String> {
        let mut active = self.active.lock().await;

        let mut candidates = Vec::new();
        if let Some(last) = self.gate.last_loaded_project() {
            candidates.push(last);
        }
        candidates.push(DEFAULT_PROJECT_FILE.to_string());

        for candidate in candidates {
            match self.read_model(&candidate).await {
                Ok(model) => {
                    self.gate.record_load(&candidate).await?;
                    *active = model;
                    log::info!("已恢复项目 {}", candidate);
                    return Ok(candidate);
                }
                Err(ProjectError::NotFound(_)) => {}
                Err(e) => log::warn!("无法恢复项目 {}: {}", candidate, e),
            }
        }

        let filename = self.unique_filename(DEFAULT_PROJECT_FILE).await?;
        let model = DatabaseModel::default();
        self.repo.write(&filename, &model.to_pretty_bytes()?).await?;
        self.gate.record_load(&filename).await?;
        *active = model;
        log::info!("已创建默认项目 {}", filename);
        Ok(filename)
    }

    // ======== 查询 ========

    /// 列出项目目录下的所有项目文件
    pub async fn list(&self) -> Result<ProjectFileListResponse> {
        let files = self.repo.list().await?;
        Ok(ProjectFileListResponse {
            files,
            last_loaded_project: self.gate.last_loaded_project(),
        })
    }

    /// 当前活动项目的概要信息
    pub async fn info(&self) -> ProjectInfo {
        let active = self.active.lock().await;
        ProjectInfo::from_model(&active, self.gate.last_loaded_project())
    }

    /// 当前活动项目的完整快照
    pub async fn current(&self) -> DatabaseModel {
        self.active.lock().await.clone()
    }

    /// 读取项目文件的原始字节
    ///
    /// 未指定文件名时下载当前已加载的项目。
    ///
    /// # 返回值
    /// (文件名, 文件内容)
    ///
    /// # 错误
    /// 文件不存在或尚未加载任何项目时返回 `ProjectError::NotFound`
    pub async fn download(&self, filename: Option<&str>) -> Result<(String, Vec<u8>)> {
        let filename = match filename {
            Some(name) => name.to_string(),
            None => self
                .gate
                .last_loaded_project()
                .ok_or_else(|| ProjectError::NotFound("当前没有已加载的项目".to_string()))?,
        };
        let content = self.repo.read(&filename).await.map_err(|e| match e {
            ProjectError::Validation(_) => ProjectError::NotFound(format!(
                "项目文件 {} 不存在",
                filename
            )),
            other => other,
        })?;
        Ok((filename, content))
    }

    // ======== 文件管理 ========

    /// 新建项目并将其加载为活动项目
    ///
    /// 文件名取自标题（路径字符替换为 `-`，空标题使用 `untitled`），
    /// 补全扩展名后在已有文件中去重。
    ///
    /// # 返回值
    /// 实际写入的文件名
    ///
    /// # 错误
    /// 生成的文件名已被占用（如同名目录）时返回 `ProjectError::Conflict`
    pub async fn create(&self, project: ProjectData) -> Result<String> {
        let mut active = self.active.lock().await;

        let requested = filename::ensure_json_extension(&filename::filename_from_title(
            &project.title,
            UNTITLED_PROJECT,
        ));

        let existing = self.repo.filenames().await?;
        let filename = filename::generate_unique_filename(&existing, &requested);
        if self.repo.exists(&filename).await? {
            return Err(ProjectError::Conflict(format!("项目文件 {} 已存在", filename)));
        }

        let model = DatabaseModel::with_project(project);
        self.repo.write(&filename, &model.to_pretty_bytes()?).await?;
        self.gate.record_load(&filename).await?;
        *active = model;

        log::info!("已创建项目 {}", filename);
        Ok(filename)
    }

    /// 复制项目文件
    ///
    /// # 错误
    /// 源文件不存在或目标文件已存在时返回 `ProjectError::Conflict`
    pub async fn duplicate(&self, from: &str, to: &str) -> Result<()> {
        let _guard = self.active.lock().await;

        let to = filename::ensure_json_extension(to);
        self.check_operation(FileOperation::Duplicate { from, to: &to }).await?;

        self.repo.copy(from, &to).await?;
        log::info!("已复制项目 {} -> {}", from, to);
        Ok(())
    }

    /// 重命名项目文件
    ///
    /// 重命名的是当前已加载的项目时，应用状态随之指向新文件名。
    ///
    /// # 错误
    /// 源文件不存在或目标文件已存在时返回 `ProjectError::Conflict`
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let _guard = self.active.lock().await;

        let to = filename::ensure_json_extension(to);
        self.check_operation(FileOperation::Rename { from, to: &to }).await?;

        self.repo.rename(from, &to).await?;
        if self.gate.is_loaded(from) {
            // 应用状态写入失败时把文件改回原名，保证已加载的项目仍受删除保护
            if let Err(e) = self.gate.record_load(&to).await {
                if let Err(rollback) = self.repo.rename(&to, from).await {
                    log::error!("回滚重命名 {} -> {} 失败: {}", to, from, rollback);
                }
                return Err(e);
            }
        }
        log::info!("已重命名项目 {} -> {}", from, to);
        Ok(())
    }

    /// 删除项目文件
    ///
    /// 当前已加载的项目无论校验结果如何都拒绝删除。
    ///
    /// # 错误
    /// - 删除当前已加载的项目时返回 `ProjectError::Forbidden`
    /// - 文件不存在（校验失败）时返回 `ProjectError::Conflict`
    pub async fn delete(&self, filename: &str) -> Result<()> {
        let _guard = self.active.lock().await;

        if self.gate.is_loaded(filename) {
            return Err(ProjectError::Forbidden(
                "不能删除当前已加载的项目".to_string(),
            ));
        }

        self.check_operation(FileOperation::Delete { filename }).await?;

        self.repo.remove(filename).await?;
        log::info!("已删除项目 {}", filename);
        Ok(())
    }

    // ======== 活动项目 ========

    /// 从项目目录加载项目文件并设为活动项目
    ///
    /// # 错误
    /// - 文件不存在时返回 `ProjectError::NotFound`，应用状态保持不变
    /// - 文件内容无法解析时返回 `ProjectError::Validation`
    pub async fn load(&self, filename: &str) -> Result<()> {
        self.apply_file(filename, ApplyOptions::default()).await
    }

    /// 将项目目录中的文件应用到活动项目
    ///
    /// - 默认选项：整体替换活动项目，并记录为已加载的项目
    /// - `only_rundown`：只替换 rundown 和 customFields，结果写回当前已加载的项目文件
    pub async fn apply_file(&self, filename: &str, options: ApplyOptions) -> Result<()> {
        let mut active = self.active.lock().await;
        let model = self.read_model(filename).await?;

        if options.only_rundown {
            let merged = merge_rundown(&active, model);
            self.persist_active(&merged).await?;
            *active = merged;
            log::info!("已从 {} 导入 rundown", filename);
        } else {
            self.gate.record_load(filename).await?;
            *active = model;
            log::info!("已加载项目 {}", filename);
        }
        Ok(())
    }

    /// 应用上传的项目文件
    ///
    /// - 默认选项：以上传文件名（去重后）保存到项目目录，并加载为活动项目
    /// - `only_rundown`：不保存文件，只将 rundown 和 customFields 合并进活动项目
    ///
    /// # 返回值
    /// 保存后的文件名；`only_rundown` 时为当前已加载的项目文件名
    ///
    /// # 错误
    /// 内容无法解析时返回 `ProjectError::Validation`
    pub async fn upload(
        &self,
        original_name: &str,
        content: &[u8],
        options: ApplyOptions,
    ) -> Result<Option<String>> {
        let model = DatabaseModel::parse(content)?;
        let mut active = self.active.lock().await;

        if options.only_rundown {
            let merged = merge_rundown(&active, model);
            self.persist_active(&merged).await?;
            *active = merged;
            log::info!("已从上传文件 {} 导入 rundown", original_name);
            return Ok(self.gate.last_loaded_project());
        }

        let requested = upload_base_name(original_name);
        let filename = self.unique_filename(&requested).await?;

        self.repo.write(&filename, &model.to_pretty_bytes()?).await?;
        self.gate.record_load(&filename).await?;
        *active = model;

        log::info!("已上传并加载项目 {}", filename);
        Ok(Some(filename))
    }

    /// 将补丁合并进活动项目
    ///
    /// 只替换补丁中出现的顶层字段；合并结果通过结构校验后写回当前已加载的项目文件。
    ///
    /// # 返回值
    /// 合并后的完整项目
    ///
    /// # 错误
    /// 补丁为空或合并结果不合法时返回 `ProjectError::Validation`
    pub async fn patch(&self, patch: DatabaseModelPatch) -> Result<DatabaseModel> {
        if patch.is_empty() {
            return Err(ProjectError::Validation("请求中没有可更新的字段".to_string()));
        }

        let mut active = self.active.lock().await;
        let merged = active.clone().merged(patch);
        merged.validate()?;

        self.persist_active(&merged).await?;
        *active = merged.clone();
        Ok(merged)
    }

    // ======== 内部辅助函数 ========

    /// 校验文件操作；除项目列表外还直接查询目标是否已被占用
    ///
    /// # 错误
    /// 任一校验失败时返回汇总后的 `ProjectError::Conflict`
    async fn check_operation(&self, operation: FileOperation<'_>) -> Result<()> {
        let existing = self.repo.filenames().await?;
        let mut errors = filename::validate_operation(&existing, operation);

        if let FileOperation::Rename { to, .. } | FileOperation::Duplicate { to, .. } = operation {
            if errors.is_empty() && self.repo.exists(to).await? {
                errors.push(format!("项目文件 {} 已存在", to));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProjectError::conflict_from(&errors))
        }
    }

    /// 生成一个项目列表和磁盘上都未占用的文件名
    async fn unique_filename(&self, requested: &str) -> Result<String> {
        let mut existing = self.repo.filenames().await?;
        loop {
            let candidate = filename::generate_unique_filename(&existing, requested);
            if !self.repo.exists(&candidate).await? {
                return Ok(candidate);
            }
            existing.insert(candidate);
        }
    }

    async fn read_model(&self, filename: &str) -> Result<DatabaseModel> {
        if let Some(error) = filename::validate_filename(filename) {
            return Err(ProjectError::NotFound(error));
        }
        let content = self.repo.read(filename).await?;
        DatabaseModel::parse(&content)
    }

    /// 将活动项目写回当前已加载的项目文件（尚未加载任何项目时只保留在内存中）
    async fn persist_active(&self, model: &DatabaseModel) -> Result<()> {
        if let Some(filename) = self.gate.last_loaded_project() {
            self.repo.write(&filename, &model.to_pretty_bytes()?).await?;
        }
        Ok(())
    }
}

/// 用导入文件的 rundown 和 customFields 替换活动项目中的对应分区
fn merge_rundown(active: &DatabaseModel, imported: DatabaseModel) -> DatabaseModel {
    DatabaseModel {
        rundown: imported.rundown,
        custom_fields: imported.custom_fields,
        ..active.clone()
    }
}

/// 上传文件名只保留最后一段路径（浏览器可能带上客户端路径），并补全扩展名
fn upload_base_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    filename::ensure_json_extension(&filename::filename_from_title(base, UNTITLED_PROJECT))
}

//! # 项目文件数据模型
//!
//! 定义了项目文件（DatabaseModel）及其补丁、列表摘要和项目信息的 Rust 结构体，
//! 对应前端 TypeScript 中的 `DatabaseModel`、`ProjectData`、`ProjectFileListResponse` 等接口。
//!
//! 设计决策：
//! - `project` 使用强类型结构体，因为创建项目时需要逐字段填充元数据。
//! - `rundown` 中的事件和 `settings`、`viewSettings`、`osc`、`http` 等分区使用
//!   `serde_json::Value` / `Map` 表示，保留计时器领域的所有原始字段，
//!   避免未知字段在读取后保存时被丢弃。
//! - 分区的 JSON 类型（数组 / 对象）由 serde 在反序列化时校验，
//!   类型不符的文件在解析阶段即被拒绝。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ProjectError, Result};

/// rundown 中的单个条目（事件、延迟或分组块）
pub type OntimeEvent = Value;

/// 以 JSON 对象表示的配置分区
pub type Section = Map<String, Value>;

/// `settings.app` 字段的合法取值，其他应用导出的文件拒绝加载
pub const APP_IDENTIFIER: &str = "ontime";

/// 项目元数据
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface ProjectData {
///   title: string;
///   description: string;
///   publicUrl: string;
///   publicInfo: string;
///   backstageUrl: string;
///   backstageInfo: string;
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectData {
    /// 项目标题，同时作为新建项目时的文件名来源
    pub title: String,
    pub description: String,
    pub public_url: String,
    pub public_info: String,
    pub backstage_url: String,
    pub backstage_info: String,
}

/// 完整的项目文件
///
/// 每个项目文件都是一个该结构的 JSON 文档（2 空格缩进），
/// 同时也是内存中"当前活动项目"的表示。
/// 文件中缺失的分区在解析时以默认值补齐。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseModel {
    #[serde(default)]
    pub rundown: Vec<OntimeEvent>,

    #[serde(default)]
    pub project: ProjectData,

    #[serde(default = "default_settings")]
    pub settings: Section,

    #[serde(default = "default_view_settings")]
    pub view_settings: Section,

    #[serde(default)]
    pub url_presets: Vec<Value>,

    #[serde(default)]
    pub custom_fields: Section,

    #[serde(default = "default_osc")]
    pub osc: Section,

    #[serde(default = "default_http")]
    pub http: Section,
}

impl Default for DatabaseModel {
    fn default() -> Self {
        Self {
            rundown: Vec::new(),
            project: ProjectData::default(),
            settings: default_settings(),
            view_settings: default_view_settings(),
            url_presets: Vec::new(),
            custom_fields: Section::new(),
            osc: default_osc(),
            http: default_http(),
        }
    }
}

impl DatabaseModel {
    /// 以给定元数据创建一个空项目（空 rundown + 默认设置）
    pub fn with_project(project: ProjectData) -> Self {
        Self {
            project,
            ..Self::default()
        }
    }

    /// 从原始字节解析项目文件
    ///
    /// 解析流程：
    /// 1. 解析为任意 JSON，顶层必须是对象
    /// 2. 反序列化为 DatabaseModel（缺失分区补默认值，类型不符则失败）
    /// 3. 执行结构校验（见 [`DatabaseModel::validate`]）
    ///
    /// # 错误
    /// 任何一步失败都返回 `ProjectError::Validation`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ProjectError::Validation(format!("项目文件不是合法的 JSON: {}", e)))?;

        if !value.is_object() {
            return Err(ProjectError::Validation(
                "项目文件的顶层必须是 JSON 对象".to_string(),
            ));
        }

        let model: Self = serde_json::from_value(value)
            .map_err(|e| ProjectError::Validation(format!("项目文件结构不合法: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    /// 结构校验
    ///
    /// - `settings.app` 存在时必须为 `"ontime"`
    /// - rundown 中每个条目必须是带非空字符串 `id` 的对象，且 `id` 互不重复
    /// - urlPresets 中每个条目必须是对象
    pub fn validate(&self) -> Result<()> {
        if let Some(app) = self.settings.get("app") {
            if app.as_str() != Some(APP_IDENTIFIER) {
                return Err(ProjectError::Validation(
                    "未知的应用类型，无法加载该项目文件".to_string(),
                ));
            }
        }

        let mut seen_ids = HashSet::new();
        for (index, entry) in self.rundown.iter().enumerate() {
            let id = entry
                .get("id")
                .and_then(|v| v.as_str())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    ProjectError::Validation(format!("rundown 第 {} 个条目缺少 id", index))
                })?;
            if !seen_ids.insert(id) {
                return Err(ProjectError::Validation(format!(
                    "rundown 中存在重复的 id: {}",
                    id
                )));
            }
        }

        if self.url_presets.iter().any(|preset| !preset.is_object()) {
            return Err(ProjectError::Validation(
                "urlPresets 中的每个条目都必须是对象".to_string(),
            ));
        }

        Ok(())
    }

    /// 将补丁中出现的顶层字段合并进当前模型
    ///
    /// 采用顶层整体替换：补丁中出现的分区完整覆盖原分区，
    /// 未出现的分区保持不变，不做嵌套对象的深度合并。
    pub fn merged(mut self, patch: DatabaseModelPatch) -> Self {
        if let Some(rundown) = patch.rundown {
            self.rundown = rundown;
        }
        if let Some(project) = patch.project {
            self.project = project;
        }
        if let Some(settings) = patch.settings {
            self.settings = settings;
        }
        if let Some(view_settings) = patch.view_settings {
            self.view_settings = view_settings;
        }
        if let Some(url_presets) = patch.url_presets {
            self.url_presets = url_presets;
        }
        if let Some(custom_fields) = patch.custom_fields {
            self.custom_fields = custom_fields;
        }
        if let Some(osc) = patch.osc {
            self.osc = osc;
        }
        if let Some(http) = patch.http {
            self.http = http;
        }
        self
    }

    /// 序列化为 2 空格缩进的 JSON 字节，用于写入项目文件
    pub fn to_pretty_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// `settings.version`，缺失时返回本服务的版本号
    pub fn version(&self) -> String {
        self.settings
            .get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }
}

/// 项目补丁（PATCH 请求体）
///
/// 所有顶层字段均可选，只合并出现的字段。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseModelPatch {
    pub rundown: Option<Vec<OntimeEvent>>,
    pub project: Option<ProjectData>,
    pub settings: Option<Section>,
    pub view_settings: Option<Section>,
    pub url_presets: Option<Vec<Value>>,
    pub custom_fields: Option<Section>,
    pub osc: Option<Section>,
    pub http: Option<Section>,
}

impl DatabaseModelPatch {
    /// 补丁中是否没有任何可合并的字段
    pub fn is_empty(&self) -> bool {
        self.rundown.is_none()
            && self.project.is_none()
            && self.settings.is_none()
            && self.view_settings.is_none()
            && self.url_presets.is_none()
            && self.custom_fields.is_none()
            && self.osc.is_none()
            && self.http.is_none()
    }
}

/// 项目列表中的单个文件摘要
///
/// 时间戳来自文件元数据，格式为 ISO 8601（UTC）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub filename: String,
    pub created_at: String,
    pub updated_at: String,
}

/// 项目列表接口的响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFileListResponse {
    /// 按文件名排序的项目文件摘要
    pub files: Vec<ProjectSummary>,
    /// 当前已加载的项目文件名，未加载时序列化为 `null`
    pub last_loaded_project: Option<String>,
}

/// 当前活动项目的概要信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub title: String,
    pub version: String,
    pub last_loaded_project: Option<String>,
    /// rundown 中 `type` 为 `event` 的条目数
    pub event_count: usize,
    /// rundown 条目总数（含延迟和分组块）
    pub entry_count: usize,
    pub custom_field_count: usize,
    pub url_preset_count: usize,
}

impl ProjectInfo {
    pub fn from_model(model: &DatabaseModel, last_loaded_project: Option<String>) -> Self {
        let event_count = model
            .rundown
            .iter()
            .filter(|entry| entry.get("type").and_then(|t| t.as_str()) == Some("event"))
            .count();

        Self {
            title: model.project.title.clone(),
            version: model.version(),
            last_loaded_project,
            event_count,
            entry_count: model.rundown.len(),
            custom_field_count: model.custom_fields.len(),
            url_preset_count: model.url_presets.len(),
        }
    }
}

// ============ 默认分区 ============

fn into_section(value: Value) -> Section {
    match value {
        Value::Object(map) => map,
        _ => Section::new(),
    }
}

fn default_settings() -> Section {
    into_section(json!({
        "app": APP_IDENTIFIER,
        "version": env!("CARGO_PKG_VERSION"),
        "serverPort": 4001,
        "editorKey": null,
        "operatorKey": null,
        "timeFormat": "24",
        "language": "en"
    }))
}

fn default_view_settings() -> Section {
    into_section(json!({
        "overrideStyles": false,
        "normalColor": "#ffffffcc",
        "warningColor": "#FFAB33",
        "dangerColor": "#ED3333",
        "freezeEnd": false,
        "endMessage": ""
    }))
}

fn default_osc() -> Section {
    into_section(json!({
        "portIn": 8888,
        "portOut": 9999,
        "targetIP": "127.0.0.1",
        "enabledIn": false,
        "enabledOut": false,
        "subscriptions": []
    }))
}

fn default_http() -> Section {
    into_section(json!({
        "enabledOut": false,
        "subscriptions": []
    }))
}

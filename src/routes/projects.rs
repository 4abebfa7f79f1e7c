//! # 项目文件 HTTP 处理函数
//!
//! 每个处理函数只做三件事：解析请求、调用 `ProjectStore`、把结果映射为状态码。
//!
//! | 操作 | 成功 | 失败 |
//! |------|------|------|
//! | `patch_project` | 200 + 合并后的项目 | 400 请求体为空或合并结果不合法 |
//! | `create_project` | 200 + `{filename}` | 409 文件名已存在 |
//! | `download_project` | 200 + 文件内容 | 404 文件不存在 |
//! | `upload_project` | 201 + message | 400 没有文件或应用失败 |
//! | `list_projects` | 200 + 列表 | 500 读取失败 |
//! | `load_project` | 201 + message | 404 文件不存在；500 应用失败 |
//! | `duplicate_project` | 201 + message | 409 校验失败 |
//! | `rename_project` | 201 + message | 409 校验失败 |
//! | `delete_project` | 204 | 403 当前已加载；409 校验失败 |
//! | `project_info` | 200 + 信息 | — |

use bytes::Bytes;
use futures_util::stream;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ProjectError;
use crate::models::project::{DatabaseModelPatch, ProjectData};
use crate::routes::ApiState;
use crate::routes::response::{self, ApiResponse};
use crate::services::project_store::ApplyOptions;
use crate::services::repository::ProjectRepository;

/// 复制 / 重命名请求体
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFilenameRequest {
    pub new_filename: String,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    filename: String,
}

/// 解析 JSON 请求体；解析失败视为请求不合法（400）
fn parse_json<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, ProjectError> {
    serde_json::from_slice(body)
        .map_err(|e| ProjectError::Validation(format!("请求体不是合法的 JSON: {}", e)))
}

/// 查询字符串中的布尔选项，`true` 或 `1` 视为开启
fn query_flag(query: Option<&str>, key: &str) -> bool {
    query_param(query, key)
        .map(|value| value == "true" || value == "1")
        .unwrap_or(false)
}

pub(crate) fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

// ============ 处理函数 ============

/// 将补丁合并进活动项目
pub async fn patch_project<R: ProjectRepository>(state: &ApiState<R>, body: Bytes) -> ApiResponse {
    if body.iter().all(u8::is_ascii_whitespace) {
        return response::error(&ProjectError::Validation(
            "请求中没有可更新的字段".to_string(),
        ));
    }

    let patch: DatabaseModelPatch = match parse_json(&body) {
        Ok(patch) => patch,
        Err(e) => return response::error(&e),
    };

    match state.store.patch(patch).await {
        Ok(model) => response::json(StatusCode::OK, &model),
        Err(e) => response::error(&e),
    }
}

/// 新建项目，文件名由标题生成
pub async fn create_project<R: ProjectRepository>(state: &ApiState<R>, body: Bytes) -> ApiResponse {
    let project: ProjectData = if body.iter().all(u8::is_ascii_whitespace) {
        ProjectData::default()
    } else {
        match parse_json(&body) {
            Ok(project) => project,
            Err(e) => return response::error(&e),
        }
    };

    match state.store.create(project).await {
        Ok(filename) => response::json(StatusCode::OK, &CreatedResponse { filename }),
        Err(e) => response::error(&e),
    }
}

/// 下载项目文件；未指定 `filename` 时下载当前已加载的项目
pub async fn download_project<R: ProjectRepository>(
    state: &ApiState<R>,
    query: Option<&str>,
) -> ApiResponse {
    let filename = query_param(query, "filename");
    match state.store.download(filename.as_deref()).await {
        Ok((filename, content)) => response::attachment(&filename, content),
        Err(e) => response::error(&e),
    }
}

/// 上传项目文件并应用
///
/// 请求体为 `multipart/form-data`，取第一个带文件名的字段作为项目文件；
/// 查询参数 `onlyRundown=true` 时只导入 rundown 和 customFields。
/// 任何失败都返回 400。
pub async fn upload_project<R: ProjectRepository>(
    state: &ApiState<R>,
    content_type: Option<&str>,
    query: Option<&str>,
    body: Bytes,
) -> ApiResponse {
    let (file_name, content) = match read_uploaded_file(content_type, body).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            return response::error(&ProjectError::Validation("没有上传文件".to_string()));
        }
        Err(e) => return response::error(&e),
    };

    let options = ApplyOptions {
        only_rundown: query_flag(query, "onlyRundown"),
    };

    match state.store.upload(&file_name, &content, options).await {
        Ok(filename) => response::json(
            StatusCode::CREATED,
            &json!({ "message": "文件已上传", "filename": filename }),
        ),
        Err(e) => response::error_with_status(StatusCode::BAD_REQUEST, &e),
    }
}

/// 列出所有项目文件
pub async fn list_projects<R: ProjectRepository>(state: &ApiState<R>) -> ApiResponse {
    match state.store.list().await {
        Ok(list) => response::json(StatusCode::OK, &list),
        Err(e) => response::error_with_status(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// 加载项目文件为活动项目
pub async fn load_project<R: ProjectRepository>(state: &ApiState<R>, filename: &str) -> ApiResponse {
    match state.store.load(filename).await {
        Ok(()) => response::message(StatusCode::CREATED, format!("已加载项目 {}", filename)),
        Err(e @ ProjectError::NotFound(_)) => response::error(&e),
        Err(e) => response::error_with_status(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// 复制项目文件
pub async fn duplicate_project<R: ProjectRepository>(
    state: &ApiState<R>,
    filename: &str,
    body: Bytes,
) -> ApiResponse {
    let request: NewFilenameRequest = match parse_json(&body) {
        Ok(request) => request,
        Err(e) => return response::error(&e),
    };

    match state.store.duplicate(filename, &request.new_filename).await {
        Ok(()) => response::message(StatusCode::CREATED, "项目已复制"),
        Err(e) => response::error(&e),
    }
}

/// 重命名项目文件
pub async fn rename_project<R: ProjectRepository>(
    state: &ApiState<R>,
    filename: &str,
    body: Bytes,
) -> ApiResponse {
    let request: NewFilenameRequest = match parse_json(&body) {
        Ok(request) => request,
        Err(e) => return response::error(&e),
    };

    match state.store.rename(filename, &request.new_filename).await {
        Ok(()) => response::message(StatusCode::CREATED, "项目已重命名"),
        Err(e) => response::error(&e),
    }
}

/// 删除项目文件
pub async fn delete_project<R: ProjectRepository>(state: &ApiState<R>, filename: &str) -> ApiResponse {
    match state.store.delete(filename).await {
        Ok(()) => response::empty(StatusCode::NO_CONTENT),
        Err(e) => response::error(&e),
    }
}

/// 当前活动项目的概要信息
pub async fn project_info<R: ProjectRepository>(state: &ApiState<R>) -> ApiResponse {
    response::json(StatusCode::OK, &state.store.info().await)
}

// ============ 内部辅助函数 ============

/// 从已缓冲的 multipart 请求体中取出第一个文件字段
///
/// # 返回值
/// - `Ok(Some((文件名, 内容)))` - 找到文件字段
/// - `Ok(None)` - 请求中没有文件字段
async fn read_uploaded_file(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<Option<(String, Vec<u8>)>, ProjectError> {
    let Some(content_type) = content_type else {
        return Ok(None);
    };
    // 非 multipart 请求视为没有上传文件
    let Ok(boundary) = multer::parse_boundary(content_type) else {
        return Ok(None);
    };

    let body_stream = stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProjectError::Validation(format!("解析上传内容失败: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content = field
            .bytes()
            .await
            .map_err(|e| ProjectError::Validation(format!("读取上传文件失败: {}", e)))?;
        return Ok(Some((file_name, content.to_vec())));
    }

    Ok(None)
}

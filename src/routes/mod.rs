//! # HTTP 路由模块
//!
//! 将请求按方法和路径分发到 `projects` 中的处理函数。
//! 所有项目文件接口都挂在 `/data/db` 下：
//!
//! | 方法 | 路径 | 处理函数 |
//! |------|------|----------|
//! | PATCH | `/data/db` | `patch_project` |
//! | POST | `/data/db/new` | `create_project` |
//! | GET | `/data/db/download?filename=` | `download_project` |
//! | POST | `/data/db/upload?onlyRundown=` | `upload_project` |
//! | GET | `/data/db/all` | `list_projects` |
//! | GET | `/data/db/info` | `project_info` |
//! | POST | `/data/db/{filename}/load` | `load_project` |
//! | POST | `/data/db/{filename}/duplicate` | `duplicate_project` |
//! | PUT | `/data/db/{filename}/rename` | `rename_project` |
//! | DELETE | `/data/db/{filename}` | `delete_project` |
//!
//! 路径中的文件名会先做百分号解码（如 `Show%20A.json`）。

pub mod projects;
pub mod response;

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::{Request, StatusCode};

use crate::error::ProjectError;
use crate::services::project_store::ProjectStore;
use crate::services::repository::ProjectRepository;
use response::ApiResponse;

/// 项目文件接口的路径前缀
pub const API_PREFIX: &str = "/data/db";

/// 路由层共享状态
pub struct ApiState<R: ProjectRepository> {
    pub store: ProjectStore<R>,
    /// 请求体（含上传文件）的大小上限
    pub max_body_bytes: usize,
}

impl<R: ProjectRepository> ApiState<R> {
    pub fn new(store: ProjectStore<R>, max_body_bytes: usize) -> Self {
        Self {
            store,
            max_body_bytes,
        }
    }
}

/// 请求分发入口
///
/// 请求体在分发前完整读入内存（受 `max_body_bytes` 限制），
/// 之后各处理函数只接触已缓冲的 `Bytes`。
pub async fn dispatch<R, B>(state: Arc<ApiState<R>>, req: Request<B>) -> ApiResponse
where
    R: ProjectRepository,
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let Some(rest) = path.strip_prefix(API_PREFIX) else {
        return response::message(StatusCode::NOT_FOUND, format!("未找到路径 {}", path));
    };
    if !rest.is_empty() && !rest.starts_with('/') {
        return response::message(StatusCode::NOT_FOUND, format!("未找到路径 {}", path));
    }

    let segments = match decode_segments(rest) {
        Ok(segments) => segments,
        Err(e) => return response::error(&e),
    };
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let body = match Limited::new(body, state.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return response::error(&ProjectError::Validation(format!("读取请求体失败: {}", e)));
        }
    };

    log::debug!("{} {}", method, path);

    let state = state.as_ref();
    let query = query.as_deref();
    match (method.as_str(), segments.as_slice()) {
        ("PATCH", []) => projects::patch_project(state, body).await,
        ("GET", ["all"]) => projects::list_projects(state).await,
        ("GET", ["info"]) => projects::project_info(state).await,
        ("GET", ["download"]) => projects::download_project(state, query).await,
        ("POST", ["new"]) => projects::create_project(state, body).await,
        ("POST", ["upload"]) => {
            projects::upload_project(state, content_type.as_deref(), query, body).await
        }
        ("POST", [filename, "load"]) => projects::load_project(state, filename).await,
        ("POST", [filename, "duplicate"]) => {
            projects::duplicate_project(state, filename, body).await
        }
        ("PUT", [filename, "rename"]) => projects::rename_project(state, filename, body).await,
        ("DELETE", [filename]) => projects::delete_project(state, filename).await,
        (_, segments) if is_known_path(segments) => response::message(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("{} 不支持 {} 方法", path, method),
        ),
        _ => response::message(StatusCode::NOT_FOUND, format!("未找到路径 {}", path)),
    }
}

/// 路径形状是否对应某个接口（用于区分 404 与 405）
fn is_known_path(segments: &[&str]) -> bool {
    matches!(
        segments,
        [] | [_] | [_, "load"] | [_, "duplicate"] | [_, "rename"]
    )
}

/// 拆分并百分号解码路径段
fn decode_segments(rest: &str) -> Result<Vec<String>, ProjectError> {
    rest.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .map_err(|e| ProjectError::Validation(format!("路径不是合法的 UTF-8: {}", e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use serde_json::{Value, json};

    use super::*;
    use crate::models::project::DatabaseModel;
    use crate::services::app_state::AppStateGate;
    use crate::services::repository::{FsProjectRepository, MemoryProjectRepository};

    type TestState = Arc<ApiState<MemoryProjectRepository>>;

    fn state() -> TestState {
        let store = ProjectStore::new(
            MemoryProjectRepository::new(),
            Arc::new(AppStateGate::in_memory()),
        );
        Arc::new(ApiState::new(store, 1024 * 1024))
    }

    async fn send<R: ProjectRepository>(
        state: &Arc<ApiState<R>>,
        method: &str,
        uri: &str,
        body: &str,
    ) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap();
        into_parts(dispatch(state.clone(), req).await).await
    }

    async fn into_parts(resp: ApiResponse) -> (StatusCode, Value) {
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn multipart_body(boundary: &str, file_name: &str, content: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"project\"; filename=\"{f}\"\r\nContent-Type: application/json\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = file_name,
            c = content
        )
    }

    async fn upload(state: &TestState, uri: &str, body: String) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Full::new(Bytes::from(body)))
            .unwrap();
        into_parts(dispatch(state.clone(), req).await).await
    }

    #[tokio::test]
    async fn test_create_collision_scenario() {
        let state = state();
        let (status, body) = send(&state, "POST", "/data/db/new", r#"{"title":"Show A"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "Show A.json");

        let (status, body) = send(&state, "POST", "/data/db/new", r#"{"title":"Show A"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "Show A (1).json");
    }

    #[tokio::test]
    async fn test_delete_loaded_is_forbidden_and_file_remains() {
        let state = state();
        send(&state, "POST", "/data/db/new", r#"{"title":"Show A"}"#).await;

        let (status, body) = send(&state, "DELETE", "/data/db/Show%20A.json", "").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].is_string());

        let (_, list) = send(&state, "GET", "/data/db/all", "").await;
        assert_eq!(list["files"][0]["filename"], "Show A.json");
        assert_eq!(list["lastLoadedProject"], "Show A.json");
    }

    #[tokio::test]
    async fn test_delete_flow() {
        let state = state();
        send(&state, "POST", "/data/db/new", r#"{"title":"A"}"#).await;
        send(&state, "POST", "/data/db/new", r#"{"title":"B"}"#).await;

        let (status, body) = send(&state, "DELETE", "/data/db/A.json", "").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = send(&state, "DELETE", "/data/db/A.json", "").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_load_missing_keeps_last_loaded() {
        let state = state();
        send(&state, "POST", "/data/db/new", r#"{"title":"A"}"#).await;

        let (status, _) = send(&state, "POST", "/data/db/missing.json/load", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            state.store.gate().last_loaded_project().as_deref(),
            Some("A.json")
        );
    }

    #[tokio::test]
    async fn test_load_existing_and_broken() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(
            FsProjectRepository::new(dir.path()),
            Arc::new(AppStateGate::in_memory()),
        );
        let state = Arc::new(ApiState::new(store, 1024 * 1024));
        send(&state, "POST", "/data/db/new", r#"{"title":"A"}"#).await;
        send(&state, "POST", "/data/db/new", r#"{"title":"B"}"#).await;

        let (status, body) = send(&state, "POST", "/data/db/A.json/load", "").await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"].as_str().unwrap().contains("A.json"));

        std::fs::write(dir.path().join("broken.json"), "{oops").unwrap();
        let (status, _) = send(&state, "POST", "/data/db/broken.json/load", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.store.gate().is_loaded("A.json"));
    }

    #[tokio::test]
    async fn test_rename_and_duplicate_to_existing_conflict() {
        let state = state();
        send(&state, "POST", "/data/db/new", r#"{"title":"A"}"#).await;
        send(&state, "POST", "/data/db/new", r#"{"title":"B"}"#).await;

        let (status, body) =
            send(&state, "PUT", "/data/db/A.json/rename", r#"{"newFilename":"B.json"}"#).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!body["message"].as_str().unwrap().is_empty());

        let (status, _) =
            send(&state, "POST", "/data/db/A.json/duplicate", r#"{"newFilename":"B"}"#).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) =
            send(&state, "PUT", "/data/db/A.json/rename", r#"{"newFilename":"Z"}"#).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) =
            send(&state, "POST", "/data/db/Z.json/duplicate", r#"{"newFilename":"Y"}"#).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_rename_target_case_and_hidden_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(
            FsProjectRepository::new(dir.path()),
            Arc::new(AppStateGate::in_memory()),
        );
        let state = Arc::new(ApiState::new(store, 1024 * 1024));
        for title in ["A", "B", "C"] {
            send(&state, "POST", "/data/db/new", &format!(r#"{{"title":"{}"}}"#, title)).await;
        }

        let (status, _) =
            send(&state, "PUT", "/data/db/B.json/rename", r#"{"newFilename":"X.JSON"}"#).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) =
            send(&state, "PUT", "/data/db/A.json/rename", r#"{"newFilename":"X.JSON"}"#).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let saved = std::fs::read(dir.path().join("X.json")).unwrap();
        assert_eq!(DatabaseModel::parse(&saved).unwrap().project.title, "B");

        let (status, _) =
            send(&state, "PUT", "/data/db/C.json/rename", r#"{"newFilename":".hidden"}"#).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, list) = send(&state, "GET", "/data/db/all", "").await;
        let names: Vec<&str> = list["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["filename"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["A.json", "C.json", "X.json"]);
    }

    #[tokio::test]
    async fn test_create_with_unusual_titles() {
        let state = state();
        let (status, body) =
            send(&state, "POST", "/data/db/new", r#"{"title":"Rock/Pop Night"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "Rock-Pop Night.json");

        let title = r#"{"title":"x (18446744073709551615)"}"#;
        let (status, _) = send(&state, "POST", "/data/db/new", title).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&state, "POST", "/data/db/new", title).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "x (18446744073709551615) (1).json");
    }

    #[tokio::test]
    async fn test_patch_empty_and_merge() {
        let state = state();
        send(&state, "POST", "/data/db/new", r#"{"title":"A"}"#).await;

        let (status, _) = send(&state, "PATCH", "/data/db", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&state, "PATCH", "/data/db", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&state, "PATCH", "/data/db", r#"{"rundown":{}}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &state,
            "PATCH",
            "/data/db",
            r#"{"project":{"title":"Renamed"},"rundown":[{"id":"1","type":"event"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["project"]["title"], "Renamed");
        assert_eq!(body["settings"]["app"], "ontime");

        let (_, info) = send(&state, "GET", "/data/db/info", "").await;
        assert_eq!(info["title"], "Renamed");
        assert_eq!(info["eventCount"], 1);
    }

    #[tokio::test]
    async fn test_download() {
        let state = state();
        let (status, _) = send(&state, "GET", "/data/db/download", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&state, "POST", "/data/db/new", r#"{"title":"Show A"}"#).await;
        let (status, body) = send(&state, "GET", "/data/db/download", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["project"]["title"], "Show A");

        let (status, _) =
            send(&state, "GET", "/data/db/download?filename=Show%20A.json", "").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, "GET", "/data/db/download?filename=nope.json", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_and_apply() {
        let state = state();
        let project = json!({
            "project": {"title": "Uploaded"},
            "rundown": [{"id": "e1", "type": "event"}]
        })
        .to_string();

        let (status, body) = upload(
            &state,
            "/data/db/upload",
            multipart_body("XBOUNDARY", "show.json", &project),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["filename"], "show.json");
        assert!(state.store.gate().is_loaded("show.json"));

        let (status, _) = upload(
            &state,
            "/data/db/upload?onlyRundown=true",
            multipart_body("XBOUNDARY", "other.json", &project),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(state.store.gate().is_loaded("show.json"));
    }

    #[tokio::test]
    async fn test_upload_failures_are_bad_request() {
        let state = state();
        let (status, _) = send(&state, "POST", "/data/db/upload", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = upload(
            &state,
            "/data/db/upload",
            multipart_body("XBOUNDARY", "bad.json", "[1,2]"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_and_info() {
        let state = state();
        let (status, body) = send(&state, "GET", "/data/db/all", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"], json!([]));
        assert_eq!(body["lastLoadedProject"], Value::Null);

        let (status, body) = send(&state, "GET", "/data/db/info", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], DatabaseModel::default().version());
    }

    #[tokio::test]
    async fn test_unknown_routes() {
        let state = state();
        let (status, _) = send(&state, "GET", "/elsewhere", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&state, "GET", "/data/dbx", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&state, "GET", "/data/db/A.json/rename", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let store = ProjectStore::new(
            MemoryProjectRepository::new(),
            Arc::new(AppStateGate::in_memory()),
        );
        let state = Arc::new(ApiState::new(store, 8));
        let (status, _) = send(&state, "POST", "/data/db/new", r#"{"title":"Too long"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

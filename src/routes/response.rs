//! # HTTP 响应构造
//!
//! 所有处理函数的响应都通过这里构造，保证：
//! - JSON 响应统一带 `content-type: application/json`
//! - 失败响应统一为 `{"message": "..."}`，状态码由 `ProjectError::status` 决定

use bytes::Bytes;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderValue};
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::error::ProjectError;

pub type ApiResponse = Response<Full<Bytes>>;

const APPLICATION_JSON: &str = "application/json";

fn with_body(status: StatusCode, body: Bytes, content_type: &'static str) -> ApiResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// 序列化任意值为 JSON 响应；序列化失败时退化为 500
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> ApiResponse {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, Bytes::from(body), APPLICATION_JSON),
        Err(e) => {
            log::error!("序列化响应失败: {}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "序列化响应失败")
        }
    }
}

/// `{"message": ...}` 形式的响应
pub fn message(status: StatusCode, text: impl Into<String>) -> ApiResponse {
    let body = json!({ "message": text.into() });
    with_body(status, Bytes::from(body.to_string()), APPLICATION_JSON)
}

/// 将业务错误转换为响应，并按严重程度记录日志
pub fn error(err: &ProjectError) -> ApiResponse {
    error_with_status(err.status(), err)
}

/// 以指定状态码返回错误（部分接口对错误的状态码有单独约定）
pub fn error_with_status(status: StatusCode, err: &ProjectError) -> ApiResponse {
    if status.is_server_error() {
        log::error!("请求处理失败 ({}): {}", status, err);
    } else {
        log::warn!("请求被拒绝 ({}): {}", status, err);
    }
    message(status, err.to_string())
}

/// 无响应体
pub fn empty(status: StatusCode) -> ApiResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// 文件下载响应
///
/// 文件名以 RFC 5987 `filename*` 形式编码，兼容非 ASCII 的项目名。
pub fn attachment(filename: &str, content: Vec<u8>) -> ApiResponse {
    let mut response = with_body(StatusCode::OK, Bytes::from(content), APPLICATION_JSON);
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    response
}

//! # 统一错误类型
//!
//! 项目文件服务的所有失败都归入五类，路由层据此映射 HTTP 状态码：
//!
//! | 变体 | 含义 | 状态码 |
//! |------|------|--------|
//! | `Validation` | 请求体为空、结构不合法、合并失败 | 400 |
//! | `Forbidden` | 删除当前已加载的项目 | 403 |
//! | `NotFound` | 目标项目文件不存在 | 404 |
//! | `Conflict` | 文件名冲突或校验未通过 | 409 |
//! | `Io` | 文件系统读写失败或其他意外错误 | 500 |

use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Io(String),
}

impl ProjectError {
    /// 由文件名校验产生的错误列表构造冲突错误（多条错误以 "; " 连接）
    pub fn conflict_from(errors: &[String]) -> Self {
        Self::Conflict(errors.join("; "))
    }

    /// 错误对应的 HTTP 状态码
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(format!("文件读写失败: {}", e))
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(format!("JSON 序列化失败: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

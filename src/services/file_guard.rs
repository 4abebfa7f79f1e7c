//! # 文件写入守卫服务
//!
//! 统一所有对项目文件的修改操作：
//!
//! ## 路径安全验证
//! 所有写入/删除操作前先校验文件名（见 `filename::validate_filename`），
//! 再确认解析后的路径确实位于项目目录内，防止意外修改项目目录之外的文件。
//!
//! ## 原子写入
//! 先写入同目录下的临时文件，再通过 `rename` 替换目标文件。
//! 写入中途失败时原文件保持不变，不会留下被截断的项目文件。
//!
//! ## 使用方式
//! 项目目录下的所有修改必须通过以下入口函数：
//! - `safe_write_file()` — 安全写入文件
//! - `safe_delete_file()` — 安全删除文件
//! - `safe_rename_file()` — 安全重命名文件

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{ProjectError, Result};
use crate::services::filename;

// ============ 公开入口函数 ============

/// 将文件名解析为项目目录下的绝对路径
///
/// # 错误
/// - 文件名不合法时返回 `ProjectError::Validation`
/// - 项目目录无法解析时返回 `ProjectError::Io`
/// - 解析结果不在项目目录内时返回 `ProjectError::Forbidden`
pub async fn resolve_project_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    if let Some(error) = filename::validate_filename(file_name) {
        return Err(ProjectError::Validation(error));
    }

    // canonicalize 解析符号链接和相对路径组件；目标文件可能尚不存在，因此只解析目录
    let canonical_dir = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| ProjectError::Io(format!("项目目录解析失败: {}", e)))?;
    let target = canonical_dir.join(file_name);

    if target.parent() != Some(canonical_dir.as_path()) {
        return Err(ProjectError::Forbidden(format!(
            "安全检查失败：路径 {} 不在项目目录 {} 下",
            file_name,
            dir.display()
        )));
    }

    Ok(target)
}

/// 安全写入文件（统一入口）
///
/// 执行流程：
/// 1. 校验文件名并解析出项目目录内的目标路径
/// 2. 写入临时文件 `.<文件名>.tmp`
/// 3. 将临时文件重命名为目标文件（覆盖已有文件）
///
/// # 错误
/// 路径验证失败或写入失败时返回错误；失败时会尽量清理临时文件
pub async fn safe_write_file(dir: &Path, file_name: &str, content: &[u8]) -> Result<()> {
    let target = resolve_project_path(dir, file_name).await?;
    let temp = target.with_file_name(format!(".{}.tmp", file_name));

    if let Err(e) = tokio::fs::write(&temp, content).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(ProjectError::Io(format!("写入临时文件失败: {}", e)));
    }

    if let Err(e) = tokio::fs::rename(&temp, &target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(ProjectError::Io(format!("替换项目文件失败: {}", e)));
    }

    Ok(())
}

/// 安全删除文件（统一入口）
///
/// # 错误
/// 文件不存在时返回 `ProjectError::NotFound`，其他删除失败返回 `ProjectError::Io`
pub async fn safe_delete_file(dir: &Path, file_name: &str) -> Result<()> {
    let target = resolve_project_path(dir, file_name).await?;

    tokio::fs::remove_file(&target).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ProjectError::NotFound(format!("项目文件 {} 不存在", file_name)),
        _ => ProjectError::Io(format!("删除文件失败: {}", e)),
    })
}

/// 安全重命名文件（统一入口）
///
/// 源文件和目标文件都必须位于项目目录内。
///
/// # 错误
/// 源文件不存在时返回 `ProjectError::NotFound`，其他失败返回 `ProjectError::Io`
pub async fn safe_rename_file(dir: &Path, from: &str, to: &str) -> Result<()> {
    let source = resolve_project_path(dir, from).await?;
    let target = resolve_project_path(dir, to).await?;

    tokio::fs::rename(&source, &target)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ProjectError::NotFound(format!("项目文件 {} 不存在", from)),
            _ => ProjectError::Io(format!("重命名文件失败: {}", e)),
        })
}

//! # 项目文件仓库
//!
//! 将"文件系统即数据库"抽象为 `ProjectRepository` trait，上层的项目存储只依赖该 trait：
//! - `FsProjectRepository` - 基于 tokio 异步文件 I/O 的项目目录实现，所有修改经过 `file_guard`
//! - `MemoryProjectRepository` - 纯内存实现，供测试替换真实目录
//!
//! 仓库只负责按文件名存取字节，不做任何业务校验；
//! 文件名策略与冲突检查由 `project_store` 在调用前完成。

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use tokio::task::JoinSet;

use crate::error::{ProjectError, Result};
use crate::models::project::ProjectSummary;
use crate::services::file_guard;
use crate::services::filename;
use crate::utils::time::system_time_to_iso8601;

/// 项目文件的存取接口
///
/// 方法返回 `Send` 的 future，使仓库可以在 hyper 的连接任务中跨 `.await` 使用。
pub trait ProjectRepository: Send + Sync + 'static {
    /// 列出所有项目文件，按文件名升序
    fn list(&self) -> impl Future<Output = Result<Vec<ProjectSummary>>> + Send;

    /// 所有项目文件名的集合，供文件名策略做冲突检查
    fn filenames(&self) -> impl Future<Output = Result<HashSet<String>>> + Send {
        async {
            let files = self.list().await?;
            Ok(files.into_iter().map(|f| f.filename).collect())
        }
    }

    fn exists(&self, filename: &str) -> impl Future<Output = Result<bool>> + Send;

    /// 读取文件内容；文件不存在时返回 `ProjectError::NotFound`
    fn read(&self, filename: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// 写入（创建或覆盖）文件
    fn write(&self, filename: &str, content: &[u8]) -> impl Future<Output = Result<()>> + Send;

    fn copy(&self, from: &str, to: &str) -> impl Future<Output = Result<()>> + Send;

    fn rename(&self, from: &str, to: &str) -> impl Future<Output = Result<()>> + Send;

    /// 删除文件；文件不存在时返回 `ProjectError::NotFound`
    fn remove(&self, filename: &str) -> impl Future<Output = Result<()>> + Send;
}

fn not_found(filename: &str) -> ProjectError {
    ProjectError::NotFound(format!("项目文件 {} 不存在", filename))
}

// ============ 文件系统实现 ============

/// 基于项目目录的仓库实现
#[derive(Debug, Clone)]
pub struct FsProjectRepository {
    dir: PathBuf,
}

impl FsProjectRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ProjectRepository for FsProjectRepository {
    /// 并行读取项目目录下所有 `.json` 文件的元数据
    ///
    /// 目录不存在时视为没有任何项目；目录存在但不可读时返回 `ProjectError::Io`。
    async fn list(&self) -> Result<Vec<ProjectSummary>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| ProjectError::Io(format!("读取项目目录失败: {}", e)))?;

        // 收集候选文件，规则与文件名策略一致
        let mut candidates = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ProjectError::Io(format!("遍历项目目录条目失败: {}", e)))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if filename::is_project_filename(&file_name) {
                candidates.push((file_name, entry.path()));
            }
        }

        let mut join_set = JoinSet::new();
        for (file_name, file_path) in candidates {
            join_set.spawn(async move {
                let metadata = tokio::fs::metadata(&file_path).await.ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let updated = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                // 部分文件系统不记录创建时间，退回到修改时间
                let created = metadata.created().unwrap_or(updated);

                Some(ProjectSummary {
                    filename: file_name,
                    created_at: system_time_to_iso8601(created),
                    updated_at: system_time_to_iso8601(updated),
                })
            });
        }

        let mut files = Vec::new();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Some(summary)) => files.push(summary),
                Ok(None) => {}
                Err(e) => log::warn!("读取项目文件元数据任务失败: {}", e),
            }
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    async fn exists(&self, filename: &str) -> Result<bool> {
        let path = file_guard::resolve_project_path(&self.dir, filename).await?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = file_guard::resolve_project_path(&self.dir, filename).await?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => not_found(filename),
            _ => ProjectError::Io(format!("读取项目文件失败: {}", e)),
        })
    }

    async fn write(&self, filename: &str, content: &[u8]) -> Result<()> {
        file_guard::safe_write_file(&self.dir, filename, content).await
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let content = self.read(from).await?;
        file_guard::safe_write_file(&self.dir, to, &content).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        file_guard::safe_rename_file(&self.dir, from, to).await
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        file_guard::safe_delete_file(&self.dir, filename).await
    }
}

// ============ 内存实现 ============

struct MemoryEntry {
    content: Vec<u8>,
    created_at: SystemTime,
    updated_at: SystemTime,
}

/// 纯内存仓库
///
/// 与文件系统实现遵循同样的错误约定（缺失文件返回 `NotFound`）。
#[derive(Default)]
pub struct MemoryProjectRepository {
    files: RwLock<BTreeMap<String, MemoryEntry>>,
}

impl MemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error() -> ProjectError {
        ProjectError::Io("内存仓库锁已损坏".to_string())
    }
}

impl ProjectRepository for MemoryProjectRepository {
    async fn list(&self) -> Result<Vec<ProjectSummary>> {
        let files = self.files.read().map_err(|_| Self::lock_error())?;
        // BTreeMap 本身按文件名有序
        Ok(files
            .iter()
            .map(|(filename, entry)| ProjectSummary {
                filename: filename.clone(),
                created_at: system_time_to_iso8601(entry.created_at),
                updated_at: system_time_to_iso8601(entry.updated_at),
            })
            .collect())
    }

    async fn exists(&self, filename: &str) -> Result<bool> {
        let files = self.files.read().map_err(|_| Self::lock_error())?;
        Ok(files.contains_key(filename))
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let files = self.files.read().map_err(|_| Self::lock_error())?;
        files
            .get(filename)
            .map(|entry| entry.content.clone())
            .ok_or_else(|| not_found(filename))
    }

    async fn write(&self, filename: &str, content: &[u8]) -> Result<()> {
        let mut files = self.files.write().map_err(|_| Self::lock_error())?;
        let now = SystemTime::now();
        files
            .entry(filename.to_string())
            .and_modify(|entry| {
                entry.content = content.to_vec();
                entry.updated_at = now;
            })
            .or_insert_with(|| MemoryEntry {
                content: content.to_vec(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let content = self.read(from).await?;
        self.write(to, &content).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.write().map_err(|_| Self::lock_error())?;
        let entry = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        let mut files = self.files.write().map_err(|_| Self::lock_error())?;
        files.remove(filename).map(|_| ()).ok_or_else(|| not_found(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsProjectRepository::new(dir.path());
        repo.write("b.json", b"{}").await.unwrap();
        repo.write("a.json", b"{}").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("folder.json")).unwrap();

        let names: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.filename)
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn test_fs_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsProjectRepository::new(dir.path().join("nope"));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fs_list_unreadable_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        let repo = FsProjectRepository::new(file);
        let err = repo.list().await.unwrap_err();
        assert!(matches!(err, ProjectError::Io(_)));
    }

    #[tokio::test]
    async fn test_fs_copy_rename_remove() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsProjectRepository::new(dir.path());
        repo.write("a.json", b"{\"a\":1}").await.unwrap();
        repo.copy("a.json", "b.json").await.unwrap();
        repo.rename("a.json", "c.json").await.unwrap();

        assert!(!repo.exists("a.json").await.unwrap());
        assert_eq!(repo.read("b.json").await.unwrap(), b"{\"a\":1}");
        assert_eq!(repo.read("c.json").await.unwrap(), b"{\"a\":1}");

        repo.remove("b.json").await.unwrap();
        assert!(matches!(
            repo.read("b.json").await.unwrap_err(),
            ProjectError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_memory_matches_fs_contract() {
        let repo = MemoryProjectRepository::new();
        repo.write("a.json", b"{}").await.unwrap();
        repo.copy("a.json", "b.json").await.unwrap();
        repo.rename("b.json", "c.json").await.unwrap();

        let names = repo.filenames().await.unwrap();
        assert!(names.contains("a.json"));
        assert!(names.contains("c.json"));
        assert!(!names.contains("b.json"));
        assert!(matches!(
            repo.remove("b.json").await.unwrap_err(),
            ProjectError::NotFound(_)
        ));
    }
}

//! # 服务配置
//!
//! 配置来源按优先级从低到高：
//! 1. 内置默认值
//! 2. 数据目录下的 `server-config.json`（可选）
//! 3. 环境变量 `ONTIME_DATA_DIR`、`ONTIME_HOST`、`ONTIME_PORT`
//!
//! `ONTIME_DATA_DIR` 同时决定在哪里查找 `server-config.json`。

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::path;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4001;
/// 上传文件的默认大小上限：50 MiB
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// 对应 `server-config.json` 文件内容
///
/// ```json
/// {
///   "host": "0.0.0.0",
///   "port": 4001,
///   "maxUploadBytes": 52428800
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 数据目录，其下包含 `projects/` 和 `db/`；只能通过环境变量或代码设置
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("ontime-data"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// 从进程环境加载配置
    ///
    /// # 错误
    /// 无法确定数据目录、配置文件损坏或环境变量格式错误时返回错误信息
    pub async fn load() -> Result<Self, String> {
        let data_dir = match std::env::var("ONTIME_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => path::get_default_data_path()?,
        };
        let host = std::env::var("ONTIME_HOST").ok();
        let port = std::env::var("ONTIME_PORT").ok();

        Self::load_from(&data_dir, host.as_deref(), port.as_deref()).await
    }

    /// 从指定数据目录加载配置并应用覆盖项
    pub async fn load_from(
        data_dir: &Path,
        host: Option<&str>,
        port: Option<&str>,
    ) -> Result<Self, String> {
        let config_path = data_dir.join(path::SERVER_CONFIG_FILE);

        let mut config = match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => serde_json::from_str::<ServerConfig>(&content)
                .map_err(|e| format!("解析配置文件 {} 失败: {}", config_path.display(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ServerConfig::default(),
            Err(e) => return Err(format!("读取配置文件失败: {}", e)),
        };
        config.data_dir = data_dir.to_path_buf();

        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| format!("ONTIME_PORT 不是合法的端口号: {}", e))?;
        }

        Ok(config)
    }

    /// 监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("监听地址 {}:{} 不合法: {}", self.host, self.port, e))
    }

    pub fn projects_dir(&self) -> PathBuf {
        path::projects_dir(&self.data_dir)
    }

    pub fn app_state_path(&self) -> PathBuf {
        path::app_state_path(&self.data_dir)
    }
}

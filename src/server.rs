//! # HTTP 服务器
//!
//! 基于 hyper 1.x 的 HTTP/1.1 服务：每个 TCP 连接在独立的 tokio 任务中处理，
//! 连接上的每个请求交给 `routes::dispatch`。

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::routes::{self, ApiState};
use crate::services::repository::ProjectRepository;

/// 绑定地址并持续接受连接
///
/// # 错误
/// 端口绑定失败时返回错误信息；单个连接的错误只记录日志，不影响服务
pub async fn serve<R: ProjectRepository>(addr: SocketAddr, state: Arc<ApiState<R>>) -> Result<(), String> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("绑定地址 {} 失败: {}", addr, e))?;
    log::info!("Ontime 服务已启动: http://{}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!("接受连接失败: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(routes::dispatch(state, req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                log::debug!("连接 {} 处理结束: {}", peer, e);
            }
        });
    }
}

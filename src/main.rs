//! # Ontime Server - 原生入口点
//!
//! `main.rs` 仅负责创建 tokio 运行时并调用 `ontime_server::run()`，
//! 核心逻辑位于 `lib.rs` 中，便于测试直接复用。

#[tokio::main]
async fn main() {
  if let Err(e) = ontime_server::run().await {
    eprintln!("Ontime 服务启动失败: {}", e);
    std::process::exit(1);
  }
}

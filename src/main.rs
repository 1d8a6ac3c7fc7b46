// src/main.rs
use clap::Parser;
use crab_gate::cli::{Cli, Commands};
use crab_gate::server;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    // RUST_LOG 优先，默认 info
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crab_gate=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start(args) => {
            // 启动失败（无拓扑 / PING 不通）时不进入服务
            if let Err(e) = server::start(args).await {
                tracing::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }
}

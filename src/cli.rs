// src/cli.rs

//! 命令行入口：`crab-gate start [flags]`

use clap::{Args, Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};

use crate::config::{self, ConnectionConfig};

#[derive(Parser, Debug)]
#[command(name = "crab-gate")]
#[command(about = "HTTP gateway for Redis hash commands")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway
    Start(StartArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// HTTP listen address (host:port)
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// JSON file with connection settings; replaces the connection flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionConfig,
}

impl StartArgs {
    /// 最终生效的连接配置
    pub fn connection_config(&self) -> anyhow::Result<ConnectionConfig> {
        match &self.config {
            Some(path) => config::load(path),
            None => Ok(self.connection.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_args(argv: &[&str]) -> StartArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Start(args) => args,
        }
    }

    #[test]
    fn test_flag_defaults_match_config_default() {
        const VARS: [&str; 17] = [
            "HOST", "MASTER_NAME", "SENTINEL_ADDRESS", "PASSWORD", "DB", "MAX_RETRIES",
            "POOL_SIZE", "MIN_IDLE_CONNS", "MIN_RETRY_BACKOFF", "MAX_RETRY_BACKOFF",
            "DIAL_TIMEOUT", "READ_TIMEOUT", "WRITE_TIMEOUT", "MAX_CONN_AGE", "POOL_TIMEOUT",
            "IDLE_TIMEOUT", "IDLE_CHECK_FREQUENCY",
        ];
        let args = start_args(&["crab-gate", "start"]);
        // 环境变量会覆盖默认值，只在干净环境下比较
        if VARS.iter().all(|v| std::env::var_os(v).is_none()) {
            assert_eq!(args.connection, ConnectionConfig::default());
        }
        assert!(args.config.is_none());
    }

    #[test]
    fn test_flags() {
        let args = start_args(&[
            "crab-gate",
            "start",
            "--host",
            "a:6379,b:6379",
            "--master-name",
            "mymaster",
            "--read-timeout",
            "4",
            "--max-retries",
            "-1",
            "--listen",
            "127.0.0.1:9000",
        ]);
        assert_eq!(args.connection.host, "a:6379,b:6379");
        assert_eq!(args.connection.master_name, "mymaster");
        assert_eq!(args.connection.read_timeout, 4);
        assert_eq!(args.connection.max_retries, -1);
        assert_eq!(args.listen, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }
}

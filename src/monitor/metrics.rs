// src/monitor/metrics.rs

use super::*;
use crate::engine::{Command, CommandResult};

/// 所有未知命令共用的统计标签
pub const UNSUPPORTED_LABEL: &str = "unsupported";

#[derive(Default)]
pub struct Metrics {
    pub command_count: AtomicU64,
    pub failure_count: AtomicU64,
    /// 命令名 -> (成功次数, 失败次数)
    pub command_stats: DashMap<String, (u64, u64)>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn record(&self, result: &CommandResult) {
        self.command_count.fetch_add(1, Ordering::Relaxed);
        if !result.success {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        // 命令名来自 URL，未知的名字不能各占一项
        let label = Command::known_name(&result.name).unwrap_or(UNSUPPORTED_LABEL);
        let mut entry = self.command_stats.entry(label.to_string()).or_insert((0, 0));
        if result.success {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP crab_gate_command_count Total commands processed\n");
        output.push_str("# TYPE crab_gate_command_count counter\n");
        output.push_str(&format!(
            "crab_gate_command_count {}\n",
            self.command_count.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP crab_gate_command_failures Total commands that failed\n");
        output.push_str("# TYPE crab_gate_command_failures counter\n");
        output.push_str(&format!(
            "crab_gate_command_failures {}\n",
            self.failure_count.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP crab_gate_command_stats Command statistics\n");
        output.push_str("# TYPE crab_gate_command_stats counter\n");
        // DashMap 迭代无序，排序后输出保证稳定
        let mut stats: Vec<(String, (u64, u64))> = self
            .command_stats
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        stats.sort();
        for (command, (ok, failed)) in stats {
            output.push_str(&format!(
                "crab_gate_command_stats{{command=\"{}\",result=\"ok\"}} {}\n",
                command, ok
            ));
            output.push_str(&format!(
                "crab_gate_command_stats{{command=\"{}\",result=\"error\"}} {}\n",
                command, failed
            ));
        }

        output
    }
}

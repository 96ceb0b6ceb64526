//! 日志初始化
//!
//! 安装 `tracing_subscriber::fmt` 全局订阅者，并把 `log` 记录桥接到 `tracing`。
//! 过滤规则优先取 `RUST_LOG`，否则使用 [`DEFAULT_FILTER`]。

use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

/// 默认过滤规则
pub const DEFAULT_FILTER: &str = "ot_motion=info,ot_pipetting=info";

/// 使用 `RUST_LOG` 或默认规则初始化日志
///
/// 已经初始化过时返回 `false`，不会覆盖已有的订阅者。
pub fn init_logging() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

/// 使用指定规则初始化日志（忽略 `RUST_LOG`）
///
/// 规则无法解析时退回默认规则。
pub fn init_logging_with_filter(directives: &str) -> bool {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

fn install(filter: EnvFilter) -> bool {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // 其他组件可能已经设置了 log 后端
    let _ = LogTracer::init();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        // 同一进程内其他测试可能已经初始化过
        let _ = init_logging_with_filter("ot_motion=debug");
        assert!(!init_logging());
        assert!(!init_logging_with_filter("not a [valid filter"));
        log::info!("bridged through tracing-log");
        tracing::debug!(target: "ot_motion", "still logging");
    }
}

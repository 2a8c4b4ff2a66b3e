//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 未安装 recorder 时所有 record_* 函数都是空操作。

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::config::ObservabilityConfig;

/// 安装 Prometheus recorder 并在 metrics_port 上暴露 `/metrics`
///
/// 需要在 tokio 运行时内调用，HTTP 监听任务由 exporter 自行 spawn。
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    info!("Metrics server listening on {}", addr);

    register_common_metrics(service_name);
    Ok(())
}

/// 注册通用指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "notifications_published_total",
        "Total number of publish calls"
    );
    metrics::describe_counter!(
        "user_notifications_created_total",
        "Total number of per-user notification records created"
    );
    metrics::describe_counter!("bulk_flushes_total", "Total number of bulk record flushes");
    metrics::describe_histogram!("bulk_flush_size", "Number of records per bulk flush");
    metrics::describe_counter!(
        "notification_publish_failures_total",
        "Total number of failed publish calls"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 记录一次发布调用
#[inline]
pub fn record_publish(mode: &str, recipients: usize) {
    metrics::counter!("notifications_published_total", "mode" => mode.to_string()).increment(1);
    metrics::histogram!("publish_recipients", "mode" => mode.to_string())
        .record(recipients as f64);
}

/// 记录发布失败
#[inline]
pub fn record_publish_failure(mode: &str, error_code: &str) {
    metrics::counter!(
        "notification_publish_failures_total",
        "mode" => mode.to_string(),
        "code" => error_code.to_string()
    )
    .increment(1);
}

/// 记录新建的用户通知记录数
#[inline]
pub fn record_records_created(channel: &str, count: usize) {
    metrics::counter!(
        "user_notifications_created_total",
        "channel" => channel.to_string()
    )
    .increment(count as u64);
}

/// 记录一次批量写入
#[inline]
pub fn record_bulk_flush(channel: &str, size: usize) {
    metrics::counter!("bulk_flushes_total", "channel" => channel.to_string()).increment(1);
    metrics::histogram!("bulk_flush_size", "channel" => channel.to_string()).record(size as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_publish("single", 1);
        record_publish("bulk", 5000);
        record_publish_failure("bulk", "DATABASE_ERROR");
        record_records_created("durable", 100);
        record_bulk_flush("durable", 100);
    }
}

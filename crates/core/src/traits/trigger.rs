use chrono::{DateTime, Utc};

/// 触发器: 由调度表达式构造, 计算给定时刻之后的下一次运行时间
///
/// 编译后只读, 可在多个线程间共享。
pub trait Trigger: Send + Sync {
    /// `inclusive` 为 true 时 `after` 本身也可以作为结果。
    /// 调度已耗尽时返回 `None`。
    fn next_run_time(&self, after: DateTime<Utc>, inclusive: bool) -> Option<DateTime<Utc>>;

    /// 原始表达式
    fn expression(&self) -> &str;
}

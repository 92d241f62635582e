//! # 数据模型
//!
//! 调度引擎的核心数据结构。作业定义(`JobGroup` / `JobDefinition` /
//! `JobDependency`)来自存储, 编译后成为内存中的 `Job`; 每个调度周期
//! 由一个 `TaskGroup` 和若干 `Task` 组成。
//!
//! ## 任务状态流转
//! ```text
//! INIT → TIMING → RUNNING → SUCCESS
//!   ↓       ↓         ↓  ↘
//! SCHEDULE_TIMEOUT  RUNNING_TIMEOUT  FAIL
//! ```
//!
//! 所有时间字段使用 `DateTime<Utc>`, 精确到秒。

pub mod job;
pub mod task;
pub mod worker;

pub use job::*;
pub use task::*;
pub use worker::*;

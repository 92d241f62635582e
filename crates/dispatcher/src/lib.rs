//! # dagsched-dispatcher
//!
//! 周期性 DAG 调度引擎:
//! - [`graph::DependencyGraph`] 通用依赖图 (Kahn 算法)
//! - [`job_graph::JobGraphManager`] 作业图, 持有作业锁
//! - [`cycle_scheduler::CycleScheduler`] 周期构建与拆除, 持有任务锁
//! - [`dispatch_loop::Dispatcher`] 调度循环与Worker协议
//!
//! 同时需要两把锁时总是先取作业锁, 再取任务锁。

pub mod controller;
pub mod cron_utils;
pub mod cycle_scheduler;
pub mod dispatch_loop;
pub mod graph;
pub mod job_graph;
pub mod strategies;

#[cfg(test)]
mod strategies_test;

pub use controller::TaskStateSummary;
pub use cron_utils::{truncate_to_second, CronTrigger};
pub use cycle_scheduler::{CycleCommand, CycleScheduler, TaskGraphState};
pub use dispatch_loop::{Dispatcher, DispatcherOptions, TickSummary};
pub use graph::DependencyGraph;
pub use job_graph::{CompiledGroup, JobGraphManager, JobGraphState};
pub use strategies::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{JobGroup, Task, TaskDescriptor, TaskGroup, TaskState},
    SchedulerResult,
};

/// 调度管理接口
#[async_trait]
pub trait SchedulerControlService: Send + Sync {
    /// 运行时加载任务组, 定义错误或循环依赖同步返回给调用方
    async fn add_job_group(&self, group_id: i64) -> SchedulerResult<()>;

    /// 移除任务组及其当前周期
    async fn delete_job_group(&self, group_id: i64) -> SchedulerResult<()>;

    /// 当前调度前沿上仍未结束的任务
    async fn pending_tasks(&self) -> SchedulerResult<Vec<Task>>;

    async fn alive_tasks(&self) -> SchedulerResult<Vec<Task>>;

    async fn alive_task_groups(&self) -> SchedulerResult<Vec<TaskGroup>>;

    async fn alive_job_groups(&self) -> SchedulerResult<Vec<JobGroup>>;
}

/// Worker协议接口
#[async_trait]
pub trait WorkerProtocolService: Send + Sync {
    /// 拉取分配给该Worker的任务, 以及需要中止的运行超时任务
    async fn pull(&self, worker_id: &str) -> SchedulerResult<Vec<TaskDescriptor>>;

    /// 上报任务结果, 重复上报同一终态是幂等的
    async fn report(
        &self,
        task_id: i64,
        done_time: DateTime<Utc>,
        worker_id: &str,
        state: TaskState,
    ) -> SchedulerResult<()>;
}

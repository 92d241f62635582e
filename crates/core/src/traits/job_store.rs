use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{JobDefinitions, Task, TaskGroup, TaskGroupState},
    SchedulerResult,
};

/// 作业与任务的持久化接口
///
/// 所有写操作失败都必须以 `SchedulerError::Store` 返回, 调用方在写入成功前
/// 不会修改内存状态。
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 查询作业定义, `group_id` 为 `None` 时返回全部
    async fn query_all(&self, group_id: Option<i64>) -> SchedulerResult<JobDefinitions>;

    /// 插入任务组, 返回带有存储分配id的任务组
    async fn insert_task_group(&self, task_group: &TaskGroup) -> SchedulerResult<TaskGroup>;

    async fn update_task_group(&self, id: i64, state: TaskGroupState) -> SchedulerResult<()>;

    async fn query_task_group(
        &self,
        group_id: i64,
        runtime: DateTime<Utc>,
    ) -> SchedulerResult<Option<TaskGroup>>;

    /// 插入任务, 返回带有存储分配id的任务
    async fn insert_task(&self, task: &Task) -> SchedulerResult<Task>;

    async fn update_task(&self, task: &Task) -> SchedulerResult<()>;

    /// 查询某个任务组下的全部任务
    async fn query_tasks(&self, task_group_id: i64) -> SchedulerResult<Vec<Task>>;
}

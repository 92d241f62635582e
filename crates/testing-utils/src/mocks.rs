//! 可注入故障的作业存储

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dagsched_core::{
    models::{JobDefinitions, Task, TaskGroup, TaskGroupState},
    traits::JobStore,
    SchedulerError, SchedulerResult,
};
use dagsched_infrastructure::InMemoryJobStore;

/// 包装内存存储, 按开关让写操作失败
#[derive(Clone)]
pub struct FlakyJobStore {
    inner: InMemoryJobStore,
    fail_writes: Arc<AtomicBool>,
    fail_task_group_updates: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl FlakyJobStore {
    pub fn new(inner: InMemoryJobStore) -> Self {
        Self {
            inner,
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_task_group_updates: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn inner(&self) -> &InMemoryJobStore {
        &self.inner
    }

    /// 所有写操作失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 只有 `update_task_group` 失败
    pub fn set_fail_task_group_updates(&self, fail: bool) {
        self.fail_task_group_updates.store(fail, Ordering::SeqCst);
    }

    /// 成功的写操作次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self, operation: &str) -> SchedulerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SchedulerError::store_error(format!("注入的写失败: {operation}")));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn query_all(&self, group_id: Option<i64>) -> SchedulerResult<JobDefinitions> {
        self.inner.query_all(group_id).await
    }

    async fn insert_task_group(&self, task_group: &TaskGroup) -> SchedulerResult<TaskGroup> {
        self.check_write("insert_task_group")?;
        self.inner.insert_task_group(task_group).await
    }

    async fn update_task_group(&self, id: i64, state: TaskGroupState) -> SchedulerResult<()> {
        if self.fail_task_group_updates.load(Ordering::SeqCst) {
            return Err(SchedulerError::store_error("注入的写失败: update_task_group"));
        }
        self.check_write("update_task_group")?;
        self.inner.update_task_group(id, state).await
    }

    async fn query_task_group(
        &self,
        group_id: i64,
        runtime: DateTime<Utc>,
    ) -> SchedulerResult<Option<TaskGroup>> {
        self.inner.query_task_group(group_id, runtime).await
    }

    async fn insert_task(&self, task: &Task) -> SchedulerResult<Task> {
        self.check_write("insert_task")?;
        self.inner.insert_task(task).await
    }

    async fn update_task(&self, task: &Task) -> SchedulerResult<()> {
        self.check_write("update_task")?;
        self.inner.update_task(task).await
    }

    async fn query_tasks(&self, task_group_id: i64) -> SchedulerResult<Vec<Task>> {
        self.inner.query_tasks(task_group_id).await
    }
}

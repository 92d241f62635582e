use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use dagsched_core::{
    models::{JobGroup, Task, TaskDescriptor, TaskGroup, TaskState},
    traits::{SchedulerControlService, WorkerProtocolService},
    SchedulerError, SchedulerResult,
};

use crate::cron_utils::truncate_to_second;
use crate::dispatch_loop::Dispatcher;

/// 存活任务按状态统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskStateSummary {
    pub init: usize,
    pub timing: usize,
    pub running: usize,
    pub reserved: usize,
}

impl TaskStateSummary {
    pub fn total(&self) -> usize {
        self.init + self.timing + self.running
    }
}

impl Dispatcher {
    /// 运行时加入任务组并构建第一个周期
    ///
    /// 校验在取锁之前完成; 插入作业图和构建周期在同一次持锁内进行。
    pub async fn add_job_group_at(&self, group_id: i64, now: DateTime<Utc>) -> SchedulerResult<()> {
        let compiled = self.jobs().prepare_group(group_id).await?;

        let mut jobs = self.jobs().lock().await;
        jobs.insert_group(compiled)?;

        let mut tasks = self.cycles().lock().await;
        let built = self
            .cycles()
            .build_cycle_locked(&jobs, &mut tasks, group_id, now, None)
            .await;
        if let Err(e) = built {
            jobs.remove_group(group_id);
            return Err(e);
        }

        info!("任务组 {} 已加入调度", group_id);
        Ok(())
    }

    pub async fn status_summary(&self) -> TaskStateSummary {
        let tasks = self.cycles().lock().await;
        let mut summary = TaskStateSummary::default();
        for task in tasks.tasks.values() {
            match task.state {
                TaskState::Init => summary.init += 1,
                TaskState::Timing => summary.timing += 1,
                TaskState::Running => summary.running += 1,
                _ => {}
            }
            if task.state != TaskState::Running && task.worker_id.is_some() {
                summary.reserved += 1;
            }
        }
        summary
    }
}

#[async_trait]
impl SchedulerControlService for Dispatcher {
    async fn add_job_group(&self, group_id: i64) -> SchedulerResult<()> {
        self.add_job_group_at(group_id, truncate_to_second(Utc::now()))
            .await
    }

    async fn delete_job_group(&self, group_id: i64) -> SchedulerResult<()> {
        let mut jobs = self.jobs().lock().await;
        if jobs.remove_group(group_id).is_none() {
            return Err(SchedulerError::JobGroupNotFound { id: group_id });
        }

        let mut tasks = self.cycles().lock().await;
        if let Some(task_group) = self.cycles().discard_group(&mut tasks, group_id) {
            warn!(
                "任务组 {} 已删除, 放弃进行中的周期 {} (runtime={})",
                group_id, task_group.id, task_group.runtime
            );
        } else {
            info!("任务组 {} 已删除", group_id);
        }
        Ok(())
    }

    async fn pending_tasks(&self) -> SchedulerResult<Vec<Task>> {
        Ok(self.cycles().lock().await.pending_tasks())
    }

    async fn alive_tasks(&self) -> SchedulerResult<Vec<Task>> {
        Ok(self.cycles().lock().await.tasks.values().cloned().collect())
    }

    async fn alive_task_groups(&self) -> SchedulerResult<Vec<TaskGroup>> {
        Ok(self
            .cycles()
            .lock()
            .await
            .task_groups
            .values()
            .cloned()
            .collect())
    }

    async fn alive_job_groups(&self) -> SchedulerResult<Vec<JobGroup>> {
        Ok(self.jobs().lock().await.groups.values().cloned().collect())
    }
}

#[async_trait]
impl WorkerProtocolService for Dispatcher {
    async fn pull(&self, worker_id: &str) -> SchedulerResult<Vec<TaskDescriptor>> {
        Dispatcher::pull(self, worker_id).await
    }

    async fn report(
        &self,
        task_id: i64,
        done_time: DateTime<Utc>,
        worker_id: &str,
        state: TaskState,
    ) -> SchedulerResult<()> {
        self.report_at(task_id, done_time, worker_id, state, truncate_to_second(Utc::now()))
            .await
    }
}

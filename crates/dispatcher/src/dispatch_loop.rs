use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use dagsched_core::{
    config::DispatcherConfig,
    models::{Task, TaskDescriptor, TaskState},
    traits::{JobStore, ResourceManager, WorkerSelectionStrategy},
    SchedulerError, SchedulerResult,
};

use crate::cron_utils::truncate_to_second;
use crate::cycle_scheduler::{CycleScheduler, TaskGraphState};
use crate::job_graph::{JobGraphManager, JobGraphState};

/// 调度循环参数
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub poll_interval: StdDuration,
    pub schedule_timeout: Duration,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            poll_interval: StdDuration::from_secs(1),
            schedule_timeout: Duration::seconds(60),
        }
    }
}

impl From<&DispatcherConfig> for DispatcherOptions {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            poll_interval: StdDuration::from_millis(config.poll_interval_ms),
            schedule_timeout: Duration::seconds(config.schedule_timeout_seconds),
        }
    }
}

/// 单次调度的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub ready: usize,
    pub assigned: usize,
    pub schedule_timeouts: usize,
    pub running_timeouts: usize,
}

/// 调度前沿上的任务按时间分类
#[derive(Debug, Default)]
struct Buckets {
    ready: Vec<Task>,
    schedule_timeout: Vec<Task>,
    running_timeout: Vec<Task>,
}

fn classify(pending: Vec<Task>, now: DateTime<Utc>, schedule_timeout: Duration) -> Buckets {
    let mut buckets = Buckets::default();
    for task in pending {
        match task.state {
            TaskState::Init | TaskState::Timing => {
                if now - schedule_timeout > task.runtime {
                    buckets.schedule_timeout.push(task);
                } else if task.runtime <= now {
                    buckets.ready.push(task);
                }
            }
            TaskState::Running => {
                if now - Duration::seconds(task.running_timeout_seconds) >= task.runtime {
                    buckets.running_timeout.push(task);
                }
            }
            _ => {}
        }
    }
    buckets
}

/// 调度器: 周期性地分类调度前沿上的任务, 并提供Worker拉取/上报协议
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    resource_manager: Arc<dyn ResourceManager>,
    strategy: Arc<dyn WorkerSelectionStrategy>,
    jobs: Arc<JobGraphManager>,
    cycles: Arc<CycleScheduler>,
    options: DispatcherOptions,
    running: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        resource_manager: Arc<dyn ResourceManager>,
        strategy: Arc<dyn WorkerSelectionStrategy>,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            jobs: Arc::new(JobGraphManager::new(store.clone())),
            cycles: Arc::new(CycleScheduler::new(store.clone())),
            store,
            resource_manager,
            strategy,
            options,
            running: AtomicBool::new(false),
        }
    }

    pub fn jobs(&self) -> &Arc<JobGraphManager> {
        &self.jobs
    }

    pub fn cycles(&self) -> &Arc<CycleScheduler> {
        &self.cycles
    }

    /// 加载作业图, 注册Worker移除监听器, 为每个作业组构建第一个周期
    pub async fn initialize(&self, now: DateTime<Utc>) -> SchedulerResult<()> {
        let groups = self.jobs.initialize().await?;

        self.resource_manager
            .register_worker_removed_listener(self.cycles.clone())
            .await;

        for group_id in &groups {
            self.cycles.build_cycle(&self.jobs, *group_id, now).await?;
        }

        info!(
            "调度器初始化完成: {} 个作业组, 选择策略: {}",
            groups.len(),
            self.strategy.name()
        );
        Ok(())
    }

    /// 在给定时刻执行一次分类调度
    pub async fn tick_at(&self, now: DateTime<Utc>) -> SchedulerResult<TickSummary> {
        let jobs = self.jobs.lock().await;
        let mut tasks = self.cycles.lock().await;

        let buckets = classify(tasks.pending_tasks(), now, self.options.schedule_timeout);
        let mut summary = TickSummary {
            ready: buckets.ready.len(),
            ..TickSummary::default()
        };

        for task in buckets.schedule_timeout {
            if self.handle_schedule_timeout(&mut tasks, task).await? {
                summary.schedule_timeouts += 1;
            }
        }

        for task in buckets.running_timeout {
            if self.handle_running_timeout(&mut tasks, task).await? {
                summary.running_timeouts += 1;
            }
        }

        for task in buckets.ready {
            if self.handle_ready(&jobs, &mut tasks, task).await? {
                summary.assigned += 1;
            }
        }

        if summary != TickSummary::default() {
            debug!("调度完成: {:?}", summary);
        }
        Ok(summary)
    }

    async fn handle_schedule_timeout(
        &self,
        tasks: &mut TaskGraphState,
        task: Task,
    ) -> SchedulerResult<bool> {
        // 同组的前一个超时可能已拆除了整个任务组
        if tasks.task(task.id).is_none() {
            return Ok(false);
        }

        let mut updated = task;
        updated.worker_id = None;
        updated.transition_to(TaskState::ScheduleTimeout)?;
        self.store.update_task(&updated).await?;

        warn!(
            "任务 {} (作业 {}) 调度超时, runtime={}",
            updated.id, updated.job_id, updated.runtime
        );
        self.cycles.on_task_failure(tasks, updated.group_id).await?;
        Ok(true)
    }

    async fn handle_running_timeout(
        &self,
        tasks: &mut TaskGraphState,
        task: Task,
    ) -> SchedulerResult<bool> {
        if tasks.task(task.id).is_none() {
            return Ok(false);
        }

        let mut updated = task;
        updated.transition_to(TaskState::RunningTimeout)?;
        self.store.update_task(&updated).await?;

        warn!(
            "任务 {} (作业 {}) 运行超时, Worker={:?}",
            updated.id, updated.job_id, updated.worker_id
        );
        self.cycles.on_task_failure(tasks, updated.group_id).await?;

        if let Some(worker_id) = updated.worker_id.as_deref() {
            tasks.push_abort_notice(worker_id, updated.descriptor());
        }
        Ok(true)
    }

    /// 到期任务进入 TIMING 并预留Worker; 返回是否完成了新的预留
    async fn handle_ready(
        &self,
        jobs: &JobGraphState,
        tasks: &mut TaskGraphState,
        task: Task,
    ) -> SchedulerResult<bool> {
        let Some(current) = tasks.task(task.id).cloned() else {
            return Ok(false);
        };

        let mut current = current;
        if current.state == TaskState::Init {
            current.transition_to(TaskState::Timing)?;
            self.store.update_task(&current).await?;
            tasks.replace_task(current.clone());
            debug!("任务 {} 到达运行时间, 进入 TIMING", current.id);
        }

        if current.worker_id.is_some() {
            return Ok(false);
        }

        let Some(job) = jobs.jobs.get(&current.job_id) else {
            warn!("任务 {} 对应的作业 {} 不存在", current.id, current.job_id);
            return Ok(false);
        };

        let mut workers = self.resource_manager.get_workers(&job.worker_group).await?;
        let load = tasks.worker_load();
        for worker in &mut workers {
            worker.current_task_count = load.get(&worker.id).copied().unwrap_or(0);
        }
        match self.strategy.choose(&current, &workers).await {
            Some(worker_id) => {
                debug!("任务 {} 预留给Worker {}", current.id, worker_id);
                current.worker_id = Some(worker_id);
                tasks.replace_task(current);
                Ok(true)
            }
            None => {
                debug!(
                    "任务 {} 暂无可用Worker (Worker组: {})",
                    current.id, job.worker_group
                );
                Ok(false)
            }
        }
    }

    /// Worker拉取: 预留给它的任务进入 RUNNING, 附带待中止的运行超时任务
    pub async fn pull(&self, worker_id: &str) -> SchedulerResult<Vec<TaskDescriptor>> {
        let mut tasks = self.cycles.lock().await;

        let reserved: Vec<Task> = tasks
            .tasks
            .values()
            .filter(|t| t.state == TaskState::Timing && t.worker_id.as_deref() == Some(worker_id))
            .cloned()
            .collect();

        let mut result = Vec::with_capacity(reserved.len());
        for mut task in reserved {
            task.transition_to(TaskState::Running)?;
            self.store.update_task(&task).await?;
            debug!("任务 {} 由Worker {} 开始执行", task.id, worker_id);
            result.push(task.descriptor());
            tasks.replace_task(task);
        }

        result.extend(tasks.take_abort_notices(worker_id));
        Ok(result)
    }

    /// Worker上报任务结果, `now` 用于构建下一个周期
    pub async fn report_at(
        &self,
        task_id: i64,
        done_time: DateTime<Utc>,
        worker_id: &str,
        state: TaskState,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        {
            let mut tasks = self.cycles.lock().await;

            let Some(task) = tasks.task(task_id).cloned() else {
                info!("忽略任务 {} 的上报: 任务未知或已结束", task_id);
                return Ok(());
            };
            if task.state.is_terminal() {
                info!("忽略任务 {} 的重复上报: 已是 {}", task_id, task.state);
                return Ok(());
            }
            if task.state != TaskState::Running {
                return Err(SchedulerError::InvalidStateTransition {
                    task_id,
                    from: task.state.to_string(),
                    to: state.to_string(),
                });
            }
            if task.worker_id.as_deref() != Some(worker_id) {
                return Err(SchedulerError::WorkerMismatch {
                    task_id,
                    expected: task.worker_id.clone(),
                    actual: worker_id.to_string(),
                });
            }

            let next = if state == TaskState::Success {
                TaskState::Success
            } else {
                TaskState::Fail
            };
            let mut updated = task;
            updated.transition_to(next)?;
            updated.done_time = Some(done_time);
            self.store.update_task(&updated).await?;
            debug!("任务 {} 上报 {} (Worker {})", task_id, next, worker_id);

            if next == TaskState::Success {
                self.cycles.on_task_success(&mut tasks, task_id).await?;
            } else {
                self.cycles
                    .on_task_failure(&mut tasks, updated.group_id)
                    .await?;
            }
        }

        if let Err(e) = self.cycles.drain_rebuilds(&self.jobs, now).await {
            error!("上报后重建周期失败, 将由调度循环重试: {}", e);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 启动调度循环
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.run().await })
    }

    /// 请求停止, 最迟一个调度间隔后生效
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run(&self) {
        info!("调度循环启动, 间隔 {:?}", self.options.poll_interval);

        while self.is_running() {
            let now = truncate_to_second(Utc::now());
            if let Err(e) = self.tick_at(now).await {
                error!("调度失败: {}", e);
            }
            if let Err(e) = self.cycles.drain_rebuilds(&self.jobs, now).await {
                error!("重建周期失败: {}", e);
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }

        info!("调度循环已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(id: i64, state: TaskState, runtime: DateTime<Utc>, running_timeout: i64) -> Task {
        let mut task = Task::new(id, 1, runtime, running_timeout);
        task.id = id;
        task.state = state;
        task
    }

    #[test]
    fn test_classify_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let pending = vec![
            task(1, TaskState::Init, now - Duration::seconds(100), 30),
            task(2, TaskState::Timing, now - Duration::seconds(10), 30),
            task(3, TaskState::Init, now + Duration::seconds(10), 30),
            task(4, TaskState::Running, now - Duration::seconds(40), 30),
            task(5, TaskState::Running, now - Duration::seconds(20), 30),
            task(6, TaskState::Running, now - Duration::seconds(30), 30),
        ];

        let buckets = classify(pending, now, Duration::seconds(60));
        let ids = |tasks: &[Task]| tasks.iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids(&buckets.schedule_timeout), vec![1]);
        assert_eq!(ids(&buckets.ready), vec![2]);
        assert_eq!(ids(&buckets.running_timeout), vec![4, 6]);
    }

    #[test]
    fn test_schedule_timeout_boundary_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let pending = vec![task(1, TaskState::Init, now - Duration::seconds(60), 30)];
        let buckets = classify(pending, now, Duration::seconds(60));
        assert!(buckets.schedule_timeout.is_empty());
        assert_eq!(buckets.ready.len(), 1);
    }

    #[test]
    fn test_options_from_config() {
        let config = DispatcherConfig {
            poll_interval_ms: 250,
            schedule_timeout_seconds: 45,
            selection_strategy: "random".to_string(),
        };
        let options = DispatcherOptions::from(&config);
        assert_eq!(options.poll_interval, StdDuration::from_millis(250));
        assert_eq!(options.schedule_timeout, Duration::seconds(45));
    }
}

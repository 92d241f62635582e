use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use dagsched_core::{
    models::{Job, Task, TaskDescriptor, TaskGroup, TaskGroupState, TaskState},
    traits::{JobStore, WorkerRemovedListener},
    SchedulerError, SchedulerResult,
};

use crate::graph::DependencyGraph;
use crate::job_graph::{JobGraphManager, JobGraphState};

/// 连续跳过已结束周期的上限
const MAX_SKIPPED_CYCLES: usize = 1024;

/// 周期重建指令, 由完成回调发出, 在锁外消费
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleCommand {
    Rebuild {
        group_id: i64,
        previous_runtime: DateTime<Utc>,
    },
}

/// 任务图及其 id 映射, 由任务锁保护
#[derive(Debug, Default)]
pub struct TaskGraphState {
    /// 活跃任务组, 按任务组id
    pub task_groups: BTreeMap<i64, TaskGroup>,
    /// 作业组id -> 活跃任务组id
    pub active: BTreeMap<i64, i64>,
    /// 存活任务
    pub tasks: BTreeMap<i64, Task>,
    /// 任务组id -> 存活任务id
    pub group_tasks: BTreeMap<i64, BTreeSet<i64>>,
    pub graph: DependencyGraph<i64>,
    abort_notices: BTreeMap<String, Vec<TaskDescriptor>>,
}

impl TaskGraphState {
    /// 调度前沿上仍未结束的任务
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.graph
            .independent_nodes()
            .into_iter()
            .filter_map(|id| self.tasks.get(&id))
            .filter(|task| task.state.is_pending())
            .cloned()
            .collect()
    }

    pub fn task(&self, task_id: i64) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn active_task_group(&self, group_id: i64) -> Option<&TaskGroup> {
        self.active
            .get(&group_id)
            .and_then(|id| self.task_groups.get(id))
    }

    pub fn tasks_of(&self, task_group_id: i64) -> Vec<&Task> {
        self.group_tasks
            .get(&task_group_id)
            .map(|ids| ids.iter().filter_map(|id| self.tasks.get(id)).collect())
            .unwrap_or_default()
    }

    /// 用新值覆盖内存中的任务
    pub fn replace_task(&mut self, task: Task) {
        if let Some(slot) = self.tasks.get_mut(&task.id) {
            *slot = task;
        }
    }

    /// 每个Worker上已预留或正在运行的任务数
    pub fn worker_load(&self) -> BTreeMap<String, i32> {
        let mut load = BTreeMap::new();
        for task in self.tasks.values() {
            if !matches!(task.state, TaskState::Timing | TaskState::Running) {
                continue;
            }
            if let Some(worker_id) = &task.worker_id {
                *load.entry(worker_id.clone()).or_insert(0) += 1;
            }
        }
        load
    }

    pub(crate) fn push_abort_notice(&mut self, worker_id: &str, notice: TaskDescriptor) {
        self.abort_notices
            .entry(worker_id.to_string())
            .or_default()
            .push(notice);
    }

    pub(crate) fn take_abort_notices(&mut self, worker_id: &str) -> Vec<TaskDescriptor> {
        self.abort_notices.remove(worker_id).unwrap_or_default()
    }

    fn register_cycle(&mut self, task_group: TaskGroup, tasks: Vec<Task>, edges: &[(i64, i64)]) {
        let mut by_job = BTreeMap::new();
        let mut ids = BTreeSet::new();
        for task in tasks {
            self.graph.add_node(task.id);
            by_job.insert(task.job_id, task.id);
            ids.insert(task.id);
            self.tasks.insert(task.id, task);
        }
        for (upstream, downstream) in edges {
            if let (Some(from), Some(to)) = (by_job.get(upstream), by_job.get(downstream)) {
                // 两端节点刚刚加入, 不会失败
                let _ = self.graph.add_edge(*from, *to);
            }
        }

        self.active.insert(task_group.group_id, task_group.id);
        self.group_tasks.insert(task_group.id, ids);
        self.task_groups.insert(task_group.id, task_group);
    }

    fn remove_task(&mut self, task_id: i64) -> Option<Task> {
        let task = self.tasks.remove(&task_id)?;
        self.graph.delete_node_if_exists(&task_id);
        if let Some(ids) = self.group_tasks.get_mut(&task.group_id) {
            ids.remove(&task_id);
        }
        Some(task)
    }

    /// 整体拆除一个任务组的内存状态
    fn teardown(&mut self, task_group_id: i64) -> Option<TaskGroup> {
        let task_group = self.task_groups.remove(&task_group_id)?;
        for task_id in self.group_tasks.remove(&task_group_id).unwrap_or_default() {
            self.tasks.remove(&task_id);
            self.graph.delete_node_if_exists(&task_id);
        }
        if self.active.get(&task_group.group_id) == Some(&task_group_id) {
            self.active.remove(&task_group.group_id);
        }
        Some(task_group)
    }
}

/// 周期调度器
///
/// 为每个作业组维护唯一的活跃任务组。任务组结束 (成功或失败) 后通过
/// 重建指令构建下一个周期, 周期的 runtime 严格递增。
pub struct CycleScheduler {
    store: Arc<dyn JobStore>,
    state: Mutex<TaskGraphState>,
    commands_tx: mpsc::UnboundedSender<CycleCommand>,
    commands_rx: Mutex<mpsc::UnboundedReceiver<CycleCommand>>,
}

impl CycleScheduler {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            store,
            state: Mutex::new(TaskGraphState::default()),
            commands_tx,
            commands_rx: Mutex::new(commands_rx),
        }
    }

    /// 获取任务锁。已持有作业锁时才能再取任务锁, 反之不行
    pub async fn lock(&self) -> MutexGuard<'_, TaskGraphState> {
        self.state.lock().await
    }

    /// 依次获取作业锁和任务锁, 然后构建周期
    pub async fn build_cycle(
        &self,
        jobs: &JobGraphManager,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Option<TaskGroup>> {
        let job_state = jobs.lock().await;
        let mut task_state = self.state.lock().await;
        self.build_cycle_locked(&job_state, &mut task_state, group_id, now, None)
            .await
    }

    /// 构建作业组的下一个周期
    ///
    /// 作业组已有活跃任务组或已不在作业图中时什么也不做。
    pub async fn build_cycle_locked(
        &self,
        jobs: &JobGraphState,
        tasks: &mut TaskGraphState,
        group_id: i64,
        now: DateTime<Utc>,
        previous_runtime: Option<DateTime<Utc>>,
    ) -> SchedulerResult<Option<TaskGroup>> {
        if let Some(active) = tasks.active_task_group(group_id) {
            debug!(
                "作业组 {} 已有活跃任务组 {} (runtime={}), 跳过构建",
                group_id, active.id, active.runtime
            );
            return Ok(None);
        }
        let Some(group) = jobs.groups.get(&group_id) else {
            debug!("作业组 {} 不在作业图中, 跳过构建", group_id);
            return Ok(None);
        };
        let anchor = jobs
            .jobs
            .get(&group.anchor_job_id)
            .ok_or(SchedulerError::InvalidAnchorJob {
                group_id,
                job_id: group.anchor_job_id,
            })?;

        let group_jobs: Vec<&Job> = jobs.jobs_of(group_id).collect();
        let edges: Vec<(i64, i64)> = jobs
            .dependencies_of(group_id)
            .iter()
            .map(|dep| (dep.upstream, dep.downstream))
            .collect();

        let Some(mut runtime) = first_runtime(anchor, now, previous_runtime) else {
            warn!("作业组 {} 的锚点触发器已没有后续运行时间", group_id);
            return Ok(None);
        };

        for _ in 0..MAX_SKIPPED_CYCLES {
            let task_group = match self.store.query_task_group(group_id, runtime).await? {
                Some(existing) if existing.state.is_terminal() => {
                    debug!(
                        "任务组 {} (runtime={}) 已是 {:?}, 尝试下一周期",
                        existing.id, runtime, existing.state
                    );
                    match anchor.trigger.next_run_time(runtime, false) {
                        Some(next) => {
                            runtime = next;
                            continue;
                        }
                        None => return Ok(None),
                    }
                }
                Some(existing) => existing,
                None => {
                    self.store
                        .insert_task_group(&TaskGroup::new(group_id, runtime))
                        .await?
                }
            };

            let cycle_tasks = self.materialize_tasks(&task_group, &group_jobs).await?;

            let outcome = if cycle_tasks.iter().any(|t| t.state.is_failure()) {
                Some(TaskGroupState::Fail)
            } else if cycle_tasks.iter().all(|t| t.state == TaskState::Success) {
                Some(TaskGroupState::Success)
            } else {
                None
            };
            if let Some(state) = outcome {
                self.store.update_task_group(task_group.id, state).await?;
                info!(
                    "任务组 {} (runtime={}) 的任务已全部结束, 标记为 {:?}",
                    task_group.id, runtime, state
                );
                match anchor.trigger.next_run_time(runtime, false) {
                    Some(next) => {
                        runtime = next;
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            let live: Vec<Task> = cycle_tasks
                .into_iter()
                .filter(|t| t.state != TaskState::Success)
                .collect();
            info!(
                "作业组 {} 构建周期: 任务组={}, runtime={}, 任务数={}",
                group_id,
                task_group.id,
                task_group.runtime,
                live.len()
            );
            tasks.register_cycle(task_group.clone(), live, &edges);
            return Ok(Some(task_group));
        }

        Err(SchedulerError::Internal(format!(
            "作业组 {group_id} 连续 {MAX_SKIPPED_CYCLES} 个周期已结束, 放弃构建"
        )))
    }

    /// 复用存储中已有的任务, 缺少的新建
    async fn materialize_tasks(
        &self,
        task_group: &TaskGroup,
        jobs: &[&Job],
    ) -> SchedulerResult<Vec<Task>> {
        let mut existing: BTreeMap<i64, Task> = self
            .store
            .query_tasks(task_group.id)
            .await?
            .into_iter()
            .map(|task| (task.job_id, task))
            .collect();

        let mut tasks = Vec::with_capacity(jobs.len());
        for job in jobs {
            if let Some(task) = existing.remove(&job.id) {
                tasks.push(task);
                continue;
            }

            let runtime = job
                .trigger
                .next_run_time(task_group.runtime, true)
                .unwrap_or(task_group.runtime);
            let task = Task::new(job.id, task_group.id, runtime, job.running_timeout_seconds);
            tasks.push(self.store.insert_task(&task).await?);
        }
        Ok(tasks)
    }

    /// 任务成功: 移出任务图; 组内已无任务时标记任务组成功并请求重建
    pub async fn on_task_success(
        &self,
        tasks: &mut TaskGraphState,
        task_id: i64,
    ) -> SchedulerResult<()> {
        let Some(task) = tasks.task(task_id) else {
            return Ok(());
        };
        let task_group_id = task.group_id;
        let is_last = tasks
            .group_tasks
            .get(&task_group_id)
            .map(|ids| ids.iter().all(|id| *id == task_id))
            .unwrap_or(false);

        if is_last {
            self.store
                .update_task_group(task_group_id, TaskGroupState::Success)
                .await?;
        }

        tasks.remove_task(task_id);
        debug!("任务 {} 成功, 已移出任务图", task_id);

        if is_last {
            if let Some(task_group) = tasks.teardown(task_group_id) {
                info!(
                    "任务组 {} (作业组 {}, runtime={}) 成功",
                    task_group.id, task_group.group_id, task_group.runtime
                );
                self.request_rebuild(&task_group);
            }
        }
        Ok(())
    }

    /// 任务失败 (包括两种超时): 标记任务组失败, 整组拆除并请求重建
    ///
    /// 任务组已不活跃时什么也不做。
    pub async fn on_task_failure(
        &self,
        tasks: &mut TaskGraphState,
        task_group_id: i64,
    ) -> SchedulerResult<()> {
        if !tasks.task_groups.contains_key(&task_group_id) {
            return Ok(());
        }

        self.store
            .update_task_group(task_group_id, TaskGroupState::Fail)
            .await?;

        if let Some(task_group) = tasks.teardown(task_group_id) {
            warn!(
                "任务组 {} (作业组 {}, runtime={}) 失败, 剩余任务已放弃",
                task_group.id, task_group.group_id, task_group.runtime
            );
            self.request_rebuild(&task_group);
        }
        Ok(())
    }

    /// 删除作业组时丢弃其活跃周期 (只影响内存)
    pub fn discard_group(&self, tasks: &mut TaskGraphState, group_id: i64) -> Option<TaskGroup> {
        let task_group_id = tasks.active.get(&group_id).copied()?;
        tasks.teardown(task_group_id)
    }

    fn request_rebuild(&self, task_group: &TaskGroup) {
        let command = CycleCommand::Rebuild {
            group_id: task_group.group_id,
            previous_runtime: task_group.runtime,
        };
        if self.commands_tx.send(command).is_err() {
            error!("重建指令通道已关闭, 作业组 {} 无法重建", task_group.group_id);
        }
    }

    /// 在锁外消费重建指令
    ///
    /// 失败的指令会重新入队, 等待下一次消费; 返回最后一个错误。
    pub async fn drain_rebuilds(
        &self,
        jobs: &JobGraphManager,
        now: DateTime<Utc>,
    ) -> SchedulerResult<usize> {
        let mut commands = Vec::new();
        {
            let mut rx = self.commands_rx.lock().await;
            while let Ok(command) = rx.try_recv() {
                commands.push(command);
            }
        }
        if commands.is_empty() {
            return Ok(0);
        }

        let mut built = 0;
        let mut last_error = None;
        for command in commands {
            let CycleCommand::Rebuild {
                group_id,
                previous_runtime,
            } = command;

            let job_state = jobs.lock().await;
            let mut task_state = self.state.lock().await;
            match self
                .build_cycle_locked(
                    &job_state,
                    &mut task_state,
                    group_id,
                    now,
                    Some(previous_runtime),
                )
                .await
            {
                Ok(Some(_)) => built += 1,
                Ok(None) => {}
                Err(e) => {
                    error!("作业组 {} 重建周期失败: {}", group_id, e);
                    let _ = self.commands_tx.send(command);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(built),
        }
    }
}

/// 下一个周期的 runtime, 保证严格晚于上一个周期
fn first_runtime(
    anchor: &Job,
    now: DateTime<Utc>,
    previous_runtime: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let candidate = anchor.trigger.next_run_time(now, true)?;
    match previous_runtime {
        Some(previous) if candidate <= previous => anchor.trigger.next_run_time(previous, false),
        _ => Some(candidate),
    }
}

#[async_trait]
impl WorkerRemovedListener for CycleScheduler {
    /// 清除该Worker在未分派任务上的预留, 使任务重新参与分配;
    /// 尚未送达的中止通知一并丢弃
    async fn on_worker_removed(&self, worker_id: &str) {
        let mut tasks = self.state.lock().await;
        let dropped = tasks.take_abort_notices(worker_id);
        if !dropped.is_empty() {
            info!("Worker {} 已移除, 丢弃 {} 条中止通知", worker_id, dropped.len());
        }

        let mut released = 0;
        for task in tasks.tasks.values_mut() {
            if matches!(task.state, TaskState::Init | TaskState::Timing)
                && task.worker_id.as_deref() == Some(worker_id)
            {
                task.worker_id = None;
                released += 1;
            }
        }
        if released > 0 {
            info!("Worker {} 已移除, 释放 {} 个任务预留", worker_id, released);
        }
    }
}

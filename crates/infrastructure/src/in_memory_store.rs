use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use dagsched_core::{
    models::{JobDefinitions, Task, TaskGroup, TaskGroupState},
    traits::JobStore,
    SchedulerError, SchedulerResult,
};

use crate::definitions::load_definitions;

#[derive(Debug, Default)]
struct StoreData {
    definitions: JobDefinitions,
    task_groups: HashMap<i64, TaskGroup>,
    tasks: HashMap<i64, Task>,
    next_task_group_id: i64,
    next_task_id: i64,
}

/// 内存作业存储
///
/// 作业定义在启动时给定 (或从 TOML 文件加载), 任务组和任务在运行中写入。
/// 进程退出后不保留任何数据。
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    data: Arc<RwLock<StoreData>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(definitions: JobDefinitions) -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreData {
                definitions,
                ..StoreData::default()
            })),
        }
    }

    pub fn from_definitions_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        Ok(Self::with_definitions(load_definitions(path)?))
    }

    /// 追加作业定义, 之后可通过 `add_job_group` 加入调度
    pub async fn add_definitions(&self, definitions: JobDefinitions) {
        let mut data = self.data.write().await;
        data.definitions.groups.extend(definitions.groups);
        data.definitions.jobs.extend(definitions.jobs);
        data.definitions.dependencies.extend(definitions.dependencies);
    }

    /// 某个作业组的全部任务组, 按 runtime 排序
    pub async fn task_groups_of(&self, group_id: i64) -> Vec<TaskGroup> {
        let data = self.data.read().await;
        let mut groups: Vec<TaskGroup> = data
            .task_groups
            .values()
            .filter(|tg| tg.group_id == group_id)
            .cloned()
            .collect();
        groups.sort_by_key(|tg| tg.runtime);
        groups
    }

    pub async fn get_task(&self, task_id: i64) -> Option<Task> {
        self.data.read().await.tasks.get(&task_id).cloned()
    }

    pub async fn task_count(&self) -> usize {
        self.data.read().await.tasks.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn query_all(&self, group_id: Option<i64>) -> SchedulerResult<JobDefinitions> {
        let data = self.data.read().await;
        let definitions = &data.definitions;
        let Some(group_id) = group_id else {
            return Ok(definitions.clone());
        };

        Ok(JobDefinitions {
            groups: definitions
                .groups
                .iter()
                .filter(|g| g.id == group_id)
                .cloned()
                .collect(),
            jobs: definitions
                .jobs
                .iter()
                .filter(|j| j.group_id == group_id)
                .cloned()
                .collect(),
            dependencies: definitions
                .dependencies
                .iter()
                .filter(|d| d.group_id == group_id)
                .copied()
                .collect(),
        })
    }

    async fn insert_task_group(&self, task_group: &TaskGroup) -> SchedulerResult<TaskGroup> {
        let mut data = self.data.write().await;
        let duplicate = data
            .task_groups
            .values()
            .any(|tg| tg.group_id == task_group.group_id && tg.runtime == task_group.runtime);
        if duplicate {
            return Err(SchedulerError::store_error(format!(
                "任务组已存在: group_id={}, runtime={}",
                task_group.group_id, task_group.runtime
            )));
        }

        data.next_task_group_id += 1;
        let mut inserted = task_group.clone();
        inserted.id = data.next_task_group_id;
        data.task_groups.insert(inserted.id, inserted.clone());

        debug!("插入任务组 {} (作业组 {})", inserted.id, inserted.group_id);
        Ok(inserted)
    }

    async fn update_task_group(&self, id: i64, state: TaskGroupState) -> SchedulerResult<()> {
        let mut data = self.data.write().await;
        let task_group = data
            .task_groups
            .get_mut(&id)
            .ok_or_else(|| SchedulerError::store_error(format!("任务组不存在: {id}")))?;
        task_group.state = state;
        Ok(())
    }

    async fn query_task_group(
        &self,
        group_id: i64,
        runtime: DateTime<Utc>,
    ) -> SchedulerResult<Option<TaskGroup>> {
        let data = self.data.read().await;
        Ok(data
            .task_groups
            .values()
            .find(|tg| tg.group_id == group_id && tg.runtime == runtime)
            .cloned())
    }

    async fn insert_task(&self, task: &Task) -> SchedulerResult<Task> {
        let mut data = self.data.write().await;
        if !data.task_groups.contains_key(&task.group_id) {
            return Err(SchedulerError::store_error(format!(
                "任务组不存在: {}",
                task.group_id
            )));
        }

        data.next_task_id += 1;
        let mut inserted = task.clone();
        inserted.id = data.next_task_id;
        data.tasks.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    async fn update_task(&self, task: &Task) -> SchedulerResult<()> {
        let mut data = self.data.write().await;
        let stored = data
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| SchedulerError::store_error(format!("任务不存在: {}", task.id)))?;
        *stored = task.clone();
        Ok(())
    }

    async fn query_tasks(&self, task_group_id: i64) -> SchedulerResult<Vec<Task>> {
        let data = self.data.read().await;
        let mut tasks: Vec<Task> = data
            .tasks
            .values()
            .filter(|t| t.group_id == task_group_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use dagsched_core::{
    models::{Job, JobDefinition, JobDefinitions, JobDependency, JobGroup},
    traits::{JobStore, Trigger},
    SchedulerError, SchedulerResult,
};

use crate::cron_utils::CronTrigger;
use crate::graph::DependencyGraph;

/// 通过校验、触发器已编译的任务组
#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub group: JobGroup,
    pub jobs: Vec<Job>,
    pub dependencies: Vec<JobDependency>,
}

impl CompiledGroup {
    /// 编译并校验一个任务组的定义
    ///
    /// 任何一个作业的触发器非法、锚点作业不在组内、依赖跨组, 整个组都不可用。
    pub fn compile(
        group: &JobGroup,
        jobs: &[&JobDefinition],
        dependencies: &[&JobDependency],
    ) -> SchedulerResult<Self> {
        let mut compiled = BTreeMap::new();
        for definition in jobs {
            let trigger: Arc<dyn Trigger> = Arc::new(CronTrigger::new(&definition.trigger)?);
            compiled.insert(definition.id, Job::new(definition, trigger));
        }

        if !compiled.contains_key(&group.anchor_job_id) {
            return Err(SchedulerError::InvalidAnchorJob {
                group_id: group.id,
                job_id: group.anchor_job_id,
            });
        }

        for dep in dependencies {
            let same_group = match (compiled.get(&dep.upstream), compiled.get(&dep.downstream)) {
                (Some(up), Some(down)) => up.group_id == down.group_id,
                _ => false,
            };
            if !same_group {
                return Err(SchedulerError::CrossGroupDependency {
                    group_id: group.id,
                    upstream: dep.upstream,
                    downstream: dep.downstream,
                });
            }
        }

        Ok(Self {
            group: group.clone(),
            jobs: compiled.into_values().collect(),
            dependencies: dependencies.iter().map(|dep| **dep).collect(),
        })
    }

    /// 组内依赖无环
    pub fn check_acyclic(&self) -> SchedulerResult<()> {
        let mut graph = DependencyGraph::new();
        for job in &self.jobs {
            graph.add_node(job.id);
        }
        for dep in &self.dependencies {
            graph.add_edge(dep.upstream, dep.downstream)?;
        }
        if graph.validate() {
            Ok(())
        } else {
            Err(SchedulerError::CycleDependency {
                group_ids: vec![self.group.id],
            })
        }
    }
}

/// 按组拆分并编译全部定义, 不合法的组被记录并排除
fn compile_all(definitions: &JobDefinitions) -> Vec<CompiledGroup> {
    let known: BTreeSet<i64> = definitions.groups.iter().map(|g| g.id).collect();
    for job in definitions.jobs.iter().filter(|j| !known.contains(&j.group_id)) {
        warn!("作业 {} 所属的任务组 {} 不存在, 已忽略", job.id, job.group_id);
    }

    definitions
        .groups
        .iter()
        .filter_map(|group| {
            let jobs: Vec<&JobDefinition> = definitions
                .jobs
                .iter()
                .filter(|j| j.group_id == group.id)
                .collect();
            let dependencies: Vec<&JobDependency> = definitions
                .dependencies
                .iter()
                .filter(|d| d.group_id == group.id)
                .collect();

            match CompiledGroup::compile(group, &jobs, &dependencies) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    error!("任务组 {} 定义无效, 已排除: {}", group.id, e);
                    None
                }
            }
        })
        .collect()
}

/// 作业图及其 id 映射, 由作业锁保护
#[derive(Debug, Default)]
pub struct JobGraphState {
    pub groups: BTreeMap<i64, JobGroup>,
    pub jobs: BTreeMap<i64, Job>,
    pub dependencies: BTreeMap<i64, Vec<JobDependency>>,
    pub graph: DependencyGraph<i64>,
}

impl JobGraphState {
    pub fn insert_group(&mut self, compiled: CompiledGroup) -> SchedulerResult<()> {
        let group_id = compiled.group.id;
        if self.groups.contains_key(&group_id) {
            return Err(SchedulerError::JobGroupAlreadyExists { id: group_id });
        }

        for job in &compiled.jobs {
            self.graph.add_node(job.id);
        }
        for dep in &compiled.dependencies {
            self.graph.add_edge(dep.upstream, dep.downstream)?;
        }
        for job in compiled.jobs {
            self.jobs.insert(job.id, job);
        }
        self.dependencies.insert(group_id, compiled.dependencies);
        self.groups.insert(group_id, compiled.group);

        debug!("任务组 {} 已加入作业图", group_id);
        Ok(())
    }

    /// 整组移除: 作业、依赖边、组记录
    pub fn remove_group(&mut self, group_id: i64) -> Option<JobGroup> {
        let group = self.groups.remove(&group_id)?;

        let job_ids: Vec<i64> = self
            .jobs
            .values()
            .filter(|job| job.group_id == group_id)
            .map(|job| job.id)
            .collect();
        for job_id in job_ids {
            self.jobs.remove(&job_id);
            self.graph.delete_node_if_exists(&job_id);
        }
        self.dependencies.remove(&group_id);

        Some(group)
    }

    pub fn jobs_of(&self, group_id: i64) -> impl Iterator<Item = &Job> {
        self.jobs.values().filter(move |job| job.group_id == group_id)
    }

    pub fn dependencies_of(&self, group_id: i64) -> &[JobDependency] {
        self.dependencies
            .get(&group_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 全局校验, 删除所有含环的任务组并返回它们的id
    fn remove_cycles(&mut self) -> Vec<i64> {
        if self.graph.validate() {
            return Vec::new();
        }

        let ordered: BTreeSet<i64> = self.graph.topological_sort().into_iter().collect();
        let cyclic: BTreeSet<i64> = self
            .jobs
            .values()
            .filter(|job| !ordered.contains(&job.id))
            .map(|job| job.group_id)
            .collect();

        for group_id in &cyclic {
            self.remove_group(*group_id);
        }
        cyclic.into_iter().collect()
    }
}

/// 作业图管理器
///
/// 持有作业锁。需要同时持有任务锁时, 必须先取作业锁。
pub struct JobGraphManager {
    store: Arc<dyn JobStore>,
    state: Mutex<JobGraphState>,
}

impl JobGraphManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            state: Mutex::new(JobGraphState::default()),
        }
    }

    /// 获取作业锁
    pub async fn lock(&self) -> MutexGuard<'_, JobGraphState> {
        self.state.lock().await
    }

    /// 从存储加载全部任务组, 返回成功加载的组id
    ///
    /// 定义错误和循环依赖只记录日志并排除相关组, 存储错误直接返回。
    pub async fn initialize(&self) -> SchedulerResult<Vec<i64>> {
        let definitions = self.store.query_all(None).await?;
        let compiled = compile_all(&definitions);

        let mut state = self.state.lock().await;
        *state = JobGraphState::default();
        for group in compiled {
            let group_id = group.group.id;
            if let Err(e) = state.insert_group(group) {
                error!("任务组 {} 加载失败: {}", group_id, e);
            }
        }

        let removed = state.remove_cycles();
        if !removed.is_empty() {
            let e = SchedulerError::CycleDependency { group_ids: removed };
            error!("{}, 相关任务组已移除", e);
        }

        let loaded: Vec<i64> = state.groups.keys().copied().collect();
        info!(
            "作业图初始化完成: {} 个任务组, {} 个作业",
            loaded.len(),
            state.jobs.len()
        );
        Ok(loaded)
    }

    /// 读取并校验单个任务组, 不持有作业锁
    pub async fn prepare_group(&self, group_id: i64) -> SchedulerResult<CompiledGroup> {
        let definitions = self.store.query_all(Some(group_id)).await?;
        let group = definitions
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .ok_or(SchedulerError::JobGroupNotFound { id: group_id })?;

        let jobs: Vec<&JobDefinition> = definitions
            .jobs
            .iter()
            .filter(|j| j.group_id == group_id)
            .collect();
        let dependencies: Vec<&JobDependency> = definitions
            .dependencies
            .iter()
            .filter(|d| d.group_id == group_id)
            .collect();

        let compiled = CompiledGroup::compile(group, &jobs, &dependencies)?;
        compiled.check_acyclic()?;
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn definition(id: i64, group_id: i64, trigger: &str) -> JobDefinition {
        JobDefinition {
            id,
            group_id,
            name: format!("job-{id}"),
            trigger: trigger.to_string(),
            worker_group: "default".to_string(),
            running_timeout_seconds: 60,
        }
    }

    fn group(id: i64, anchor: i64) -> JobGroup {
        JobGroup {
            id,
            name: format!("group-{id}"),
            anchor_job_id: anchor,
        }
    }

    fn dep(group_id: i64, upstream: i64, downstream: i64) -> JobDependency {
        JobDependency {
            group_id,
            upstream,
            downstream,
        }
    }

    #[test]
    fn test_compile_rejects_bad_trigger() {
        let g = group(1, 10);
        let job = definition(10, 1, "every day");
        let err = CompiledGroup::compile(&g, &[&job], &[]).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    }

    #[test]
    fn test_compile_rejects_foreign_anchor() {
        let g = group(1, 99);
        let job = definition(10, 1, "0 * * * * *");
        let err = CompiledGroup::compile(&g, &[&job], &[]).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidAnchorJob {
                group_id: 1,
                job_id: 99
            }
        ));
    }

    #[test]
    fn test_compile_rejects_cross_group_dependency() {
        let g = group(1, 10);
        let job = definition(10, 1, "0 * * * * *");
        let d = dep(1, 10, 20);
        let err = CompiledGroup::compile(&g, &[&job], &[&d]).unwrap_err();
        assert!(matches!(err, SchedulerError::CrossGroupDependency { .. }));
        assert!(err.is_definition_error());
    }

    #[test]
    fn test_check_acyclic() {
        let g = group(1, 10);
        let a = definition(10, 1, "0 * * * * *");
        let b = definition(11, 1, "0 * * * * *");
        let forward = dep(1, 10, 11);
        let backward = dep(1, 11, 10);

        let ok = CompiledGroup::compile(&g, &[&a, &b], &[&forward]).unwrap();
        assert!(ok.check_acyclic().is_ok());

        let cyclic = CompiledGroup::compile(&g, &[&a, &b], &[&forward, &backward]).unwrap();
        let err = cyclic.check_acyclic().unwrap_err();
        assert!(matches!(err, SchedulerError::CycleDependency { ref group_ids } if group_ids == &vec![1]));
    }

    #[test]
    fn test_compile_all_excludes_only_invalid_groups() {
        let definitions = JobDefinitions {
            groups: vec![group(1, 10), group(2, 20)],
            jobs: vec![
                definition(10, 1, "0 * * * * *"),
                definition(20, 2, "bogus"),
                definition(30, 3, "0 * * * * *"),
            ],
            dependencies: vec![],
        };
        let compiled = compile_all(&definitions);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].group.id, 1);
        assert!(compiled[0].jobs[0]
            .trigger
            .next_run_time(Utc::now(), true)
            .is_some());
    }

    #[test]
    fn test_state_remove_cycles_purges_whole_group() {
        let mut state = JobGraphState::default();
        let healthy = JobDefinitions {
            groups: vec![group(1, 10), group(2, 20)],
            jobs: vec![
                definition(10, 1, "0 * * * * *"),
                definition(11, 1, "0 * * * * *"),
                definition(20, 2, "0 * * * * *"),
                definition(21, 2, "0 * * * * *"),
                definition(22, 2, "0 * * * * *"),
            ],
            dependencies: vec![dep(1, 10, 11), dep(2, 20, 21), dep(2, 21, 22), dep(2, 22, 21)],
        };
        for compiled in compile_all(&healthy) {
            state.insert_group(compiled).unwrap();
        }

        assert_eq!(state.remove_cycles(), vec![2]);
        assert!(state.groups.contains_key(&1));
        assert!(!state.groups.contains_key(&2));
        assert_eq!(state.jobs.len(), 2);
        assert_eq!(state.graph.len(), 2);
        assert!(state.dependencies_of(2).is_empty());
        assert!(state.graph.validate());
    }

    #[test]
    fn test_insert_existing_group_rejected() {
        let mut state = JobGraphState::default();
        let g = group(1, 10);
        let job = definition(10, 1, "0 * * * * *");
        let compiled = CompiledGroup::compile(&g, &[&job], &[]).unwrap();
        state.insert_group(compiled.clone()).unwrap();

        let err = state.insert_group(compiled).unwrap_err();
        assert!(matches!(err, SchedulerError::JobGroupAlreadyExists { id: 1 }));
        assert_eq!(state.jobs_of(1).count(), 1);
    }
}

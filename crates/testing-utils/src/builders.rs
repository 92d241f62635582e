//! 测试数据构建器, 提供合理的默认值

use dagsched_core::models::{
    JobDefinition, JobDefinitions, JobDependency, JobGroup, WorkerInfo, WorkerStatus,
};

/// 每分钟第0秒触发
pub const EVERY_MINUTE: &str = "0 * * * * *";

pub struct JobDefinitionBuilder {
    job: JobDefinition,
}

impl JobDefinitionBuilder {
    pub fn new() -> Self {
        Self {
            job: JobDefinition {
                id: 1,
                group_id: 1,
                name: "test_job".to_string(),
                trigger: EVERY_MINUTE.to_string(),
                worker_group: "default".to_string(),
                running_timeout_seconds: 300,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.job.id = id;
        self.job.name = format!("job-{id}");
        self
    }

    pub fn with_group(mut self, group_id: i64) -> Self {
        self.job.group_id = group_id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.job.name = name.to_string();
        self
    }

    pub fn with_trigger(mut self, trigger: &str) -> Self {
        self.job.trigger = trigger.to_string();
        self
    }

    pub fn with_worker_group(mut self, worker_group: &str) -> Self {
        self.job.worker_group = worker_group.to_string();
        self
    }

    pub fn with_running_timeout(mut self, seconds: i64) -> Self {
        self.job.running_timeout_seconds = seconds;
        self
    }

    pub fn build(self) -> JobDefinition {
        self.job
    }
}

impl Default for JobDefinitionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 逐步累积任务组、作业和依赖
#[derive(Default)]
pub struct DefinitionsBuilder {
    definitions: JobDefinitions,
}

impl DefinitionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, id: i64, anchor_job_id: i64) -> Self {
        self.definitions.groups.push(JobGroup {
            id,
            name: format!("group-{id}"),
            anchor_job_id,
        });
        self
    }

    pub fn job(mut self, job: JobDefinition) -> Self {
        self.definitions.jobs.push(job);
        self
    }

    pub fn dependency(mut self, group_id: i64, upstream: i64, downstream: i64) -> Self {
        self.definitions.dependencies.push(JobDependency {
            group_id,
            upstream,
            downstream,
        });
        self
    }

    pub fn build(self) -> JobDefinitions {
        self.definitions
    }
}

pub struct WorkerInfoBuilder {
    worker: WorkerInfo,
}

impl WorkerInfoBuilder {
    pub fn new() -> Self {
        Self {
            worker: WorkerInfo::new("test-worker", "default", 5),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.worker.id = id.to_string();
        self
    }

    pub fn with_worker_group(mut self, worker_group: &str) -> Self {
        self.worker.worker_group = worker_group.to_string();
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max: i32) -> Self {
        self.worker.max_concurrent_tasks = max;
        self
    }

    pub fn with_current_task_count(mut self, count: i32) -> Self {
        self.worker.current_task_count = count;
        self
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.worker.status = status;
        self
    }

    pub fn build(self) -> WorkerInfo {
        self.worker
    }
}

impl Default for WorkerInfoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

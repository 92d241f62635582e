use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::traits::Trigger;

/// 任务组定义
///
/// 锚点作业(`anchor_job_id`)的触发器决定整个组的周期开始时间。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobGroup {
    pub id: i64,
    pub name: String,
    pub anchor_job_id: i64,
}

/// 持久化的作业定义, 触发器尚未编译
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
    /// cron 表达式 (带秒字段)
    pub trigger: String,
    /// 决定哪些Worker可以执行该作业
    pub worker_group: String,
    pub running_timeout_seconds: i64,
}

/// 组内依赖: `upstream` 成功后 `downstream` 才可执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDependency {
    pub group_id: i64,
    pub upstream: i64,
    pub downstream: i64,
}

/// `JobStore::query_all` 的返回值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDefinitions {
    #[serde(default)]
    pub groups: Vec<JobGroup>,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
    #[serde(default)]
    pub dependencies: Vec<JobDependency>,
}

/// 编译后的作业, 在调度器生命周期内不可变
#[derive(Clone)]
pub struct Job {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
    pub trigger: Arc<dyn Trigger>,
    pub worker_group: String,
    pub running_timeout_seconds: i64,
}

impl Job {
    pub fn new(definition: &JobDefinition, trigger: Arc<dyn Trigger>) -> Self {
        Self {
            id: definition.id,
            group_id: definition.group_id,
            name: definition.name.clone(),
            trigger,
            worker_group: definition.worker_group.clone(),
            running_timeout_seconds: definition.running_timeout_seconds,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("group_id", &self.group_id)
            .field("name", &self.name)
            .field("trigger", &self.trigger.expression())
            .field("worker_group", &self.worker_group)
            .field("running_timeout_seconds", &self.running_timeout_seconds)
            .finish()
    }
}

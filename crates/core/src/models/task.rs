use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SchedulerError, SchedulerResult};

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "TIMING")]
    Timing,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "SCHEDULE_TIMEOUT")]
    ScheduleTimeout,
    #[serde(rename = "RUNNING_TIMEOUT")]
    RunningTimeout,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Init => "INIT",
            TaskState::Timing => "TIMING",
            TaskState::Running => "RUNNING",
            TaskState::Success => "SUCCESS",
            TaskState::Fail => "FAIL",
            TaskState::ScheduleTimeout => "SCHEDULE_TIMEOUT",
            TaskState::RunningTimeout => "RUNNING_TIMEOUT",
        }
    }

    /// 仍在调度窗口内 (INIT / TIMING / RUNNING)
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Init | TaskState::Timing | TaskState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// FAIL 与两种超时对周期调度来说等价
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskState::Fail | TaskState::ScheduleTimeout | TaskState::RunningTimeout
        )
    }

    /// 状态机: 只允许前进, 超时是唯二的强制转换
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, next),
            (Init, Timing)
                | (Init, ScheduleTimeout)
                | (Timing, Running)
                | (Timing, ScheduleTimeout)
                | (Running, Success)
                | (Running, Fail)
                | (Running, RunningTimeout)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务组(一个调度周期)状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskGroupState {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAIL")]
    Fail,
}

impl TaskGroupState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskGroupState::Init)
    }
}

/// 任务组: 某个 `JobGroup` 的一次具体运行周期
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub id: i64,
    pub group_id: i64,
    pub runtime: DateTime<Utc>,
    pub state: TaskGroupState,
}

impl TaskGroup {
    /// 创建新的任务组, id 由存储分配
    pub fn new(group_id: i64, runtime: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            group_id,
            runtime,
            state: TaskGroupState::Init,
        }
    }
}

/// 任务: 作业在某个任务组中的一次执行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub job_id: i64,
    /// 所属任务组 id
    pub group_id: i64,
    pub runtime: DateTime<Utc>,
    pub state: TaskState,
    pub worker_id: Option<String>,
    pub running_timeout_seconds: i64,
    pub done_time: Option<DateTime<Utc>>,
}

impl Task {
    /// 创建新的任务, id 由存储分配
    pub fn new(
        job_id: i64,
        group_id: i64,
        runtime: DateTime<Utc>,
        running_timeout_seconds: i64,
    ) -> Self {
        Self {
            id: 0,
            job_id,
            group_id,
            runtime,
            state: TaskState::Init,
            worker_id: None,
            running_timeout_seconds,
            done_time: None,
        }
    }

    /// 按状态机推进状态, 非法转换返回 `InvalidStateTransition`
    pub fn transition_to(&mut self, next: TaskState) -> SchedulerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(SchedulerError::InvalidStateTransition {
                task_id: self.id,
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            task_id: self.id,
            job_id: self.job_id,
            state: self.state,
        }
    }
}

/// Worker拉取任务时得到的描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: i64,
    pub job_id: i64,
    pub state: TaskState,
}

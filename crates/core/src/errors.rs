use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("存储错误: {0}")]
    Store(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("任务组 {group_id} 的锚点作业 {job_id} 不属于该组")]
    InvalidAnchorJob { group_id: i64, job_id: i64 },

    #[error("跨组依赖: 任务组 {group_id} 中的依赖 {upstream} -> {downstream} 无效")]
    CrossGroupDependency {
        group_id: i64,
        upstream: i64,
        downstream: i64,
    },

    #[error("检测到循环依赖, 涉及任务组: {group_ids:?}")]
    CycleDependency { group_ids: Vec<i64> },

    #[error("任务组未找到: {id}")]
    JobGroupNotFound { id: i64 },

    #[error("任务组已存在: {id}")]
    JobGroupAlreadyExists { id: i64 },

    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },

    #[error("任务 {task_id} 不允许从 {from} 转换到 {to}")]
    InvalidStateTransition {
        task_id: i64,
        from: String,
        to: String,
    },

    #[error("任务 {task_id} 分配给Worker {expected:?}, 但收到来自 {actual} 的上报")]
    WorkerMismatch {
        task_id: i64,
        expected: Option<String>,
        actual: String,
    },

    #[error("图节点未找到: {0}")]
    GraphNodeNotFound(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn store_error<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }

    /// 作业定义问题, 作用域总是所属任务组
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidCron { .. }
                | SchedulerError::InvalidAnchorJob { .. }
                | SchedulerError::CrossGroupDependency { .. }
                | SchedulerError::JobGroupNotFound { .. }
                | SchedulerError::JobGroupAlreadyExists { .. }
        )
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self, SchedulerError::Store(_))
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_display() {
        let store_error = SchedulerError::store_error("connection reset");
        assert_eq!(store_error.to_string(), "存储错误: connection reset");

        let cycle_error = SchedulerError::CycleDependency {
            group_ids: vec![3, 7],
        };
        assert_eq!(cycle_error.to_string(), "检测到循环依赖, 涉及任务组: [3, 7]");

        let task_error = SchedulerError::task_not_found(42);
        assert_eq!(task_error.to_string(), "任务未找到: 42");
    }

    #[test]
    fn test_error_classification() {
        assert!(SchedulerError::InvalidCron {
            expr: "bad".to_string(),
            message: "parse".to_string(),
        }
        .is_definition_error());
        assert!(SchedulerError::InvalidAnchorJob {
            group_id: 1,
            job_id: 2
        }
        .is_definition_error());
        assert!(!SchedulerError::store_error("x").is_definition_error());
        assert!(SchedulerError::store_error("x").is_store_error());
        assert!(!SchedulerError::CycleDependency { group_ids: vec![] }.is_store_error());
    }

    #[test]
    fn test_from_anyhow() {
        let err: SchedulerError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, SchedulerError::Internal(ref m) if m == "boom"));
    }
}

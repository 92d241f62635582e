use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Worker节点信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: String,
    pub worker_group: String,
    pub max_concurrent_tasks: i32,
    pub current_task_count: i32,
    pub status: WorkerStatus,
    pub registered_at: DateTime<Utc>,
}

/// Worker状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerStatus {
    #[serde(rename = "ALIVE")]
    Alive,
    #[serde(rename = "DOWN")]
    Down,
}

impl WorkerInfo {
    pub fn new(id: impl Into<String>, worker_group: impl Into<String>, max_concurrent_tasks: i32) -> Self {
        Self {
            id: id.into(),
            worker_group: worker_group.into(),
            max_concurrent_tasks,
            current_task_count: 0,
            status: WorkerStatus::Alive,
            registered_at: Utc::now(),
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.status, WorkerStatus::Alive)
    }

    /// 获取Worker负载率
    pub fn load_percentage(&self) -> f64 {
        if self.max_concurrent_tasks == 0 {
            0.0
        } else {
            (self.current_task_count as f64 / self.max_concurrent_tasks as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_percentage() {
        let mut worker = WorkerInfo::new("worker-1", "default", 4);
        assert_eq!(worker.load_percentage(), 0.0);
        worker.current_task_count = 1;
        assert_eq!(worker.load_percentage(), 25.0);

        let idle = WorkerInfo::new("worker-2", "default", 0);
        assert_eq!(idle.load_percentage(), 0.0);
        assert!(idle.is_alive());
    }
}

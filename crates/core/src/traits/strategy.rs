use async_trait::async_trait;

use crate::models::{Task, WorkerInfo};

/// Worker选择策略接口
#[async_trait]
pub trait WorkerSelectionStrategy: Send + Sync {
    /// 从候选Worker中选择一个, 无合适Worker时返回 `None`
    async fn choose(&self, task: &Task, workers: &[WorkerInfo]) -> Option<String>;

    /// 获取策略名称
    fn name(&self) -> &str;
}

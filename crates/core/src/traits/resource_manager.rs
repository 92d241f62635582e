use std::sync::Arc;

use async_trait::async_trait;

use crate::{models::WorkerInfo, SchedulerResult};

/// Worker被移除时的回调
#[async_trait]
pub trait WorkerRemovedListener: Send + Sync {
    async fn on_worker_removed(&self, worker_id: &str);
}

/// Worker资源管理接口
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// 获取某个Worker组内的存活Worker
    async fn get_workers(&self, worker_group: &str) -> SchedulerResult<Vec<WorkerInfo>>;

    /// 注册Worker移除监听器
    async fn register_worker_removed_listener(&self, listener: Arc<dyn WorkerRemovedListener>);
}

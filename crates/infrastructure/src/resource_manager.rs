use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use dagsched_core::{
    models::{WorkerInfo, WorkerStatus},
    traits::{ResourceManager, WorkerRemovedListener},
    SchedulerResult,
};

/// 内存Worker注册表
///
/// Worker由配置静态注册或在运行中注册; 移除Worker时通知所有监听器。
#[derive(Default)]
pub struct InMemoryResourceManager {
    workers: RwLock<HashMap<String, WorkerInfo>>,
    listeners: RwLock<Vec<Arc<dyn WorkerRemovedListener>>>,
}

impl InMemoryResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_worker(&self, worker: WorkerInfo) {
        info!(
            "注册Worker: {} (Worker组: {}, 最大并发: {})",
            worker.id, worker.worker_group, worker.max_concurrent_tasks
        );
        self.workers.write().await.insert(worker.id.clone(), worker);
    }

    /// 移除Worker并通知监听器, 返回Worker是否存在
    pub async fn remove_worker(&self, worker_id: &str) -> bool {
        if self.workers.write().await.remove(worker_id).is_none() {
            warn!("移除Worker失败, 未注册: {}", worker_id);
            return false;
        }

        // 通知时不持有锁
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_worker_removed(worker_id).await;
        }
        info!("Worker {} 已移除", worker_id);
        true
    }

    pub async fn set_status(&self, worker_id: &str, status: WorkerStatus) -> bool {
        match self.workers.write().await.get_mut(worker_id) {
            Some(worker) => {
                worker.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }
}

#[async_trait]
impl ResourceManager for InMemoryResourceManager {
    async fn get_workers(&self, worker_group: &str) -> SchedulerResult<Vec<WorkerInfo>> {
        let workers = self.workers.read().await;
        let mut result: Vec<WorkerInfo> = workers
            .values()
            .filter(|w| w.worker_group == worker_group && w.is_alive())
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }

    async fn register_worker_removed_listener(&self, listener: Arc<dyn WorkerRemovedListener>) {
        self.listeners.write().await.push(listener);
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use dagsched_core::{models::WorkerInfo, AppConfig};
use dagsched_dispatcher::{strategy_from_name, truncate_to_second, Dispatcher, DispatcherOptions};
use dagsched_infrastructure::{InMemoryJobStore, InMemoryResourceManager};

/// 等待调度循环退出的上限
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// 主应用程序: 组装存储、Worker资源和调度器
pub struct Application {
    dispatcher: Arc<Dispatcher>,
    resources: Arc<InMemoryResourceManager>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("配置校验失败")?;

        let definitions_path = &config.store.definitions_path;
        let store = InMemoryJobStore::from_definitions_file(definitions_path)
            .with_context(|| format!("加载作业定义失败: {definitions_path}"))?;

        let resources = Arc::new(InMemoryResourceManager::new());
        for worker in &config.workers {
            resources
                .register_worker(WorkerInfo::new(
                    &worker.id,
                    &worker.worker_group,
                    worker.max_concurrent_tasks,
                ))
                .await;
        }
        if config.workers.is_empty() {
            warn!("未配置任何Worker, 到期任务将停留在 TIMING 状态");
        }

        let strategy = strategy_from_name(&config.dispatcher.selection_strategy)?;
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(store),
            resources.clone(),
            strategy,
            DispatcherOptions::from(&config.dispatcher),
        ));

        Ok(Self {
            dispatcher,
            resources,
        })
    }

    /// 初始化并运行调度循环, 直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.dispatcher
            .initialize(truncate_to_second(Utc::now()))
            .await
            .context("调度器初始化失败")?;

        info!("已注册 {} 个Worker", self.resources.worker_count().await);
        let handle = self.dispatcher.start();

        let _ = shutdown_rx.recv().await;
        info!("停止调度循环");
        self.dispatcher.stop();

        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("调度循环异常退出: {}", e),
            Err(_) => warn!("等待调度循环退出超时"),
        }

        let summary = self.dispatcher.status_summary().await;
        info!(
            "退出时存活任务 {} 个 (INIT {}, TIMING {}, RUNNING {}, 已预留未拉取 {})",
            summary.total(),
            summary.init,
            summary.timing,
            summary.running,
            summary.reserved
        );
        Ok(())
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use dagsched_core::{
    models::{Task, WorkerInfo},
    traits::WorkerSelectionStrategy,
    SchedulerError, SchedulerResult,
};

/// 存活且还有空闲槽位的Worker
fn suitable_workers(workers: &[WorkerInfo]) -> Vec<&WorkerInfo> {
    workers
        .iter()
        .filter(|worker| worker.is_alive() && worker.current_task_count < worker.max_concurrent_tasks)
        .collect()
}

/// 根据配置中的名称构建策略
///
/// `composite:least_loaded,random` 形式按顺序组合多个基础策略。
pub fn strategy_from_name(name: &str) -> SchedulerResult<Arc<dyn WorkerSelectionStrategy>> {
    let Some(members) = name.strip_prefix("composite:") else {
        return basic_strategy(name);
    };

    let mut composite = CompositeStrategy::new(Vec::new());
    for member in members.split(',').map(str::trim) {
        if member.is_empty() {
            return Err(SchedulerError::config_error(format!(
                "组合策略包含空的成员: {name}"
            )));
        }
        composite.add_strategy(basic_strategy(member)?);
    }
    Ok(Arc::new(composite))
}

fn basic_strategy(name: &str) -> SchedulerResult<Arc<dyn WorkerSelectionStrategy>> {
    match name {
        "round_robin" => Ok(Arc::new(RoundRobinStrategy::new())),
        "least_loaded" => Ok(Arc::new(LeastLoadedStrategy::new())),
        "random" => Ok(Arc::new(RandomStrategy::new())),
        other => Err(SchedulerError::config_error(format!(
            "无效的调度策略: {other}"
        ))),
    }
}

pub struct RoundRobinStrategy {
    counter: AtomicUsize,
}

pub struct LeastLoadedStrategy;

pub struct RandomStrategy;

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerSelectionStrategy for RoundRobinStrategy {
    async fn choose(&self, task: &Task, workers: &[WorkerInfo]) -> Option<String> {
        let candidates = suitable_workers(workers);
        if candidates.is_empty() {
            debug!("任务 {} 没有可用的Worker节点", task.id);
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        let selected_worker = candidates[index];

        debug!(
            "轮询策略选择Worker: {} (索引: {}/{})",
            selected_worker.id,
            index,
            candidates.len()
        );

        Some(selected_worker.id.clone())
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }
}

impl LeastLoadedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeastLoadedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerSelectionStrategy for LeastLoadedStrategy {
    async fn choose(&self, task: &Task, workers: &[WorkerInfo]) -> Option<String> {
        let selected_worker = suitable_workers(workers).into_iter().min_by(|a, b| {
            a.load_percentage()
                .partial_cmp(&b.load_percentage())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let Some(selected_worker) = selected_worker else {
            debug!("任务 {} 没有可用的Worker节点", task.id);
            return None;
        };

        debug!(
            "负载均衡策略选择Worker: {} (负载: {:.1}%)",
            selected_worker.id,
            selected_worker.load_percentage()
        );

        Some(selected_worker.id.clone())
    }

    fn name(&self) -> &str {
        "LeastLoaded"
    }
}

impl RandomStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerSelectionStrategy for RandomStrategy {
    async fn choose(&self, task: &Task, workers: &[WorkerInfo]) -> Option<String> {
        let candidates = suitable_workers(workers);
        if candidates.is_empty() {
            debug!("任务 {} 没有可用的Worker节点", task.id);
            return None;
        }
        let index = rand::rng().random_range(0..candidates.len());
        debug!("随机策略选择Worker: {}", candidates[index].id);

        Some(candidates[index].id.clone())
    }

    fn name(&self) -> &str {
        "Random"
    }
}

/// 按顺序尝试多个策略, 第一个选中的生效
pub struct CompositeStrategy {
    strategies: Vec<Arc<dyn WorkerSelectionStrategy>>,
}

impl CompositeStrategy {
    pub fn new(strategies: Vec<Arc<dyn WorkerSelectionStrategy>>) -> Self {
        Self { strategies }
    }
    pub fn add_strategy(&mut self, strategy: Arc<dyn WorkerSelectionStrategy>) {
        self.strategies.push(strategy);
    }
}

#[async_trait]
impl WorkerSelectionStrategy for CompositeStrategy {
    async fn choose(&self, task: &Task, workers: &[WorkerInfo]) -> Option<String> {
        for strategy in &self.strategies {
            match strategy.choose(task, workers).await {
                Some(worker_id) => {
                    debug!(
                        "组合策略使用 {} 策略选择了Worker: {}",
                        strategy.name(),
                        worker_id
                    );
                    return Some(worker_id);
                }
                None => {
                    debug!(
                        "策略 {} 未找到合适的Worker，尝试下一个策略",
                        strategy.name()
                    );
                }
            }
        }

        warn!("所有策略都未能为任务 {} 找到合适的Worker", task.id);
        None
    }

    fn name(&self) -> &str {
        "Composite"
    }
}

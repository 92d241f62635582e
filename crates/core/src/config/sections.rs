use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const VALID_STRATEGIES: [&str; 3] = ["round_robin", "least_loaded", "random"];
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 调度循环间隔
    pub poll_interval_ms: u64,
    /// 任务在 runtime 之后最多等待多久被分派
    pub schedule_timeout_seconds: i64,
    pub selection_strategy: String, // "round_robin", "least_loaded", "random", "composite:least_loaded,random"
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            schedule_timeout_seconds: 60,
            selection_strategy: "round_robin".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("调度间隔必须大于0"));
        }

        if self.schedule_timeout_seconds <= 0 {
            return Err(anyhow::anyhow!("调度超时时间必须大于0"));
        }

        let members: Vec<&str> = match self.selection_strategy.strip_prefix("composite:") {
            Some(rest) => rest.split(',').map(str::trim).collect(),
            None => vec![self.selection_strategy.as_str()],
        };
        if members.iter().any(|m| !VALID_STRATEGIES.contains(m)) {
            return Err(anyhow::anyhow!(
                "无效的调度策略: {}，支持的策略: {:?} 或 composite:<策略>,<策略>",
                self.selection_strategy,
                VALID_STRATEGIES
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 作业定义文件 (TOML)
    pub definitions_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            definitions_path: "config/jobs.toml".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.definitions_path.trim().is_empty() {
            return Err(anyhow::anyhow!("作业定义文件路径不能为空"));
        }
        Ok(())
    }
}

/// 静态注册的Worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticWorkerConfig {
    pub id: String,
    pub worker_group: String,
    pub max_concurrent_tasks: i32,
}

impl StaticWorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(anyhow::anyhow!("Worker ID不能为空"));
        }

        if self.worker_group.is_empty() {
            return Err(anyhow::anyhow!("Worker组不能为空: {}", self.id));
        }

        if self.max_concurrent_tasks <= 0 {
            return Err(anyhow::anyhow!("最大并发任务数必须大于0: {}", self.id));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.log_level,
                VALID_LOG_LEVELS
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}，支持的格式: {:?}",
                self.log_format,
                VALID_LOG_FORMATS
            ));
        }

        Ok(())
    }
}

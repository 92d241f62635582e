//! 作业定义文件 (TOML)
//!
//! ```toml
//! [[groups]]
//! id = 1
//! name = "nightly-etl"
//! anchor_job_id = 10
//!
//! [[jobs]]
//! id = 10
//! group_id = 1
//! name = "extract"
//! trigger = "0 0 2 * * *"
//! worker_group = "etl"
//! running_timeout_seconds = 600
//!
//! [[dependencies]]
//! group_id = 1
//! upstream = 10
//! downstream = 11
//! ```

use std::path::Path;

use tracing::info;

use dagsched_core::{models::JobDefinitions, SchedulerError, SchedulerResult};

pub fn parse_definitions(content: &str) -> SchedulerResult<JobDefinitions> {
    toml::from_str(content)
        .map_err(|e| SchedulerError::config_error(format!("解析作业定义失败: {e}")))
}

pub fn load_definitions(path: impl AsRef<Path>) -> SchedulerResult<JobDefinitions> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        SchedulerError::config_error(format!("读取作业定义文件 {} 失败: {e}", path.display()))
    })?;
    let definitions = parse_definitions(&content)?;

    info!(
        "从 {} 加载作业定义: {} 个任务组, {} 个作业, {} 条依赖",
        path.display(),
        definitions.groups.len(),
        definitions.jobs.len(),
        definitions.dependencies.len()
    );
    Ok(definitions)
}

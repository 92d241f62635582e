//! 测试夹具与等待工具

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::time::sleep;

use dagsched_core::models::JobDefinitions;
use dagsched_infrastructure::InMemoryJobStore;

use crate::builders::{DefinitionsBuilder, JobDefinitionBuilder, EVERY_MINUTE};

/// 固定的测试起点, 落在两个整分钟之间
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 30)
        .single()
        .unwrap_or_else(Utc::now)
}

/// 链式任务组: `job_ids[0] -> job_ids[1] -> ...`, 锚点是第一个作业
pub fn chain_group(group_id: i64, job_ids: &[i64], running_timeout_seconds: i64) -> JobDefinitions {
    let mut builder = DefinitionsBuilder::new().group(group_id, job_ids.first().copied().unwrap_or_default());
    for job_id in job_ids {
        builder = builder.job(
            JobDefinitionBuilder::new()
                .with_id(*job_id)
                .with_group(group_id)
                .with_trigger(EVERY_MINUTE)
                .with_running_timeout(running_timeout_seconds)
                .build(),
        );
    }
    for pair in job_ids.windows(2) {
        builder = builder.dependency(group_id, pair[0], pair[1]);
    }
    builder.build()
}

/// 环形任务组: 在链的基础上把最后一个作业连回第一个
pub fn cycle_group(group_id: i64, job_ids: &[i64]) -> JobDefinitions {
    let mut definitions = chain_group(group_id, job_ids, 300);
    if let (Some(first), Some(last)) = (job_ids.first(), job_ids.last()) {
        definitions.dependencies.push(dagsched_core::models::JobDependency {
            group_id,
            upstream: *last,
            downstream: *first,
        });
    }
    definitions
}

/// 合并多份定义
pub fn merge(parts: Vec<JobDefinitions>) -> JobDefinitions {
    parts
        .into_iter()
        .fold(JobDefinitions::default(), |mut acc, part| {
            acc.groups.extend(part.groups);
            acc.jobs.extend(part.jobs);
            acc.dependencies.extend(part.dependencies);
            acc
        })
}

pub fn seeded_store(parts: Vec<JobDefinitions>) -> InMemoryJobStore {
    InMemoryJobStore::with_definitions(merge(parts))
}

pub struct TestEnv;

impl TestEnv {
    /// 在超时前轮询条件, 条件满足返回 true
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }

        false
    }
}

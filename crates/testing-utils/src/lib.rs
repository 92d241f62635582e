//! # dagsched-testing-utils
//!
//! 测试共享工具, 只作为 dev-dependency 使用:
//!
//! - **Builders**: 作业定义与Worker的测试数据构建器
//! - **Mocks**: 可按需注入写失败的作业存储
//! - **Helpers**: 预置链式/环形任务组的存储、等待条件等
//!
//! ```toml
//! [dev-dependencies]
//! dagsched-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;

//! # dagsched-infrastructure
//!
//! 协作方接口的内存实现: 作业存储、Worker注册表, 以及作业定义文件加载。

pub mod definitions;
pub mod in_memory_store;
pub mod resource_manager;

pub use definitions::{load_definitions, parse_definitions};
pub use in_memory_store::InMemoryJobStore;
pub use resource_manager::InMemoryResourceManager;

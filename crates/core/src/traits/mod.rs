pub mod job_store;
pub mod resource_manager;
pub mod scheduler;
pub mod strategy;
pub mod trigger;

pub use job_store::*;
pub use resource_manager::*;
pub use scheduler::*;
pub use strategy::*;
pub use trigger::*;

//! 认知层：Planner、PLAN / ACT 主循环与过程事件

pub mod events;
pub mod loop_;
pub mod planner;

pub use events::ReactEvent;
pub use loop_::{react_loop, ReactSession, DEFAULT_MAX_STEPS};
pub use planner::{Planner, DEFAULT_SYSTEM_PROMPT};

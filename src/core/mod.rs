//! 核心层：错误类型、会话状态、状态追踪与多会话监管

pub mod error;
pub mod session_supervisor;
pub mod state;
pub mod tracker;

pub use error::AgentError;
pub use session_supervisor::{SessionId, SessionSupervisor};
pub use state::{SessionState, SlideFocus, TurnOutput, TurnStatus};

//! Task lifecycle control: the pure state machine and the async controller
//! that owns it.

pub mod controller;
pub mod state;

pub use controller::{POLL_FAILURE_MESSAGE, TaskController};
pub use state::{ControlCommand, TaskPhase, TaskSnapshot, TaskState, TaskStep, validate_transition};

//! Task and subtask tracking.
//!
//! Pure rules live in [`timer`], [`completion`] and [`subtask_diff`]; the
//! [`store`] port describes the atomic units of persistence, implemented by
//! [`memory`] and [`mysql`]; [`service`] orchestrates ownership checks,
//! validation and the store.

pub mod completion;
pub mod domain;
pub mod error;
pub mod memory;
pub mod mysql;
pub mod service;
pub mod store;
pub mod subtask_diff;
pub mod timer;
pub mod validation;

#[cfg(test)]
mod service_tests;

pub use domain::{Subtask, SubtaskId, Task, TaskId, UserId};
pub use error::{TrackerError, TrackerResult};
pub use service::TaskService;
pub use store::{StoreError, StoreResult, TaskStore};
pub use timer::TimerState;

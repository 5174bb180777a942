//! tasklist - Hierarchical markdown task lists with transactional edits
//!
//! A task list is a markdown checklist whose entries nest into subtasks.
//! Edits arrive as batches of operations that are checked against a
//! simulated copy and applied all-or-nothing, with parents completing
//! automatically once all their children are done.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{BatchEngine, BatchResult, Operation, PositionId, StableId, Task, TaskList, TaskStatus};

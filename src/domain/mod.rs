//! Domain models for tasklist
//!
//! Contains the core business logic without any I/O concerns.

mod autocomplete;
mod batch;
mod codec;
mod graph;
mod id;
mod list;
mod query;
mod task;

pub use autocomplete::propagate_completion;
pub use batch::{
    check_requirements_file, execution_order, AddOperation, BatchEngine, BatchError, BatchResult, Limits, Operation,
    OperationError, RemoveOperation, UpdateOperation, MAX_DETAIL_LEN, MAX_REFERENCE_LEN,
    MAX_TITLE_LEN,
};
pub use codec::{CodecError, DocumentCodec};
pub use graph::DependencyGraph;
pub use id::{IdError, PositionId, StableId, StableIdGenerator, MAX_STABLE_VALUE, STABLE_ID_LEN};
pub use list::{FrontMatter, Stats, TaskList, DEFAULT_REQUIREMENTS_FILE};
pub use query::{
    analyze_streams, filter_tasks, find_tasks, first_incomplete_path, next_task, ready_tasks,
    NextTask, SearchOptions, StreamStatus, StreamsReport, TaskFilter, TaskSummary,
};
pub use task::{Task, TaskStatus};

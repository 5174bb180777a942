//! Upward completion of parent tasks
//!
//! When a task becomes completed, each ancestor whose children are now all
//! completed is completed too. The walk stops at the first ancestor with
//! incomplete work.

use super::id::PositionId;
use super::list::TaskList;
use super::task::TaskStatus;

/// Completes ancestors of `completed` whose children are all done
///
/// Returns the positions of ancestors whose status actually changed,
/// nearest first.
pub fn propagate_completion(list: &mut TaskList, completed: &PositionId) -> Vec<PositionId> {
    let mut promoted = Vec::new();

    for ancestor in completed.ancestors() {
        let Some(task) = list.find_mut(&ancestor) else {
            break;
        };
        if !task.children_complete() {
            break;
        }
        if task.status != TaskStatus::Completed {
            task.status = TaskStatus::Completed;
            promoted.push(ancestor);
        }
    }

    promoted
}

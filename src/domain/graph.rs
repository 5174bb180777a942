//! Dependency graph for tasks
//!
//! Edges point from a task to each task it is blocked by. Only tasks that
//! carry a stable ID take part; position IDs are never graph nodes.
//! Uses petgraph for graph storage.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

use super::id::StableId;
use super::list::TaskList;
use super::task::TaskStatus;

/// A dependency graph over stable IDs
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    graph: DiGraph<StableId, ()>,

    /// Map from StableId to node index
    node_map: HashMap<StableId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds the graph of every `blocked_by` edge in a document
    pub fn from_list(list: &TaskList) -> Self {
        let mut graph = Self::new();

        // First pass: add all nodes
        for id in list.stable_ids() {
            graph.add_task(id.clone());
        }

        // Second pass: add all edges
        for task in list.iter() {
            if let Some(id) = &task.stable_id {
                for blocker in &task.blocked_by {
                    graph.add_dependency(id, blocker);
                }
            }
        }

        graph
    }

    /// Adds a task to the graph
    pub fn add_task(&mut self, id: StableId) -> NodeIndex {
        if let Some(idx) = self.node_map.get(&id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_map.insert(id, idx);
        idx
    }

    /// Adds an edge: `task` is blocked by `blocker`
    ///
    /// Unknown endpoints are added as nodes. No cycle check happens here;
    /// see [`DependencyGraph::find_cycle`].
    pub fn add_dependency(&mut self, task: &StableId, blocker: &StableId) {
        let task_idx = self.add_task(task.clone());
        let blocker_idx = self.add_task(blocker.clone());
        if self.graph.find_edge(task_idx, blocker_idx).is_none() {
            self.graph.add_edge(task_idx, blocker_idx, ());
        }
    }

    /// Returns a cycle as a path that starts and ends on the same task
    ///
    /// Runs a depth-first search from every node, tracking the recursion
    /// stack, so cycles anywhere in the graph are found. A self-reference
    /// comes back as `[a, a]`.
    pub fn find_cycle(&self) -> Option<Vec<StableId>> {
        if !is_cyclic_directed(&self.graph) {
            return None;
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            marks[start.index()] = Mark::OnStack;
            let mut stack = vec![(start, self.blocker_indices(start))];

            while let Some(frame) = stack.last_mut() {
                match frame.1.pop() {
                    Some(next) => match marks[next.index()] {
                        Mark::OnStack => {
                            let from = stack.iter().position(|(n, _)| *n == next)?;
                            let mut path: Vec<StableId> = stack[from..]
                                .iter()
                                .map(|(n, _)| self.graph[*n].clone())
                                .collect();
                            path.push(self.graph[next].clone());
                            return Some(path);
                        }
                        Mark::Unvisited => {
                            marks[next.index()] = Mark::OnStack;
                            stack.push((next, self.blocker_indices(next)));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        if let Some((node, _)) = stack.pop() {
                            marks[node.index()] = Mark::Done;
                        }
                    }
                }
            }
        }

        None
    }

    /// Neighbours in reverse so that popping visits them in edge order
    fn blocker_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut blockers: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        blockers.reverse();
        blockers
    }

    /// Returns the direct blockers of a task
    pub fn blockers(&self, id: &StableId) -> Vec<StableId> {
        let Some(idx) = self.node_map.get(id) else {
            return vec![];
        };

        self.graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Returns true if any blocker of `id` is not complete
    ///
    /// Blockers missing from `statuses` do not block.
    pub fn is_blocked(&self, id: &StableId, statuses: &HashMap<StableId, TaskStatus>) -> bool {
        self.blockers(id).iter().any(|blocker| {
            statuses
                .get(blocker)
                .map(|s| !s.is_complete())
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(n: u64) -> StableId {
        StableId::from_value(n).unwrap()
    }

    #[test]
    fn empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.blockers(&sid(1)).is_empty());
        assert_eq!(graph.find_cycle(), None);
    }

    #[test]
    fn add_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(2), &sid(1));

        assert_eq!(graph.blockers(&sid(2)), vec![sid(1)]);
        assert!(graph.blockers(&sid(1)).is_empty());
        assert_eq!(graph.find_cycle(), None);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(2), &sid(1));
        graph.add_dependency(&sid(2), &sid(1));
        assert_eq!(graph.blockers(&sid(2)).len(), 1);
    }

    #[test]
    fn two_cycle_detected() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(1), &sid(2));
        graph.add_dependency(&sid(2), &sid(1));

        let path = graph.find_cycle().unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), path.last());
    }

    #[test]
    fn three_cycle_path_follows_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(1), &sid(2));
        graph.add_dependency(&sid(2), &sid(3));
        graph.add_dependency(&sid(3), &sid(1));

        let path = graph.find_cycle().unwrap();
        assert_eq!(path, vec![sid(1), sid(2), sid(3), sid(1)]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(4), &sid(4));
        assert_eq!(graph.find_cycle(), Some(vec![sid(4), sid(4)]));
    }

    #[test]
    fn cycle_reached_through_acyclic_prefix() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(1), &sid(2));
        graph.add_dependency(&sid(2), &sid(3));
        graph.add_dependency(&sid(3), &sid(2));

        let path = graph.find_cycle().unwrap();
        assert_eq!(path, vec![sid(2), sid(3), sid(2)]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(4), &sid(2));
        graph.add_dependency(&sid(4), &sid(3));
        graph.add_dependency(&sid(2), &sid(1));
        graph.add_dependency(&sid(3), &sid(1));
        assert_eq!(graph.find_cycle(), None);
    }

    #[test]
    fn blocked_status() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(&sid(2), &sid(1));
        graph.add_dependency(&sid(3), &sid(9));

        let mut statuses = HashMap::new();
        statuses.insert(sid(1), TaskStatus::Pending);
        statuses.insert(sid(2), TaskStatus::Pending);
        statuses.insert(sid(3), TaskStatus::Pending);

        assert!(graph.is_blocked(&sid(2), &statuses));
        assert!(!graph.is_blocked(&sid(1), &statuses));
        // unknown blocker does not block
        assert!(!graph.is_blocked(&sid(3), &statuses));

        statuses.insert(sid(1), TaskStatus::Completed);
        assert!(!graph.is_blocked(&sid(2), &statuses));
    }
}

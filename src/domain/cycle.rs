//! Cycle detection
//!
//! Depth-first traversal with three-colour marking over the combined
//! group/parcel graph. Roots and neighbours are visited in declaration order,
//! so the reported cycle is the same on every run.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::NodeIndex;

use super::graph::{DependencyGraph, GraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

struct Frame {
    node: NodeIndex,
    next: Vec<NodeIndex>,
    pos: usize,
}

/// Fails with the first cycle found, if any
pub fn check(graph: &DependencyGraph<'_>) -> Result<(), GraphError> {
    match find_cycle(graph) {
        Some(path) => {
            tracing::debug!(path = %path.join(" -> "), "cycle detected");
            Err(GraphError::CycleDetected { path })
        }
        None => Ok(()),
    }
}

/// Returns the first cycle as node names, closing node repeated at the end
///
/// Example: `["A", "p", "B", "q", "A"]` for group `A` containing `p`, which
/// requires `B`, which contains `q`, which requires `A`.
pub fn find_cycle(graph: &DependencyGraph<'_>) -> Option<Vec<String>> {
    let g = graph.petgraph();
    if !is_cyclic_directed(g) {
        return None;
    }

    let name = |idx: NodeIndex| graph.node_name(g[idx]);
    let mut marks = vec![Mark::Unvisited; g.node_count()];

    for root in g.node_indices() {
        if marks[root.index()] != Mark::Unvisited {
            continue;
        }

        marks[root.index()] = Mark::InProgress;
        let mut stack = vec![Frame {
            node: root,
            next: graph.successors(root),
            pos: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let child = frame.next.get(frame.pos).copied();
            frame.pos += 1;

            let Some(child) = child else {
                marks[frame.node.index()] = Mark::Done;
                stack.pop();
                continue;
            };

            match marks[child.index()] {
                Mark::Unvisited => {
                    marks[child.index()] = Mark::InProgress;
                    stack.push(Frame {
                        node: child,
                        next: graph.successors(child),
                        pos: 0,
                    });
                }
                Mark::InProgress => {
                    // Back-edge: everything from `child` up the stack is the cycle
                    let start = stack.iter().position(|f| f.node == child).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..].iter().map(|f| name(f.node)).collect();
                    path.push(name(child));
                    return Some(path);
                }
                Mark::Done => {}
            }
        }
    }

    None
}

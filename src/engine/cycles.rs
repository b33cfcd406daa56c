//! Cycle detection over the predecessor graph.
//!
//! Edges run from a successor to each of its predecessors and are keyed by
//! item id. References to ids outside the task set are ignored.

use std::collections::{HashMap, HashSet};

use crate::model::WbsItem;

type Adjacency<'a> = HashMap<&'a str, Vec<&'a str>>;

fn adjacency(all: &[WbsItem]) -> Adjacency<'_> {
    let known: HashSet<&str> = all.iter().map(|t| t.id.as_str()).collect();
    all.iter()
        .map(|t| {
            let preds = t
                .predecessors
                .iter()
                .map(|p| p.id.as_str())
                .filter(|id| known.contains(id))
                .collect();
            (t.id.as_str(), preds)
        })
        .collect()
}

enum Step<'a> {
    Enter(&'a str),
    Exit(&'a str),
}

/// Depth-first search from `start`, reporting the on-path slice whenever a
/// node already on the path is reached again. `visited` carries fully
/// explored nodes across calls.
fn walk<'a>(
    start: &'a str,
    graph: &Adjacency<'a>,
    visited: &mut HashSet<&'a str>,
    mut on_cycle: impl FnMut(&[&'a str]) -> bool,
) {
    let mut path: Vec<&'a str> = Vec::new();
    let mut on_path: HashSet<&'a str> = HashSet::new();
    let mut stack = vec![Step::Enter(start)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Exit(node) => {
                path.pop();
                on_path.remove(node);
                visited.insert(node);
            }
            Step::Enter(node) => {
                if on_path.contains(node) {
                    let from = path.iter().position(|n| *n == node).unwrap_or(0);
                    if on_cycle(&path[from..]) {
                        return;
                    }
                    continue;
                }
                if visited.contains(node) {
                    continue;
                }
                path.push(node);
                on_path.insert(node);
                stack.push(Step::Exit(node));
                if let Some(next) = graph.get(node) {
                    stack.extend(next.iter().rev().map(|n| Step::Enter(*n)));
                }
            }
        }
    }
}

/// True when a dependency cycle is reachable from `task_id`.
pub fn detect_circular_dependencies(task_id: &str, all: &[WbsItem]) -> bool {
    let graph = adjacency(all);
    let Some((start, _)) = graph.get_key_value(task_id) else {
        return false;
    };
    let mut found = false;
    walk(*start, &graph, &mut HashSet::new(), |_| {
        found = true;
        true
    });
    found
}

/// Every distinct cycle in the task set, each as the ids along the cycle
/// rotated to start at its smallest id.
pub fn find_cycles(all: &[WbsItem]) -> Vec<Vec<String>> {
    let graph = adjacency(all);
    let mut visited = HashSet::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut cycles = Vec::new();

    for task in all {
        walk(task.id.as_str(), &graph, &mut visited, |cycle| {
            let pivot = cycle
                .iter()
                .enumerate()
                .min_by_key(|(_, id)| **id)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let canonical: Vec<String> = cycle[pivot..]
                .iter()
                .chain(&cycle[..pivot])
                .map(|s| s.to_string())
                .collect();
            if seen.insert(canonical.clone()) {
                cycles.push(canonical);
            }
            false
        });
    }
    cycles
}

/// True when `predecessor` already depends (transitively) on `successor`,
/// so linking them would close a loop. Self links count as cycles.
pub fn would_create_cycle(successor: &str, predecessor: &str, all: &[WbsItem]) -> bool {
    if successor == predecessor {
        return true;
    }
    let graph = adjacency(all);
    let mut seen = HashSet::new();
    let mut stack = vec![predecessor];
    while let Some(node) = stack.pop() {
        if node == successor {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(next) = graph.get(node) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

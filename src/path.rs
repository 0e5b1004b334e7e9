//! Shortest-path search, used only to build diagnostic explanations.

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
};

/// A path found by [`find_path`]: `nodes` interleaved with the `edges` that
/// connect them, so `edges.len() == nodes.len() - 1`.
#[derive(Debug, Clone)]
pub struct Path<P, E> {
    /// The visited points, start to end
    pub nodes: Vec<P>,
    /// The edge taken out of each node but the last
    pub edges: Vec<E>,
}

/// Breadth-first search from a multi-source seed set.
///
/// `successors` maps a point to its outgoing `(edge, point)` pairs and
/// `test` recognizes an acceptable endpoint. Returns the shortest path from
/// any seed to an accepted point, or `None` if there is none.
pub fn find_path<P, E, S, D>(
    start_set: impl IntoIterator<Item = P>,
    successors: S,
    test: D,
) -> Option<Path<P, E>>
where
    P: Eq + Hash + Clone,
    E: Clone,
    S: Fn(&P) -> Vec<(E, P)>,
    D: Fn(&P) -> bool,
{
    // Each reached point links back to the point and edge it was reached by.
    let mut links: HashMap<P, Option<(P, E)>> = HashMap::new();
    let mut todo: VecDeque<P> = VecDeque::new();

    for p in start_set {
        if links.contains_key(&p) {
            continue;
        }
        links.insert(p.clone(), None);
        if test(&p) {
            return Some(Path {
                nodes: vec![p],
                edges: vec![],
            });
        }
        todo.push_back(p);
    }

    let mut found: Option<P> = None;
    'search: while let Some(a) = todo.pop_front() {
        for (edge, b) in successors(&a) {
            if links.contains_key(&b) {
                continue;
            }
            links.insert(b.clone(), Some((a.clone(), edge)));
            if test(&b) {
                found = Some(b);
                break 'search;
            }
            todo.push_back(b);
        }
    }

    // Reconstruct how we got here.
    let mut current = found?;
    let mut nodes = vec![current.clone()];
    let mut edges = Vec::new();
    while let Some((prev, edge)) = links.get(&current).cloned().flatten() {
        edges.push(edge);
        nodes.push(prev.clone());
        current = prev;
    }
    nodes.reverse();
    edges.reverse();
    Some(Path { nodes, edges })
}

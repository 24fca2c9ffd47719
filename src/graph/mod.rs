//! Dependency graph between model components
//!
//! Nodes live in an index-addressed arena (`UnitId` is the declaration index).
//! Edges point from a component to the components its formula calls
//! ("children"); self-calls are time recursion and never become edges.
//! The transitive closure of each node drives the evaluation order.

use std::collections::{HashSet, VecDeque};

/// Index of a component in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub usize);

impl UnitId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Direct and transitive dependencies of every component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    children: Vec<Vec<UnitId>>,
    closures: Vec<Vec<UnitId>>,
}

impl DependencyGraph {
    /// Build the graph from each node's direct dependencies
    ///
    /// Self-edges and repeated edges are dropped; edge order is otherwise kept.
    pub fn new(children: Vec<Vec<UnitId>>) -> Self {
        let children: Vec<Vec<UnitId>> = children
            .into_iter()
            .enumerate()
            .map(|(i, edges)| {
                let mut seen = HashSet::new();
                edges
                    .into_iter()
                    .filter(|c| c.index() != i && seen.insert(*c))
                    .collect()
            })
            .collect();

        let closures = (0..children.len())
            .map(|i| closure_of(&children, UnitId(i)))
            .collect();

        Self { children, closures }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Components called directly, in first-call order
    pub fn children(&self, id: UnitId) -> &[UnitId] {
        &self.children[id.index()]
    }

    /// Every component reached from `id`, breadth first, without `id` itself
    pub fn closure(&self, id: UnitId) -> &[UnitId] {
        &self.closures[id.index()]
    }

    /// Evaluation order: ascending closure size, ties in declaration order
    pub fn queue(&self) -> Vec<UnitId> {
        let mut order: Vec<UnitId> = (0..self.len()).map(UnitId).collect();
        // sort_by_key is stable, so equal sizes keep declaration order
        order.sort_by_key(|id| self.closures[id.index()].len());
        order
    }

    /// Copy of the graph with `removed` taken out of every closure
    ///
    /// Direct edges are left alone; only the ordering proxy changes.
    pub fn without(&self, removed: UnitId) -> Self {
        let closures = self
            .closures
            .iter()
            .map(|closure| closure.iter().copied().filter(|&id| id != removed).collect())
            .collect();
        Self {
            children: self.children.clone(),
            closures,
        }
    }

    /// Components that sit on a cycle through other components
    pub fn cyclic_units(&self) -> Vec<UnitId> {
        (0..self.len())
            .map(UnitId)
            .filter(|&id| {
                self.children(id)
                    .iter()
                    .any(|&child| self.closure(child).contains(&id))
            })
            .collect()
    }

    /// Union of `roots` and everything they depend on, in queue order
    pub fn scope(&self, roots: &[UnitId]) -> Vec<UnitId> {
        let mut needed = vec![false; self.len()];
        for &root in roots {
            needed[root.index()] = true;
            for &dep in self.closure(root) {
                needed[dep.index()] = true;
            }
        }
        self.queue().into_iter().filter(|id| needed[id.index()]).collect()
    }
}

fn closure_of(children: &[Vec<UnitId>], root: UnitId) -> Vec<UnitId> {
    let mut visited = vec![false; children.len()];
    visited[root.index()] = true;

    let mut closure = Vec::new();
    let mut queue: VecDeque<UnitId> = children[root.index()].iter().copied().collect();

    while let Some(node) = queue.pop_front() {
        if visited[node.index()] {
            continue;
        }
        visited[node.index()] = true;
        closure.push(node);
        queue.extend(children[node.index()].iter().copied());
    }

    closure
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[usize]) -> Vec<UnitId> {
        raw.iter().copied().map(UnitId).collect()
    }

    #[test]
    fn test_closures() {
        // a=0 -> [b=1, c=2], b -> [d=3, e=4, f=5], e -> [g=6]
        let graph = DependencyGraph::new(vec![
            ids(&[1, 2]),
            ids(&[3, 4, 5]),
            vec![],
            vec![],
            ids(&[6]),
            vec![],
            vec![],
        ]);

        assert_eq!(graph.closure(UnitId(0)), ids(&[1, 2, 3, 4, 5, 6]).as_slice());
        assert_eq!(graph.closure(UnitId(1)), ids(&[3, 4, 5, 6]).as_slice());
        assert_eq!(graph.closure(UnitId(4)), ids(&[6]).as_slice());
        assert!(graph.closure(UnitId(6)).is_empty());
    }

    #[test]
    fn test_chain_closure_is_superset() {
        // a -> b -> c, b -> d
        let graph = DependencyGraph::new(vec![ids(&[1]), ids(&[2, 3]), vec![], vec![]]);
        let a = graph.closure(UnitId(0));
        for dep in ids(&[1, 2, 3]) {
            assert!(a.contains(&dep));
        }
        assert!(graph.closure(UnitId(1)).contains(&UnitId(3)));
    }

    #[test]
    fn test_self_edges_and_duplicates_dropped() {
        let graph = DependencyGraph::new(vec![ids(&[0, 1, 1]), vec![]]);
        assert_eq!(graph.children(UnitId(0)), ids(&[1]).as_slice());
        assert_eq!(graph.closure(UnitId(0)), ids(&[1]).as_slice());
    }

    #[test]
    fn test_queue_ascending_by_closure_size() {
        // a -> [b, c], b -> [c]
        let graph = DependencyGraph::new(vec![ids(&[1, 2]), ids(&[2]), vec![]]);
        let queue = graph.queue();
        assert_eq!(queue, ids(&[2, 1, 0]));

        let sizes: Vec<usize> = queue.iter().map(|&id| graph.closure(id).len()).collect();
        assert_eq!(sizes, vec![0, 1, 2]);
    }

    #[test]
    fn test_queue_ties_keep_declaration_order() {
        let graph = DependencyGraph::new(vec![ids(&[2]), ids(&[2]), vec![]]);
        assert_eq!(graph.queue(), ids(&[2, 0, 1]));
    }

    #[test]
    fn test_without_removes_everywhere() {
        // a -> [b, c], b -> [c], d -> [e] (unrelated)
        let graph = DependencyGraph::new(vec![ids(&[1, 2]), ids(&[2]), vec![], ids(&[4]), vec![]]);
        let pruned = graph.without(UnitId(2));

        assert_eq!(pruned.closure(UnitId(0)), ids(&[1]).as_slice());
        assert!(pruned.closure(UnitId(1)).is_empty());
        assert!(pruned.closure(UnitId(2)).is_empty());
        assert_eq!(pruned.closure(UnitId(3)), graph.closure(UnitId(3)));
        // the source graph is untouched
        assert_eq!(graph.closure(UnitId(0)), ids(&[1, 2]).as_slice());
    }

    #[test]
    fn test_cyclic_units() {
        // a <-> b, c -> a
        let graph = DependencyGraph::new(vec![ids(&[1]), ids(&[0]), ids(&[0])]);
        assert_eq!(graph.cyclic_units(), ids(&[0, 1]));
        assert!(DependencyGraph::new(vec![ids(&[1]), vec![]]).cyclic_units().is_empty());
    }

    #[test]
    fn test_scope() {
        // a -> b, c independent
        let graph = DependencyGraph::new(vec![ids(&[1]), vec![], vec![]]);
        assert_eq!(graph.scope(&ids(&[0])), ids(&[1, 0]));
        assert_eq!(graph.scope(&ids(&[2])), ids(&[2]));
    }
}

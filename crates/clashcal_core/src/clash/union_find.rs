//! Index-based disjoint-set forest.

/// Union-find over dense positions `0..len` with path halving and union by size.
#[derive(Debug, Clone)]
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    pub(crate) fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let (mut root_a, mut root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return;
        }
        if self.size[root_a] < self.size[root_b] {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b] = root_a;
        self.size[root_a] += self.size[root_b];
    }

    /// Components with at least `min_size` members.
    ///
    /// Members are ascending; components are ordered by their smallest member.
    pub(crate) fn components(&mut self, min_size: usize) -> Vec<Vec<usize>> {
        let len = self.parent.len();
        let mut slot_by_root = vec![usize::MAX; len];
        let mut components: Vec<Vec<usize>> = Vec::new();

        for node in 0..len {
            let root = self.find(node);
            if self.size[root] < min_size {
                continue;
            }
            if slot_by_root[root] == usize::MAX {
                slot_by_root[root] = components.len();
                components.push(Vec::new());
            }
            components[slot_by_root[root]].push(node);
        }

        components
    }
}

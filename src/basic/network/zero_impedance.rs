/// Union-Find over bus numbers, used to grow spanning forests of zero impedance
/// subnetworks and to find connected components.
#[derive(Default, Debug, Clone)]
pub struct NodeMerge {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl NodeMerge {
    /// Each of the `n` nodes starts as its own root with rank 0.
    pub fn new(n: usize) -> Self {
        NodeMerge {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Finds the root of a node, compressing the path on the way.
    pub fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = node;
        while self.parent[current] != root {
            let parent = self.parent[current];
            self.parent[current] = root;
            current = parent;
        }
        root
    }

    /// Merges the sets of two nodes by rank.
    ///
    /// Returns `false` when both nodes were already in the same set.
    pub fn union(&mut self, node1: usize, node2: usize) -> bool {
        let root1 = self.find(node1);
        let root2 = self.find(node2);
        if root1 == root2 {
            return false;
        }
        let (rank1, rank2) = (self.rank[root1], self.rank[root2]);
        if rank1 < rank2 {
            self.parent[root1] = root2;
        } else {
            self.parent[root2] = root1;
            if rank1 == rank2 {
                self.rank[root1] += 1;
            }
        }
        true
    }
}

/// Spanning forest of the zero impedance edges, in edge order.
///
/// `edges` yields `(branch, bus1, bus2)` for every usable zero impedance branch;
/// the returned vector flags branches that join two distinct components.
pub fn spanning_forest(
    bus_count: usize,
    branch_count: usize,
    edges: impl IntoIterator<Item = (usize, usize, usize)>,
) -> Vec<bool> {
    let mut uf = NodeMerge::new(bus_count);
    let mut spanning = vec![false; branch_count];
    for (branch, bus1, bus2) in edges {
        spanning[branch] = uf.union(bus1, bus2);
    }
    spanning
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_merge() {
        let mut uf = NodeMerge::new(8);
        let links = [(2, 3, true), (3, 4, true), (5, 6, false), (6, 7, true)];
        for (a, b, closed) in links {
            if closed {
                uf.union(a, b);
            }
        }
        assert_eq!(uf.find(2), uf.find(3));
        assert_eq!(uf.find(3), uf.find(4));
        assert_ne!(uf.find(5), uf.find(6));
        assert_eq!(uf.find(6), uf.find(7));
    }

    #[test]
    fn test_spanning_forest_skips_cycle_edge() {
        // triangle 0-1-2 plus a pendant 3
        let edges = vec![(0, 0, 1), (1, 1, 2), (2, 2, 0), (3, 2, 3)];
        let spanning = spanning_forest(4, 4, edges);
        assert_eq!(spanning, vec![true, true, false, true]);
    }
}

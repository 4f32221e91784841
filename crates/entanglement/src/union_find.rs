use std::collections::HashMap;

use uuid::Uuid;

/// Union-Find over a dynamic set of [`Uuid`] keys, path compression on find
/// and union-by-rank on union (spec §4.12 step 5).
pub struct UnionFind {
    index: HashMap<Uuid, usize>,
    parent: Vec<usize>,
    rank: Vec<u8>,
    keys: Vec<Uuid>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            parent: Vec::new(),
            rank: Vec::new(),
            keys: Vec::new(),
        }
    }

    fn index_of(&mut self, id: Uuid) -> usize {
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        let i = self.parent.len();
        self.parent.push(i);
        self.rank.push(0);
        self.keys.push(id);
        self.index.insert(id, i);
        i
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    pub fn union(&mut self, a: Uuid, b: Uuid) {
        let (a, b) = (self.index_of(a), self.index_of(b));
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
        } else if self.rank[ra] > self.rank[rb] {
            self.parent[rb] = ra;
        } else {
            self.parent[rb] = ra;
            self.rank[ra] += 1;
        }
    }

    /// Ensure `id` is present as a singleton component even if it never
    /// participates in a union (so loose ends can be detected later).
    pub fn touch(&mut self, id: Uuid) {
        self.index_of(id);
    }

    /// Every connected component, each as the set of member uuids.
    pub fn components(&mut self) -> Vec<Vec<Uuid>> {
        let mut groups: HashMap<usize, Vec<Uuid>> = HashMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            groups.entry(root).or_default().push(self.keys[i]);
        }
        groups.into_values().collect()
    }
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitively_unioned_items_share_a_component() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();

        let mut uf = UnionFind::new();
        uf.union(a, b);
        uf.union(b, c);
        uf.touch(d);

        let components = uf.components();
        let abc = components.iter().find(|g| g.contains(&a)).unwrap();
        assert!(abc.contains(&b) && abc.contains(&c));
        assert!(components.iter().any(|g| g == &vec![d]));
    }
}

//! Group index
//!
//! Symmetric adjacency over peer IDs: `b` is in `a`'s group exactly when `a`
//! is in `b`'s. Every registered peer has an entry, and its own ID is always
//! a member of it. Only `link`, `unlink` and `purge` touch other peers' sets,
//! and each of them updates both sides.

use std::collections::{BTreeSet, HashMap};

use super::peer::PeerId;

#[derive(Debug, Default)]
pub struct GroupIndex {
    groups: HashMap<PeerId, BTreeSet<PeerId>>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `id` in a group of its own
    pub fn create_singleton(&mut self, id: &PeerId) {
        self.groups
            .insert(id.clone(), BTreeSet::from([id.clone()]));
    }

    /// Whether `id` has an entry
    pub fn contains(&self, id: &str) -> bool {
        self.groups.contains_key(id)
    }

    /// Members of `id`'s group (including `id`), in ID order
    pub fn members(&self, id: &str) -> impl Iterator<Item = &PeerId> + '_ {
        self.groups.get(id).into_iter().flatten()
    }

    /// Whether `b` is in `a`'s group
    pub fn is_grouped(&self, a: &str, b: &str) -> bool {
        self.groups.get(a).map_or(false, |set| set.contains(b))
    }

    /// Group `a` and `b` together
    ///
    /// Returns `false` without changes for self-links, unknown IDs, or pairs
    /// that are already grouped.
    pub fn link(&mut self, a: &PeerId, b: &PeerId) -> bool {
        if a == b || !self.contains(a.as_str()) || !self.contains(b.as_str()) {
            return false;
        }
        if self.is_grouped(a.as_str(), b.as_str()) {
            return false;
        }

        if let Some(set) = self.groups.get_mut(a) {
            set.insert(b.clone());
        }
        if let Some(set) = self.groups.get_mut(b) {
            set.insert(a.clone());
        }
        true
    }

    /// Separate `a` and `b`, if `a` currently lists `b`
    pub fn unlink(&mut self, a: &PeerId, b: &PeerId) -> bool {
        if a == b || !self.is_grouped(a.as_str(), b.as_str()) {
            return false;
        }

        if let Some(set) = self.groups.get_mut(a) {
            set.remove(b);
        }
        if let Some(set) = self.groups.get_mut(b) {
            set.remove(a);
        }
        true
    }

    /// Drop `id` everywhere
    ///
    /// Returns the peers that had `id` in their group. Unknown IDs return
    /// an empty list.
    pub fn purge(&mut self, id: &PeerId) -> Vec<PeerId> {
        let Some(own) = self.groups.remove(id) else {
            return Vec::new();
        };

        let former: Vec<PeerId> = own.into_iter().filter(|member| member != id).collect();
        for member in &former {
            if let Some(set) = self.groups.get_mut(member) {
                set.remove(id);
            }
        }
        former
    }

    #[cfg(test)]
    pub(crate) fn is_symmetric(&self) -> bool {
        self.groups.iter().all(|(a, set)| {
            set.contains(a)
                && set
                    .iter()
                    .all(|b| self.groups.get(b).map_or(false, |other| other.contains(a)))
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn ids(names: &[&str]) -> Vec<PeerId> {
        names.iter().map(|n| PeerId::from(*n)).collect()
    }

    fn index_with(peers: &[PeerId]) -> GroupIndex {
        let mut index = GroupIndex::new();
        for id in peers {
            index.create_singleton(id);
        }
        index
    }

    #[test]
    fn test_singleton() {
        let peers = ids(&["A"]);
        let index = index_with(&peers);

        assert_eq!(index.members("A").collect::<Vec<_>>(), vec![&peers[0]]);
        assert!(index.is_grouped("A", "A"));
    }

    #[test]
    fn test_link_is_symmetric_and_idempotent() {
        let peers = ids(&["A", "B"]);
        let mut index = index_with(&peers);

        assert!(index.link(&peers[0], &peers[1]));
        assert!(!index.link(&peers[0], &peers[1]));
        assert!(!index.link(&peers[1], &peers[0]));

        assert!(index.is_grouped("A", "B"));
        assert!(index.is_grouped("B", "A"));
        assert_eq!(index.members("A").count(), 2);
    }

    #[test]
    fn test_link_rejects_self_and_unknown() {
        let peers = ids(&["A", "GHOST"]);
        let mut index = index_with(&peers[..1]);

        assert!(!index.link(&peers[0], &peers[0]));
        assert!(!index.link(&peers[0], &peers[1]));
        assert!(!index.link(&peers[1], &peers[0]));

        assert_eq!(index.members("A").count(), 1);
        assert!(!index.contains("GHOST"));
    }

    #[test]
    fn test_unlink_requires_membership() {
        let peers = ids(&["A", "B", "C"]);
        let mut index = index_with(&peers);
        index.link(&peers[0], &peers[1]);

        assert!(!index.unlink(&peers[0], &peers[2]));
        assert!(!index.unlink(&peers[0], &peers[0]));
        assert!(index.unlink(&peers[1], &peers[0]));
        assert!(!index.is_grouped("A", "B"));
        assert!(!index.is_grouped("B", "A"));
        assert!(index.is_grouped("A", "A"));
    }

    #[test]
    fn test_purge_returns_former_members() {
        let peers = ids(&["A", "B", "C", "D"]);
        let mut index = index_with(&peers);
        index.link(&peers[0], &peers[1]);
        index.link(&peers[0], &peers[2]);

        let former = index.purge(&peers[0]);

        assert_eq!(former, ids(&["B", "C"]));
        assert!(!index.contains("A"));
        assert!(!index.is_grouped("B", "A"));
        assert!(!index.is_grouped("C", "A"));
        assert!(index.purge(&peers[0]).is_empty());
        assert!(index.is_symmetric());
    }

    #[test]
    fn test_random_sequences_stay_symmetric() {
        let peers = ids(&["A", "B", "C", "D", "E", "F"]);
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..50 {
            let mut index = index_with(&peers);
            for _ in 0..200 {
                let a = &peers[rng.gen_range(0..peers.len())];
                let b = &peers[rng.gen_range(0..peers.len())];
                match rng.gen_range(0..10) {
                    0..=4 => {
                        index.link(a, b);
                    }
                    5..=8 => {
                        index.unlink(a, b);
                    }
                    _ => {
                        index.purge(a);
                        index.create_singleton(a);
                    }
                }
                assert!(index.is_symmetric());
            }
        }
    }
}

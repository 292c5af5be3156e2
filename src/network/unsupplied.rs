use std::collections::BTreeSet;

use crate::domain::NodeId;

/// Ids of nodes currently cut off from every generation plant.
///
/// Kept ordered so that retry passes visit members in ascending id order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnsuppliedSet {
    members: BTreeSet<NodeId>,
}

impl UnsuppliedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the node was not already unsupplied.
    pub fn insert(&mut self, id: &str) -> bool {
        self.members.insert(id.to_string())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.members.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.members.iter()
    }

    /// Snapshot of the members in ascending id order.
    pub fn sorted(&self) -> Vec<NodeId> {
        self.members.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_and_membership() {
        let mut set = UnsuppliedSet::new();
        assert!(set.insert("C_9"));
        assert!(set.insert("C_10"));
        assert!(set.insert("A"));
        assert!(!set.insert("A"));
        assert_eq!(set.sorted(), vec!["A", "C_10", "C_9"]);

        assert!(set.remove("C_10"));
        assert!(!set.contains("C_10"));
        assert_eq!(set.len(), 2);
    }
}

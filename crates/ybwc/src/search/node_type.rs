//! Node classification carried by split points.

/// Kind of node being searched.
///
/// Participants of a split point dispatch on this to pick the search variant
/// matching the master's node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// The root of the search tree.
    Root,
    /// A principal variation node searched with a full window.
    Pv,
    /// A node searched with a null window.
    #[default]
    NonPv,
}

impl NodeType {
    /// Whether this is a PV node (true for PV and Root nodes).
    #[inline]
    pub fn is_pv(self) -> bool {
        matches!(self, NodeType::Root | NodeType::Pv)
    }

    /// Whether this is the root node.
    #[inline]
    pub fn is_root(self) -> bool {
        self == NodeType::Root
    }

    /// Node type of the first child searched with a full window.
    #[inline]
    pub fn child(self) -> NodeType {
        if self.is_pv() {
            NodeType::Pv
        } else {
            NodeType::NonPv
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(NodeType::Root.is_pv());
        assert!(NodeType::Root.is_root());
        assert!(NodeType::Pv.is_pv());
        assert!(!NodeType::Pv.is_root());
        assert!(!NodeType::NonPv.is_pv());
    }

    #[test]
    fn test_child() {
        assert_eq!(NodeType::Root.child(), NodeType::Pv);
        assert_eq!(NodeType::Pv.child(), NodeType::Pv);
        assert_eq!(NodeType::NonPv.child(), NodeType::NonPv);
    }
}

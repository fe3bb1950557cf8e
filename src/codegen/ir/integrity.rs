use std::fmt;

use super::{CodeArena, Link, NodeId, Slot};

/// Inconsistency between the links of two nodes.
///
/// A node holding both a parent and a predecessor cannot be represented, since [`Link`] is a
/// single value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// The node names a parent which does not hold it in the named slot
    DanglingParent { node: NodeId, parent: NodeId },
    /// A body or else-if of an If does not name that If as its parent
    OrphanedBody { branch: NodeId, body: NodeId },
    /// The successor of a node does not name it as predecessor
    BrokenSequence { node: NodeId, successor: NodeId },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingParent { node, parent } => {
                write!(f, "node {node} names {parent} as parent, which does not own it")
            }
            Self::OrphanedBody { branch, body } => {
                write!(f, "body {body} of If {branch} does not name it as parent")
            }
            Self::BrokenSequence { node, successor } => {
                write!(f, "successor {successor} of {node} does not name it as predecessor")
            }
        }
    }
}

impl CodeArena {
    fn holds(&self, parent: NodeId, slot: Slot, node: NodeId) -> bool {
        self.branch(parent)
            .is_some_and(|branch| branch.slots().any(|held| held == (slot, node)))
    }

    /// Checks every node reachable from `root`
    pub fn check_integrity(&self, root: NodeId) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();

        for node in self.descendants(root) {
            if let Link::ChildOf(parent, slot) = self.link(node) {
                if !self.holds(parent, slot, node) {
                    violations.push(IntegrityViolation::DanglingParent { node, parent });
                }
            }

            if let Some(branch) = self.branch(node) {
                for (slot, body) in branch.slots() {
                    if self.link(body) != Link::ChildOf(node, slot) {
                        violations.push(IntegrityViolation::OrphanedBody { branch: node, body });
                    }
                }
            }

            if let Some(successor) = self.next(node) {
                if self.link(successor) != Link::After(node) {
                    violations.push(IntegrityViolation::BrokenSequence { node, successor });
                }
            }
        }

        violations
    }
}

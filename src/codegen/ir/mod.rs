//! Intermediate representation of generated code.
//!
//! Nodes live in a [`CodeArena`] and refer to each other by [`NodeId`]. Every node has exactly one
//! [`Link`]: it either starts a sequence, follows a predecessor, or is the first node of one of the
//! bodies of an If. Sequences continue through `next`.

use std::mem;
use std::ops::ControlFlow;

use super::{guard::Guard, temporary};
use crate::language::expression::{Expression, Trail};

pub mod integrity;
pub mod render;

pub use integrity::IntegrityViolation;

pub type NodeId = usize;

/// Which body of an If a node heads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Then,
    Else,
    ElseIf(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Link {
    #[default]
    Root,
    After(NodeId),
    ChildOf(NodeId, Slot),
}

/// Right-hand side of a definition
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    /// Operand `index` of the node bound at `parent`
    Operand { parent: Trail, index: usize },
    /// The node bound at the given trail itself
    Alias(Trail),
    /// A freshly constructed expression; `value` is what `code` builds
    Constructed { code: String, value: Expression },
}

impl Binding {
    fn serialize(&self) -> String {
        match self {
            Self::Operand { parent, index } => format!("{}.operand({index})", temporary(parent)),
            Self::Alias(trail) => format!("{}.clone()", temporary(trail)),
            Self::Constructed { code, .. } => code.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Branch {
    pub guard: Guard,
    then_body: NodeId,
    else_body: NodeId,
    else_ifs: Vec<NodeId>,
}

impl Branch {
    pub fn then_body(&self) -> NodeId {
        self.then_body
    }

    pub fn else_body(&self) -> NodeId {
        self.else_body
    }

    pub fn else_ifs(&self) -> &[NodeId] {
        &self.else_ifs
    }

    /// Every owned node with the slot it occupies
    pub fn slots(&self) -> impl Iterator<Item = (Slot, NodeId)> + '_ {
        [(Slot::Then, self.then_body), (Slot::Else, self.else_body)]
            .into_iter()
            .chain(
                self.else_ifs
                    .iter()
                    .enumerate()
                    .map(|(index, &node)| (Slot::ElseIf(index), node)),
            )
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut NodeId> {
        match slot {
            Slot::Then => Some(&mut self.then_body),
            Slot::Else => Some(&mut self.else_body),
            Slot::ElseIf(index) => self.else_ifs.get_mut(index),
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Declaration(Trail),
    Definition {
        target: Trail,
        binding: Binding,
        declares: bool,
    },
    Return(bool),
    If(Branch),
    Custom(String),
    NoOp,
    /// Marks where continuation code is spliced in later
    Placeholder,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub comment: Option<String>,
    pub commented_out: bool,
    link: Link,
    next: Option<NodeId>,
}

/// How [`CodeArena::append`] attaches a fragment to the end of a sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendMode {
    Plain,
    ReplaceLast,
    BeforeLast,
}

#[derive(Clone, Debug, Default)]
pub struct CodeArena {
    nodes: Vec<Node>,
}

impl CodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated, reachable or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn link(&self, id: NodeId) -> Link {
        self.nodes[id].link
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].next
    }

    pub fn branch(&self, id: NodeId) -> Option<&Branch> {
        match &self.nodes[id].kind {
            NodeKind::If(branch) => Some(branch),
            _ => None,
        }
    }

    fn branch_mut(&mut self, id: NodeId) -> Option<&mut Branch> {
        match &mut self.nodes[id].kind {
            NodeKind::If(branch) => Some(branch),
            _ => None,
        }
    }

    pub fn set_guard(&mut self, id: NodeId, guard: Guard) {
        if let Some(branch) = self.branch_mut(id) {
            branch.guard = guard;
        }
    }

    pub fn set_comment(&mut self, id: NodeId, comment: &str) {
        self.nodes[id].comment = Some(String::from(comment));
    }

    /// Keeps the node in the output, but only as a comment
    pub fn comment_out(&mut self, id: NodeId, comment: &str) {
        self.nodes[id].commented_out = true;
        self.set_comment(id, comment);
    }

    /// Turns a declaring definition into an assignment and vice versa
    pub fn set_declares(&mut self, id: NodeId, value: bool) {
        if let NodeKind::Definition { declares, .. } = &mut self.nodes[id].kind {
            *declares = value;
        }
    }

    /// Replaces the node's kind by a no-op, keeping its position
    pub fn neutralize(&mut self, id: NodeId) {
        self.nodes[id].kind = NodeKind::NoOp;
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            comment: None,
            commented_out: false,
            link: Link::Root,
            next: None,
        });
        self.nodes.len() - 1
    }

    pub fn noop(&mut self) -> NodeId {
        self.push(NodeKind::NoOp)
    }

    pub fn placeholder(&mut self) -> NodeId {
        self.push(NodeKind::Placeholder)
    }

    pub fn custom(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Custom(text.into()))
    }

    pub fn ret(&mut self, value: bool) -> NodeId {
        self.push(NodeKind::Return(value))
    }

    pub fn declaration(&mut self, target: Trail) -> NodeId {
        self.push(NodeKind::Declaration(target))
    }

    pub fn definition(&mut self, target: Trail, binding: Binding, declares: bool) -> NodeId {
        self.push(NodeKind::Definition {
            target,
            binding,
            declares,
        })
    }

    /// A no-op followed by `items`
    pub fn sequence(&mut self, items: impl IntoIterator<Item = NodeId>) -> NodeId {
        let head = self.noop();
        for item in items {
            self.append(head, item, AppendMode::Plain);
        }
        head
    }

    /// Creates an If owning the given bodies, or fresh no-ops in their place
    pub fn create_if(
        &mut self,
        guard: Guard,
        then_body: Option<NodeId>,
        else_body: Option<NodeId>,
    ) -> NodeId {
        let then_body = then_body.unwrap_or_else(|| self.noop());
        let else_body = else_body.unwrap_or_else(|| self.noop());
        self.detach(then_body);
        self.detach(else_body);

        let id = self.push(NodeKind::If(Branch {
            guard,
            then_body,
            else_body,
            else_ifs: Vec::new(),
        }));
        self.nodes[then_body].link = Link::ChildOf(id, Slot::Then);
        self.nodes[else_body].link = Link::ChildOf(id, Slot::Else);
        id
    }

    /// Adds an else-if branch to the If `id` and returns the branch node
    pub fn add_else_if(&mut self, id: NodeId, guard: Guard, body: Option<NodeId>) -> NodeId {
        let else_if = self.create_if(guard, body, None);
        let Some(branch) = self.branch_mut(id) else {
            unreachable!("else-if attached to a node which is not an If")
        };
        branch.else_ifs.push(else_if);
        let slot = Slot::ElseIf(branch.else_ifs.len() - 1);
        self.nodes[else_if].link = Link::ChildOf(id, slot);
        else_if
    }

    /// Puts `node` into `slot` of `parent` and returns the node previously there
    fn put_into_slot(&mut self, parent: NodeId, slot: Slot, node: NodeId) -> Option<NodeId> {
        let previous = self
            .branch_mut(parent)
            .and_then(|branch| branch.slot_mut(slot))
            .map(|held| mem::replace(held, node))?;
        self.nodes[node].link = Link::ChildOf(parent, slot);
        Some(previous)
    }

    /// Unlinks `node` from its position; a body left empty gets a fresh no-op
    fn detach(&mut self, node: NodeId) {
        match self.nodes[node].link {
            Link::Root => {}
            Link::After(predecessor) => self.nodes[predecessor].next = None,
            Link::ChildOf(parent, slot) => {
                let filler = self.noop();
                self.put_into_slot(parent, slot, filler);
            }
        }
        self.nodes[node].link = Link::Root;
    }

    /// Makes `node` the successor of `predecessor`, clearing any parent of `node`
    pub fn set_predecessor(&mut self, node: NodeId, predecessor: NodeId) {
        self.detach(node);
        if let Some(previous) = self.nodes[predecessor].next.replace(node) {
            self.nodes[previous].link = Link::Root;
        }
        self.nodes[node].link = Link::After(predecessor);
    }

    /// Makes `node` head `slot` of `parent`, clearing any predecessor of `node`
    pub fn set_parent(&mut self, node: NodeId, parent: NodeId, slot: Slot) {
        self.detach(node);
        if let Some(previous) = self.put_into_slot(parent, slot, node) {
            if previous != node {
                self.nodes[previous].link = Link::Root;
            }
        }
    }

    pub fn last(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(next) = self.nodes[current].next {
            current = next;
        }
        current
    }

    pub fn append(&mut self, sequence: NodeId, fragment: NodeId, mode: AppendMode) {
        let last = self.last(sequence);
        match mode {
            AppendMode::Plain => self.set_predecessor(fragment, last),
            AppendMode::ReplaceLast => self.replace(last, fragment),
            AppendMode::BeforeLast => self.insert_before(last, fragment),
        }
    }

    /// Moves `fragment` into the position of `node`; whatever followed `node` follows the fragment
    pub fn replace(&mut self, node: NodeId, fragment: NodeId) {
        let successor = self.nodes[node].next.take();
        self.insert_before(node, fragment);
        self.detach(node);

        if let Some(successor) = successor {
            let last = self.last(fragment);
            self.nodes[last].next = Some(successor);
            self.nodes[successor].link = Link::After(last);
        }
    }

    /// Moves `fragment` into the position of `node`, which then follows the fragment
    pub fn insert_before(&mut self, node: NodeId, fragment: NodeId) {
        let link = self.nodes[node].link;
        self.detach(fragment);
        self.nodes[node].link = Link::Root;

        match link {
            Link::Root => {}
            Link::After(predecessor) => {
                self.nodes[predecessor].next = Some(fragment);
                self.nodes[fragment].link = link;
            }
            Link::ChildOf(parent, slot) => {
                self.put_into_slot(parent, slot, fragment);
            }
        }

        let last = self.last(fragment);
        self.nodes[last].next = Some(node);
        self.nodes[node].link = Link::After(last);
    }

    /// Depth-first walk over the sequence starting at `id`.
    ///
    /// For every node the bodies of an If are visited first (true-body, false-body, else-ifs),
    /// then the node itself, then its successor. Returning `Break` stops the walk.
    pub fn walk<F>(&self, id: NodeId, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(NodeId) -> ControlFlow<()>,
    {
        let mut current = Some(id);
        while let Some(node) = current {
            if let NodeKind::If(branch) = &self.nodes[node].kind {
                self.walk(branch.then_body, visit)?;
                self.walk(branch.else_body, visit)?;
                for &else_if in &branch.else_ifs {
                    self.walk(else_if, visit)?;
                }
            }
            visit(node)?;
            current = self.nodes[node].next;
        }
        ControlFlow::Continue(())
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let _ = self.walk(id, &mut |node| {
            nodes.push(node);
            ControlFlow::Continue(())
        });
        nodes
    }

    /// First node in walk order satisfying `predicate`
    pub fn find(&self, id: NodeId, predicate: impl Fn(&Node) -> bool) -> Option<NodeId> {
        let mut found = None;
        let _ = self.walk(id, &mut |node| {
            if predicate(&self.nodes[node]) {
                found = Some(node);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        found
    }

    pub fn find_placeholder(&self, id: NodeId) -> Option<NodeId> {
        self.find(id, |node| matches!(node.kind, NodeKind::Placeholder))
    }

    fn up(&self, id: NodeId) -> Option<NodeId> {
        match self.nodes[id].link {
            Link::After(node) | Link::ChildOf(node, _) => Some(node),
            Link::Root => None,
        }
    }

    /// Predecessors first, then the enclosing If, then its predecessors, and so on
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.up(id), move |&node| self.up(node))
    }

    /// First node of the sequence from `id` on which is neither a no-op nor a placeholder
    pub fn next_meaningful(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if !matches!(self.nodes[node].kind, NodeKind::NoOp | NodeKind::Placeholder) {
                return Some(node);
            }
            current = self.nodes[node].next;
        }
        None
    }

    pub fn is_blank(&self, id: NodeId) -> bool {
        self.next_meaningful(id).is_none()
    }

    /// Last If of the sequence starting at `id`, not looking into bodies
    pub fn last_branch(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        let mut last = None;
        while let Some(node) = current {
            if self.branch(node).is_some() {
                last = Some(node);
            }
            current = self.nodes[node].next;
        }
        last
    }

    /// Text of a single node, without its bodies
    pub fn content(&self, id: NodeId) -> String {
        match &self.nodes[id].kind {
            NodeKind::Declaration(target) => format!("let mut {}: TermPtr;", temporary(target)),
            NodeKind::Definition {
                target,
                binding,
                declares: true,
            } => format!("let {}: TermPtr = {};", temporary(target), binding.serialize()),
            NodeKind::Definition {
                target, binding, ..
            } => format!("{} = {};", temporary(target), binding.serialize()),
            NodeKind::Return(value) => format!("return {value};"),
            NodeKind::If(branch) => branch.guard.serialize(),
            NodeKind::Custom(text) => text.clone(),
            NodeKind::NoOp | NodeKind::Placeholder => String::new(),
        }
    }

    /// Temporary introduced by a declaring definition
    pub fn declared_target(&self, id: NodeId) -> Option<&Trail> {
        match &self.nodes[id].kind {
            NodeKind::Definition {
                target,
                declares: true,
                ..
            } => Some(target),
            _ => None,
        }
    }

    /// Copies the sequence starting at `id`, bodies included. The copy starts a new sequence.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let head = self.copy_node(id);
        let mut previous = head;
        let mut source = self.nodes[id].next;

        while let Some(node) = source {
            let copy = self.copy_node(node);
            self.set_predecessor(copy, previous);
            previous = copy;
            source = self.nodes[node].next;
        }

        head
    }

    fn copy_node(&mut self, id: NodeId) -> NodeId {
        let original = self.nodes[id].clone();
        let kind = match original.kind {
            NodeKind::If(branch) => {
                let then_body = self.deep_copy(branch.then_body);
                let else_body = self.deep_copy(branch.else_body);
                let else_ifs = branch
                    .else_ifs
                    .iter()
                    .map(|&else_if| self.deep_copy(else_if))
                    .collect();
                NodeKind::If(Branch {
                    guard: branch.guard,
                    then_body,
                    else_body,
                    else_ifs,
                })
            }
            kind => kind,
        };

        let copy = self.push(kind);
        self.nodes[copy].comment = original.comment;
        self.nodes[copy].commented_out = original.commented_out;

        let owned: Vec<_> = self
            .branch(copy)
            .map(|branch| branch.slots().collect())
            .unwrap_or_default();
        for (slot, body) in owned {
            self.nodes[body].link = Link::ChildOf(copy, slot);
        }

        copy
    }

    /// Compares the sequences starting at `a` and `b` node by node, bodies included
    pub fn structurally_equal(&self, a: NodeId, b: NodeId) -> bool {
        let (mut left, mut right) = (Some(a), Some(b));
        loop {
            match (left, right) {
                (None, None) => return true,
                (Some(l), Some(r)) if self.nodes_equal(l, r) => {
                    left = self.nodes[l].next;
                    right = self.nodes[r].next;
                }
                _ => return false,
            }
        }
    }

    fn nodes_equal(&self, a: NodeId, b: NodeId) -> bool {
        let (left, right) = (&self.nodes[a], &self.nodes[b]);
        if mem::discriminant(&left.kind) != mem::discriminant(&right.kind)
            || left.comment != right.comment
            || left.commented_out != right.commented_out
            || self.content(a) != self.content(b)
        {
            return false;
        }

        match (self.branch(a), self.branch(b)) {
            (Some(l), Some(r)) => {
                l.else_ifs.len() == r.else_ifs.len()
                    && l.slots()
                        .zip(r.slots())
                        .all(|((_, x), (_, y))| self.structurally_equal(x, y))
            }
            _ => true,
        }
    }
}

//! Layout - How panes are split and nested
//!
//! The tree is mutated in place by its single owner. The UI gets deep copies
//! through [`LayoutTree::snapshot`].

use std::fmt;
use std::path::PathBuf;

use crate::core::session::SessionId;
use crate::error::{MuxError, Result};

/// Unique identifier for a pane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(pub u64);

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Unique identifier for a group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub u64);

/// Direction a group lays its children out in
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    Horizontal, // Side by side (vertical divider)
    Vertical,   // Stacked (horizontal divider)
}

/// Where a new pane goes relative to the split target
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Position {
    Before,
    After,
}

/// Leaf: one terminal surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pane {
    pub id: PaneId,
    pub session: Option<SessionId>,
    pub initial_cwd: Option<PathBuf>,
    /// Number shown to the user; never reused while the tree lives
    pub display_number: u32,
}

/// Internal node splitting its children along an axis
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub axis: Axis,
    pub children: Vec<LayoutNode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutNode {
    Pane(Pane),
    Group(Group),
}

impl LayoutNode {
    /// First pane in depth-first order
    fn first_pane(&self) -> Option<PaneId> {
        match self {
            LayoutNode::Pane(pane) => Some(pane.id),
            LayoutNode::Group(group) => group.children.first().and_then(LayoutNode::first_pane),
        }
    }

    fn collect_panes<'a>(&'a self, out: &mut Vec<&'a Pane>) {
        match self {
            LayoutNode::Pane(pane) => out.push(pane),
            LayoutNode::Group(group) => group.collect_panes(out),
        }
    }
}

impl Group {
    fn collect_panes<'a>(&'a self, out: &mut Vec<&'a Pane>) {
        for child in &self.children {
            child.collect_panes(out);
        }
    }

    /// Depth-first search for the group directly holding `pane_id`.
    /// `path` receives the child indices leading from `self` to that group.
    fn locate(&self, pane_id: PaneId, path: &mut Vec<usize>) -> Option<usize> {
        for (index, child) in self.children.iter().enumerate() {
            match child {
                LayoutNode::Pane(pane) if pane.id == pane_id => return Some(index),
                LayoutNode::Pane(_) => {}
                LayoutNode::Group(group) => {
                    path.push(index);
                    if let Some(found) = group.locate(pane_id, path) {
                        return Some(found);
                    }
                    path.pop();
                }
            }
        }
        None
    }

    fn descend(&self, path: &[usize]) -> Option<&Group> {
        let mut group = self;
        for &index in path {
            match group.children.get(index)? {
                LayoutNode::Group(child) => group = child,
                LayoutNode::Pane(_) => return None,
            }
        }
        Some(group)
    }

    fn descend_mut(&mut self, path: &[usize]) -> Option<&mut Group> {
        let mut group = self;
        for &index in path {
            match group.children.get_mut(index)? {
                LayoutNode::Group(child) => group = child,
                LayoutNode::Pane(_) => return None,
            }
        }
        Some(group)
    }

    fn write_summary(&self, out: &mut String) {
        out.push(match self.axis {
            Axis::Horizontal => 'H',
            Axis::Vertical => 'V',
        });
        out.push('[');
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            match child {
                LayoutNode::Pane(pane) => out.push_str(&pane.display_number.to_string()),
                LayoutNode::Group(group) => group.write_summary(out),
            }
        }
        out.push(']');
    }
}

/// Result of a pane lookup
#[derive(Debug)]
pub struct PaneLocation<'a> {
    pub pane: &'a Pane,
    pub parent: &'a Group,
    pub index: usize,
}

/// A pane removed by [`LayoutTree::close`]
#[derive(Debug)]
pub struct ClosedPane {
    pub pane: Pane,
    /// Pane that should take focus if the closed one had it
    pub focus_hint: PaneId,
}

/// The pane layout: always a root group holding at least one pane.
#[derive(Debug, Clone)]
pub struct LayoutTree {
    root: Group,
    next_id: u64,
    next_number: u32,
}

impl LayoutTree {
    /// Create a layout with a single pane
    pub fn new(initial_cwd: Option<PathBuf>) -> Self {
        let pane = Pane {
            id: PaneId(2),
            session: None,
            initial_cwd,
            display_number: 1,
        };
        Self {
            root: Group {
                id: GroupId(1),
                axis: Axis::Horizontal,
                children: vec![LayoutNode::Pane(pane)],
            },
            next_id: 3,
            next_number: 2,
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Deep copy for consumers outside the control thread
    pub fn snapshot(&self) -> LayoutNode {
        LayoutNode::Group(self.root.clone())
    }

    /// Split `target`, returning the id of the new pane.
    ///
    /// Along the parent's axis the new pane becomes a sibling; across it the
    /// target is wrapped in a new group. A lone root pane makes the root take
    /// the requested axis.
    pub fn split(
        &mut self,
        target: PaneId,
        axis: Axis,
        position: Position,
        initial_cwd: Option<PathBuf>,
    ) -> Result<PaneId> {
        let mut path = Vec::new();
        let index = self
            .root
            .locate(target, &mut path)
            .ok_or(MuxError::PaneNotFound(target))?;

        let pane_id = PaneId(self.alloc_id());
        let new_pane = LayoutNode::Pane(Pane {
            id: pane_id,
            session: None,
            initial_cwd,
            display_number: self.next_number,
        });
        self.next_number += 1;

        let is_root = path.is_empty();
        let wraps = {
            let parent = self
                .root
                .descend_mut(&path)
                .ok_or(MuxError::PaneNotFound(target))?;
            if is_root && parent.children.len() == 1 {
                parent.axis = axis;
            }
            parent.axis != axis
        };
        // Only a cross-axis split creates a group
        let group_id = wraps.then(|| GroupId(self.alloc_id()));

        let parent = self
            .root
            .descend_mut(&path)
            .ok_or(MuxError::PaneNotFound(target))?;
        match group_id {
            None => {
                let at = match position {
                    Position::Before => index,
                    Position::After => index + 1,
                };
                parent.children.insert(at, new_pane);
            }
            Some(id) => {
                let target_node = parent.children.remove(index);
                let children = match position {
                    Position::Before => vec![new_pane, target_node],
                    Position::After => vec![target_node, new_pane],
                };
                parent.children.insert(
                    index,
                    LayoutNode::Group(Group {
                        id,
                        axis,
                        children,
                    }),
                );
            }
        }

        Ok(pane_id)
    }

    /// Remove a pane, collapsing groups left with fewer than two children.
    pub fn close(&mut self, pane_id: PaneId) -> Result<ClosedPane> {
        let mut path = Vec::new();
        let index = self
            .root
            .locate(pane_id, &mut path)
            .ok_or(MuxError::PaneNotFound(pane_id))?;
        if self.pane_count() <= 1 {
            return Err(MuxError::LastPaneProtected);
        }

        let parent = self
            .root
            .descend_mut(&path)
            .ok_or(MuxError::PaneNotFound(pane_id))?;
        let pane = match parent.children.remove(index) {
            LayoutNode::Pane(pane) => pane,
            other => {
                parent.children.insert(index, other);
                return Err(MuxError::PaneNotFound(pane_id));
            }
        };

        // Whoever slid into the closed slot, else the previous sibling
        let focus_hint = parent
            .children
            .get(index)
            .or_else(|| index.checked_sub(1).and_then(|i| parent.children.get(i)))
            .and_then(LayoutNode::first_pane);

        self.collapse(&path);

        let focus_hint = match focus_hint {
            Some(id) => id,
            None => self.pane_ids()[0],
        };
        Ok(ClosedPane { pane, focus_hint })
    }

    /// Restore the group invariants from the group at `path` up to the root.
    fn collapse(&mut self, path: &[usize]) {
        for depth in (1..=path.len()).rev() {
            let (parent_path, index) = (&path[..depth - 1], path[depth - 1]);
            let Some(parent) = self.root.descend_mut(parent_path) else {
                return;
            };
            let parent_axis = parent.axis;
            let child_len = match parent.children.get(index) {
                Some(LayoutNode::Group(group)) => group.children.len(),
                _ => return,
            };
            if child_len >= 2 {
                // Nothing changed above this level
                return;
            }

            let LayoutNode::Group(group) = parent.children.remove(index) else {
                return;
            };
            match group.children.into_iter().next() {
                None => {}
                Some(LayoutNode::Group(only)) if only.axis == parent_axis => {
                    // Same direction as the parent: splice the grandchildren in
                    for (offset, child) in only.children.into_iter().enumerate() {
                        parent.children.insert(index + offset, child);
                    }
                }
                Some(only) => parent.children.insert(index, only),
            }
        }

        // A root left holding a single group becomes that group
        if self.root.children.len() == 1 {
            if let Some(LayoutNode::Group(_)) = self.root.children.first() {
                if let Some(LayoutNode::Group(only)) = self.root.children.pop() {
                    self.root = only;
                }
            }
        }
    }

    /// Attach a session to a pane
    pub fn attach_session(&mut self, pane_id: PaneId, session: SessionId) -> Result<()> {
        let mut path = Vec::new();
        let index = self
            .root
            .locate(pane_id, &mut path)
            .ok_or(MuxError::PaneNotFound(pane_id))?;
        let parent = self
            .root
            .descend_mut(&path)
            .ok_or(MuxError::PaneNotFound(pane_id))?;
        match parent.children.get_mut(index) {
            Some(LayoutNode::Pane(pane)) => {
                pane.session = Some(session);
                Ok(())
            }
            _ => Err(MuxError::PaneNotFound(pane_id)),
        }
    }

    /// Find a pane together with its parent group and index
    pub fn find_pane(&self, pane_id: PaneId) -> Option<PaneLocation<'_>> {
        let mut path = Vec::new();
        let index = self.root.locate(pane_id, &mut path)?;
        let parent = self.root.descend(&path)?;
        match parent.children.get(index)? {
            LayoutNode::Pane(pane) => Some(PaneLocation { pane, parent, index }),
            LayoutNode::Group(_) => None,
        }
    }

    /// Find a pane by its display number
    pub fn find_pane_by_number(&self, number: u32) -> Option<PaneId> {
        self.panes()
            .into_iter()
            .find(|p| p.display_number == number)
            .map(|p| p.id)
    }

    pub fn pane(&self, pane_id: PaneId) -> Option<&Pane> {
        self.find_pane(pane_id).map(|loc| loc.pane)
    }

    /// All panes in depth-first order
    pub fn panes(&self) -> Vec<&Pane> {
        let mut out = Vec::new();
        self.root.collect_panes(&mut out);
        out
    }

    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.panes().iter().map(|p| p.id).collect()
    }

    pub fn pane_count(&self) -> usize {
        self.panes().len()
    }

    /// Pane following `pane_id` in depth-first order, wrapping around
    pub fn next_pane_after(&self, pane_id: PaneId) -> Option<PaneId> {
        let ids = self.pane_ids();
        let pos = ids.iter().position(|&id| id == pane_id)?;
        Some(ids[(pos + 1) % ids.len()])
    }

    /// Compact form such as `H[1 V[2 3]]`, using display numbers
    pub fn summary(&self) -> String {
        let mut out = String::new();
        self.root.write_summary(&mut out);
        out
    }
}

//! Retained view tree shared by slots, activations and the overlay layer
//!
//! Every node has at most one parent. Moving a node is always
//! detach-then-attach inside a single call, and every mutation is appended
//! to an operation log that a renderer drains and mirrors onto real widgets.

use crate::Widget;

/// Handle to a node in a [`ViewTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Mutations recorded by the tree, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOp {
    Attach { node: NodeId, parent: NodeId },
    Detach { node: NodeId, parent: NodeId },
    SetVisible { node: NodeId, visible: bool },
}

#[derive(Debug)]
struct Node {
    label: String,
    content: Option<Vec<Widget>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    visible: bool,
}

/// Arena of containers and surfaces
#[derive(Debug, Default)]
pub struct ViewTree {
    nodes: Vec<Node>,
    ops: Vec<ViewOp>,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detached, visible container
    pub fn add_container(&mut self, label: impl Into<String>) -> NodeId {
        self.push(label.into(), None)
    }

    /// Adds a detached, visible surface with rendered content
    pub fn add_surface(&mut self, label: impl Into<String>, content: Vec<Widget>) -> NodeId {
        self.push(label.into(), Some(content))
    }

    fn push(&mut self, label: String, content: Option<Vec<Widget>>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            label,
            content,
            parent: None,
            children: Vec::new(),
            visible: true,
        });
        id
    }

    /// Attaches `node` as the last child of `parent`, detaching it from any
    /// previous parent first. Attaching to the current parent is a no-op.
    pub fn attach(&mut self, node: NodeId, parent: NodeId) {
        debug_assert!(!self.is_ancestor(node, parent), "attach would create a cycle");
        if self.nodes[node.0].parent == Some(parent) {
            return;
        }
        self.detach(node);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.push(node);
        self.ops.push(ViewOp::Attach { node, parent });
    }

    /// Detaches `node` from its parent, returning the former parent
    pub fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent.take()?;
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.ops.push(ViewOp::Detach { node, parent });
        Some(parent)
    }

    /// Detaches every child of `container`
    pub fn clear(&mut self, container: NodeId) {
        let children = std::mem::take(&mut self.nodes[container.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.ops.push(ViewOp::Detach {
                node: child,
                parent: container,
            });
        }
    }

    /// Changes visibility, logging only real changes
    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        let slot = &mut self.nodes[node.0].visible;
        if *slot != visible {
            *slot = visible;
            self.ops.push(ViewOp::SetVisible { node, visible });
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.nodes[node.0].visible
    }

    pub fn label(&self, node: NodeId) -> &str {
        &self.nodes[node.0].label
    }

    /// Rendered widgets of a surface; `None` for containers
    pub fn content(&self, node: NodeId) -> Option<&[Widget]> {
        self.nodes[node.0].content.as_deref()
    }

    /// Checks if `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes[current.0].parent;
        }
        false
    }

    /// Operations recorded since the last drain
    pub fn ops(&self) -> &[ViewOp] {
        &self.ops
    }

    /// Takes the recorded operations, leaving the log empty
    pub fn drain_ops(&mut self) -> Vec<ViewOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

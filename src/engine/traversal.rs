//! Traversal orders.
//!
//! An order is the product of three independent axes plus a root-only flag:
//!
//! ```text
//! breadth     DepthFirst  | WidthFirst
//! horizontal  LeftToRight | RightToLeft
//! vertical    TopToBottom | BottomToTop
//! root_only   visit the traversal root and nothing else
//! ```
//!
//! [`Traverse`] is the flag-set spelling of the same space (`DEPTH_FIRST |
//! RIGHT_TO_LEFT`, ...). Axes left unspecified take their default, and
//! contradicting flags are rejected when converting to a [`TraversalOrder`].
//!
//! A [`Traversal`] is lazy: each node's children are read when that node is
//! expanded. Changing a node's children before it is expanded is therefore
//! visible to the traversal, and doing so is not supported; collect the nodes
//! first and mutate in a later step.

use crate::error::{Error, Result};
use crate::node::TreeNode;
use std::collections::VecDeque;

bitflags::bitflags! {
    /// Traversal axes as combinable flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Traverse: u8 {
        const DEPTH_FIRST   = 1 << 0;
        const WIDTH_FIRST   = 1 << 1;
        const LEFT_TO_RIGHT = 1 << 2;
        const RIGHT_TO_LEFT = 1 << 3;
        const TOP_TO_BOTTOM = 1 << 4;
        const BOTTOM_TO_TOP = 1 << 5;
        const ROOT_ONLY     = 1 << 6;

        const DEFAULT = Self::DEPTH_FIRST.bits() | Self::LEFT_TO_RIGHT.bits() | Self::TOP_TO_BOTTOM.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Breadth {
    #[default]
    DepthFirst,
    WidthFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Horizontal {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Vertical {
    #[default]
    TopToBottom,
    BottomToTop,
}

/// How a rule walks the tree. The default is depth-first, left-to-right,
/// top-to-bottom (document order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TraversalOrder {
    pub breadth: Breadth,
    pub horizontal: Horizontal,
    pub vertical: Vertical,
    pub root_only: bool,
}

impl TraversalOrder {
    pub const fn new(breadth: Breadth, horizontal: Horizontal, vertical: Vertical) -> Self {
        TraversalOrder { breadth, horizontal, vertical, root_only: false }
    }

    pub const fn root_only() -> Self {
        TraversalOrder {
            breadth: Breadth::DepthFirst,
            horizontal: Horizontal::LeftToRight,
            vertical: Vertical::TopToBottom,
            root_only: true,
        }
    }

    /// The lazy node sequence for the subtree under `root`.
    pub fn traverse<N: TreeNode>(&self, root: &N) -> Traversal<N> {
        let root = root.clone();
        let horizontal = self.horizontal;
        let state = match (self.root_only, self.breadth, self.vertical) {
            (true, ..) => State::Root(Some(root)),
            (false, Breadth::DepthFirst, Vertical::TopToBottom) => State::PreOrder { stack: vec![root], horizontal },
            (false, Breadth::DepthFirst, Vertical::BottomToTop) => {
                State::PostOrder { stack: vec![(root, false)], horizontal }
            }
            (false, Breadth::WidthFirst, Vertical::TopToBottom) => {
                State::LevelOrder { queue: VecDeque::from([root]), horizontal }
            }
            (false, Breadth::WidthFirst, Vertical::BottomToTop) => {
                State::ReverseLevelOrder { root: Some(root), pending: Vec::new(), horizontal }
            }
        };
        Traversal { state }
    }
}

impl TryFrom<Traverse> for TraversalOrder {
    type Error = Error;

    fn try_from(flags: Traverse) -> Result<Self> {
        fn axis<T>(flags: Traverse, a: Traverse, b: Traverse, (x, y): (T, T), what: &'static str) -> Result<Option<T>> {
            match (flags.contains(a), flags.contains(b)) {
                (true, true) => Err(Error::InvalidTraversalOrder(flags, what)),
                (true, false) => Ok(Some(x)),
                (false, true) => Ok(Some(y)),
                (false, false) => Ok(None),
            }
        }

        let breadth = axis(
            flags,
            Traverse::DEPTH_FIRST,
            Traverse::WIDTH_FIRST,
            (Breadth::DepthFirst, Breadth::WidthFirst),
            "depth-first and width-first exclude each other",
        )?;
        let horizontal = axis(
            flags,
            Traverse::LEFT_TO_RIGHT,
            Traverse::RIGHT_TO_LEFT,
            (Horizontal::LeftToRight, Horizontal::RightToLeft),
            "left-to-right and right-to-left exclude each other",
        )?;
        let vertical = axis(
            flags,
            Traverse::TOP_TO_BOTTOM,
            Traverse::BOTTOM_TO_TOP,
            (Vertical::TopToBottom, Vertical::BottomToTop),
            "top-to-bottom and bottom-to-top exclude each other",
        )?;

        Ok(TraversalOrder {
            breadth: breadth.unwrap_or_default(),
            horizontal: horizontal.unwrap_or_default(),
            vertical: vertical.unwrap_or_default(),
            root_only: flags.contains(Traverse::ROOT_ONLY),
        })
    }
}

impl From<TraversalOrder> for Traverse {
    fn from(order: TraversalOrder) -> Self {
        let mut flags = match order.breadth {
            Breadth::DepthFirst => Traverse::DEPTH_FIRST,
            Breadth::WidthFirst => Traverse::WIDTH_FIRST,
        };
        flags |= match order.horizontal {
            Horizontal::LeftToRight => Traverse::LEFT_TO_RIGHT,
            Horizontal::RightToLeft => Traverse::RIGHT_TO_LEFT,
        };
        flags |= match order.vertical {
            Vertical::TopToBottom => Traverse::TOP_TO_BOTTOM,
            Vertical::BottomToTop => Traverse::BOTTOM_TO_TOP,
        };
        if order.root_only {
            flags |= Traverse::ROOT_ONLY;
        }
        flags
    }
}

/// Children in visiting order.
fn ordered<N: TreeNode>(node: &N, horizontal: Horizontal) -> Vec<N> {
    let mut children = node.children();
    if horizontal == Horizontal::RightToLeft {
        children.reverse();
    }
    children
}

#[derive(Debug, Clone)]
enum State<N> {
    Root(Option<N>),
    PreOrder { stack: Vec<N>, horizontal: Horizontal },
    PostOrder { stack: Vec<(N, bool)>, horizontal: Horizontal },
    LevelOrder { queue: VecDeque<N>, horizontal: Horizontal },
    ReverseLevelOrder { root: Option<N>, pending: Vec<N>, horizontal: Horizontal },
}

/// Iterator over the nodes of one traversal. Cloning it yields an
/// independent cursor at the same position.
#[derive(Debug, Clone)]
pub struct Traversal<N> {
    state: State<N>,
}

impl<N: TreeNode> Iterator for Traversal<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        match &mut self.state {
            State::Root(root) => root.take(),
            State::PreOrder { stack, horizontal } => {
                let node = stack.pop()?;
                stack.extend(ordered(&node, *horizontal).into_iter().rev());
                Some(node)
            }
            State::PostOrder { stack, horizontal } => loop {
                let (node, expanded) = stack.pop()?;
                if expanded {
                    return Some(node);
                }
                let children = ordered(&node, *horizontal);
                stack.push((node, true));
                stack.extend(children.into_iter().rev().map(|c| (c, false)));
            },
            State::LevelOrder { queue, horizontal } => {
                let node = queue.pop_front()?;
                queue.extend(ordered(&node, *horizontal));
                Some(node)
            }
            State::ReverseLevelOrder { root, pending, horizontal } => {
                if let Some(root) = root.take() {
                    // Popped from the end: deepest level first, each level in
                    // horizontal order.
                    let mut level = vec![root];
                    while !level.is_empty() {
                        let next: Vec<N> = level.iter().flat_map(|n| ordered(n, *horizontal)).collect();
                        pending.extend(level.into_iter().rev());
                        level = next;
                    }
                }
                pending.pop()
            }
        }
    }
}

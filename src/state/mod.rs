//
// blossomv-rs is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License  v3
// as published by the Free Software Foundation.
//
// blossomv-rs is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY.
// See the GNU Lesser General Public License  for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with blossomv-rs. If not, see http://www.gnu.org/licenses/lgpl-3.0.en.html
//
// Copyright (c)  2022 by X. Gillard
//

//! The state module comprises all the datastructures that make up the graph
//! model manipulated by the matching engine: the nodes (vertices and
//! blossoms), the edges, the alternating trees and the tree edges which link
//! these trees together.
//!
//! # Note
//! All these objects live in arenas owned by the `State` and refer to one
//! another through dense integer identifiers. This is what makes it possible
//! to express the (heavily cyclic) pointer structure of the algorithm without
//! fighting the borrow checker:
//! * a node knows its parent blossom, a path-compressed ancestor and the edge
//!   linking it to the next node of the odd cycle it belongs to;
//! * a tree node knows its parent edge and its children (an index linked
//!   list, so that insertions and removals are O(1));
//! * an edge knows its current endpoints, its original endpoints and the
//!   one heap it currently lives in.

mod heap;
mod manager;

pub(crate) use heap::*;
pub(crate) use manager::*;

use rustc_hash::FxHashMap;

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ IDENTIFIERS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The identifier of a node (either an original vertex or a blossom).
/// Original vertices keep the identifier they had in the input graph; blossoms
/// are numbered after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(pub(crate) usize);

/// The identifier of an edge of the graph model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EdgeId(pub(crate) usize);

/// The identifier of an alternating tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TreeId(pub(crate) usize);

/// The identifier of an edge between two alternating trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TreeEdgeId(pub(crate) usize);

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ NODES ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The label of an outer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Label {
    /// The node sits at an even depth of some alternating tree
    Plus,
    /// The node sits at an odd depth of some alternating tree
    Minus,
    /// The node does not belong to any tree. (Nodes that are contracted in
    /// a blossom are labeled this way too: their dual is fixed)
    Infinity,
}

/// A node is either an original vertex of the graph or a blossom (pseudonode)
/// that contracts an odd cycle of nodes.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// The label of the node. Only meaningful for outer nodes
    pub label: Label,
    /// The (lazy) dual variable of this node. The true dual of the node is
    /// `dual + tree.eps` when the node is Plus, `dual - tree.eps` when it is
    /// Minus and simply `dual` otherwise.
    pub dual: f64,
    /// The matched edge incident to this node (if any)
    pub matched: Option<EdgeId>,

    /// Is this node a top level node (not contracted in any blossom) ?
    pub is_outer: bool,
    /// Is this node a pseudonode ?
    pub is_blossom: bool,
    /// Is this node the root of its tree ?
    pub is_tree_root: bool,
    /// Has this blossom been expanded (its slot is waiting to be recycled) ?
    pub is_removed: bool,
    /// Scratch flag used while looking for the root of a new blossom
    pub is_marked: bool,

    /// The tree this node belongs to (if any)
    pub tree: Option<TreeId>,
    /// The edge linking this node to its parent in the tree
    pub parent_edge: Option<EdgeId>,
    /// The first child of this node in the tree
    pub first_tree_child: Option<NodeId>,
    /// The next sibling of this node in its parent's list of children
    pub tree_sibling_next: Option<NodeId>,
    /// The previous sibling of this node in its parent's list of children.
    ///
    /// # Note
    /// The first child of a node uses this field to point to the *last*
    /// child of the list. This is what makes appending O(1).
    pub tree_sibling_prev: Option<NodeId>,

    /// The blossom that directly contains this node
    pub blossom_parent: Option<NodeId>,
    /// Some (path compressed) blossom ancestor of this node
    pub blossom_grandparent: Option<NodeId>,
    /// The edge linking this node to the next node of the odd cycle that
    /// forms its blossom parent
    pub blossom_sibling: Option<EdgeId>,

    /// The edges which are currently attached to this node
    pub edges: Vec<EdgeId>,
}

impl Node {
    /// Creates a fresh node, outside of any tree and any blossom
    pub fn new(is_blossom: bool) -> Self {
        Self {
            label: Label::Infinity,
            dual: 0.0,
            matched: None,
            is_outer: true,
            is_blossom,
            is_tree_root: false,
            is_removed: false,
            is_marked: false,
            tree: None,
            parent_edge: None,
            first_tree_child: None,
            tree_sibling_next: None,
            tree_sibling_prev: None,
            blossom_parent: None,
            blossom_grandparent: None,
            blossom_sibling: None,
            edges: vec![],
        }
    }

    /// Forgets everything about the position of this node in a tree
    pub fn clear_tree_links(&mut self) {
        self.tree = None;
        self.parent_edge = None;
        self.first_tree_child = None;
        self.tree_sibling_next = None;
        self.tree_sibling_prev = None;
        self.is_tree_root = false;
    }
}

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ EDGES ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The heap an edge currently lives in. This is derived from the labels of
/// the current endpoints of the edge (see `State::desired_home`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EdgeHome {
    /// (+, inf) edge of the given tree
    PlusInfinity(TreeId),
    /// (+, +) edge whose both endpoints belong to the given tree
    PlusPlus(TreeId),
    /// (+, +) edge between the two trees of the given tree edge
    CrossPlusPlus(TreeEdgeId),
    /// (+, -) edge between two trees. The index tells which endpoint of the
    /// tree edge holds the plus node.
    CrossPlusMinus(TreeEdgeId, usize),
}

/// An edge of the graph model
#[derive(Debug, Clone)]
pub(crate) struct Edge {
    /// The current endpoints of this edge. `head[k]` always is an ancestor
    /// (or the node itself) of `head_original[k]`
    pub head: [NodeId; 2],
    /// The original vertices linked by this edge
    pub head_original: [NodeId; 2],
    /// The position of this edge in the `edges` list of `head[k]`
    pub slot: [usize; 2],
    /// The (lazy) reduced cost of this edge. The true slack of an edge whose
    /// endpoints are outer is `slack - eps(head[0]) - eps(head[1])` where
    /// `eps(n)` is `+tree.eps` for a plus node, `-tree.eps` for a minus node
    /// and zero otherwise.
    pub slack: f64,
    /// The weight of this edge
    pub weight: f64,
    /// The index of the input graph edge this edge stands for
    pub graph_edge: usize,
    /// The heap this edge currently lives in (if any)
    pub home: Option<EdgeHome>,
}

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ TREES ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// An alternating tree
#[derive(Debug)]
pub(crate) struct Tree {
    /// The root of this tree (an unmatched node)
    pub root: NodeId,
    /// The dual change accumulated by this tree. It is lazily spread over the
    /// duals of the nodes and the slacks of the edges.
    pub eps: f64,
    /// The (+, inf) edges incident to the plus nodes of this tree
    pub plus_infinity_edges: MinHeap<EdgeId>,
    /// The (+, +) edges whose both endpoints belong to this tree
    pub plus_plus_edges: MinHeap<EdgeId>,
    /// The minus blossoms of this tree, keyed by their (lazy) dual
    pub minus_blossoms: MinHeap<NodeId>,
    /// The tree edges linking this tree to its neighbors
    pub neighbors: FxHashMap<TreeId, TreeEdgeId>,
    /// Previous tree in the list of live trees
    pub prev: Option<TreeId>,
    /// Next tree in the list of live trees
    pub next: Option<TreeId>,
    /// Is this tree still alive ? (trees die when they are augmented)
    pub is_alive: bool,
}

impl Tree {
    /// Creates a new tree rooted in the given node
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            eps: 0.0,
            plus_infinity_edges: MinHeap::new(),
            plus_plus_edges: MinHeap::new(),
            minus_blossoms: MinHeap::new(),
            neighbors: FxHashMap::default(),
            prev: None,
            next: None,
            is_alive: true,
        }
    }
}

/// A tree edge links two neighboring trees. It holds the edges which go from
/// one tree to the other and might constrain the dual updates of the trees.
#[derive(Debug)]
pub(crate) struct TreeEdge {
    /// The two trees linked by this tree edge
    pub head: [TreeId; 2],
    /// The (+, +) edges between the two trees
    pub plus_plus_edges: MinHeap<EdgeId>,
    /// `plus_minus_edges[k]` holds the edges whose plus endpoint belongs to
    /// `head[k]` and whose minus endpoint belongs to `head[1 - k]`
    pub plus_minus_edges: [MinHeap<EdgeId>; 2],
    /// Is this tree edge still in use ?
    pub is_alive: bool,
}

impl TreeEdge {
    /// Creates a new tree edge between the two given trees
    pub fn new(a: TreeId, b: TreeId) -> Self {
        Self {
            head: [a, b],
            plus_plus_edges: MinHeap::new(),
            plus_minus_edges: [MinHeap::new(), MinHeap::new()],
            is_alive: true,
        }
    }
    /// Returns the index of the given tree among the heads of this tree edge
    pub fn dir_of(&self, tree: TreeId) -> usize {
        if self.head[0] == tree {
            0
        } else {
            debug_assert_eq!(self.head[1], tree);
            1
        }
    }
    /// Returns true iff all the heaps of this tree edge are empty
    pub fn is_empty(&self) -> bool {
        self.plus_plus_edges.is_empty()
            && self.plus_minus_edges[0].is_empty()
            && self.plus_minus_edges[1].is_empty()
    }
}

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

//! This module defines the `State`: the structure which owns all the nodes,
//! edges, trees and tree edges manipulated by the matching engine, along with
//! the low level utilities which are used to keep these consistent (incidence
//! lists, tree children lists, heap bookkeeping and blossom lookups).

use crate::{
    Edge, EdgeHome, EdgeId, Label, Node, NodeId, Statistics, Tree, TreeEdge, TreeEdgeId, TreeId,
};

/// This is the structure which holds the complete graph model of the matching
/// engine.
#[derive(Debug)]
pub(crate) struct State {
    /// The number of vertices of the original graph. The nodes `0..nb_vertices`
    /// stand for these vertices, the remaining ones are blossoms
    pub nb_vertices: usize,
    /// All the nodes (vertices first, then blossoms)
    pub nodes: Vec<Node>,
    /// All the edges
    pub edges: Vec<Edge>,
    /// All the trees that have been created (dead ones included)
    pub trees: Vec<Tree>,
    /// All the tree edges (dead ones included, their slots get recycled)
    pub tree_edges: Vec<TreeEdge>,
    /// Maps the index of an input edge onto the edge which models it (forbidden
    /// edges and self loops are not modeled)
    pub graph_edges: Vec<Option<EdgeId>>,

    /// The first tree of the list of live trees
    pub first_tree: Option<TreeId>,
    /// The number of live trees
    pub tree_num: usize,
    /// The blossoms which have been expanded since the last reclamation
    pub removed: Vec<NodeId>,
    /// The blossom slots that can be reused
    pub free_blossoms: Vec<NodeId>,
    /// The tree edge slots that can be reused
    pub free_tree_edges: Vec<TreeEdgeId>,

    /// The threshold below which a slack (or a dual) is considered to be zero
    pub tolerance: f64,
    /// What happened during the resolution
    pub stats: Statistics,
}

impl State {
    /// Creates a new state with one node per vertex and no edge
    pub fn new(nb_vertices: usize, tolerance: f64) -> Self {
        Self {
            nb_vertices,
            nodes: (0..nb_vertices).map(|_| Node::new(false)).collect(),
            edges: vec![],
            trees: vec![],
            tree_edges: vec![],
            graph_edges: vec![],
            first_tree: None,
            tree_num: 0,
            removed: vec![],
            free_blossoms: vec![],
            free_tree_edges: vec![],
            tolerance,
            stats: Statistics::default(),
        }
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ EDGES AND INCIDENCE LISTS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Creates a new edge between the vertices u and v. Its slack is
    /// initialized with its weight.
    pub fn add_edge(&mut self, u: NodeId, v: NodeId, weight: f64, graph_edge: usize) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            head: [u, v],
            head_original: [u, v],
            slot: [0, 0],
            slack: weight,
            weight,
            graph_edge,
            home: None,
        });
        self.attach(id, 0);
        self.attach(id, 1);

        if self.graph_edges.len() <= graph_edge {
            self.graph_edges.resize(graph_edge + 1, None);
        }
        self.graph_edges[graph_edge] = Some(id);
        id
    }
    /// Appends the edge to the incidence list of its k-th head
    fn attach(&mut self, e: EdgeId, k: usize) {
        let node = self.edges[e.0].head[k];
        let list = &mut self.nodes[node.0].edges;
        self.edges[e.0].slot[k] = list.len();
        list.push(e);
    }
    /// Removes the edge from the incidence list of its k-th head (in O(1))
    fn detach(&mut self, e: EdgeId, k: usize) {
        let node = self.edges[e.0].head[k];
        let slot = self.edges[e.0].slot[k];
        let list = &mut self.nodes[node.0].edges;
        list.swap_remove(slot);
        if let Some(&moved) = list.get(slot) {
            let dir = self.dir_from(moved, node);
            self.edges[moved.0].slot[dir] = slot;
        }
    }
    /// Moves the k-th end of the edge onto a different node
    pub fn move_edge(&mut self, e: EdgeId, k: usize, to: NodeId) {
        self.detach(e, k);
        self.edges[e.0].head[k] = to;
        self.attach(e, k);
    }
    /// Returns the index k such that `head[k]` of the given edge is `node`
    pub fn dir_from(&self, e: EdgeId, node: NodeId) -> usize {
        let head = self.edges[e.0].head;
        if head[0] == node {
            0
        } else {
            debug_assert_eq!(head[1], node, "{e:?} is not attached to {node:?}");
            1
        }
    }
    /// Returns the end of the edge which is not the given node
    pub fn opposite(&self, e: EdgeId, node: NodeId) -> NodeId {
        let dir = self.dir_from(e, node);
        self.edges[e.0].head[1 - dir]
    }
    /// Returns (a copy of) the list of edges currently attached to the node
    pub fn incident_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.nodes[node.0].edges.clone()
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ LAZY DUALS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Returns the share of its tree's eps that must be added to the dual of
    /// the given node to obtain its true dual
    pub fn node_eps(&self, node: NodeId) -> f64 {
        let n = &self.nodes[node.0];
        match (n.label, n.tree) {
            (Label::Plus, Some(t)) => self.trees[t.0].eps,
            (Label::Minus, Some(t)) => -self.trees[t.0].eps,
            _ => 0.0,
        }
    }
    /// Returns the true dual of the node
    pub fn true_dual(&self, node: NodeId) -> f64 {
        self.nodes[node.0].dual + self.node_eps(node)
    }
    /// Returns the true slack of the edge
    pub fn true_slack(&self, e: EdgeId) -> f64 {
        let [a, b] = self.edges[e.0].head;
        self.edges[e.0].slack - self.node_eps(a) - self.node_eps(b)
    }
    /// Turns the given outer node into an infinity node. Its dual and the
    /// slack of its incident edges are updated so that their true values
    /// remain unchanged.
    ///
    /// # Note
    /// This does not touch the heaps: the caller is responsible for re-homing
    /// the edges and removing the node from the minus blossoms if needed.
    pub fn flush_eps(&mut self, node: NodeId) {
        let eps = self.node_eps(node);
        if eps != 0.0 {
            self.nodes[node.0].dual += eps;
            for i in 0..self.nodes[node.0].edges.len() {
                let e = self.nodes[node.0].edges[i];
                self.edges[e.0].slack -= eps;
            }
        }
        let n = &mut self.nodes[node.0];
        n.label = Label::Infinity;
        n.tree = None;
    }
    /// Makes an infinity node join the given tree with the given label. Its
    /// dual and the slack of its incident edges are updated so that their true
    /// values remain unchanged.
    ///
    /// # Note
    /// This does not touch the heaps: the caller is responsible for re-homing
    /// the edges and registering the node as a minus blossom if needed.
    pub fn join_tree(&mut self, node: NodeId, tree: TreeId, label: Label) {
        debug_assert_eq!(self.nodes[node.0].label, Label::Infinity);
        self.nodes[node.0].label = label;
        self.nodes[node.0].tree = Some(tree);

        let eps = self.node_eps(node);
        if eps != 0.0 {
            self.nodes[node.0].dual -= eps;
            for i in 0..self.nodes[node.0].edges.len() {
                let e = self.nodes[node.0].edges[i];
                self.edges[e.0].slack += eps;
            }
        }
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ TREE STRUCTURE ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Appends child to the list of children of parent. The given edge
    /// becomes the parent edge of child.
    pub fn add_tree_child(&mut self, parent: NodeId, child: NodeId, edge: EdgeId) {
        self.nodes[child.0].parent_edge = Some(edge);
        self.nodes[child.0].tree_sibling_next = None;
        match self.nodes[parent.0].first_tree_child {
            None => {
                self.nodes[parent.0].first_tree_child = Some(child);
                self.nodes[child.0].tree_sibling_prev = Some(child);
            }
            Some(first) => {
                let last = self.nodes[first.0].tree_sibling_prev.unwrap_or(first);
                self.nodes[last.0].tree_sibling_next = Some(child);
                self.nodes[child.0].tree_sibling_prev = Some(last);
                self.nodes[first.0].tree_sibling_prev = Some(child);
            }
        }
    }
    /// Removes child from the list of children of parent
    pub fn remove_tree_child(&mut self, parent: NodeId, child: NodeId) {
        let next = self.nodes[child.0].tree_sibling_next;
        let prev = self.nodes[child.0].tree_sibling_prev;
        let first = self.nodes[parent.0].first_tree_child;

        if first == Some(child) {
            self.nodes[parent.0].first_tree_child = next;
            if let Some(n) = next {
                // the new first child points to the last one
                self.nodes[n.0].tree_sibling_prev = prev;
            }
        } else if let Some(p) = prev {
            self.nodes[p.0].tree_sibling_next = next;
            match next {
                Some(n) => self.nodes[n.0].tree_sibling_prev = Some(p),
                None => {
                    if let Some(f) = first {
                        self.nodes[f.0].tree_sibling_prev = Some(p);
                    }
                }
            }
        }
        self.nodes[child.0].tree_sibling_next = None;
        self.nodes[child.0].tree_sibling_prev = None;
    }
    /// Returns the children of the node in the tree
    pub fn tree_children(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut current = self.nodes[node.0].first_tree_child;
        while let Some(c) = current {
            out.push(c);
            current = self.nodes[c.0].tree_sibling_next;
        }
        out
    }
    /// Returns the parent of the node in its tree (if any)
    pub fn tree_parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0]
            .parent_edge
            .map(|e| self.opposite(e, node))
    }
    /// Returns all the nodes of the tree rooted in the given node
    pub fn tree_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut current = self.nodes[node.0].first_tree_child;
            while let Some(c) = current {
                stack.push(c);
                current = self.nodes[c.0].tree_sibling_next;
            }
        }
        out
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ TREES AND TREE EDGES ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Creates a new tree rooted in the given (unmatched, infinity) node. The
    /// node becomes a plus node but its edges are not re-homed.
    pub fn add_tree(&mut self, root: NodeId) -> TreeId {
        let id = TreeId(self.trees.len());
        let mut tree = Tree::new(root);
        tree.next = self.first_tree;
        if let Some(first) = self.first_tree {
            self.trees[first.0].prev = Some(id);
        }
        self.trees.push(tree);
        self.first_tree = Some(id);
        self.tree_num += 1;

        self.nodes[root.0].is_tree_root = true;
        self.join_tree(root, id, Label::Plus);
        id
    }
    /// Unregisters the given tree along with all of its tree edges. The tree
    /// is expected to have been emptied beforehand.
    pub fn remove_tree(&mut self, tree: TreeId) {
        let neighbors = self.trees[tree.0]
            .neighbors
            .iter()
            .map(|(u, te)| (*u, *te))
            .collect::<Vec<_>>();
        for (other, te) in neighbors {
            debug_assert!(self.tree_edges[te.0].is_empty(), "{te:?} is not empty");
            self.trees[other.0].neighbors.remove(&tree);
            self.tree_edges[te.0].is_alive = false;
            self.free_tree_edges.push(te);
        }
        let t = &mut self.trees[tree.0];
        debug_assert!(t.plus_infinity_edges.is_empty());
        debug_assert!(t.plus_plus_edges.is_empty());
        debug_assert!(t.minus_blossoms.is_empty());
        t.neighbors.clear();
        t.is_alive = false;

        let (prev, next) = (t.prev, t.next);
        t.prev = None;
        t.next = None;
        match prev {
            Some(p) => self.trees[p.0].next = next,
            None => self.first_tree = next,
        }
        if let Some(n) = next {
            self.trees[n.0].prev = prev;
        }
        self.tree_num -= 1;
    }
    /// Returns the identifiers of all the live trees
    pub fn live_trees(&self) -> Vec<TreeId> {
        let mut out = Vec::with_capacity(self.tree_num);
        let mut current = self.first_tree;
        while let Some(t) = current {
            out.push(t);
            current = self.trees[t.0].next;
        }
        out
    }
    /// Returns true iff the tree is still alive
    pub fn is_alive(&self, tree: TreeId) -> bool {
        self.trees[tree.0].is_alive
    }
    /// Returns the tree edge linking the two given trees, creating it if needed
    fn get_or_add_tree_edge(&mut self, a: TreeId, b: TreeId) -> TreeEdgeId {
        if let Some(te) = self.trees[a.0].neighbors.get(&b) {
            debug_assert!(self.tree_edges[te.0].is_alive);
            return *te;
        }
        let te = match self.free_tree_edges.pop() {
            Some(te) => {
                self.tree_edges[te.0] = TreeEdge::new(a, b);
                te
            }
            None => {
                self.tree_edges.push(TreeEdge::new(a, b));
                TreeEdgeId(self.tree_edges.len() - 1)
            }
        };
        self.trees[a.0].neighbors.insert(b, te);
        self.trees[b.0].neighbors.insert(a, te);
        te
    }
    /// Returns the tree edges of the given tree along with the neighbor tree
    /// they lead to. The list is sorted so that iterating over it is
    /// deterministic.
    pub fn tree_neighbors(&self, tree: TreeId) -> Vec<(TreeId, TreeEdgeId)> {
        let mut out = self.trees[tree.0]
            .neighbors
            .iter()
            .map(|(u, te)| (*u, *te))
            .collect::<Vec<_>>();
        out.sort_unstable();
        out
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ HEAPS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Computes the heap where the given edge should live given the current
    /// labels of its endpoints (creating the tree edge if needed).
    fn desired_home(&mut self, e: EdgeId) -> Option<EdgeHome> {
        let [a, b] = self.edges[e.0].head;
        let (na, nb) = (&self.nodes[a.0], &self.nodes[b.0]);
        if !na.is_outer || !nb.is_outer {
            return None;
        }
        match (na.label, na.tree, nb.label, nb.tree) {
            (Label::Plus, Some(ta), Label::Plus, Some(tb)) => {
                if ta == tb {
                    Some(EdgeHome::PlusPlus(ta))
                } else {
                    let te = self.get_or_add_tree_edge(ta, tb);
                    Some(EdgeHome::CrossPlusPlus(te))
                }
            }
            (Label::Plus, Some(ta), Label::Infinity, _) => Some(EdgeHome::PlusInfinity(ta)),
            (Label::Infinity, _, Label::Plus, Some(tb)) => Some(EdgeHome::PlusInfinity(tb)),
            (Label::Plus, Some(tp), Label::Minus, Some(tm))
            | (Label::Minus, Some(tm), Label::Plus, Some(tp))
                if tp != tm =>
            {
                let te = self.get_or_add_tree_edge(tp, tm);
                let dir = self.tree_edges[te.0].dir_of(tp);
                Some(EdgeHome::CrossPlusMinus(te, dir))
            }
            _ => None,
        }
    }
    /// Takes the edge out of the heap it lives in (if any)
    pub fn unhome(&mut self, e: EdgeId) {
        if let Some(home) = self.edges[e.0].home.take() {
            match home {
                EdgeHome::PlusInfinity(t) => self.trees[t.0].plus_infinity_edges.remove(e),
                EdgeHome::PlusPlus(t) => self.trees[t.0].plus_plus_edges.remove(e),
                EdgeHome::CrossPlusPlus(te) => self.tree_edges[te.0].plus_plus_edges.remove(e),
                EdgeHome::CrossPlusMinus(te, k) => {
                    self.tree_edges[te.0].plus_minus_edges[k].remove(e)
                }
            };
        }
    }
    /// Moves the edge to the heap it belongs to given the current labels of
    /// its endpoints. Its key is refreshed with its current slack.
    pub fn rehome(&mut self, e: EdgeId) {
        debug_assert!(
            self.true_slack(e) >= -1e-6 * (1.0 + self.edges[e.0].weight),
            "{e:?} has a negative slack ({})",
            self.true_slack(e)
        );
        self.unhome(e);
        let home = self.desired_home(e);
        let key = self.edges[e.0].slack;
        if let Some(home) = home {
            match home {
                EdgeHome::PlusInfinity(t) => self.trees[t.0].plus_infinity_edges.push(e, key),
                EdgeHome::PlusPlus(t) => self.trees[t.0].plus_plus_edges.push(e, key),
                EdgeHome::CrossPlusPlus(te) => self.tree_edges[te.0].plus_plus_edges.push(e, key),
                EdgeHome::CrossPlusMinus(te, k) => {
                    self.tree_edges[te.0].plus_minus_edges[k].push(e, key)
                }
            }
        }
        self.edges[e.0].home = home;
    }
    /// Re-homes all the edges attached to the given node
    pub fn rehome_all(&mut self, node: NodeId) {
        for e in self.incident_edges(node) {
            self.rehome(e);
        }
    }
    /// Registers the given minus blossom in the heap of its tree
    pub fn add_minus_blossom(&mut self, node: NodeId) {
        let n = &self.nodes[node.0];
        if let (true, Label::Minus, Some(t)) = (n.is_blossom, n.label, n.tree) {
            let key = n.dual;
            self.trees[t.0].minus_blossoms.push(node, key);
        }
    }
    /// Removes the given minus blossom from the heap of its tree
    pub fn remove_minus_blossom(&mut self, node: NodeId) {
        let n = &self.nodes[node.0];
        if let (true, Label::Minus, Some(t)) = (n.is_blossom, n.label, n.tree) {
            self.trees[t.0].minus_blossoms.remove(node);
        }
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ BLOSSOMS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Allocates a fresh blossom node (reusing a reclaimed slot if possible)
    pub fn new_blossom(&mut self) -> NodeId {
        match self.free_blossoms.pop() {
            Some(id) => {
                self.nodes[id.0] = Node::new(true);
                id
            }
            None => {
                self.nodes.push(Node::new(true));
                NodeId(self.nodes.len() - 1)
            }
        }
    }
    /// Marks the given (expanded) blossom as removed. Once there are too many
    /// removed blossoms, their slots are reclaimed.
    pub fn remove_blossom(&mut self, blossom: NodeId) {
        let node = &mut self.nodes[blossom.0];
        node.clear_tree_links();
        node.is_removed = true;
        node.is_outer = false;
        node.label = Label::Infinity;
        node.matched = None;
        node.blossom_parent = None;
        node.blossom_grandparent = None;
        node.blossom_sibling = None;
        self.removed.push(blossom);

        if self.removed.len() > 4 * self.nb_vertices {
            self.reclaim_removed_blossoms();
        }
    }
    /// Makes the slots of the removed blossoms available for reuse. All the
    /// grandparent shortcuts are reset first since some of them might point
    /// to a removed blossom.
    fn reclaim_removed_blossoms(&mut self) {
        for node in self.nodes.iter_mut() {
            if !node.is_outer && !node.is_removed {
                node.blossom_grandparent = node.blossom_parent;
            }
        }
        self.free_blossoms.append(&mut self.removed);
    }
    /// Returns the child of the outer blossom containing the given node which
    /// contains that node. Grandparent shortcuts are compressed along the way.
    ///
    /// # Note
    /// The node must not be outer.
    pub fn penultimate_blossom(&mut self, node: NodeId) -> NodeId {
        let mut visited = vec![];
        let mut current = node;
        loop {
            let n = &self.nodes[current.0];
            match n.blossom_grandparent {
                Some(g) if g != current && !self.nodes[g.0].is_removed && !self.nodes[g.0].is_outer => {
                    visited.push(current);
                    current = g;
                }
                _ => {
                    let parent = n
                        .blossom_parent
                        .expect("a contracted node always has a parent blossom");
                    if self.nodes[parent.0].is_outer {
                        break;
                    }
                    visited.push(current);
                    current = parent;
                }
            }
        }
        for v in visited {
            self.nodes[v.0].blossom_grandparent = Some(current);
        }
        current
    }
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

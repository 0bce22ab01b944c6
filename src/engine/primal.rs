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

//! This module implements the four primal operations of the algorithm: grow,
//! augment, shrink and expand.
//!
//! All of them preserve the true duals of the nodes and the true slacks of
//! the edges. Whenever a node changes its label, the eps of its tree is
//! flushed in (or spread out of) its dual and the slacks of its edges, and
//! all of its edges are re-homed.

use std::time::Instant;

use log::trace;

use crate::{EdgeHome, EdgeId, Label, NodeId, PrimalUpdater, State, TreeId};

impl PrimalUpdater for State {
    fn grow(&mut self, edge: EdgeId, recursive: bool) -> bool {
        let mut stack = vec![edge];
        while let Some(e) = stack.pop() {
            let [a, b] = self.edges[e.0].head;
            let (plus, inf) = if self.nodes[a.0].label == Label::Infinity {
                (b, a)
            } else {
                (a, b)
            };
            // edges stacked by a recursive grow might have gone stale
            if self.nodes[inf.0].label != Label::Infinity
                || self.nodes[plus.0].label != Label::Plus
                || !self.nodes[inf.0].is_outer
                || !self.nodes[plus.0].is_outer
            {
                continue;
            }
            let Some(tree) = self.nodes[plus.0].tree else {
                continue;
            };
            let matched = self.nodes[inf.0]
                .matched
                .expect("a node out of every tree is always matched");
            let mate = self.opposite(matched, inf);

            trace!("grow {inf:?} and {mate:?} in {tree:?} (via {e:?})");
            self.stats.grow_num += 1;

            self.add_tree_child(plus, inf, e);
            self.add_tree_child(inf, mate, matched);
            self.join_tree(inf, tree, Label::Minus);
            self.join_tree(mate, tree, Label::Plus);

            self.rehome_all(inf);
            self.add_minus_blossom(inf);

            let mut augmenting = None;
            for e2 in self.incident_edges(mate) {
                self.rehome(e2);
                match self.edges[e2.0].home {
                    Some(EdgeHome::CrossPlusPlus(_)) => {
                        if augmenting.is_none() && self.true_slack(e2) <= self.tolerance {
                            augmenting = Some(e2);
                        }
                    }
                    Some(EdgeHome::PlusInfinity(_)) => {
                        if recursive && self.true_slack(e2) <= self.tolerance {
                            stack.push(e2);
                        }
                    }
                    _ => {}
                }
            }
            if let Some(e2) = augmenting {
                self.augment(e2);
                return true;
            }
        }
        false
    }

    fn augment(&mut self, edge: EdgeId) {
        let [a, b] = self.edges[edge.0].head;
        let ta = self.nodes[a.0].tree.expect("augment from a node out of every tree");
        let tb = self.nodes[b.0].tree.expect("augment from a node out of every tree");
        debug_assert_ne!(ta, tb);
        trace!("augment {ta:?} and {tb:?} (via {edge:?})");
        let start = Instant::now();
        self.stats.augment_num += 1;

        self.augment_branch(a, edge);
        self.augment_branch(b, edge);
        self.dissolve_tree(ta);
        self.dissolve_tree(tb);
        self.stats.augment_time += start.elapsed();
    }

    fn shrink(&mut self, edge: EdgeId) -> NodeId {
        let [a, b] = self.edges[edge.0].head;
        let tree = self.nodes[a.0].tree.expect("shrink from a node out of every tree");
        debug_assert_eq!(Some(tree), self.nodes[b.0].tree);
        self.stats.shrink_num += 1;

        let root = self.find_blossom_root(a, b);
        let blossom = self.new_blossom();
        trace!("shrink {blossom:?} rooted in {root:?} (via {edge:?})");

        // link the odd cycle: a -> ... -> root -> ... -> b -> a
        let mut cycle = vec![];
        let mut current = a;
        while current != root {
            let pe = self.nodes[current.0].parent_edge.expect("non root tree node");
            self.nodes[current.0].blossom_sibling = Some(pe);
            cycle.push(current);
            current = self.opposite(pe, current);
        }
        let mut prev_edge = edge;
        let mut current = b;
        while current != root {
            let pe = self.nodes[current.0].parent_edge.expect("non root tree node");
            self.nodes[current.0].blossom_sibling = Some(prev_edge);
            cycle.push(current);
            prev_edge = pe;
            current = self.opposite(pe, current);
        }
        self.nodes[root.0].blossom_sibling = Some(prev_edge);
        cycle.push(root);

        for &v in cycle.iter() {
            let n = &mut self.nodes[v.0];
            n.blossom_parent = Some(blossom);
            n.blossom_grandparent = Some(blossom);
        }

        // remember where the blossom goes in the tree
        let root_is_tree_root = self.nodes[root.0].is_tree_root;
        let root_parent_edge = self.nodes[root.0].parent_edge;
        let mut outer_children = vec![];
        for &v in cycle.iter() {
            for c in self.tree_children(v) {
                if self.nodes[c.0].blossom_parent != Some(blossom) {
                    outer_children.push(c);
                }
            }
        }
        if let Some(pe) = root_parent_edge {
            let parent = self.opposite(pe, root);
            self.remove_tree_child(parent, root);
        }

        // the cycle nodes leave the tree
        for &v in cycle.iter() {
            self.remove_minus_blossom(v);
            self.flush_eps(v);
            let n = &mut self.nodes[v.0];
            n.clear_tree_links();
            n.is_outer = false;
        }

        // the boundary edges are moved onto the blossom
        self.nodes[blossom.0].matched = self.nodes[root.0].matched;
        for &v in cycle.iter() {
            for e in self.incident_edges(v) {
                let dir = self.dir_from(e, v);
                let other = self.edges[e.0].head[1 - dir];
                if self.nodes[other.0].blossom_parent != Some(blossom) {
                    self.move_edge(e, dir, blossom);
                }
            }
        }

        // the blossom takes the place of the cycle in the tree
        self.join_tree(blossom, tree, Label::Plus);
        match root_parent_edge {
            None => {
                self.nodes[blossom.0].is_tree_root = true;
                self.trees[tree.0].root = blossom;
            }
            Some(pe) => {
                let parent = self.opposite(pe, blossom);
                self.add_tree_child(parent, blossom, pe);
            }
        }
        debug_assert_eq!(root_is_tree_root, self.nodes[blossom.0].is_tree_root);
        for c in outer_children {
            let pe = self.nodes[c.0].parent_edge.expect("a tree child has a parent edge");
            self.add_tree_child(blossom, c, pe);
        }

        // inner edges leave their heaps, boundary edges get a new home
        for &v in cycle.iter() {
            self.rehome_all(v);
        }
        self.rehome_all(blossom);
        blossom
    }

    fn expand(&mut self, blossom: NodeId) {
        let tree = self.nodes[blossom.0].tree.expect("only minus blossoms are expanded");
        debug_assert_eq!(Label::Minus, self.nodes[blossom.0].label);
        trace!("expand {blossom:?} in {tree:?}");
        self.stats.expand_num += 1;

        let parent_edge = self.nodes[blossom.0].parent_edge.expect("a minus node has a parent");
        let matched = self.nodes[blossom.0].matched.expect("a minus node is matched");
        let parent = self.opposite(parent_edge, blossom);
        let child = self.opposite(matched, blossom);

        let k_in = {
            let dir = self.dir_from(parent_edge, blossom);
            self.penultimate_blossom(self.edges[parent_edge.0].head_original[dir])
        };
        let k_out = {
            let dir = self.dir_from(matched, blossom);
            self.penultimate_blossom(self.edges[matched.0].head_original[dir])
        };

        // the blossom leaves the tree and gives its edges back to its children
        self.remove_minus_blossom(blossom);
        self.remove_tree_child(parent, blossom);
        self.flush_eps(blossom);
        for e in self.incident_edges(blossom) {
            self.unhome(e);
            let dir = self.dir_from(e, blossom);
            let target = self.penultimate_blossom(self.edges[e.0].head_original[dir]);
            self.move_edge(e, dir, target);
        }

        // walk the cycle in the direction where k_out is at an even distance
        let mut forward = vec![k_in];
        let mut links = vec![];
        loop {
            let last = forward[forward.len() - 1];
            let sibling = self.nodes[last.0].blossom_sibling.expect("a cycle node has a sibling");
            let next = self.opposite(sibling, last);
            links.push(sibling);
            if next == k_in {
                break;
            }
            forward.push(next);
        }
        let len = forward.len();
        let pos_out = forward
            .iter()
            .position(|v| *v == k_out)
            .expect("k_out belongs to the cycle");
        let (order, links) = if pos_out % 2 == 0 {
            (forward, links)
        } else {
            // order[i] = forward[-i], the link between order[i] and order[i+1]
            // is the sibling edge of order[i+1]
            let order = (0..len).map(|i| forward[(len - i) % len]).collect::<Vec<_>>();
            let links = (0..len)
                .map(|i| links[(2 * len - i - 1) % len])
                .collect::<Vec<_>>();
            (order, links)
        };
        let pos_out = order
            .iter()
            .position(|v| *v == k_out)
            .expect("k_out belongs to the cycle");
        debug_assert_eq!(0, pos_out % 2);

        for &v in order.iter() {
            let n = &mut self.nodes[v.0];
            n.is_outer = true;
            n.blossom_parent = None;
            n.blossom_grandparent = None;
            n.blossom_sibling = None;
        }

        // the even branch re-enters the tree
        self.add_tree_child(parent, order[0], parent_edge);
        for i in 0..pos_out {
            self.add_tree_child(order[i], order[i + 1], links[i]);
        }
        self.add_tree_child(order[pos_out], child, matched);
        for i in (0..pos_out).step_by(2) {
            self.nodes[order[i].0].matched = Some(links[i]);
            self.nodes[order[i + 1].0].matched = Some(links[i]);
        }
        self.nodes[order[pos_out].0].matched = Some(matched);
        for (i, &v) in order.iter().enumerate().take(pos_out + 1) {
            let label = if i % 2 == 0 { Label::Minus } else { Label::Plus };
            self.join_tree(v, tree, label);
        }

        // the odd branch is matched pairwise and stays out of the tree
        for j in (pos_out + 1..len).step_by(2) {
            self.nodes[order[j].0].matched = Some(links[j]);
            self.nodes[order[j + 1].0].matched = Some(links[j]);
        }

        for &v in order.iter() {
            self.rehome_all(v);
            self.add_minus_blossom(v);
        }
        self.remove_blossom(blossom);
    }
}

impl State {
    /// Flips the matching along the path going from the given plus node up to
    /// the root of its tree. The given edge becomes matched to that node.
    fn augment_branch(&mut self, node: NodeId, edge: EdgeId) {
        let mut current = node;
        let mut new_match = edge;
        loop {
            let parent_edge = self.nodes[current.0].parent_edge;
            self.nodes[current.0].matched = Some(new_match);
            match parent_edge {
                None => break,
                Some(pe) => {
                    let minus = self.opposite(pe, current);
                    let up = self.nodes[minus.0]
                        .parent_edge
                        .expect("a minus node always has a parent");
                    self.nodes[minus.0].matched = Some(up);
                    current = self.opposite(up, minus);
                    new_match = up;
                }
            }
        }
    }

    /// Turns all the nodes of the given tree into infinity nodes and destroys
    /// the tree.
    fn dissolve_tree(&mut self, tree: TreeId) {
        let root = self.trees[tree.0].root;
        let nodes = self.tree_nodes(root);
        for &v in nodes.iter() {
            self.remove_minus_blossom(v);
            self.flush_eps(v);
            self.nodes[v.0].clear_tree_links();
        }
        for &v in nodes.iter() {
            self.rehome_all(v);
        }
        self.remove_tree(tree);
    }

    /// Returns the first common ancestor of two plus nodes of the same tree.
    /// Both branches are climbed alternately (two levels at a time) and
    /// marked until one of them hits a marked node.
    fn find_blossom_root(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let mut ends = [a, b];
        let mut branch = 0;
        let root = loop {
            let v = ends[branch];
            if self.nodes[v.0].is_marked {
                break v;
            }
            self.nodes[v.0].is_marked = true;
            if self.nodes[v.0].is_tree_root {
                let mut w = ends[1 - branch];
                while !self.nodes[w.0].is_marked {
                    w = self.tree_grandparent(w);
                }
                break w;
            }
            ends[branch] = self.tree_grandparent(v);
            branch = 1 - branch;
        };
        for start in [a, b] {
            let mut v = start;
            while self.nodes[v.0].is_marked {
                self.nodes[v.0].is_marked = false;
                if self.nodes[v.0].is_tree_root {
                    break;
                }
                v = self.tree_grandparent(v);
            }
        }
        root
    }

    /// Returns the plus grandparent of a non root plus node
    fn tree_grandparent(&self, node: NodeId) -> NodeId {
        let minus = self.tree_parent(node).expect("non root plus node");
        self.tree_parent(minus).expect("a minus node always has a parent")
    }
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

#[cfg(test)]
mod test_primal {
    use crate::{EdgeHome, EdgeId, Label, NodeId, PrimalUpdater, State};

    /// Builds a state where the given edges (u, v, weight) are modeled and
    /// the given pairs of edges are matched. All the unmatched vertices are
    /// tree roots and all duals are zero.
    fn state(n: usize, edges: &[(usize, usize, f64)], matched: &[usize]) -> State {
        let mut state = State::new(n, 1e-9);
        for (i, (u, v, w)) in edges.iter().copied().enumerate() {
            state.add_edge(NodeId(u), NodeId(v), w, i);
        }
        for &m in matched {
            let [a, b] = state.edges[m].head;
            state.nodes[a.0].matched = Some(EdgeId(m));
            state.nodes[b.0].matched = Some(EdgeId(m));
        }
        for v in 0..n {
            if state.nodes[v].matched.is_none() {
                state.add_tree(NodeId(v));
            }
        }
        for v in 0..n {
            state.rehome_all(NodeId(v));
        }
        state
    }

    #[test]
    fn grow_adds_a_minus_child_and_a_plus_grandchild() {
        // 0 - 1 = 2 - 3
        let mut state = state(4, &[(0, 1, 0.0), (1, 2, 0.0), (2, 3, 5.0)], &[1]);
        let augmented = state.grow(EdgeId(0), false);
        assert!(!augmented);
        assert_eq!(Label::Minus, state.nodes[1].label);
        assert_eq!(Label::Plus, state.nodes[2].label);
        assert_eq!(Some(NodeId(0)), state.tree_parent(NodeId(1)));
        assert_eq!(Some(NodeId(1)), state.tree_parent(NodeId(2)));
        assert_eq!(1, state.stats.grow_num);
        // 2 and 3 are both plus nodes of different trees
        assert!(matches!(state.edges[2].home, Some(EdgeHome::CrossPlusPlus(_))));
    }

    #[test]
    fn grow_augments_when_it_finds_a_tight_edge_to_another_tree() {
        // 0 - 1 = 2 - 3 with everything tight
        let mut state = state(4, &[(0, 1, 0.0), (1, 2, 0.0), (2, 3, 0.0)], &[1]);
        let augmented = state.grow(EdgeId(0), true);
        assert!(augmented);
        assert_eq!(0, state.tree_num);
        assert_eq!(Some(EdgeId(0)), state.nodes[0].matched);
        assert_eq!(Some(EdgeId(0)), state.nodes[1].matched);
        assert_eq!(Some(EdgeId(2)), state.nodes[2].matched);
        assert_eq!(Some(EdgeId(2)), state.nodes[3].matched);
        for e in 0..3 {
            assert_eq!(None, state.edges[e].home);
        }
    }

    #[test]
    fn recursive_grow_follows_tight_edges() {
        // 0 - 1 = 2 - 3 = 4 and a lonely 5 - 0 edge to keep 5 apart
        let mut state = state(
            6,
            &[(0, 1, 0.0), (1, 2, 0.0), (2, 3, 0.0), (3, 4, 0.0), (4, 5, 9.0)],
            &[1, 3],
        );
        let augmented = state.grow(EdgeId(0), true);
        assert!(!augmented);
        assert_eq!(Label::Plus, state.nodes[4].label);
        assert_eq!(Label::Minus, state.nodes[3].label);
        assert_eq!(2, state.stats.grow_num);
    }

    #[test]
    fn augment_flips_the_matching_and_destroys_both_trees() {
        // 2 - 3 is not tight yet, otherwise the grow would augment on its own
        let mut state = state(4, &[(0, 1, 0.0), (1, 2, 0.0), (2, 3, 1.0)], &[1]);
        assert!(!state.grow(EdgeId(0), false));
        assert_eq!(2, state.tree_num);
        let t0 = state.nodes[0].tree.unwrap();
        let t3 = state.nodes[3].tree.unwrap();
        state.trees[t0.0].eps = 0.5;
        state.trees[t3.0].eps = 0.5;
        state.augment(EdgeId(2));
        assert_eq!(0, state.tree_num);
        assert_eq!(Some(EdgeId(0)), state.nodes[1].matched);
        assert_eq!(Some(EdgeId(2)), state.nodes[3].matched);
        for v in 0..4 {
            assert_eq!(Label::Infinity, state.nodes[v].label);
            assert_eq!(None, state.nodes[v].tree);
        }
    }

    #[test]
    fn augment_preserves_the_dual_objective() {
        let mut state = state(4, &[(0, 1, 0.0), (1, 2, 0.0), (2, 3, 1.0)], &[1]);
        state.grow(EdgeId(0), false);
        // raise both trees so that the edge 2 - 3 gets tight
        let t0 = state.nodes[0].tree.unwrap();
        let t3 = state.nodes[3].tree.unwrap();
        state.trees[t0.0].eps = 0.5;
        state.trees[t3.0].eps = 0.5;
        let before = (0..4).map(|v| state.true_dual(NodeId(v))).sum::<f64>();
        state.augment(EdgeId(2));
        let after = (0..4).map(|v| state.true_dual(NodeId(v))).sum::<f64>();
        assert!((before - after).abs() < 1e-12);
        assert!((state.true_slack(EdgeId(2))).abs() < 1e-12);
    }

    #[test]
    fn shrink_contracts_an_odd_cycle_into_a_plus_blossom() {
        // triangle 0, 1, 2 where 1 = 2 is matched and 0 is the root,
        // plus a pendant 3 matched with nothing (root of its own tree)
        let mut state = state(
            4,
            &[(0, 1, 0.0), (1, 2, 0.0), (2, 0, 0.0), (2, 3, 10.0)],
            &[1],
        );
        state.grow(EdgeId(0), false);
        assert_eq!(Some(EdgeHome::PlusPlus(state.nodes[0].tree.unwrap())), state.edges[2].home);

        let blossom = state.shrink(EdgeId(2));
        let b = &state.nodes[blossom.0];
        assert!(b.is_blossom && b.is_outer && b.is_tree_root);
        assert_eq!(Label::Plus, b.label);
        assert_eq!(None, b.matched);
        for v in 0..3 {
            assert!(!state.nodes[v].is_outer);
            assert_eq!(Some(blossom), state.nodes[v].blossom_parent);
            assert_eq!(None, state.edges[v].home);
        }
        // the cycle is closed
        let mut current = NodeId(0);
        for _ in 0..3 {
            let sibling = state.nodes[current.0].blossom_sibling.unwrap();
            current = state.opposite(sibling, current);
        }
        assert_eq!(NodeId(0), current);
        // the boundary edge now hangs on the blossom
        assert_eq!(blossom, state.edges[3].head[0]);
        assert!(matches!(state.edges[3].home, Some(EdgeHome::CrossPlusPlus(_))));
        assert!((state.true_dual(blossom)).abs() < 1e-12);
    }

    #[test]
    fn expand_restores_the_cycle_in_the_tree() {
        // triangle 1, 2, 3 (2 = 3 matched) hanging between 0 and 4
        let mut state = state(
            6,
            &[
                (1, 2, 0.0), // 0
                (2, 3, 0.0), // 1
                (3, 1, 0.0), // 2
                (0, 2, 0.0), // 3
                (1, 4, 0.0), // 4
                (4, 5, 7.0), // 5
            ],
            &[1],
        );
        // the triangle becomes a plus blossom rooted in 1 ...
        state.grow(EdgeId(0), false);
        let blossom = state.shrink(EdgeId(2));
        let tb = state.nodes[blossom.0].tree.unwrap();
        assert_eq!(blossom, state.trees[tb.0].root);
        // ... which is then matched with 4 ...
        state.augment(EdgeId(4));
        assert_eq!(Some(EdgeId(4)), state.nodes[blossom.0].matched);
        assert_eq!(2, state.tree_num);
        // ... and grown from 0 as a minus blossom
        assert!(!state.grow(EdgeId(3), false));
        let t0 = state.nodes[0].tree.unwrap();
        assert_eq!(Label::Minus, state.nodes[blossom.0].label);
        assert_eq!(Some((blossom, 0.0)), state.trees[t0.0].minus_blossoms.peek());

        state.expand(blossom);
        assert!(state.nodes[blossom.0].is_removed);
        assert!(state.trees[t0.0].minus_blossoms.is_empty());
        // even branch: 2 (minus, holds the parent edge) - 3 (plus) - 1 (minus, holds the match)
        assert_eq!(Label::Minus, state.nodes[2].label);
        assert_eq!(Label::Plus, state.nodes[3].label);
        assert_eq!(Label::Minus, state.nodes[1].label);
        assert_eq!(Some(NodeId(0)), state.tree_parent(NodeId(2)));
        assert_eq!(Some(NodeId(2)), state.tree_parent(NodeId(3)));
        assert_eq!(Some(NodeId(3)), state.tree_parent(NodeId(1)));
        assert_eq!(Some(NodeId(1)), state.tree_parent(NodeId(4)));
        assert_eq!(Some(EdgeId(1)), state.nodes[2].matched);
        assert_eq!(Some(EdgeId(1)), state.nodes[3].matched);
        assert_eq!(Some(EdgeId(4)), state.nodes[1].matched);
        for v in 1..4 {
            assert!(state.nodes[v].is_outer);
            assert_eq!(None, state.nodes[v].blossom_parent);
        }
        assert_eq!(NodeId(2), state.edges[3].head[1]);
        assert_eq!(NodeId(1), state.edges[4].head[0]);
        // 3 - 1 is a (+, -) edge of the tree: it lives in no heap
        assert_eq!(None, state.edges[2].home);
        let mut nodes = state.tree_nodes(NodeId(0));
        nodes.sort_unstable();
        assert_eq!(vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3), NodeId(4)], nodes);
    }
}

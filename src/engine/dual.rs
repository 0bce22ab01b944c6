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

//! This module implements the dual updates. A dual update raises the eps of
//! one or several trees: the true dual of their plus nodes increases by the
//! same amount while the true dual of their minus nodes decreases by that
//! amount. The true slacks must remain non negative, which bounds the
//! admissible increase:
//!
//! * a (+, inf) edge of the tree bounds it by its slack;
//! * a (+, +) edge of the tree bounds it by half of its slack;
//! * a minus blossom bounds it by its dual;
//! * the edges leading to other trees bound it depending on how much these
//!   other trees move.

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::{
    DualUpdateStrategy, DualUpdater, MatchingError, MatchingResult, PrimalUpdater, State,
    TreeId, INFINITY, INFINITY_THRESHOLD,
};

impl DualUpdater for State {
    fn get_eps(&self, tree: TreeId) -> f64 {
        let t = &self.trees[tree.0];
        let mut eps = INFINITY;
        if let Some(slack) = t.plus_infinity_edges.min_key() {
            eps = eps.min(slack);
        }
        if let Some(slack) = t.plus_plus_edges.min_key() {
            eps = eps.min(slack / 2.0);
        }
        if let Some(dual) = t.minus_blossoms.min_key() {
            eps = eps.min(dual);
        }
        eps
    }

    fn update_duals_single(&mut self, tree: TreeId) -> MatchingResult<bool> {
        let mut eps = self.get_eps(tree);
        let mut eps_augment = INFINITY;
        let mut augmenting = None;
        for (other, te) in self.tree_neighbors(tree) {
            let other_eps = self.trees[other.0].eps;
            let te = &self.tree_edges[te.0];
            let dir = te.dir_of(tree);
            if let Some((e, slack)) = te.plus_plus_edges.peek() {
                if slack - other_eps < eps_augment {
                    eps_augment = slack - other_eps;
                    augmenting = Some(e);
                }
            }
            if let Some(slack) = te.plus_minus_edges[dir].min_key() {
                eps = eps.min(slack + other_eps);
            }
        }
        eps = eps.min(eps_augment);
        if eps >= INFINITY_THRESHOLD {
            debug!("{tree:?} can raise its duals indefinitely");
            return Err(MatchingError::NoPerfectMatching);
        }

        let old_eps = self.trees[tree.0].eps;
        let increased = eps > old_eps;
        if increased {
            trace!("{tree:?} eps {old_eps} -> {eps}");
            self.trees[tree.0].eps = eps;
            self.stats.single_dual_updates_num += 1;
        }
        if let Some(e) = augmenting {
            if eps_augment - self.trees[tree.0].eps <= self.tolerance {
                self.augment(e);
            }
        }
        Ok(increased)
    }

    fn update_duals(&mut self, strategy: DualUpdateStrategy) -> MatchingResult<bool> {
        let increased = match strategy {
            DualUpdateStrategy::FixedDelta => self.update_duals_fixed_delta()?,
            DualUpdateStrategy::ConnectedComponents => self.update_duals_connected_components()?,
        };
        if increased {
            self.stats.dual_updates_num += 1;
        }
        Ok(increased)
    }
}

impl State {
    /// Raises all the trees by the same delta
    fn update_duals_fixed_delta(&mut self) -> MatchingResult<bool> {
        let trees = self.live_trees();
        let mut delta = INFINITY;
        for &t in trees.iter() {
            let eps = self.trees[t.0].eps;
            delta = delta.min(self.get_eps(t) - eps);
            for (other, te) in self.tree_neighbors(t) {
                let other_eps = self.trees[other.0].eps;
                if let Some(slack) = self.tree_edges[te.0].plus_plus_edges.min_key() {
                    delta = delta.min((slack - eps - other_eps) / 2.0);
                }
            }
        }
        if delta >= INFINITY_THRESHOLD {
            return Err(MatchingError::NoPerfectMatching);
        }
        if delta > 0.0 {
            debug!("fixed delta dual update: {delta} for {} trees", trees.len());
            for t in trees {
                self.trees[t.0].eps += delta;
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Raises the trees component by component where two trees belong to the
    /// same component when they are linked by a tight (+, -) edge.
    fn update_duals_connected_components(&mut self) -> MatchingResult<bool> {
        let trees = self.live_trees();
        let mut component: FxHashMap<TreeId, usize> = FxHashMap::default();
        let mut nb_components = 0;
        let mut increased = false;

        for &start in trees.iter() {
            if component.contains_key(&start) {
                continue;
            }
            let id = nb_components;
            nb_components += 1;
            component.insert(start, id);

            let mut members = vec![];
            let mut stack = vec![start];
            while let Some(t) = stack.pop() {
                members.push(t);
                let eps = self.trees[t.0].eps;
                for (other, te) in self.tree_neighbors(t) {
                    if component.contains_key(&other) {
                        continue;
                    }
                    let other_eps = self.trees[other.0].eps;
                    let te = &self.tree_edges[te.0];
                    let dir = te.dir_of(t);
                    let tight_out = te.plus_minus_edges[dir]
                        .min_key()
                        .map_or(false, |s| s - eps + other_eps <= self.tolerance);
                    let tight_in = te.plus_minus_edges[1 - dir]
                        .min_key()
                        .map_or(false, |s| s - other_eps + eps <= self.tolerance);
                    if tight_out || tight_in {
                        component.insert(other, id);
                        stack.push(other);
                    }
                }
            }

            let mut delta = INFINITY;
            for &t in members.iter() {
                let eps = self.trees[t.0].eps;
                delta = delta.min(self.get_eps(t) - eps);
                for (other, te) in self.tree_neighbors(t) {
                    let other_eps = self.trees[other.0].eps;
                    let te = &self.tree_edges[te.0];
                    let dir = te.dir_of(t);
                    let plus_plus = te.plus_plus_edges.min_key();
                    if component.get(&other) == Some(&id) {
                        if let Some(slack) = plus_plus {
                            delta = delta.min((slack - eps - other_eps) / 2.0);
                        }
                    } else {
                        if let Some(slack) = plus_plus {
                            delta = delta.min(slack - eps - other_eps);
                        }
                        if let Some(slack) = te.plus_minus_edges[dir].min_key() {
                            delta = delta.min(slack - eps + other_eps);
                        }
                    }
                }
            }
            if delta >= INFINITY_THRESHOLD {
                return Err(MatchingError::NoPerfectMatching);
            }
            if delta > 0.0 {
                trace!("component of {start:?}: {} trees raised by {delta}", members.len());
                for t in members {
                    self.trees[t.0].eps += delta;
                }
                increased = true;
            }
        }
        if increased {
            debug!("connected components dual update over {nb_components} components");
        }
        Ok(increased)
    }
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

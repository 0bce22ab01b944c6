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

//! This module defines what the matching engine hands back to its caller: the
//! matching itself, the dual solution certifying its optimality and some
//! statistics about the resolution.

use std::time::Duration;

use rustc_hash::FxHashSet;

use crate::WeightedGraph;

/// What happened during the resolution
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Statistics {
    /// The number of trees right after the initialization
    pub initial_trees: usize,
    /// The number of grow operations
    pub grow_num: usize,
    /// The number of shrink operations
    pub shrink_num: usize,
    /// The number of expand operations
    pub expand_num: usize,
    /// The number of augment operations
    pub augment_num: usize,
    /// The number of successful global dual updates
    pub dual_updates_num: usize,
    /// The number of successful single tree dual updates
    pub single_dual_updates_num: usize,
    /// Time spent in the initialization
    pub init_time: Duration,
    /// Time spent growing trees (this includes the augmentations triggered by
    /// a grow)
    pub grow_time: Duration,
    /// Time spent shrinking blossoms
    pub shrink_time: Duration,
    /// Time spent expanding blossoms
    pub expand_time: Duration,
    /// Time spent augmenting the matching
    pub augment_time: Duration,
    /// Time spent updating the duals (single tree updates included)
    pub dual_update_time: Duration,
}

/// A set of vertices along with its dual value. The sets of a dual solution
/// form a laminar family: any two of them are either disjoint or nested.
#[derive(Debug, Clone, PartialEq)]
pub struct DualSet {
    pub(crate) vertices: Vec<usize>,
    pub(crate) value: f64,
    pub(crate) parent: Option<usize>,
}

impl DualSet {
    /// The vertices of this set
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }
    /// The dual value of this set
    pub fn value(&self) -> f64 {
        self.value
    }
    /// The index of the smallest set strictly containing this one (if any)
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }
    /// Returns true iff this set is made of one single vertex
    pub fn is_singleton(&self) -> bool {
        self.vertices.len() == 1
    }
}

/// The dual solution certifying the optimality of a matching. The set at index
/// `v < nb_vertices` is the singleton `{v}`, the remaining sets are the
/// blossoms having a non zero dual value.
#[derive(Debug, Clone, PartialEq)]
pub struct DualSolution {
    pub(crate) sets: Vec<DualSet>,
}

impl DualSolution {
    /// All the sets of the dual solution
    pub fn sets(&self) -> &[DualSet] {
        &self.sets
    }
    /// The dual value of the given vertex
    pub fn vertex_dual(&self, vertex: usize) -> f64 {
        self.sets[vertex].value
    }
    /// The value of the dual objective (sum of all dual values)
    pub fn objective(&self) -> f64 {
        self.sets.iter().map(|s| s.value).sum()
    }
    /// Returns the indices of all the sets containing the given vertex (from
    /// the smallest to the largest one)
    fn chain(&self, vertex: usize) -> Vec<usize> {
        let mut out = vec![vertex];
        let mut current = self.sets[vertex].parent;
        while let Some(s) = current {
            out.push(s);
            current = self.sets[s].parent;
        }
        out
    }
    /// Returns the sets containing exactly one of u and v
    fn separating_sets(&self, u: usize, v: usize) -> Vec<usize> {
        let cu = self.chain(u);
        let cv = self.chain(v);
        let su = cu.iter().copied().collect::<FxHashSet<_>>();
        let sv = cv.iter().copied().collect::<FxHashSet<_>>();
        cu.iter()
            .copied()
            .filter(|s| !sv.contains(s))
            .chain(cv.iter().copied().filter(|s| !su.contains(s)))
            .collect()
    }
    /// Returns the reduced cost of an edge (u, v, weight) w.r.t. this dual
    /// solution
    pub fn reduced_cost(&self, u: usize, v: usize, weight: f64) -> f64 {
        weight
            - self
                .separating_sets(u, v)
                .into_iter()
                .map(|s| self.sets[s].value)
                .sum::<f64>()
    }
}

/// A minimum weight perfect matching
#[derive(Debug, Clone)]
pub struct MatchingSolution {
    pub(crate) mates: Vec<usize>,
    pub(crate) matched_edges: Vec<usize>,
    pub(crate) weight: f64,
    pub(crate) tolerance: f64,
    pub(crate) dual: DualSolution,
    pub(crate) statistics: Statistics,
}

impl MatchingSolution {
    /// The matched pairs (u, v) with u < v, sorted
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        self.mates
            .iter()
            .enumerate()
            .filter(|(u, v)| u < *v)
            .map(|(u, v)| (u, *v))
            .collect()
    }
    /// The vertex matched with the given one
    pub fn mate(&self, vertex: usize) -> usize {
        self.mates[vertex]
    }
    /// The index (in the input graph) of the edge covering the given vertex
    pub fn matched_edge(&self, vertex: usize) -> usize {
        self.matched_edges[vertex]
    }
    /// The total weight of the matching
    pub fn weight(&self) -> f64 {
        self.weight
    }
    /// The dual solution certifying the optimality of the matching
    pub fn dual(&self) -> &DualSolution {
        &self.dual
    }
    /// What happened during the resolution
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Verifies that this matching is a minimum weight perfect matching of
    /// the given graph (with the tolerance used during the resolution)
    pub fn is_optimal<G: WeightedGraph>(&self, graph: &G) -> bool {
        self.is_optimal_with(graph, self.tolerance)
    }

    /// Verifies that this matching is a minimum weight perfect matching of
    /// the given graph. This checks that:
    /// * the matching is perfect and only uses edges of the graph;
    /// * the dual solution is feasible (reduced costs and blossom duals are
    ///   non negative);
    /// * complementary slackness holds: matched edges have a zero reduced
    ///   cost and blossoms with a positive dual have exactly one matched edge
    ///   leaving them.
    pub fn is_optimal_with<G: WeightedGraph>(&self, graph: &G, tolerance: f64) -> bool {
        let n = graph.nb_vertices();
        if self.mates.len() != n || self.matched_edges.len() != n || self.dual.sets.len() < n {
            return false;
        }
        for v in 0..n {
            let mate = self.mates[v];
            if mate >= n || mate == v || self.mates[mate] != v {
                return false;
            }
            let index = self.matched_edges[v];
            if index >= graph.nb_edges() || self.matched_edges[mate] != index {
                return false;
            }
            let edge = graph.edge(index);
            let ends_ok = (edge.source == v && edge.target == mate)
                || (edge.source == mate && edge.target == v);
            if !ends_ok || !edge.weight.is_finite() {
                return false;
            }
        }

        let blossoms = &self.dual.sets[n..];
        if blossoms.iter().any(|s| s.value < -tolerance) {
            return false;
        }

        let mut feasible = true;
        graph.for_each_edge(|index, edge| {
            if !feasible || edge.source == edge.target || !edge.weight.is_finite() {
                return;
            }
            if edge.source >= n || edge.target >= n {
                feasible = false;
                return;
            }
            let slack = self.dual.reduced_cost(edge.source, edge.target, edge.weight);
            if slack < -tolerance {
                feasible = false;
            }
            if self.matched_edges[edge.source] == index && slack.abs() > tolerance {
                feasible = false;
            }
        });
        if !feasible {
            return false;
        }

        let mut leaving = vec![0_usize; self.dual.sets.len()];
        for (u, v) in self.pairs() {
            for s in self.dual.separating_sets(u, v) {
                leaving[s] += 1;
            }
        }
        self.dual
            .sets
            .iter()
            .enumerate()
            .skip(n)
            .all(|(i, s)| s.value <= tolerance || leaving[i] == 1)
    }
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

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

//! This module provides the definition of the matching engine's core
//! abstractions: the errors it may raise, the options that tune it and the
//! traits splitting the responsibilities of the primal and dual updates.

use crate::{EdgeId, NodeId, TreeId};

/// A value that is larger than any meaningful dual or slack
pub(crate) const INFINITY: f64 = 1e100;
/// When the dual change of some tree reaches this threshold, the tree is not
/// constrained by anything: the dual problem is unbounded.
pub(crate) const INFINITY_THRESHOLD: f64 = 1e90;

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ ERRORS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// This is the kind of error that gets raised whenever a matching cannot be
/// computed
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq)]
pub enum MatchingError {
    /// The graph has no vertex at all
    #[error("the graph has no vertex")]
    NoVertices,
    /// A graph with an odd number of vertices has no perfect matching
    #[error("the graph has an odd number of vertices ({0})")]
    OddVertexCount(usize),
    /// Some edge refers to a vertex that does not exist
    #[error("edge {edge} refers to vertex {vertex} but the graph only has {nb_vertices} vertices")]
    VertexOutOfRange {
        /// the index of the faulty edge
        edge: usize,
        /// the vertex which does not exist
        vertex: usize,
        /// the number of vertices of the graph
        nb_vertices: usize,
    },
    /// Some edge has a negative or NaN weight
    #[error("edge {edge} has an invalid weight ({weight})")]
    InvalidWeight {
        /// the index of the faulty edge
        edge: usize,
        /// its weight
        weight: f64,
    },
    /// The graph has no perfect matching
    #[error("the graph has no perfect matching")]
    NoPerfectMatching,
}

/// The result of a matching operation. (Note: the computation fails when the
/// input is invalid or admits no perfect matching)
pub type MatchingResult<T> = Result<T, MatchingError>;

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ OPTIONS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// How the initial duals and matching are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Initialization {
    /// All duals are zero and every vertex is the root of its own tree
    None,
    /// Duals are greedily raised and matched along the tight edges
    #[default]
    Greedy,
    /// Duals and matching are derived from an optimal fractional matching
    Fractional,
}

/// How the duals of the trees are jointly updated when no tree can make any
/// progress on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DualUpdateStrategy {
    /// All trees move by one common delta
    FixedDelta,
    /// Trees connected by tight (+, -) edges move together, each group by its
    /// own delta
    #[default]
    ConnectedComponents,
}

/// When a tree tries to raise its own dual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SingleTreeUpdate {
    /// Before any primal operation is attempted on the tree
    Before,
    /// Once no primal operation applies to the tree anymore
    #[default]
    After,
}

/// The options which tune the behavior of the matching engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    /// How the initial duals and matching are computed
    pub initialization: Initialization,
    /// How the duals are updated when all trees are stuck
    pub dual_update: DualUpdateStrategy,
    /// When the single tree dual updates are performed
    pub single_tree_update: SingleTreeUpdate,
    /// The threshold below which a slack (or a dual) is considered zero
    pub tolerance: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initialization: Initialization::default(),
            dual_update: DualUpdateStrategy::default(),
            single_tree_update: SingleTreeUpdate::default(),
            tolerance: 1e-9,
        }
    }
}

impl Options {
    /// Sets the initialization strategy
    pub fn initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }
    /// Sets the dual update strategy
    pub fn dual_update(mut self, dual_update: DualUpdateStrategy) -> Self {
        self.dual_update = dual_update;
        self
    }
    /// Sets the moment when single tree updates are performed
    pub fn single_tree_update(mut self, single_tree_update: SingleTreeUpdate) -> Self {
        self.single_tree_update = single_tree_update;
        self
    }
    /// Sets the tolerance used to decide whether a slack is zero
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~ UPDATERS ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
//~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The primal updater is the portion of the engine which changes the matching
/// and the structure of the alternating trees. It never changes a true dual.
pub(crate) trait PrimalUpdater {
    /// Grows the tree of the plus end of the given tight (+, inf) edge: the
    /// infinity node becomes a minus child and its mate a plus grandchild.
    /// When `recursive` is set, the tight (+, inf) edges of the new plus
    /// nodes are grown too.
    ///
    /// Returns true iff an augmentation took place in the meantime.
    fn grow(&mut self, edge: EdgeId, recursive: bool) -> bool;
    /// Augments the matching along the given tight (+, +) edge linking two
    /// different trees. Both trees are destroyed.
    fn augment(&mut self, edge: EdgeId);
    /// Contracts the odd cycle closed by the given tight (+, +) edge (whose
    /// ends belong to the same tree) into a new plus blossom.
    fn shrink(&mut self, edge: EdgeId) -> NodeId;
    /// Expands a minus blossom whose dual has dropped to zero.
    fn expand(&mut self, blossom: NodeId);
}

/// The dual updater is the portion of the engine which raises the eps of the
/// trees while keeping all slacks non negative.
pub(crate) trait DualUpdater {
    /// Returns the largest eps the tree could take without considering the
    /// edges which lead to other trees.
    fn get_eps(&self, tree: TreeId) -> f64;
    /// Raises the eps of the given tree as much as possible (considering the
    /// other trees as fixed). When this makes some (+, +) edge between trees
    /// tight, that edge is augmented.
    ///
    /// Returns true iff the eps of the tree has increased.
    fn update_duals_single(&mut self, tree: TreeId) -> MatchingResult<bool>;
    /// Jointly raises the eps of all the trees with the given strategy.
    ///
    /// Returns true iff the eps of some tree has increased.
    fn update_duals(&mut self, strategy: DualUpdateStrategy) -> MatchingResult<bool>;
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

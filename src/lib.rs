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

//! # blossomv-rs
//! This crate computes minimum weight perfect matchings in general
//! (non-bipartite) undirected graphs with Kolmogorov's Blossom V algorithm.
//! Along with the matching, it hands back a dual solution which certifies
//! its optimality.
//!
//! ## Example
//! ```
//! use blossomv_rs::{minimum_weight_perfect_matching, EdgeList};
//!
//! let graph = EdgeList::from_edges(4, [
//!     (0, 1, 8.0), (1, 2, 9.0), (2, 3, 8.0), (3, 0, 8.0), (0, 2, 1.0),
//! ]);
//! let solution = minimum_weight_perfect_matching(&graph).unwrap();
//! assert_eq!(16.0, solution.weight());
//! assert_eq!(vec![(0, 1), (2, 3)], solution.pairs());
//! assert!(solution.is_optimal(&graph));
//! ```
//!
//! ## Tuning
//! The behavior of the engine can be tuned through its `Options`:
//! ```
//! use blossomv_rs::{BlossomV, DualUpdateStrategy, EdgeList, Initialization, Options};
//!
//! let graph = EdgeList::from_edges(2, [(0, 1, 5.0)]);
//! let options = Options::default()
//!     .initialization(Initialization::Fractional)
//!     .dual_update(DualUpdateStrategy::FixedDelta);
//! let solution = BlossomV::new(options).solve(&graph).unwrap();
//! assert_eq!(5.0, solution.weight());
//! ```

mod engine;
mod graph;
mod state;

pub use engine::*;
pub use graph::*;
pub(crate) use state::*;

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

//! The engine module comprises the matching algorithm proper. The 'core'
//! submodule defines the errors, the options and the abstractions of the
//! primal and dual operations; 'primal' and 'dual' implement these operations
//! on top of the state, 'init' computes the starting point of the search and
//! 'solver' drives the whole thing before handing a 'solution' back.

mod core;
mod dual;
mod init;
mod primal;
mod solution;
mod solver;

pub use self::core::*;
pub use solution::*;
pub use solver::*;

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

//! This module builds the initial state of the matching engine from the input
//! graph: it validates the graph, computes a first feasible dual solution
//! (along with a partial matching that is tight w.r.t. these duals) and
//! allocates one alternating tree per unmatched vertex.

use std::{cmp::Reverse, collections::BinaryHeap};

use log::debug;
use ordered_float::OrderedFloat;

use crate::{
    EdgeId, Initialization, MatchingError, MatchingResult, NodeId, State, WeightedGraph, INFINITY,
};

impl State {
    /// Creates the graph model of the given graph (one node per vertex and one
    /// edge per usable graph edge). Loops and forbidden edges are not modeled.
    pub(crate) fn from_graph<G: WeightedGraph>(graph: &G, tolerance: f64) -> MatchingResult<Self> {
        let nb_vertices = graph.nb_vertices();
        if nb_vertices == 0 {
            return Err(MatchingError::NoVertices);
        }
        if nb_vertices % 2 == 1 {
            return Err(MatchingError::OddVertexCount(nb_vertices));
        }

        let mut state = State::new(nb_vertices, tolerance);
        let mut error = None;
        graph.for_each_edge(|i, edge| {
            if error.is_some() {
                return;
            }
            for vertex in [edge.source, edge.target] {
                if vertex >= nb_vertices {
                    error = Some(MatchingError::VertexOutOfRange {
                        edge: i,
                        vertex,
                        nb_vertices,
                    });
                    return;
                }
            }
            if edge.weight.is_nan() || edge.weight < 0.0 {
                error = Some(MatchingError::InvalidWeight {
                    edge: i,
                    weight: edge.weight,
                });
                return;
            }
            if edge.source != edge.target && edge.weight.is_finite() {
                state.add_edge(NodeId(edge.source), NodeId(edge.target), edge.weight, i);
            }
        });
        if let Some(error) = error {
            return Err(error);
        }
        state.graph_edges.resize(graph.nb_edges(), None);
        if let Some(isolated) = graph.degrees().iter().position(|d| *d == 0) {
            debug!("vertex {isolated} has no usable edge");
            return Err(MatchingError::NoPerfectMatching);
        }
        Ok(state)
    }

    /// Computes the initial duals and matching with the given strategy and
    /// allocates the trees
    pub(crate) fn initialize(&mut self, init: Initialization) -> MatchingResult<()> {
        match init {
            Initialization::None => {}
            Initialization::Greedy => self.init_greedy(),
            Initialization::Fractional => self.init_fractional()?,
        }
        self.allocate_trees();
        self.stats.initial_trees = self.tree_num;
        debug!(
            "{init:?} initialization: {} vertices, {} edges, {} trees",
            self.nb_vertices,
            self.edges.len(),
            self.tree_num
        );
        Ok(())
    }

    /// Creates one tree per unmatched vertex and puts the edges of these roots
    /// in the heaps where they belong
    fn allocate_trees(&mut self) {
        let mut roots = vec![];
        for v in 0..self.nb_vertices {
            if self.nodes[v].matched.is_none() {
                self.add_tree(NodeId(v));
                roots.push(NodeId(v));
            }
        }
        for root in roots {
            self.rehome_all(root);
        }
    }

    /// Sets the slack of every edge to its reduced cost w.r.t. the current duals
    fn compute_slacks(&mut self) {
        for e in self.edges.iter_mut() {
            let [u, v] = e.head;
            e.slack = e.weight - self.nodes[u.0].dual - self.nodes[v.0].dual;
        }
    }

    /// Matches the two vertices along the given edge
    fn match_edge(&mut self, e: EdgeId) {
        let [u, v] = self.edges[e.0].head;
        self.nodes[u.0].matched = Some(e);
        self.nodes[v.0].matched = Some(e);
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ GREEDY ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Each vertex first takes half of its lightest edge as dual. Then every
    /// unmatched vertex raises its dual as much as it can and gets matched
    /// along a tight edge to an unmatched neighbor (when there is one).
    fn init_greedy(&mut self) {
        for node in self.nodes.iter_mut() {
            node.dual = INFINITY;
        }
        for e in self.edges.iter() {
            for v in e.head {
                let dual = &mut self.nodes[v.0].dual;
                *dual = dual.min(e.weight);
            }
        }
        for node in self.nodes.iter_mut() {
            node.dual /= 2.0;
        }
        self.compute_slacks();

        for v in 0..self.nb_vertices {
            if self.nodes[v].matched.is_some() {
                continue;
            }
            let incident = self.incident_edges(NodeId(v));
            let min_slack = incident
                .iter()
                .map(|e| self.edges[e.0].slack)
                .fold(INFINITY, f64::min);
            self.nodes[v].dual += min_slack;
            for e in incident.iter() {
                self.edges[e.0].slack -= min_slack;
            }
            let tight = incident.iter().copied().find(|e| {
                self.edges[e.0].slack <= 0.0
                    && self.nodes[self.opposite(*e, NodeId(v)).0].matched.is_none()
            });
            if let Some(e) = tight {
                self.match_edge(e);
            }
        }
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ FRACTIONAL ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Computes an optimal fractional perfect matching (that is an optimal
    /// assignment in the bipartite double cover of the graph where each vertex
    /// v has a left copy and a right copy, and each edge {u, v} yields the arcs
    /// (u, v) and (v, u)). The assignment is computed with successive shortest
    /// paths (Dijkstra on the reduced costs).
    ///
    /// The duals of the left and right copies are then averaged, which gives a
    /// feasible dual solution that is tight on every edge of the assignment.
    /// The assignment decomposes in cycles: the even ones are matched
    /// alternately, the odd ones too except for one vertex which becomes the
    /// root of a tree.
    fn init_fractional(&mut self) -> MatchingResult<()> {
        let n = self.nb_vertices;
        let mut left = vec![0.0; n];
        let mut right = vec![INFINITY; n];
        for e in self.edges.iter() {
            for v in e.head {
                right[v.0] = f64::min(right[v.0], e.weight);
            }
        }

        let mut mate_left: Vec<Option<(usize, EdgeId)>> = vec![None; n];
        let mut mate_right: Vec<Option<usize>> = vec![None; n];
        let mut dist_left = vec![INFINITY; n];
        let mut dist_right = vec![INFINITY; n];
        let mut done_left = vec![false; n];
        let mut done_right = vec![false; n];
        let mut pred_right: Vec<Option<(usize, EdgeId)>> = vec![None; n];

        for source in 0..n {
            dist_left.fill(INFINITY);
            dist_right.fill(INFINITY);
            done_left.fill(false);
            done_right.fill(false);
            pred_right.fill(None);

            let mut visited_left = vec![];
            let mut visited_right = vec![];
            let mut heap = BinaryHeap::new();
            dist_left[source] = 0.0;
            heap.push(Reverse((OrderedFloat(0.0), Side::Left, source)));

            let mut sink = None;
            while let Some(Reverse((OrderedFloat(d), side, x))) = heap.pop() {
                match side {
                    Side::Left => {
                        if done_left[x] {
                            continue;
                        }
                        done_left[x] = true;
                        visited_left.push(x);
                        for &e in self.nodes[x].edges.iter() {
                            let j = self.opposite(e, NodeId(x)).0;
                            if done_right[j] {
                                continue;
                            }
                            let reduced = (self.edges[e.0].weight - left[x] - right[j]).max(0.0);
                            if d + reduced < dist_right[j] {
                                dist_right[j] = d + reduced;
                                pred_right[j] = Some((x, e));
                                heap.push(Reverse((OrderedFloat(d + reduced), Side::Right, j)));
                            }
                        }
                    }
                    Side::Right => {
                        if done_right[x] {
                            continue;
                        }
                        done_right[x] = true;
                        visited_right.push(x);
                        match mate_right[x] {
                            None => {
                                sink = Some((x, d));
                                break;
                            }
                            Some(i) => {
                                if !done_left[i] && d < dist_left[i] {
                                    dist_left[i] = d;
                                    heap.push(Reverse((OrderedFloat(d), Side::Left, i)));
                                }
                            }
                        }
                    }
                }
            }

            let Some((sink, length)) = sink else {
                debug!("the double cover has no perfect assignment");
                return Err(MatchingError::NoPerfectMatching);
            };
            for i in visited_left {
                left[i] += length - dist_left[i];
            }
            for j in visited_right {
                right[j] -= length - dist_right[j];
            }

            let mut j = sink;
            loop {
                let (i, e) = pred_right[j].expect("a reached right vertex has a predecessor");
                let previous = mate_left[i];
                mate_left[i] = Some((j, e));
                mate_right[j] = Some(i);
                if i == source {
                    break;
                }
                j = previous.expect("a left vertex other than the source is matched").0;
            }
        }

        for v in 0..n {
            self.nodes[v].dual = (left[v] + right[v]) / 2.0;
        }
        self.compute_slacks();

        let mut visited = vec![false; n];
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut cycle = vec![];
            let mut links = vec![];
            let mut v = start;
            while !visited[v] {
                visited[v] = true;
                cycle.push(v);
                let (next, e) = mate_left[v].expect("the assignment is perfect");
                links.push(e);
                v = next;
            }
            let first = if cycle.len() % 2 == 0 { 0 } else { 1 };
            for i in (first..cycle.len()).step_by(2) {
                self.match_edge(links[i]);
            }
        }
        Ok(())
    }
}

/// The side of a vertex copy in the double cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Left,
    Right,
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

#[cfg(test)]
mod test_init {
    use crate::{EdgeId, EdgeList, Initialization, MatchingError, State};

    fn true_slacks_are_feasible(state: &State) -> bool {
        (0..state.edges.len()).all(|i| state.true_slack(EdgeId(i)) >= -1e-9)
    }

    fn matched_edges_are_tight(state: &State) -> bool {
        state
            .nodes
            .iter()
            .filter_map(|n| n.matched)
            .all(|e| state.true_slack(e).abs() <= 1e-9)
    }

    #[test]
    fn an_empty_graph_is_rejected() {
        let graph = EdgeList::new(0);
        assert_eq!(Err(MatchingError::NoVertices), State::from_graph(&graph, 1e-9).map(|_| ()));
    }

    #[test]
    fn an_odd_graph_is_rejected() {
        let graph = EdgeList::from_edges(3, [(0, 1, 1.0), (1, 2, 1.0)]);
        assert_eq!(
            Err(MatchingError::OddVertexCount(3)),
            State::from_graph(&graph, 1e-9).map(|_| ())
        );
    }

    #[test]
    fn out_of_range_vertices_are_rejected() {
        let graph = EdgeList::from_edges(2, [(0, 1, 1.0), (1, 5, 1.0)]);
        assert_eq!(
            Err(MatchingError::VertexOutOfRange {
                edge: 1,
                vertex: 5,
                nb_vertices: 2
            }),
            State::from_graph(&graph, 1e-9).map(|_| ())
        );
    }

    #[test]
    fn negative_weights_are_rejected() {
        let graph = EdgeList::from_edges(2, [(0, 1, -1.0)]);
        assert_eq!(
            Err(MatchingError::InvalidWeight {
                edge: 0,
                weight: -1.0
            }),
            State::from_graph(&graph, 1e-9).map(|_| ())
        );
    }

    #[test]
    fn isolated_vertices_make_the_problem_infeasible() {
        let graph = EdgeList::from_edges(4, [(0, 1, 1.0), (1, 2, 1.0), (3, 3, 1.0)]);
        assert_eq!(
            Err(MatchingError::NoPerfectMatching),
            State::from_graph(&graph, 1e-9).map(|_| ())
        );
    }

    #[test]
    fn a_vertex_with_forbidden_edges_only_is_isolated() {
        let graph = EdgeList::from_edges(4, [(0, 1, f64::INFINITY), (1, 2, 1.0), (2, 3, 1.0)]);
        assert_eq!(
            Err(MatchingError::NoPerfectMatching),
            State::from_graph(&graph, 1e-9).map(|_| ())
        );
    }

    #[test]
    fn loops_and_forbidden_edges_are_not_modeled() {
        let graph = EdgeList::from_edges(
            2,
            [(0, 0, 1.0), (0, 1, f64::INFINITY), (1, 0, 3.0)],
        );
        let state = State::from_graph(&graph, 1e-9).unwrap();
        assert_eq!(1, state.edges.len());
        assert_eq!(vec![None, None, Some(EdgeId(0))], state.graph_edges);
    }

    #[test]
    fn none_initialization_makes_one_tree_per_vertex() {
        let graph = EdgeList::from_edges(4, [(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0)]);
        let mut state = State::from_graph(&graph, 1e-9).unwrap();
        state.initialize(Initialization::None).unwrap();
        assert_eq!(4, state.tree_num);
        assert_eq!(4, state.stats.initial_trees);
        assert!(state.nodes.iter().all(|n| n.dual == 0.0));
    }

    #[test]
    fn greedy_initialization_matches_along_tight_edges() {
        let graph = EdgeList::from_edges(4, [(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0)]);
        let mut state = State::from_graph(&graph, 1e-9).unwrap();
        state.initialize(Initialization::Greedy).unwrap();
        assert!(true_slacks_are_feasible(&state));
        assert!(matched_edges_are_tight(&state));
        // 0 - 1 gets matched first, then 2 - 3
        assert_eq!(0, state.tree_num);
    }

    #[test]
    fn greedy_initialization_leaves_trees_when_it_gets_stuck() {
        // a star: only one leaf can be matched with the center
        let graph = EdgeList::from_edges(
            6,
            [(0, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0), (3, 4, 5.0), (4, 5, 1.0), (2, 5, 7.0)],
        );
        let mut state = State::from_graph(&graph, 1e-9).unwrap();
        state.initialize(Initialization::Greedy).unwrap();
        assert!(true_slacks_are_feasible(&state));
        assert!(matched_edges_are_tight(&state));
        assert_eq!(state.stats.initial_trees, state.tree_num);
        assert_eq!(0, state.tree_num % 2);
    }

    #[test]
    fn fractional_initialization_is_feasible_and_tight() {
        // two triangles linked by an edge: the fractional optimum is made of
        // two odd cycles
        let graph = EdgeList::from_edges(
            6,
            [
                (0, 1, 1.0),
                (1, 2, 1.0),
                (2, 0, 1.0),
                (3, 4, 1.0),
                (4, 5, 1.0),
                (5, 3, 1.0),
                (2, 3, 10.0),
            ],
        );
        let mut state = State::from_graph(&graph, 1e-9).unwrap();
        state.initialize(Initialization::Fractional).unwrap();
        assert!(true_slacks_are_feasible(&state));
        assert!(matched_edges_are_tight(&state));
        assert_eq!(2, state.tree_num);
        let objective = state.nodes.iter().map(|n| n.dual).sum::<f64>();
        assert!((objective - 3.0).abs() < 1e-9);
    }

    #[test]
    fn fractional_initialization_detects_infeasibility() {
        // a star with three leaves has no fractional perfect matching
        let graph = EdgeList::from_edges(4, [(0, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0)]);
        let mut state = State::from_graph(&graph, 1e-9).unwrap();
        assert_eq!(
            Err(MatchingError::NoPerfectMatching),
            state.initialize(Initialization::Fractional)
        );
    }
}

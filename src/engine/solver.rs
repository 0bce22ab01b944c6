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

//! This module provides the matching driver: the main loop which alternates
//! between primal operations and dual updates until every vertex is matched,
//! and the extraction of the final matching and of its dual certificate.

use std::time::Instant;

use log::debug;

use crate::{
    DualSet, DualSolution, DualUpdateStrategy, DualUpdater, MatchingError, MatchingResult,
    MatchingSolution, NodeId, Options, PrimalUpdater, SingleTreeUpdate, State, TreeId,
    WeightedGraph,
};

/// The entry point of the library: a configured matching engine
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlossomV {
    options: Options,
}

impl BlossomV {
    /// Creates a new engine with the given options
    pub fn new(options: Options) -> Self {
        Self { options }
    }
    /// The options of this engine
    pub fn options(&self) -> &Options {
        &self.options
    }
    /// Computes a minimum weight perfect matching of the given graph
    pub fn solve<G: WeightedGraph>(&self, graph: &G) -> MatchingResult<MatchingSolution> {
        let start = Instant::now();
        let mut state = State::from_graph(graph, self.options.tolerance)?;
        state.initialize(self.options.initialization)?;
        state.stats.init_time = start.elapsed();

        state.run(&self.options)?;
        let solution = state.solution();
        debug!(
            "perfect matching of weight {} found in {:?}: {:?}",
            solution.weight(),
            start.elapsed(),
            solution.statistics()
        );
        Ok(solution)
    }
}

/// Computes a minimum weight perfect matching of the given graph with the
/// default options
pub fn minimum_weight_perfect_matching<G: WeightedGraph>(
    graph: &G,
) -> MatchingResult<MatchingSolution> {
    BlossomV::default().solve(graph)
}

impl State {
    /// Runs the main loop until there is no tree left
    fn run(&mut self, options: &Options) -> MatchingResult<()> {
        while self.tree_num > 0 {
            let trees_before = self.tree_num;
            let changes_before = self.nb_changes();

            for tree in self.live_trees() {
                if !self.is_alive(tree) {
                    continue;
                }
                if options.single_tree_update == SingleTreeUpdate::Before {
                    self.timed_update_single(tree)?;
                    if !self.is_alive(tree) {
                        continue;
                    }
                }
                loop {
                    self.process_tree(tree);
                    if !self.is_alive(tree) {
                        break;
                    }
                    if options.single_tree_update == SingleTreeUpdate::After
                        && self.timed_update_single(tree)?
                        && self.is_alive(tree)
                    {
                        continue;
                    }
                    break;
                }
            }

            if self.tree_num > 0 && self.tree_num == trees_before {
                let mut progress = self.timed_update_global(options.dual_update)?;
                if !progress && options.dual_update == DualUpdateStrategy::FixedDelta {
                    progress = self.timed_update_global(DualUpdateStrategy::ConnectedComponents)?;
                }
                if !progress && self.nb_changes() == changes_before {
                    debug!("no progress can be made with {} trees left", self.tree_num);
                    return Err(MatchingError::NoPerfectMatching);
                }
            }
        }
        Ok(())
    }

    /// Applies primal operations to the tree for as long as possible
    fn process_tree(&mut self, tree: TreeId) {
        while self.is_alive(tree) {
            let t = &self.trees[tree.0];
            let eps = t.eps;
            let tol = self.tolerance;
            if let Some((e, slack)) = t.plus_infinity_edges.peek() {
                if slack - eps <= tol {
                    let start = Instant::now();
                    self.grow(e, true);
                    self.stats.grow_time += start.elapsed();
                    continue;
                }
            }
            if let Some((e, slack)) = t.plus_plus_edges.peek() {
                if slack - 2.0 * eps <= tol {
                    let start = Instant::now();
                    self.shrink(e);
                    self.stats.shrink_time += start.elapsed();
                    continue;
                }
            }
            if let Some((b, dual)) = t.minus_blossoms.peek() {
                if dual - eps <= tol {
                    let start = Instant::now();
                    self.expand(b);
                    self.stats.expand_time += start.elapsed();
                    continue;
                }
            }
            break;
        }
    }

    fn timed_update_single(&mut self, tree: TreeId) -> MatchingResult<bool> {
        let start = Instant::now();
        let result = self.update_duals_single(tree);
        self.stats.dual_update_time += start.elapsed();
        result
    }

    fn timed_update_global(&mut self, strategy: DualUpdateStrategy) -> MatchingResult<bool> {
        let start = Instant::now();
        let result = self.update_duals(strategy);
        self.stats.dual_update_time += start.elapsed();
        result
    }

    /// The number of operations which changed the state so far
    fn nb_changes(&self) -> usize {
        let s = &self.stats;
        s.grow_num + s.shrink_num + s.expand_num + s.augment_num + s.single_dual_updates_num
    }

    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~ FINAL SOLUTION ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    //~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Extracts the matching and its dual certificate from the final state
    fn solution(&mut self) -> MatchingSolution {
        self.expand_matching();

        let n = self.nb_vertices;
        let mut mates = vec![0; n];
        let mut matched_edges = vec![0; n];
        let mut weight = 0.0;
        for v in 0..n {
            let e = self.nodes[v]
                .matched
                .expect("every vertex is matched once no tree is left");
            let edge = &self.edges[e.0];
            let [a, b] = edge.head_original;
            let mate = if a == NodeId(v) { b } else { a };
            debug_assert_eq!(Some(e), self.nodes[mate.0].matched);
            mates[v] = mate.0;
            matched_edges[v] = edge.graph_edge;
            if v < mate.0 {
                weight += edge.weight;
            }
        }

        MatchingSolution {
            mates,
            matched_edges,
            weight,
            tolerance: self.tolerance,
            dual: self.dual_solution(),
            statistics: self.stats,
        }
    }

    /// Propagates the matching down the blossom hierarchy: in every blossom,
    /// the child holding the matched edge of the blossom is matched with it,
    /// the other children are matched pairwise along the odd cycle.
    fn expand_matching(&mut self) {
        // (blossom, original vertex of the blossom covered by its matched edge)
        let mut stack = vec![];
        for i in self.nb_vertices..self.nodes.len() {
            let node = &self.nodes[i];
            if node.is_outer && !node.is_removed {
                let e = node.matched.expect("every outer node is matched once no tree is left");
                let dir = self.dir_from(e, NodeId(i));
                stack.push((NodeId(i), self.edges[e.0].head_original[dir]));
            }
        }

        while let Some((blossom, anchor)) = stack.pop() {
            let matched = self.nodes[blossom.0].matched;
            let mut base = anchor;
            while self.nodes[base.0].blossom_parent != Some(blossom) {
                base = self.nodes[base.0]
                    .blossom_parent
                    .expect("the anchor belongs to the blossom");
            }

            let mut cycle = vec![base];
            loop {
                let last = cycle[cycle.len() - 1];
                let sibling = self.nodes[last.0].blossom_sibling.expect("a cycle node has a sibling");
                let next = self.opposite(sibling, last);
                if next == base {
                    break;
                }
                cycle.push(next);
            }

            self.nodes[base.0].matched = matched;
            if self.nodes[base.0].is_blossom {
                stack.push((base, anchor));
            }
            for i in (1..cycle.len()).step_by(2) {
                let (x, y) = (cycle[i], cycle[i + 1]);
                let e = self.nodes[x.0].blossom_sibling.expect("a cycle node has a sibling");
                for z in [x, y] {
                    self.nodes[z.0].matched = Some(e);
                    if self.nodes[z.0].is_blossom {
                        let dir = self.dir_from(e, z);
                        stack.push((z, self.edges[e.0].head_original[dir]));
                    }
                }
            }
        }
    }

    /// Collects the duals of the vertices and of the blossoms having a non
    /// zero dual
    fn dual_solution(&self) -> DualSolution {
        let n = self.nb_vertices;
        let mut index = vec![None; self.nodes.len()];
        let mut sets = vec![];
        for v in 0..n {
            index[v] = Some(v);
            sets.push(DualSet {
                vertices: vec![v],
                value: self.true_dual(NodeId(v)),
                parent: None,
            });
        }
        for i in n..self.nodes.len() {
            let node = &self.nodes[i];
            if !node.is_removed && node.dual != 0.0 {
                index[i] = Some(sets.len());
                sets.push(DualSet {
                    vertices: vec![],
                    value: self.true_dual(NodeId(i)),
                    parent: None,
                });
            }
        }

        // nearest kept ancestor of every kept node
        for i in 0..self.nodes.len() {
            let Some(set) = index[i] else { continue };
            let mut current = self.nodes[i].blossom_parent;
            while let Some(p) = current {
                if let Some(parent) = index[p.0] {
                    sets[set].parent = Some(parent);
                    break;
                }
                current = self.nodes[p.0].blossom_parent;
            }
        }
        for v in 0..n {
            let mut current = sets[v].parent;
            while let Some(s) = current {
                sets[s].vertices.push(v);
                current = sets[s].parent;
            }
        }
        DualSolution { sets }
    }
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

#[cfg(test)]
mod test_solver {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::{
        minimum_weight_perfect_matching, BlossomV, DualUpdateStrategy, EdgeList, Initialization,
        MatchingError, Options, SingleTreeUpdate, WeightedGraph,
    };

    /// Computes the weight of a minimum weight perfect matching by dynamic
    /// programming over the subsets of vertices (only for small graphs)
    fn brute_force(graph: &EdgeList) -> Option<f64> {
        let n = graph.nb_vertices();
        let full = (1_usize << n) - 1;
        let mut best = vec![f64::INFINITY; full + 1];
        best[0] = 0.0;
        for mask in 0..full {
            let cost = best[mask];
            if cost == f64::INFINITY {
                continue;
            }
            // the smallest vertex which is not covered yet
            let u = (!mask).trailing_zeros() as usize;
            for e in graph.edges() {
                if !e.weight.is_finite() || e.source == e.target {
                    continue;
                }
                let v = if e.source == u {
                    e.target
                } else if e.target == u {
                    e.source
                } else {
                    continue;
                };
                if mask & (1 << v) != 0 {
                    continue;
                }
                let next = mask | (1 << u) | (1 << v);
                best[next] = best[next].min(cost + e.weight);
            }
        }
        if best[full].is_finite() {
            Some(best[full])
        } else {
            None
        }
    }

    fn all_options() -> Vec<Options> {
        let mut out = vec![];
        for init in [
            Initialization::None,
            Initialization::Greedy,
            Initialization::Fractional,
        ] {
            for dual in [
                DualUpdateStrategy::FixedDelta,
                DualUpdateStrategy::ConnectedComponents,
            ] {
                for single in [SingleTreeUpdate::Before, SingleTreeUpdate::After] {
                    out.push(
                        Options::default()
                            .initialization(init)
                            .dual_update(dual)
                            .single_tree_update(single),
                    );
                }
            }
        }
        out
    }

    fn random_graph(rng: &mut StdRng, n: usize, density: f64, max_weight: u32) -> EdgeList {
        let mut graph = EdgeList::new(n);
        for u in 0..n {
            for v in u + 1..n {
                if rng.gen_bool(density) {
                    graph.add_edge(u, v, rng.gen_range(0..=max_weight) as f64);
                }
            }
        }
        graph
    }

    fn check_against_brute_force(graph: &EdgeList) {
        let expected = brute_force(graph);
        for options in all_options() {
            let result = BlossomV::new(options).solve(graph);
            match expected {
                None => assert_eq!(
                    Err(MatchingError::NoPerfectMatching),
                    result.map(|s| s.weight()),
                    "{options:?} on {graph:?}"
                ),
                Some(weight) => {
                    let solution = result.unwrap_or_else(|e| panic!("{e} with {options:?} on {graph:?}"));
                    assert!(
                        (weight - solution.weight()).abs() < 1e-6,
                        "{options:?} on {graph:?}: expected {weight} got {}",
                        solution.weight()
                    );
                    assert!(solution.is_optimal(graph), "{options:?} on {graph:?}");
                    assert!(
                        (solution.dual().objective() - weight).abs() < 1e-6,
                        "{options:?} on {graph:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn a_single_edge_is_matched() {
        let graph = EdgeList::from_edges(2, [(0, 1, 5.0)]);
        let solution = minimum_weight_perfect_matching(&graph).unwrap();
        assert_eq!(vec![(0, 1)], solution.pairs());
        assert_eq!(5.0, solution.weight());
        assert_eq!(0, solution.matched_edge(1));
        assert!(solution.is_optimal(&graph));
    }

    #[test]
    fn a_zero_weight_edge_is_matched() {
        let graph = EdgeList::from_edges(2, [(0, 1, 0.0)]);
        let solution = minimum_weight_perfect_matching(&graph).unwrap();
        assert_eq!(vec![(0, 1)], solution.pairs());
        assert_eq!(0.0, solution.weight());
        assert!(solution.is_optimal(&graph));
    }

    #[test]
    fn the_chord_of_a_square_is_avoided() {
        // 4-cycle 1-2-3-4 with a cheap chord 2-4 that no perfect matching uses
        let graph = EdgeList::from_edges(
            4,
            [(0, 1, 8.0), (1, 2, 8.0), (2, 3, 8.0), (3, 0, 8.0), (1, 3, 2.0)],
        );
        for options in all_options() {
            let solution = BlossomV::new(options).solve(&graph).unwrap();
            assert_eq!(16.0, solution.weight(), "{options:?}");
            assert!(solution.pairs().iter().all(|p| *p != (1, 3)));
            assert!(solution.is_optimal(&graph));
        }
    }

    #[test]
    fn complete_bipartite_graph() {
        // K(3,3) between {1, 2, 3} and {4, 5, 6}: the only optimum is
        // 1-6, 2-5, 3-4
        let graph = EdgeList::from_edges(
            6,
            [
                (0, 3, 7.0),
                (0, 4, 5.0),
                (0, 5, 2.0),
                (1, 3, 1.0),
                (1, 4, 3.0),
                (1, 5, 4.0),
                (2, 3, 7.0),
                (2, 4, 10.0),
                (2, 5, 7.0),
            ],
        );
        for options in all_options() {
            let solution = BlossomV::new(options).solve(&graph).unwrap();
            assert_eq!(12.0, solution.weight(), "{options:?}");
            assert_eq!(vec![(0, 5), (1, 4), (2, 3)], solution.pairs(), "{options:?}");
            assert!(solution.is_optimal(&graph));
        }
    }

    #[test]
    fn odd_cycles_force_blossoms() {
        // two triangles joined by a heavy bridge, each with a cheap pendant
        let graph = EdgeList::from_edges(
            8,
            [
                (0, 1, 1.0),
                (1, 2, 1.0),
                (2, 0, 1.0),
                (3, 4, 1.0),
                (4, 5, 1.0),
                (5, 3, 1.0),
                (2, 3, 10.0),
                (0, 6, 4.0),
                (5, 7, 4.0),
                (6, 7, 30.0),
            ],
        );
        check_against_brute_force(&graph);
        let solution = minimum_weight_perfect_matching(&graph).unwrap();
        assert_eq!(10.0, solution.weight());
    }

    #[test]
    fn nested_blossoms_are_expanded_correctly() {
        // a pentagon of triangles: this builds blossoms inside blossoms
        let graph = EdgeList::from_edges(
            10,
            [
                (0, 1, 2.0),
                (1, 2, 2.0),
                (2, 3, 2.0),
                (3, 4, 2.0),
                (4, 0, 2.0),
                (0, 5, 3.0),
                (1, 6, 3.0),
                (2, 7, 3.0),
                (3, 8, 3.0),
                (4, 9, 3.0),
                (5, 6, 9.0),
                (7, 8, 1.0),
                (8, 9, 6.0),
                (6, 7, 5.0),
            ],
        );
        check_against_brute_force(&graph);
    }

    #[test]
    fn an_odd_graph_is_rejected() {
        let graph = EdgeList::from_edges(3, [(0, 1, 1.0), (1, 2, 1.0)]);
        assert_eq!(
            Err(MatchingError::OddVertexCount(3)),
            minimum_weight_perfect_matching(&graph).map(|s| s.weight())
        );
    }

    #[test]
    fn two_odd_components_have_no_perfect_matching() {
        // two disjoint triangles
        let graph = EdgeList::from_edges(
            6,
            [(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0), (3, 4, 1.0), (4, 5, 1.0), (5, 3, 1.0)],
        );
        for options in all_options() {
            assert_eq!(
                Err(MatchingError::NoPerfectMatching),
                BlossomV::new(options).solve(&graph).map(|s| s.weight()),
                "{options:?}"
            );
        }
    }

    #[test]
    fn a_star_has_no_perfect_matching() {
        let graph = EdgeList::from_edges(4, [(0, 1, 1.0), (0, 2, 2.0), (0, 3, 3.0)]);
        for options in all_options() {
            assert_eq!(
                Err(MatchingError::NoPerfectMatching),
                BlossomV::new(options).solve(&graph).map(|s| s.weight()),
                "{options:?}"
            );
        }
    }

    #[test]
    fn parallel_edges_use_the_cheapest_one() {
        let graph = EdgeList::from_edges(2, [(0, 1, 5.0), (1, 0, 2.0), (0, 1, 3.0)]);
        let solution = minimum_weight_perfect_matching(&graph).unwrap();
        assert_eq!(2.0, solution.weight());
        assert_eq!(1, solution.matched_edge(0));
    }

    #[test]
    fn forbidden_edges_are_never_used() {
        let graph = EdgeList::from_edges(
            4,
            [(0, 1, f64::INFINITY), (2, 3, 1.0), (0, 2, 4.0), (1, 3, 4.0)],
        );
        let solution = minimum_weight_perfect_matching(&graph).unwrap();
        assert_eq!(8.0, solution.weight());
        assert!(solution.is_optimal(&graph));
    }

    #[test]
    fn is_optimal_is_idempotent() {
        let graph = EdgeList::from_edges(
            6,
            [(0, 1, 3.0), (1, 2, 1.0), (2, 0, 2.0), (2, 3, 6.0), (3, 4, 1.0), (4, 5, 2.0), (5, 3, 2.0)],
        );
        let solution = minimum_weight_perfect_matching(&graph).unwrap();
        let first = solution.is_optimal(&graph);
        let second = solution.is_optimal(&graph);
        assert!(first);
        assert_eq!(first, second);
    }

    #[test]
    fn statistics_are_collected() {
        let graph = EdgeList::from_edges(
            6,
            [(0, 1, 3.0), (1, 2, 1.0), (2, 0, 2.0), (2, 3, 6.0), (3, 4, 1.0), (4, 5, 2.0), (5, 3, 2.0)],
        );
        let solution = BlossomV::new(Options::default().initialization(Initialization::None))
            .solve(&graph)
            .unwrap();
        let stats = solution.statistics();
        assert_eq!(6, stats.initial_trees);
        assert_eq!(3, stats.augment_num);
    }

    #[test]
    fn random_small_graphs_match_the_brute_force() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..150 {
            let n = 2 * rng.gen_range(1..=6);
            let density = rng.gen_range(0.3..=1.0);
            let graph = random_graph(&mut rng, n, density, 20);
            check_against_brute_force(&graph);
        }
    }

    #[test]
    fn random_graphs_with_many_ties_match_the_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..150 {
            let n = 2 * rng.gen_range(2..=6);
            let graph = random_graph(&mut rng, n, 0.6, 3);
            check_against_brute_force(&graph);
        }
    }

    #[test]
    fn random_dense_graphs_are_certified_optimal() {
        let mut rng = StdRng::seed_from_u64(2022);
        for _ in 0..10 {
            let graph = random_graph(&mut rng, 40, 0.5, 1000);
            for options in all_options() {
                let solution = BlossomV::new(options).solve(&graph).unwrap();
                assert!(solution.is_optimal(&graph), "{options:?}");
                assert!((solution.dual().objective() - solution.weight()).abs() < 1e-6);
            }
        }
    }
}

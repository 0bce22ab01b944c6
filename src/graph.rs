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

//! This module defines the minimal abstraction of a weighted undirected graph
//! the matching engine works with, along with a ready made implementation.

/// An edge of a weighted graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEdge {
    /// one end of the edge
    pub source: usize,
    /// the other end of the edge
    pub target: usize,
    /// the weight of the edge. `f64::INFINITY` means the edge is forbidden
    pub weight: f64,
}

/// A weighted undirected graph whose vertices are numbered `0..nb_vertices()`
/// and whose edges are numbered `0..nb_edges()`.
pub trait WeightedGraph {
    /// Returns the number of vertices of the graph
    fn nb_vertices(&self) -> usize;
    /// Returns the number of edges of the graph
    fn nb_edges(&self) -> usize;
    /// Returns the edge having the given index
    fn edge(&self, index: usize) -> WeightedEdge;

    /// Calls `f` with the index and the description of each edge
    fn for_each_edge<F: FnMut(usize, WeightedEdge)>(&self, mut f: F) {
        for i in 0..self.nb_edges() {
            f(i, self.edge(i))
        }
    }
    /// Returns the number of (non forbidden, non loop) edges incident to each
    /// vertex. Edges leading to a vertex that does not exist are ignored.
    fn degrees(&self) -> Vec<usize> {
        let n = self.nb_vertices();
        let mut degrees = vec![0; n];
        self.for_each_edge(|_, e| {
            if e.source != e.target && e.source < n && e.target < n && e.weight.is_finite() {
                degrees[e.source] += 1;
                degrees[e.target] += 1;
            }
        });
        degrees
    }
}

/// A graph stored as a plain list of edges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList {
    nb_vertices: usize,
    edges: Vec<WeightedEdge>,
}

impl EdgeList {
    /// Creates a graph with the given number of vertices and no edge
    pub fn new(nb_vertices: usize) -> Self {
        Self {
            nb_vertices,
            edges: vec![],
        }
    }
    /// Adds an edge between u and v and returns its index
    pub fn add_edge(&mut self, u: usize, v: usize, weight: f64) -> usize {
        self.edges.push(WeightedEdge {
            source: u,
            target: v,
            weight,
        });
        self.edges.len() - 1
    }
    /// Creates a graph from a list of (u, v, weight) triples
    pub fn from_edges<I>(nb_vertices: usize, edges: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut graph = Self::new(nb_vertices);
        for (u, v, w) in edges {
            graph.add_edge(u, v, w);
        }
        graph
    }
    /// Returns the edges of the graph
    pub fn edges(&self) -> &[WeightedEdge] {
        &self.edges
    }
}

impl WeightedGraph for EdgeList {
    fn nb_vertices(&self) -> usize {
        self.nb_vertices
    }
    fn nb_edges(&self) -> usize {
        self.edges.len()
    }
    fn edge(&self, index: usize) -> WeightedEdge {
        self.edges[index]
    }
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

//! A local marker graph built by merging aligned marker positions.
//!
//! This is the union-find local assembly backend. Every position of every
//! input sequence starts as its own cell, and [`MarkerGraph::merge`] joins the
//! cells of aligned positions with the same marker token. After merging, each
//! disjoint set becomes a vertex, and edges connect the vertices of
//! consecutive positions in each sequence.
//!
//! Unlike the windowed backend in [`crate::de_bruijn`], simplification removes
//! edges rather than vertices: self edges, low-coverage edges, and finally the
//! vertices left without edges. Bubbles (see [`MarkerGraph::find_bubbles`])
//! are the branch points used for pairwise consistency statistics in
//! [`crate::analyze`].

use crate::MarkerToken;
use crate::canonical::SequenceId;

use std::collections::{BTreeMap, BTreeSet, HashMap};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// One position of an input sequence contained in a vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Occurrence {
    /// The sequence containing the position.
    pub sequence_id: SequenceId,
    /// Local ordinal of the position within the sequence.
    pub position: u32,
}

/// A vertex of the marker graph: one merged set of sequence positions.
#[derive(Clone, Debug)]
pub struct Vertex {
    // Sorted by (sequence_id, position).
    occurrences: Vec<Occurrence>,
}

impl Vertex {
    /// Returns the merged positions, sorted by sequence and position.
    #[inline]
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Returns the number of merged positions.
    #[inline]
    pub fn coverage(&self) -> usize {
        self.occurrences.len()
    }

    /// Returns `true` if the vertex contains a position of the given sequence.
    pub fn contains_sequence(&self, sequence_id: SequenceId) -> bool {
        self.occurrences.iter().any(|occurrence| occurrence.sequence_id == sequence_id)
    }

    /// Returns the distinct sequences with a position in the vertex, in increasing order.
    pub fn sequence_ids(&self) -> Vec<SequenceId> {
        let mut result: Vec<SequenceId> =
            self.occurrences.iter().map(|occurrence| occurrence.sequence_id).collect();
        result.dedup();
        result
    }
}

/// An edge of the marker graph.
///
/// The edge exists because at least one sequence has consecutive positions in
/// `from` and `to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Source vertex index.
    pub from: usize,
    /// Destination vertex index.
    pub to: usize,
    /// The sequences traversing the edge, in increasing order.
    pub sequence_ids: Vec<SequenceId>,
}

impl Edge {
    /// Returns the number of sequences traversing the edge.
    #[inline]
    pub fn coverage(&self) -> usize {
        self.sequence_ids.len()
    }

    /// Returns `true` if the given sequence traverses the edge.
    pub fn contains_sequence(&self, sequence_id: SequenceId) -> bool {
        self.sequence_ids.binary_search(&sequence_id).is_ok()
    }
}

/// A locus where the sequences split into mutually exclusive branches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bubble {
    /// The branch vertices, in increasing index order.
    pub branches: Vec<usize>,
    /// The branch taken by each sequence, or [`None`] if the sequence is absent.
    pub branch_table: Vec<Option<usize>>,
}

//-----------------------------------------------------------------------------

/// A marker graph over a set of sequences.
///
/// The intended order of operations is: [`MarkerGraph::add_sequence`] for each
/// sequence, [`MarkerGraph::done_adding_sequences`], [`MarkerGraph::merge`]
/// for each alignment, [`MarkerGraph::done_merging`], then the simplification
/// passes and [`MarkerGraph::find_bubbles`].
#[derive(Clone, Debug, Default)]
pub struct MarkerGraph {
    sequences: Vec<Vec<MarkerToken>>,
    // Cell index of position 0 in each sequence.
    offsets: Vec<usize>,
    // Disjoint sets over the cells. Empty until `done_adding_sequences`.
    parent: Vec<usize>,
    rank: Vec<usize>,
    // Built by `done_merging`.
    vertices: Vec<Vertex>,
    live_vertices: Vec<bool>,
    edges: Vec<Edge>,
    live_edges: Vec<bool>,
}

impl MarkerGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        MarkerGraph::default()
    }

    /// Returns the number of added sequences.
    #[inline]
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Adds a sequence to the graph and returns its identifier.
    ///
    /// # Panics
    ///
    /// Panics if [`MarkerGraph::done_adding_sequences`] has already been called.
    pub fn add_sequence(&mut self, tokens: &[MarkerToken]) -> SequenceId {
        assert!(self.parent.is_empty(), "Cannot add sequences after done_adding_sequences");
        let sequence_id = self.sequences.len();
        self.sequences.push(tokens.to_vec());
        sequence_id
    }

    /// Finishes adding sequences and returns the number of position cells.
    ///
    /// Each position of each sequence becomes a cell in the disjoint set
    /// structure, initially in its own set.
    pub fn done_adding_sequences(&mut self) -> usize {
        assert!(self.parent.is_empty(), "done_adding_sequences was called twice");
        let mut offset = 0;
        for sequence in self.sequences.iter() {
            self.offsets.push(offset);
            offset += sequence.len();
        }
        self.parent = (0..offset).collect();
        self.rank = vec![0; offset];
        offset
    }

    // Cell index of a position.
    #[inline]
    fn cell(&self, sequence_id: SequenceId, position: u32) -> usize {
        self.offsets[sequence_id] + position as usize
    }

    // Find with path halving.
    fn find(&mut self, cell: usize) -> usize {
        let mut cell = cell;
        while self.parent[cell] != cell {
            self.parent[cell] = self.parent[self.parent[cell]];
            cell = self.parent[cell];
        }
        cell
    }

    // Union by rank.
    fn union(&mut self, first: usize, second: usize) {
        let first = self.find(first);
        let second = self.find(second);
        if first == second {
            return;
        }
        if self.rank[first] < self.rank[second] {
            self.parent[first] = second;
        } else if self.rank[first] > self.rank[second] {
            self.parent[second] = first;
        } else {
            self.parent[second] = first;
            self.rank[first] += 1;
        }
    }

    /// Merges the cells of aligned positions in two sequences.
    ///
    /// Each pair `[position0, position1]` is a local position in `sequence_id0`
    /// and `sequence_id1` respectively.
    ///
    /// # Panics
    ///
    /// Panics if [`MarkerGraph::done_adding_sequences`] has not been called, if
    /// a position is out of range, or if the marker tokens at a merged pair of
    /// positions differ. Merging positions with different tokens is a bug in
    /// the caller, not bad input.
    pub fn merge(&mut self, sequence_id0: SequenceId, sequence_id1: SequenceId, pairs: &[[u32; 2]]) {
        assert!(!self.parent.is_empty(), "Cannot merge before done_adding_sequences");
        for pair in pairs.iter() {
            let token0 = self.sequences[sequence_id0][pair[0] as usize];
            let token1 = self.sequences[sequence_id1][pair[1] as usize];
            assert_eq!(
                token0, token1,
                "Merging positions {} of sequence {} and {} of sequence {} with different tokens",
                pair[0], sequence_id0, pair[1], sequence_id1
            );
            let cell0 = self.cell(sequence_id0, pair[0]);
            let cell1 = self.cell(sequence_id1, pair[1]);
            self.union(cell0, cell1);
        }
    }

    /// Finishes merging and builds the vertices and edges of the graph.
    ///
    /// Each disjoint set of cells becomes a vertex, with its occurrences
    /// sorted by sequence and position. Edges connect the vertices of
    /// consecutive positions in each sequence.
    pub fn done_merging(&mut self) {
        assert!(!self.parent.is_empty(), "Cannot build the graph before done_adding_sequences");
        assert!(self.vertices.is_empty(), "done_merging was called twice");

        // Assign vertex indexes to the set roots in cell order, so that the
        // occurrences of each vertex come out sorted.
        let mut root_to_vertex: HashMap<usize, usize> = HashMap::new();
        let mut vertex_of_cell: Vec<usize> = Vec::with_capacity(self.parent.len());
        for cell in 0..self.parent.len() {
            let root = self.find(cell);
            let next_index = self.vertices.len();
            let vertex_index = *root_to_vertex.entry(root).or_insert(next_index);
            if vertex_index == self.vertices.len() {
                self.vertices.push(Vertex { occurrences: Vec::new() });
            }
            vertex_of_cell.push(vertex_index);
        }
        for sequence_id in 0..self.sequences.len() {
            for position in 0..self.sequences[sequence_id].len() {
                let vertex_index = vertex_of_cell[self.cell(sequence_id, position as u32)];
                self.vertices[vertex_index].occurrences.push(Occurrence {
                    sequence_id, position: position as u32,
                });
            }
        }
        self.live_vertices = vec![true; self.vertices.len()];

        // One edge per ordered vertex pair with consecutive positions.
        let mut by_pair: BTreeMap<(usize, usize), Vec<SequenceId>> = BTreeMap::new();
        for sequence_id in 0..self.sequences.len() {
            for position in 1..self.sequences[sequence_id].len() {
                let from = vertex_of_cell[self.cell(sequence_id, position as u32 - 1)];
                let to = vertex_of_cell[self.cell(sequence_id, position as u32)];
                by_pair.entry((from, to)).or_default().push(sequence_id);
            }
        }
        self.edges = by_pair.into_iter().map(|((from, to), mut sequence_ids)| {
            sequence_ids.dedup();
            Edge { from, to, sequence_ids }
        }).collect();
        self.live_edges = vec![true; self.edges.len()];
    }

    /// Returns the number of vertices that have not been removed.
    pub fn live_vertex_count(&self) -> usize {
        self.live_vertices.iter().filter(|flag| **flag).count()
    }

    /// Returns the number of edges that have not been removed.
    pub fn live_edge_count(&self) -> usize {
        self.live_edges.iter().filter(|flag| **flag).count()
    }

    /// Returns `true` if the vertex with the given index has not been removed.
    #[inline]
    pub fn is_live_vertex(&self, vertex_index: usize) -> bool {
        self.live_vertices[vertex_index]
    }

    /// Returns the vertex with the given index, which may have been removed.
    #[inline]
    pub fn vertex(&self, vertex_index: usize) -> &Vertex {
        &self.vertices[vertex_index]
    }

    /// Returns an iterator over the live vertices with their indexes.
    pub fn live_vertices(&self) -> impl Iterator<Item = (usize, &Vertex)> {
        self.vertices.iter().enumerate().filter(|(index, _)| self.live_vertices[*index])
    }

    /// Returns an iterator over the live edges.
    pub fn live_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().enumerate()
            .filter(|(index, _)| self.live_edges[*index])
            .map(|(_, edge)| edge)
    }

    /// Removes every edge from a vertex to itself.
    ///
    /// A sequence whose consecutive positions merged into the same vertex
    /// creates such an edge. Returns the number of removed edges.
    pub fn remove_self_edges(&mut self) -> usize {
        let mut removed = 0;
        for (index, edge) in self.edges.iter().enumerate() {
            if self.live_edges[index] && edge.from == edge.to {
                self.live_edges[index] = false;
                removed += 1;
            }
        }
        removed
    }

    /// Removes live edges that do not meet the coverage thresholds.
    ///
    /// An edge survives if its total coverage is at least `min_total`, with at
    /// least `min_same` traversals from sequences on the query strand and at
    /// least `min_opposite` from the opposite strand. `same_strand` gives the
    /// strand of each sequence relative to the query; see
    /// [`crate::canonical::SequenceSet::is_same_strand`]. Returns the number of
    /// removed edges.
    pub fn remove_low_coverage_edges(
        &mut self,
        min_total: usize, min_same: usize, min_opposite: usize,
        same_strand: &[bool]
    ) -> usize {
        assert_eq!(same_strand.len(), self.sequences.len(), "Wrong number of strand flags");
        let mut removed = 0;
        for (index, edge) in self.edges.iter().enumerate() {
            if !self.live_edges[index] {
                continue;
            }
            let total = edge.coverage();
            let same = edge.sequence_ids.iter()
                .filter(|sequence_id| same_strand[**sequence_id])
                .count();
            if total < min_total || same < min_same || total - same < min_opposite {
                self.live_edges[index] = false;
                removed += 1;
            }
        }
        removed
    }

    /// Removes vertices without any live incident edges.
    ///
    /// Returns the number of removed vertices.
    pub fn remove_isolated_vertices(&mut self) -> usize {
        let mut connected = vec![false; self.vertices.len()];
        for edge in self.live_edges() {
            connected[edge.from] = true;
            connected[edge.to] = true;
        }

        let mut removed = 0;
        for (index, flag) in self.live_vertices.iter_mut().enumerate() {
            if *flag && !connected[index] {
                *flag = false;
                removed += 1;
            }
        }
        removed
    }

    /// Finds the bubbles of the graph.
    ///
    /// A bubble is a group of at least two live vertices that share a
    /// predecessor and a successor through live edges and whose sequence sets
    /// are pairwise disjoint. Each sequence takes at most one branch, and the
    /// branch table records which one.
    ///
    /// # Panics
    ///
    /// Panics if a sequence would be assigned to two branches of the same
    /// bubble, which contradicts the disjointness of the branch sets.
    pub fn find_bubbles(&self) -> Vec<Bubble> {
        // Successors of each vertex through live edges.
        let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
        for edge in self.live_edges() {
            successors.entry(edge.from).or_default().push(edge.to);
        }

        let mut branch_sets: BTreeSet<Vec<usize>> = BTreeSet::new();
        for (predecessor, middle_vertices) in successors.iter() {
            let mut by_successor: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for middle in middle_vertices.iter() {
                if !self.live_vertices[*middle] {
                    continue;
                }
                if let Some(targets) = successors.get(middle) {
                    for successor in targets.iter() {
                        if successor != predecessor {
                            by_successor.entry(*successor).or_default().push(*middle);
                        }
                    }
                }
            }
            for (_, mut candidates) in by_successor.into_iter() {
                candidates.sort_unstable();
                candidates.dedup();
                if candidates.len() < 2 {
                    continue;
                }
                if self.sequences_pairwise_disjoint(&candidates) {
                    branch_sets.insert(candidates);
                }
            }
        }

        branch_sets.into_iter().map(|branches| {
            let mut branch_table: Vec<Option<usize>> = vec![None; self.sequences.len()];
            for (branch, vertex_index) in branches.iter().enumerate() {
                for sequence_id in self.vertices[*vertex_index].sequence_ids() {
                    assert!(
                        branch_table[sequence_id].is_none(),
                        "Sequence {} appears on multiple branches of a bubble", sequence_id
                    );
                    branch_table[sequence_id] = Some(branch);
                }
            }
            Bubble { branches, branch_table }
        }).collect()
    }

    // Are the sequence sets of the given vertices pairwise disjoint?
    fn sequences_pairwise_disjoint(&self, vertex_indexes: &[usize]) -> bool {
        let mut seen: BTreeSet<SequenceId> = BTreeSet::new();
        for index in vertex_indexes.iter() {
            for sequence_id in self.vertices[*index].sequence_ids() {
                if !seen.insert(sequence_id) {
                    return false;
                }
            }
        }
        true
    }
}

//-----------------------------------------------------------------------------

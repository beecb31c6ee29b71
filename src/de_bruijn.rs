//! A De Bruijn graph over marker-token windows.
//!
//! This is the windowed local assembly backend. Each vertex corresponds to a
//! window of `k` consecutive marker tokens, and the vertex stores every
//! occurrence of the window in the input sequences. Ambiguous vertices (windows
//! that recur non-adjacently within a single sequence) are removed first, then vertices are
//! filtered by coverage, and edges connect the consecutive surviving vertices
//! of each sequence.
//!
//! Incompatible vertex sets (see
//! [`DeBruijnGraph::find_incompatible_vertex_sets`]) are the branch points used
//! for pairwise consistency statistics in [`crate::analyze`].

use crate::MarkerToken;
use crate::canonical::SequenceId;

use std::collections::{BTreeMap, BTreeSet, HashMap};


//-----------------------------------------------------------------------------

/// One occurrence of a window in an input sequence.
///
/// `position` is the local ordinal of the first token of the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Occurrence {
    /// The sequence containing the window.
    pub sequence_id: SequenceId,
    /// Local ordinal of the first token of the window.
    pub position: u32,
}

/// A vertex of the De Bruijn graph: a window and its occurrences.
#[derive(Clone, Debug)]
pub struct Vertex {
    window: Vec<MarkerToken>,
    // Sorted by (sequence_id, position).
    occurrences: Vec<Occurrence>,
}

impl Vertex {
    /// Returns the window of marker tokens for this vertex.
    #[inline]
    pub fn window(&self) -> &[MarkerToken] {
        &self.window
    }

    /// Returns the occurrences, sorted by sequence and position.
    #[inline]
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Returns the number of occurrences.
    #[inline]
    pub fn coverage(&self) -> usize {
        self.occurrences.len()
    }

    /// Returns `true` if the window occurs in the given sequence.
    pub fn contains_sequence(&self, sequence_id: SequenceId) -> bool {
        self.occurrences.iter().any(|occurrence| occurrence.sequence_id == sequence_id)
    }

    /// Returns the distinct sequences containing the window, in increasing order.
    pub fn sequence_ids(&self) -> Vec<SequenceId> {
        let mut result: Vec<SequenceId> =
            self.occurrences.iter().map(|occurrence| occurrence.sequence_id).collect();
        result.dedup();
        result
    }

    // Does any sequence contain this window at non-adjacent positions?
    // The occurrences are sorted, so it is enough to look at consecutive ones.
    fn is_ambiguous(&self) -> bool {
        for i in 1..self.occurrences.len() {
            let prev = self.occurrences[i - 1];
            let curr = self.occurrences[i];
            if prev.sequence_id == curr.sequence_id && curr.position - prev.position > 1 {
                return true;
            }
        }
        false
    }
}

/// An edge of the De Bruijn graph.
///
/// The edge exists because at least one sequence visits `to` immediately after
/// `from`, in the order of surviving vertices along the sequence.
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
}

//-----------------------------------------------------------------------------

/// Coverage histograms of the live vertices, split by strand.
///
/// Index `c` counts the vertices with the given coverage `c`. The same and
/// opposite counts classify occurrences by the strand of their sequence
/// relative to the query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageHistograms {
    /// Histogram of total coverage.
    pub total: Vec<usize>,
    /// Histogram of coverage from sequences on the query strand.
    pub same_strand: Vec<usize>,
    /// Histogram of coverage from sequences on the opposite strand.
    pub opposite_strand: Vec<usize>,
}

fn increment(histogram: &mut Vec<usize>, value: usize) {
    if histogram.len() <= value {
        histogram.resize(value + 1, 0);
    }
    histogram[value] += 1;
}

//-----------------------------------------------------------------------------

/// A De Bruijn graph of marker-token windows over a set of sequences.
///
/// The intended order of operations is: [`DeBruijnGraph::add_sequence`] for
/// each sequence, [`DeBruijnGraph::remove_ambiguous_vertices`], coverage
/// filtering with [`DeBruijnGraph::remove_low_coverage_vertices`],
/// [`DeBruijnGraph::create_edges`], and then
/// [`DeBruijnGraph::find_incompatible_vertex_sets`].
#[derive(Clone, Debug)]
pub struct DeBruijnGraph {
    k: usize,
    sequence_count: usize,
    vertices: Vec<Vertex>,
    live: Vec<bool>,
    edges: Vec<Edge>,
    window_to_vertex: HashMap<Vec<MarkerToken>, usize>,
}

impl DeBruijnGraph {
    /// Creates an empty graph with the given window length.
    ///
    /// # Panics
    ///
    /// Panics if `k == 0`.
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "Window length must be nonzero");
        DeBruijnGraph {
            k,
            sequence_count: 0,
            vertices: Vec::new(),
            live: Vec::new(),
            edges: Vec::new(),
            window_to_vertex: HashMap::new(),
        }
    }

    /// Returns the window length.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of added sequences.
    #[inline]
    pub fn sequence_count(&self) -> usize {
        self.sequence_count
    }

    /// Returns the number of vertices that have not been removed.
    pub fn live_vertex_count(&self) -> usize {
        self.live.iter().filter(|flag| **flag).count()
    }

    /// Returns `true` if the vertex with the given index has not been removed.
    #[inline]
    pub fn is_live(&self, vertex_index: usize) -> bool {
        self.live[vertex_index]
    }

    /// Returns the vertex with the given index, which may have been removed.
    #[inline]
    pub fn vertex(&self, vertex_index: usize) -> &Vertex {
        &self.vertices[vertex_index]
    }

    /// Returns an iterator over the live vertices with their indexes.
    pub fn live_vertices(&self) -> impl Iterator<Item = (usize, &Vertex)> {
        self.vertices.iter().enumerate().filter(|(index, _)| self.live[*index])
    }

    /// Returns the edges created by the latest [`DeBruijnGraph::create_edges`].
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Adds a sequence to the graph and returns its identifier.
    ///
    /// All windows of `k` consecutive tokens are inserted. A sequence shorter
    /// than `k` contributes no windows but still gets an identifier.
    pub fn add_sequence(&mut self, tokens: &[MarkerToken]) -> SequenceId {
        let sequence_id = self.sequence_count;
        self.sequence_count += 1;

        if tokens.len() >= self.k {
            for position in 0..=(tokens.len() - self.k) {
                let window = &tokens[position..position + self.k];
                let vertex_index = match self.window_to_vertex.get(window) {
                    Some(index) => *index,
                    None => {
                        let index = self.vertices.len();
                        self.vertices.push(Vertex {
                            window: window.to_vec(),
                            occurrences: Vec::new(),
                        });
                        self.live.push(true);
                        self.window_to_vertex.insert(window.to_vec(), index);
                        index
                    },
                };
                self.vertices[vertex_index].occurrences.push(Occurrence {
                    sequence_id, position: position as u32,
                });
            }
        }

        sequence_id
    }

    /// Removes every vertex whose window recurs non-adjacently within a single sequence.
    ///
    /// Such windows are internal repeats: they do not identify a unique locus
    /// and would conflate distinct regions of the same read. A run of the
    /// window at adjacent positions still pins down one locus and is kept.
    /// Returns the number of removed vertices.
    pub fn remove_ambiguous_vertices(&mut self) -> usize {
        let mut removed = 0;
        for (index, vertex) in self.vertices.iter().enumerate() {
            if self.live[index] && vertex.is_ambiguous() {
                self.live[index] = false;
                removed += 1;
            }
        }
        removed
    }

    /// Returns coverage histograms of the live vertices.
    ///
    /// `same_strand` gives the strand of each sequence relative to the query;
    /// see [`crate::canonical::SequenceSet::is_same_strand`].
    pub fn coverage_histograms(&self, same_strand: &[bool]) -> CoverageHistograms {
        assert_eq!(same_strand.len(), self.sequence_count, "Wrong number of strand flags");
        let mut result = CoverageHistograms::default();
        for (_, vertex) in self.live_vertices() {
            let same = vertex.occurrences.iter()
                .filter(|occurrence| same_strand[occurrence.sequence_id])
                .count();
            increment(&mut result.total, vertex.coverage());
            increment(&mut result.same_strand, same);
            increment(&mut result.opposite_strand, vertex.coverage() - same);
        }
        result
    }

    /// Removes live vertices that do not meet the coverage thresholds.
    ///
    /// A vertex survives if its total coverage is at least `min_total`, with at
    /// least `min_same` occurrences on the query strand and at least
    /// `min_opposite` on the opposite strand. Requiring support from both
    /// strands discards windows created by strand-specific artifacts.
    /// Returns the number of removed vertices.
    pub fn remove_low_coverage_vertices(
        &mut self,
        min_total: usize, min_same: usize, min_opposite: usize,
        same_strand: &[bool]
    ) -> usize {
        assert_eq!(same_strand.len(), self.sequence_count, "Wrong number of strand flags");
        let mut removed = 0;
        for (index, vertex) in self.vertices.iter().enumerate() {
            if !self.live[index] {
                continue;
            }
            let total = vertex.coverage();
            let same = vertex.occurrences.iter()
                .filter(|occurrence| same_strand[occurrence.sequence_id])
                .count();
            if total < min_total || same < min_same || total - same < min_opposite {
                self.live[index] = false;
                removed += 1;
            }
        }
        removed
    }

    // The live vertices visited by the given sequence, in position order.
    fn path(&self, sequence_id: SequenceId) -> Vec<(u32, usize)> {
        let mut result = Vec::new();
        for (index, vertex) in self.live_vertices() {
            for occurrence in vertex.occurrences.iter() {
                if occurrence.sequence_id == sequence_id {
                    result.push((occurrence.position, index));
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// Creates the edges of the graph from the live vertices.
    ///
    /// For each sequence, consecutive surviving vertices along the sequence are
    /// connected. Removed vertices leave gaps that are bridged by connecting
    /// the vertices on either side. Any previous edges are replaced.
    pub fn create_edges(&mut self) {
        let mut by_pair: BTreeMap<(usize, usize), Vec<SequenceId>> = BTreeMap::new();
        for sequence_id in 0..self.sequence_count {
            let path = self.path(sequence_id);
            for window in path.windows(2) {
                let (from, to) = (window[0].1, window[1].1);
                by_pair.entry((from, to)).or_default().push(sequence_id);
            }
        }

        self.edges = by_pair.into_iter().map(|((from, to), sequence_ids)| {
            Edge { from, to, sequence_ids }
        }).collect();
    }

    /// Finds the incompatible vertex sets of the graph.
    ///
    /// An incompatible vertex set is a group of at least two vertices that
    /// share a predecessor and a successor and whose sequence sets are pairwise
    /// disjoint. Each sequence takes at most one of the branches, so the sets
    /// partition the sequences into haplotype-consistent groups.
    ///
    /// The returned sets contain sorted vertex indexes. Requires edges; see
    /// [`DeBruijnGraph::create_edges`].
    pub fn find_incompatible_vertex_sets(&self) -> Vec<Vec<usize>> {
        // Successors of each live vertex.
        let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
        for edge in self.edges.iter() {
            successors.entry(edge.from).or_default().push(edge.to);
        }

        let mut result: BTreeSet<Vec<usize>> = BTreeSet::new();
        for (predecessor, middle_vertices) in successors.iter() {
            // Group the successors of `predecessor` by their own successor.
            let mut by_successor: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for middle in middle_vertices.iter() {
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
                    result.insert(candidates);
                }
            }
        }

        result.into_iter().collect()
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

    /// Returns the branch taken by each sequence in an incompatible vertex set.
    ///
    /// The result has one entry per sequence: `Some(branch)` with the index of
    /// the branch vertex within `vertex_set`, or [`None`] if the sequence does
    /// not appear in the set.
    ///
    /// # Panics
    ///
    /// Panics if a sequence appears on more than one branch, which violates the
    /// disjointness of an incompatible vertex set.
    pub fn branch_assignment(&self, vertex_set: &[usize]) -> Vec<Option<usize>> {
        let mut result: Vec<Option<usize>> = vec![None; self.sequence_count];
        for (branch, vertex_index) in vertex_set.iter().enumerate() {
            for sequence_id in self.vertices[*vertex_index].sequence_ids() {
                assert!(
                    result[sequence_id].is_none(),
                    "Sequence {} appears on multiple branches of an incompatible vertex set",
                    sequence_id
                );
                result[sequence_id] = Some(branch);
            }
        }
        result
    }
}

//-----------------------------------------------------------------------------

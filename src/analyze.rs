//! The mini-assembly analysis pipeline.
//!
//! One invocation analyzes a single query oriented read: canonicalize its
//! stored alignments ([`crate::canonical`]), project the participating
//! sequences, build a local consensus graph with one of the two backends,
//! simplify it with strand-aware coverage thresholds, and detect the loci
//! where the sequences split into mutually exclusive branches. The branch
//! tables of those loci feed [`BranchConsistency`], which quantifies pairwise
//! branch agreement between the sequences.
//!
//! [`analyze_coverage`] is an independent per-ordinal coverage analysis of the
//! same alignments, without any graph construction.

use crate::{OrientedReadId, StoredAlignmentInformation, StoreInterface};
use crate::{Error, Result};
use crate::canonical::{self, SequenceId, SequenceSet};
use crate::de_bruijn::{CoverageHistograms, DeBruijnGraph};
use crate::marker_graph::MarkerGraph;

use std::fmt::Display;
use std::str::FromStr;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// The graph construction backend of the mini-assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// Windowed De Bruijn graph; see [`crate::de_bruijn`].
    DeBruijn,
    /// Union-find marker graph; see [`crate::marker_graph`].
    #[default]
    MarkerGraph,
}

impl Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Backend::DeBruijn => write!(f, "de-bruijn"),
            Backend::MarkerGraph => write!(f, "marker-graph"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "de-bruijn" => Ok(Backend::DeBruijn),
            "marker-graph" => Ok(Backend::MarkerGraph),
            _ => Err(format!("Invalid backend: {} (expected de-bruijn or marker-graph)", value)),
        }
    }
}

/// Parameters of the mini-assembly pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisParams {
    /// The graph construction backend.
    pub backend: Backend,
    /// Window length of the De Bruijn backend.
    pub window_length: usize,
    /// Minimum total coverage for a vertex or edge to survive.
    pub min_total_coverage: usize,
    /// Minimum coverage from sequences on the query strand.
    pub min_same_strand_coverage: usize,
    /// Minimum coverage from sequences on the opposite strand.
    pub min_opposite_strand_coverage: usize,
    /// Average degree of the read similarity graph.
    pub neighbor_count: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        AnalysisParams {
            backend: Backend::default(),
            window_length: 3,
            min_total_coverage: 5,
            min_same_strand_coverage: 2,
            min_opposite_strand_coverage: 2,
            neighbor_count: 3,
        }
    }
}

//-----------------------------------------------------------------------------

/// Per-ordinal alignment coverage for one query oriented read.
///
/// For each marker ordinal of the query, coverage counts the alignments with
/// an aligned pair at that ordinal, while range coverage counts the alignments
/// whose matched span contains the ordinal. Both are split by the strand of
/// the aligned read relative to the query. Built by [`analyze_coverage`].
#[derive(Clone, Debug)]
pub struct CoverageAnalysis {
    /// The query oriented read.
    pub query: OrientedReadId,
    /// The aligned oriented reads, in alignment order.
    pub oriented_read_ids: Vec<OrientedReadId>,
    /// For each query ordinal and each alignment, the aligned partner ordinal.
    pub ordinal_table: Vec<Vec<Option<u32>>>,
    /// Matched span of each alignment on the query side.
    pub spans: Vec<[u32; 2]>,
    /// Aligned pair counts per query ordinal: same strand, opposite strand.
    pub coverage: Vec<[u64; 2]>,
    /// Matched span counts per query ordinal: same strand, opposite strand.
    pub range_coverage: Vec<[u64; 2]>,
}

/// Number of bins in the coverage ratio histogram.
pub const RATIO_BINS: usize = 10;

/// Histograms of the values in a [`CoverageAnalysis`].
///
/// `counts[c]` holds, for coverage value `c`: total coverage, same strand
/// coverage, opposite strand coverage, and the three range coverage variants.
/// `ratios[i]` bins the coverage-to-range-coverage ratios into
/// [`RATIO_BINS`] bins of equal width, with the last bin for exact ratio 1;
/// each entry holds the total, same strand, and opposite strand counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageHistogram {
    /// Coverage value histograms.
    pub counts: Vec<[u64; 6]>,
    /// Binned coverage ratio histograms.
    pub ratios: Vec<[u64; 3]>,
}

impl CoverageAnalysis {
    /// Returns the number of markers in the query.
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.coverage.len()
    }

    /// Returns the number of alignments.
    #[inline]
    pub fn alignment_count(&self) -> usize {
        self.oriented_read_ids.len()
    }

    /// Computes the coverage and coverage ratio histograms.
    pub fn histograms(&self) -> CoverageHistogram {
        let mut result = CoverageHistogram {
            counts: Vec::new(),
            ratios: vec![[0; 3]; RATIO_BINS + 1],
        };
        let bin_size = 1.0 / RATIO_BINS as f64;

        for ordinal in 0..self.marker_count() {
            let [same, opposite] = self.coverage[ordinal];
            let total = same + opposite;
            let [range_same, range_opposite] = self.range_coverage[ordinal];
            let range_total = range_same + range_opposite;

            let max_value = total.max(range_total) as usize;
            if result.counts.len() <= max_value {
                result.counts.resize(max_value + 1, [0; 6]);
            }
            result.counts[total as usize][0] += 1;
            result.counts[same as usize][1] += 1;
            result.counts[opposite as usize][2] += 1;
            result.counts[range_total as usize][3] += 1;
            result.counts[range_same as usize][4] += 1;
            result.counts[range_opposite as usize][5] += 1;

            let ratio = |value: u64, range: u64| -> usize {
                if range == 0 {
                    0
                } else {
                    ((value as f64 / range as f64) / bin_size) as usize
                }
            };
            result.ratios[ratio(total, range_total)][0] += 1;
            result.ratios[ratio(same, range_same)][1] += 1;
            result.ratios[ratio(opposite, range_opposite)][2] += 1;
        }

        result
    }
}

/// Computes the per-ordinal alignment coverage of the query.
///
/// # Errors
///
/// Passes through the errors of [`canonical::stored_alignments`].
pub fn analyze_coverage(
    query: OrientedReadId, store: &mut StoreInterface
) -> Result<CoverageAnalysis> {
    let alignments = canonical::stored_alignments(query, store)?;
    let marker_count = store.marker_count(query)?;

    let mut result = CoverageAnalysis {
        query,
        oriented_read_ids: alignments.iter().map(|stored| stored.oriented_read_id).collect(),
        ordinal_table: vec![vec![None; alignments.len()]; marker_count],
        spans: Vec::with_capacity(alignments.len()),
        coverage: vec![[0; 2]; marker_count],
        range_coverage: vec![[0; 2]; marker_count],
    };

    for (i, stored) in alignments.iter().enumerate() {
        let strand_index = if stored.oriented_read_id.strand() == query.strand() { 0 } else { 1 };
        for pair in stored.alignment.ordinals.iter() {
            result.ordinal_table[pair[0] as usize][i] = Some(pair[1]);
            result.coverage[pair[0] as usize][strand_index] += 1;
        }
        let first = stored.alignment.first_ordinal(0);
        let last = stored.alignment.last_ordinal(0);
        for ordinal in first..=last {
            result.range_coverage[ordinal as usize][strand_index] += 1;
        }
        result.spans.push([first, last]);
    }

    Ok(result)
}

//-----------------------------------------------------------------------------

/// Pairwise branch agreement between the sequences of a mini-assembly.
///
/// Each branch locus contributes one signature: the branch taken by each
/// sequence, or [`None`] for sequences absent from the locus. For every pair
/// of sequences present at the same locus, the pair agrees (same branch) or
/// disagrees (different branches). The matrices are symmetric.
#[derive(Clone, Debug)]
pub struct BranchConsistency {
    sequence_count: usize,
    same_branch: Vec<Vec<u64>>,
    different_branch: Vec<Vec<u64>>,
}

impl BranchConsistency {
    /// Creates empty matrices for the given number of sequences.
    pub fn new(sequence_count: usize) -> Self {
        BranchConsistency {
            sequence_count,
            same_branch: vec![vec![0; sequence_count]; sequence_count],
            different_branch: vec![vec![0; sequence_count]; sequence_count],
        }
    }

    /// Returns the number of sequences.
    #[inline]
    pub fn sequence_count(&self) -> usize {
        self.sequence_count
    }

    /// Accumulates one branch locus.
    ///
    /// # Panics
    ///
    /// Panics if the signature length does not match the sequence count.
    pub fn add_signature(&mut self, signature: &[Option<usize>]) {
        assert_eq!(signature.len(), self.sequence_count, "Wrong signature length");
        for a in 0..self.sequence_count {
            let branch_a = match signature[a] {
                Some(branch) => branch,
                None => continue,
            };
            for b in (a + 1)..self.sequence_count {
                let branch_b = match signature[b] {
                    Some(branch) => branch,
                    None => continue,
                };
                if branch_a == branch_b {
                    self.same_branch[a][b] += 1;
                    self.same_branch[b][a] += 1;
                } else {
                    self.different_branch[a][b] += 1;
                    self.different_branch[b][a] += 1;
                }
            }
        }
    }

    /// Returns how many times the two sequences took the same branch.
    #[inline]
    pub fn same_branch_count(&self, a: SequenceId, b: SequenceId) -> u64 {
        self.same_branch[a][b]
    }

    /// Returns how many times the two sequences took different branches.
    #[inline]
    pub fn different_branch_count(&self, a: SequenceId, b: SequenceId) -> u64 {
        self.different_branch[a][b]
    }

    /// Returns the fraction of shared loci where the two sequences agree.
    ///
    /// Returns [`None`] if the sequences never appear at the same locus.
    /// An undefined similarity is not evidence of disagreement, so it is kept
    /// distinct from 0.
    pub fn similarity(&self, a: SequenceId, b: SequenceId) -> Option<f64> {
        let same = self.same_branch[a][b];
        let total = same + self.different_branch[a][b];
        if total == 0 {
            None
        } else {
            Some(same as f64 / total as f64)
        }
    }

    /// Returns the strongest sequence pairs for the read similarity graph.
    ///
    /// All unordered pairs are ranked by `delta`, the same-branch count minus
    /// the different-branch count, in decreasing order, and only the top
    /// `neighbor_count * sequence_count / 2` pairs are kept. This approximates
    /// a constant average degree instead of the full quadratic edge set.
    pub fn edge_table(&self, neighbor_count: usize) -> Vec<(i64, SequenceId, SequenceId)> {
        let mut result = Vec::new();
        for a in 0..self.sequence_count {
            for b in (a + 1)..self.sequence_count {
                let delta = self.same_branch[a][b] as i64 - self.different_branch[a][b] as i64;
                result.push((delta, a, b));
            }
        }
        result.sort_unstable_by(|left, right| right.cmp(left));
        result.truncate(neighbor_count * self.sequence_count / 2);
        result
    }
}

//-----------------------------------------------------------------------------

/// The simplified local consensus graph of a mini-assembly.
#[derive(Clone, Debug)]
pub enum BackendGraph {
    /// Result of the De Bruijn backend, with the coverage histograms computed
    /// before the low-coverage vertices were removed.
    DeBruijn(DeBruijnGraph, CoverageHistograms),
    /// Result of the marker graph backend.
    MarkerGraph(MarkerGraph),
}

impl BackendGraph {
    /// Returns the number of live vertices and live edges.
    pub fn size(&self) -> (usize, usize) {
        match self {
            BackendGraph::DeBruijn(graph, _) => (graph.live_vertex_count(), graph.edges().len()),
            BackendGraph::MarkerGraph(graph) => (graph.live_vertex_count(), graph.live_edge_count()),
        }
    }
}

/// The result of analyzing one query oriented read.
///
/// Built by [`analyze_read`]. The report writers in [`crate::formats`] consume
/// this structure.
#[derive(Clone, Debug)]
pub struct ReadAnalysis {
    /// The query oriented read.
    pub query: OrientedReadId,
    /// The sequences taking part in the mini-assembly; the query is last.
    pub sequences: SequenceSet,
    /// The simplified consensus graph.
    pub graph: BackendGraph,
    /// The branch taken by each sequence at each branch locus.
    pub signatures: Vec<Vec<Option<usize>>>,
    /// Pairwise branch agreement accumulated over the signatures.
    pub consistency: BranchConsistency,
}

impl ReadAnalysis {
    /// Returns the sequence identifier of the query.
    #[inline]
    pub fn query_sequence_id(&self) -> SequenceId {
        self.sequences.query_sequence_id()
    }

    /// Returns the number of branch loci.
    #[inline]
    pub fn bubble_count(&self) -> usize {
        self.signatures.len()
    }

    /// Returns, for each sequence, its same-branch and different-branch counts
    /// against the query, with the corresponding ratios.
    pub fn bubble_summary(&self) -> Vec<(SequenceId, u64, u64, Option<f64>, Option<f64>)> {
        let query = self.query_sequence_id();
        let mut result = Vec::with_capacity(query);
        for sequence_id in 0..query {
            let same = self.consistency.same_branch_count(query, sequence_id);
            let different = self.consistency.different_branch_count(query, sequence_id);
            let total = same + different;
            let (same_ratio, different_ratio) = if total == 0 {
                (None, None)
            } else {
                (Some(same as f64 / total as f64), Some(different as f64 / total as f64))
            };
            result.push((sequence_id, same, different, same_ratio, different_ratio));
        }
        result
    }
}

//-----------------------------------------------------------------------------

// Strand of each sequence relative to the query.
fn same_strand_flags(sequences: &SequenceSet) -> Vec<bool> {
    (0..sequences.len()).map(|sequence_id| sequences.is_same_strand(sequence_id)).collect()
}

// Windowed backend: build, filter, and find incompatible vertex sets.
fn build_de_bruijn(
    sequences: &SequenceSet, params: &AnalysisParams
) -> (BackendGraph, Vec<Vec<Option<usize>>>) {
    let same_strand = same_strand_flags(sequences);
    let mut graph = DeBruijnGraph::new(params.window_length);
    for sequence_id in 0..sequences.len() {
        graph.add_sequence(sequences.sequence(sequence_id));
    }
    graph.remove_ambiguous_vertices();

    // Histograms reflect the graph before coverage filtering.
    let histograms = graph.coverage_histograms(&same_strand);

    graph.remove_low_coverage_vertices(
        params.min_total_coverage,
        params.min_same_strand_coverage,
        params.min_opposite_strand_coverage,
        &same_strand,
    );
    graph.create_edges();

    let signatures: Vec<Vec<Option<usize>>> = graph.find_incompatible_vertex_sets()
        .iter()
        .map(|vertex_set| graph.branch_assignment(vertex_set))
        .collect();
    (BackendGraph::DeBruijn(graph, histograms), signatures)
}

// Union-find backend: merge aligned positions and find bubbles.
//
// The first merging pass uses the alignments between the query and its
// neighbors. The second pass re-queries the store for alignments between
// pairs of neighbors and merges the aligned positions that fall within both
// matched spans.
fn build_marker_graph(
    sequences: &SequenceSet,
    alignments: &[StoredAlignmentInformation],
    store: &mut StoreInterface,
    params: &AnalysisParams
) -> Result<(BackendGraph, Vec<Vec<Option<usize>>>)> {
    let same_strand = same_strand_flags(sequences);
    let query_id = sequences.query_sequence_id();

    let mut graph = MarkerGraph::new();
    for sequence_id in 0..sequences.len() {
        graph.add_sequence(sequences.sequence(sequence_id));
    }
    graph.done_adding_sequences();

    // First pass: the alignments between the query and its neighbors.
    // The positions are local to the projected spans.
    let mut pairs: Vec<[u32; 2]> = Vec::new();
    for (sequence_id, stored) in alignments.iter().enumerate() {
        pairs.clear();
        for ordinal_pair in stored.alignment.ordinals.iter() {
            pairs.push([
                ordinal_pair[0] - sequences.first_ordinal(query_id),
                ordinal_pair[1] - sequences.first_ordinal(sequence_id),
            ]);
        }
        graph.merge(query_id, sequence_id, &pairs);
    }

    // Second pass: the alignments between pairs of neighbors. Only the
    // positions within both projected spans can be merged.
    let mut partners: Vec<OrientedReadId> = sequences.oriented_read_ids()[..query_id].to_vec();
    partners.sort_unstable();
    partners.dedup();
    for sequence_id1 in 0..query_id {
        let oriented1 = sequences.oriented_read(sequence_id1);
        let neighbor_alignments = canonical::stored_alignments_among(oriented1, &partners, store)?;

        for stored in neighbor_alignments.iter() {
            let sequence_id2 = sequences.oriented_read_ids()[..query_id].iter()
                .position(|oriented| *oriented == stored.oriented_read_id)
                .ok_or(Error::DataIntegrity(format!(
                    "Aligned read {} is not part of the mini-assembly", stored.oriented_read_id
                )))?;
            if sequence_id2 == sequence_id1 {
                continue;
            }

            pairs.clear();
            for ordinal_pair in stored.alignment.ordinals.iter() {
                if ordinal_pair[0] < sequences.first_ordinal(sequence_id1)
                    || ordinal_pair[0] > sequences.last_ordinal(sequence_id1)
                    || ordinal_pair[1] < sequences.first_ordinal(sequence_id2)
                    || ordinal_pair[1] > sequences.last_ordinal(sequence_id2)
                {
                    continue;
                }
                pairs.push([
                    ordinal_pair[0] - sequences.first_ordinal(sequence_id1),
                    ordinal_pair[1] - sequences.first_ordinal(sequence_id2),
                ]);
            }
            graph.merge(sequence_id1, sequence_id2, &pairs);
        }
    }

    graph.done_merging();
    graph.remove_self_edges();
    graph.remove_low_coverage_edges(
        params.min_total_coverage,
        params.min_same_strand_coverage,
        params.min_opposite_strand_coverage,
        &same_strand,
    );
    graph.remove_isolated_vertices();

    let signatures: Vec<Vec<Option<usize>>> = graph.find_bubbles()
        .into_iter()
        .map(|bubble| bubble.branch_table)
        .collect();
    Ok((BackendGraph::MarkerGraph(graph), signatures))
}

/// Runs the mini-assembly pipeline for one query oriented read.
///
/// Canonicalizes the stored alignments of the query, projects the
/// participating sequences, builds and simplifies the consensus graph with the
/// backend selected in `params`, and accumulates the pairwise branch
/// agreement statistics.
///
/// # Errors
///
/// Passes through the errors of [`crate::canonical`] and the store.
pub fn analyze_read(
    query: OrientedReadId, store: &mut StoreInterface, params: &AnalysisParams
) -> Result<ReadAnalysis> {
    let alignments = canonical::stored_alignments(query, store)?;
    let sequences = SequenceSet::extract(query, &alignments, store)?;

    let (graph, signatures) = match params.backend {
        Backend::DeBruijn => build_de_bruijn(&sequences, params),
        Backend::MarkerGraph => build_marker_graph(&sequences, &alignments, store, params)?,
    };

    let mut consistency = BranchConsistency::new(sequences.len());
    for signature in signatures.iter() {
        consistency.add_signature(signature);
    }

    Ok(ReadAnalysis {
        query,
        sequences,
        graph,
        signatures, consistency,
    })
}

//-----------------------------------------------------------------------------

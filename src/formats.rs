//! Text input parsing and report writing.
//!
//! The input side parses the marker and alignment files consumed by
//! [`crate::AlignmentBase::create_from_files`]. The output side writes the
//! diagnostic reports of an analysis: CSV tables and Graphviz graphs. The
//! reports are a format contract only; nothing in the crate consumes them.
//!
//! # Input line formats
//!
//! A marker line stores the token sequence of one oriented read:
//!
//! ```text
//! readId strand token token ...
//! ```
//!
//! An alignment line stores one alignment in its strand-canonical form, with
//! `+` for same-strand and `-` for opposite-strand alignments:
//!
//! ```text
//! readId0 readId1 +|- ordinal0:ordinal1 ...
//! ```
//!
//! Empty lines and lines starting with `#` are skipped by the loader.

use crate::{MarkerToken, ReadId, Strand};
use crate::{Error, Result};
use crate::analyze::{BranchConsistency, BackendGraph, CoverageAnalysis, CoverageHistogram, ReadAnalysis, RATIO_BINS};
use crate::canonical::{SequenceId, SequenceSet};
use crate::de_bruijn::{CoverageHistograms, DeBruijnGraph};
use crate::marker_graph::MarkerGraph;

use std::io::{self, Write};


//-----------------------------------------------------------------------------

// Input parsing.

fn invalid(line_num: usize, msg: String) -> Error {
    Error::InvalidInput { line: line_num, msg }
}

fn parse_field<T: std::str::FromStr>(field: &str, line_num: usize, name: &str) -> Result<T> {
    field.parse().map_err(|_| {
        invalid(line_num, format!("Invalid {}: {}", name, field))
    })
}

/// Parses a marker line into a read identifier, a strand, and the tokens.
///
/// Returns [`Error::InvalidInput`] with the given line number on a malformed line.
pub fn parse_marker_line(line: &str, line_num: usize) -> Result<(ReadId, Strand, Vec<MarkerToken>)> {
    let mut fields = line.split_whitespace();
    let read_id = fields.next().ok_or_else(|| {
        invalid(line_num, String::from("Missing read id"))
    })?;
    let read_id: ReadId = parse_field(read_id, line_num, "read id")?;
    let strand = fields.next().ok_or_else(|| {
        invalid(line_num, String::from("Missing strand"))
    })?;
    let strand: Strand = parse_field(strand, line_num, "strand")?;
    if strand > 1 {
        return Err(invalid(line_num, format!("Invalid strand: {}", strand)));
    }

    let mut tokens: Vec<MarkerToken> = Vec::new();
    for field in fields {
        tokens.push(parse_field(field, line_num, "marker token")?);
    }
    Ok((read_id, strand, tokens))
}

/// Parses an alignment line into the read pair, the same-strand flag, and the
/// ordinal pairs.
///
/// Returns [`Error::InvalidInput`] with the given line number on a malformed line.
pub fn parse_alignment_line(line: &str, line_num: usize) -> Result<(ReadId, ReadId, bool, Vec<[u32; 2]>)> {
    let mut fields = line.split_whitespace();
    let read0 = fields.next().ok_or_else(|| {
        invalid(line_num, String::from("Missing first read id"))
    })?;
    let read0: ReadId = parse_field(read0, line_num, "read id")?;
    let read1 = fields.next().ok_or_else(|| {
        invalid(line_num, String::from("Missing second read id"))
    })?;
    let read1: ReadId = parse_field(read1, line_num, "read id")?;

    let is_same_strand = match fields.next() {
        Some("+") => true,
        Some("-") => false,
        Some(field) => {
            return Err(invalid(line_num, format!("Invalid strand flag: {}", field)));
        },
        None => {
            return Err(invalid(line_num, String::from("Missing strand flag")));
        },
    };

    let mut ordinals: Vec<[u32; 2]> = Vec::new();
    for field in fields {
        let (first, second) = field.split_once(':').ok_or_else(|| {
            invalid(line_num, format!("Invalid ordinal pair: {}", field))
        })?;
        ordinals.push([
            parse_field(first, line_num, "ordinal")?,
            parse_field(second, line_num, "ordinal")?,
        ]);
    }
    Ok((read0, read1, is_same_strand, ordinals))
}

//-----------------------------------------------------------------------------

// CSV reports for the coverage analysis.

// Ratios are undefined where nothing covers the ordinal.
fn ratio_cell(value: u64, range: u64) -> String {
    if range == 0 {
        String::from("-")
    } else {
        format!("{}", value as f64 / range as f64)
    }
}

/// Writes the per-ordinal alignment coverage table.
///
/// One row per marker ordinal of the query: coverage and range coverage split
/// by strand, coverage ratios, and the aligned ordinal in each aligned read.
/// A `No` cell marks an ordinal inside the matched span of an alignment but
/// not aligned by it.
pub fn write_ordinal_table<W: Write>(out: &mut W, analysis: &CoverageAnalysis) -> io::Result<()> {
    write!(out, "Ordinal,Coverage,Same strand coverage,Opposite strand coverage,\
        Range coverage,Same strand range coverage,Opposite strand range coverage,\
        Coverage ratio,Same strand coverage ratio,Opposite strand coverage ratio")?;
    for oriented_read in analysis.oriented_read_ids.iter() {
        write!(out, ",{}", oriented_read)?;
    }
    writeln!(out)?;

    for ordinal in 0..analysis.marker_count() {
        let [same, opposite] = analysis.coverage[ordinal];
        let total = same + opposite;
        let [range_same, range_opposite] = analysis.range_coverage[ordinal];
        let range_total = range_same + range_opposite;

        write!(
            out, "{},{},{},{},{},{},{},{},{},{}",
            ordinal, total, same, opposite,
            range_total, range_same, range_opposite,
            ratio_cell(total, range_total),
            ratio_cell(same, range_same),
            ratio_cell(opposite, range_opposite)
        )?;
        for (i, cell) in analysis.ordinal_table[ordinal].iter().enumerate() {
            match cell {
                Some(partner_ordinal) => write!(out, ",{}", partner_ordinal)?,
                None => {
                    let [first, last] = analysis.spans[i];
                    if ordinal as u32 >= first && ordinal as u32 <= last {
                        write!(out, ",No")?;
                    } else {
                        write!(out, ",")?;
                    }
                },
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the histogram of coverage and range coverage values.
pub fn write_coverage_histogram<W: Write>(out: &mut W, histogram: &CoverageHistogram) -> io::Result<()> {
    writeln!(out, "Coverage value,Total,Same strand,Opposite strand,\
        Range total,Range same strand,Range opposite strand")?;
    for (value, counts) in histogram.counts.iter().enumerate() {
        write!(out, "{}", value)?;
        for count in counts.iter() {
            write!(out, ",{}", count)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the binned histogram of coverage ratios.
pub fn write_coverage_ratio_histogram<W: Write>(out: &mut W, histogram: &CoverageHistogram) -> io::Result<()> {
    writeln!(out, "Coverage ratio,Total,Same strand,Opposite strand")?;
    let bin_size = 1.0 / RATIO_BINS as f64;
    for (bin, counts) in histogram.ratios.iter().enumerate() {
        write!(out, "{:.1}", bin as f64 * bin_size)?;
        for count in counts.iter() {
            write!(out, ",{}", count)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

//-----------------------------------------------------------------------------

// CSV reports for the mini-assembly.

/// Writes the vertex coverage histograms of the De Bruijn backend.
///
/// The histograms are computed before low-coverage vertices are removed, so
/// they show the coverage distribution the thresholds apply to.
pub fn write_vertex_coverage_histogram<W: Write>(out: &mut W, histograms: &CoverageHistograms) -> io::Result<()> {
    writeln!(out, "Coverage,Total coverage frequency,\
        Same strand coverage frequency,Opposite strand coverage frequency")?;
    let rows = histograms.total.len()
        .max(histograms.same_strand.len())
        .max(histograms.opposite_strand.len());
    for coverage in 0..rows {
        writeln!(
            out, "{},{},{},{}",
            coverage,
            histograms.total.get(coverage).unwrap_or(&0),
            histograms.same_strand.get(coverage).unwrap_or(&0),
            histograms.opposite_strand.get(coverage).unwrap_or(&0)
        )?;
    }
    Ok(())
}

/// Writes the pairwise branch similarity matrix.
///
/// Each cell is `same/different/similarity`. The similarity is `-` for pairs
/// that never appear at the same branch locus, which is not the same thing as
/// a similarity of 0.
pub fn write_similarity_matrix<W: Write>(out: &mut W, consistency: &BranchConsistency) -> io::Result<()> {
    for a in 0..consistency.sequence_count() {
        for b in 0..consistency.sequence_count() {
            let similarity = match consistency.similarity(a, b) {
                Some(value) => format!("{}", value),
                None => String::from("-"),
            };
            write!(
                out, "{}/{}/{},",
                consistency.same_branch_count(a, b),
                consistency.different_branch_count(a, b),
                similarity
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the per-neighbor bubble summary.
///
/// One row per neighbor sequence: how often it takes the same or a different
/// branch as the query, with the corresponding ratios (`-` when the pair
/// shares no branch locus).
pub fn write_bubble_summary<W: Write>(out: &mut W, analysis: &ReadAnalysis) -> io::Result<()> {
    writeln!(out, "SequenceId,OrientedReadId,SameBubbleCount,DifferentBubbleCount,\
        TotalCount,SameBubbleRatio,DifferentBubbleRatio")?;
    for (sequence_id, same, different, same_ratio, different_ratio) in analysis.bubble_summary() {
        let format_ratio = |ratio: Option<f64>| match ratio {
            Some(value) => format!("{}", value),
            None => String::from("-"),
        };
        writeln!(
            out, "{},{},{},{},{},{},{}",
            sequence_id,
            analysis.sequences.oriented_read(sequence_id),
            same, different, same + different,
            format_ratio(same_ratio),
            format_ratio(different_ratio)
        )?;
    }
    Ok(())
}

//-----------------------------------------------------------------------------

// Graphviz reports.

/// Writes the De Bruijn graph in Graphviz format.
///
/// Vertex labels list each occurrence as `orientedRead:ordinal` in read
/// coordinates. Vertices containing the query are filled.
pub fn write_de_bruijn_graph<W: Write>(
    out: &mut W, graph: &DeBruijnGraph, sequences: &SequenceSet
) -> io::Result<()> {
    let query_id = sequences.query_sequence_id();
    writeln!(out, "digraph DeBruijnGraph {{")?;

    for (index, vertex) in graph.live_vertices() {
        write!(out, "{}[label=\"{}", index, index)?;
        for occurrence in vertex.occurrences() {
            write!(
                out, "\\n{}:{}",
                sequences.oriented_read(occurrence.sequence_id),
                sequences.to_read_ordinal(occurrence.sequence_id, occurrence.position)
            )?;
        }
        write!(out, "\"")?;
        if vertex.contains_sequence(query_id) {
            write!(out, " style=filled fillcolor=pink")?;
        }
        writeln!(out, "];")?;
    }

    for edge in graph.edges() {
        writeln!(out, "{}->{};", edge.from, edge.to)?;
    }

    writeln!(out, "}}")
}

/// Writes the marker graph in Graphviz format.
///
/// Vertex sizes and edge widths scale with the square root of coverage, and
/// the parts containing the query are drawn in blue.
pub fn write_marker_graph<W: Write>(
    out: &mut W, graph: &MarkerGraph, query_id: SequenceId
) -> io::Result<()> {
    writeln!(out, "digraph MarkerGraph {{")?;
    writeln!(out, "tooltip = \" \";")?;

    for (index, vertex) in graph.live_vertices() {
        let coverage = vertex.coverage();
        write!(out, "{}[width={}", index, 0.05 * (coverage as f64).sqrt())?;
        if vertex.contains_sequence(query_id) {
            write!(out, " color=blue")?;
        }
        writeln!(out, " tooltip=\"{}\"];", coverage)?;
    }

    for edge in graph.live_edges() {
        let coverage = edge.coverage();
        write!(out, "{}->{}[penwidth={}", edge.from, edge.to, (coverage as f64).sqrt())?;
        if edge.contains_sequence(query_id) {
            write!(out, " color=blue")?;
        }
        writeln!(out, " tooltip=\"{}\"];", coverage)?;
    }

    writeln!(out, "}}")
}

/// Writes the read similarity graph in Graphviz format.
///
/// One vertex per sequence, with the branch agreement against the query in the
/// tooltip. The query is cyan; neighbors that disagree with the query more
/// often than they agree are red, and ties are orange. The edges are the top
/// pairs from [`BranchConsistency::edge_table`].
pub fn write_read_similarity_graph<W: Write>(
    out: &mut W, analysis: &ReadAnalysis, neighbor_count: usize
) -> io::Result<()> {
    let query_id = analysis.query_sequence_id();
    writeln!(out, "graph G{{")?;

    for sequence_id in 0..analysis.sequences.len() {
        let same = analysis.consistency.same_branch_count(sequence_id, query_id);
        let different = analysis.consistency.different_branch_count(sequence_id, query_id);
        write!(
            out, "{}[tooltip=\"{} {}: same branch {}: different branch {}\"",
            sequence_id, sequence_id,
            analysis.sequences.oriented_read(sequence_id),
            same, different
        )?;
        if sequence_id == query_id {
            write!(out, " color=cyan")?;
        } else if different > same {
            write!(out, " color=red")?;
        } else if different == same && different > 0 {
            write!(out, " color=orange")?;
        }
        writeln!(out, "]")?;
    }

    for (_, a, b) in analysis.consistency.edge_table(neighbor_count) {
        writeln!(out, "{}--{};", a, b)?;
    }

    writeln!(out, "}}")
}

/// Writes the consensus graph of an analysis in Graphviz format.
///
/// Dispatches to the writer of the backend that built the graph.
pub fn write_consensus_graph<W: Write>(out: &mut W, analysis: &ReadAnalysis) -> io::Result<()> {
    match &analysis.graph {
        BackendGraph::DeBruijn(graph, _) => {
            write_de_bruijn_graph(out, graph, &analysis.sequences)
        },
        BackendGraph::MarkerGraph(graph) => {
            write_marker_graph(out, graph, analysis.query_sequence_id())
        },
    }
}

//-----------------------------------------------------------------------------

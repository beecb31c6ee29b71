use super::*;

use crate::{AlignmentBase, StoreData, formats, utils};

use std::fs;
use std::path::PathBuf;

//-----------------------------------------------------------------------------

// Utility functions.

// A query (read 0) with three aligned reads. Reads 1 and 2 branch at marker
// position 2 of the query, where read 1 carries token 3 and read 2 carries
// token 9. Read 3 only aligns to the tail and is absent from the locus.
fn bubble_database(name_part: &str) -> (PathBuf, AlignmentBase) {
    let mut data = StoreData::new();
    data.add_markers(0, 0, vec![1, 2, 3, 4, 5]).unwrap();
    data.add_markers(0, 1, vec![15, 14, 13, 12, 11]).unwrap();
    data.add_markers(1, 0, vec![1, 2, 3, 4, 5]).unwrap();
    data.add_markers(1, 1, vec![15, 14, 13, 12, 11]).unwrap();
    data.add_markers(2, 0, vec![1, 2, 9, 4, 5]).unwrap();
    data.add_markers(2, 1, vec![15, 14, 19, 12, 11]).unwrap();
    data.add_markers(3, 0, vec![4, 5]).unwrap();
    data.add_markers(3, 1, vec![15, 14]).unwrap();

    data.add_alignment(0, 1, true, vec![[0, 0], [1, 1], [2, 2], [3, 3], [4, 4]]).unwrap();
    data.add_alignment(0, 2, true, vec![[0, 0], [1, 1], [3, 3], [4, 4]]).unwrap();
    data.add_alignment(0, 3, true, vec![[3, 0], [4, 1]]).unwrap();
    data.add_alignment(1, 2, true, vec![[0, 0], [1, 1], [3, 3], [4, 4]]).unwrap();
    data.add_alignment(1, 3, true, vec![[3, 0], [4, 1]]).unwrap();
    data.add_alignment(2, 3, true, vec![[3, 0], [4, 1]]).unwrap();

    let db_file = utils::temp_file_name(name_part);
    AlignmentBase::create(&data, &db_file).unwrap();
    let database = AlignmentBase::open(&db_file).unwrap();
    (db_file, database)
}

// Permissive coverage thresholds for the small test inputs.
fn test_params(backend: Backend) -> AnalysisParams {
    AnalysisParams {
        backend,
        window_length: 1,
        min_total_coverage: 1,
        min_same_strand_coverage: 0,
        min_opposite_strand_coverage: 0,
        neighbor_count: 3,
    }
}

//-----------------------------------------------------------------------------

// Tests for `Backend` and `AnalysisParams`.

#[test]
fn backend_names() {
    for backend in [Backend::DeBruijn, Backend::MarkerGraph] {
        let name = backend.to_string();
        assert_eq!(name.parse::<Backend>(), Ok(backend), "Backend name round trip failed");
    }
    assert!("debruijn".parse::<Backend>().is_err(), "An invalid backend name was accepted");
}

#[test]
fn default_params() {
    let params = AnalysisParams::default();
    assert_eq!(params.backend, Backend::MarkerGraph, "Wrong default backend");
    assert_eq!(params.window_length, 3, "Wrong default window length");
    assert_eq!(params.min_total_coverage, 5, "Wrong default total coverage threshold");
    assert_eq!(params.min_same_strand_coverage, 2, "Wrong default same-strand threshold");
    assert_eq!(params.min_opposite_strand_coverage, 2, "Wrong default opposite-strand threshold");
    assert_eq!(params.neighbor_count, 3, "Wrong default neighbor count");
}

//-----------------------------------------------------------------------------

// Tests for `analyze_coverage`.

#[test]
fn coverage_analysis() {
    let (db_file, database) = bubble_database("coverage-analysis");
    let mut interface = crate::StoreInterface::new(&database).unwrap();

    let query = OrientedReadId::new(0, 0);
    let analysis = analyze_coverage(query, &mut interface).unwrap();
    assert_eq!(analysis.marker_count(), 5, "Wrong marker count");
    assert_eq!(analysis.alignment_count(), 3, "Wrong alignment count");
    assert_eq!(analysis.spans, vec![[0, 4], [0, 4], [3, 4]], "Wrong matched spans");

    // The branch locus is aligned only by read 1; reads 1 and 2 span it.
    assert_eq!(analysis.coverage[2], [1, 0], "Wrong coverage at the branch locus");
    assert_eq!(analysis.range_coverage[2], [2, 0], "Wrong range coverage at the branch locus");
    assert_eq!(analysis.ordinal_table[2], vec![Some(2), None, None], "Wrong ordinal table row");

    // The tail is aligned by everything.
    assert_eq!(analysis.coverage[4], [3, 0], "Wrong coverage at the tail");
    assert_eq!(analysis.ordinal_table[4], vec![Some(4), Some(4), Some(1)], "Wrong ordinal table row");

    let histogram = analysis.histograms();
    let total: u64 = histogram.counts.iter().map(|row| row[0]).sum();
    assert_eq!(total, 5, "The histogram does not cover every ordinal");

    drop(interface);
    drop(database);
    fs::remove_file(&db_file).unwrap();
}

//-----------------------------------------------------------------------------

// Tests for `BranchConsistency`.

#[test]
fn consistency_matrices() {
    let mut consistency = BranchConsistency::new(4);
    consistency.add_signature(&[Some(0), Some(1), None, Some(0)]);
    consistency.add_signature(&[Some(1), Some(1), None, Some(1)]);

    for a in 0..4 {
        for b in 0..4 {
            assert_eq!(
                consistency.same_branch_count(a, b), consistency.same_branch_count(b, a),
                "The same-branch matrix is not symmetric"
            );
            assert_eq!(
                consistency.different_branch_count(a, b), consistency.different_branch_count(b, a),
                "The different-branch matrix is not symmetric"
            );
        }
    }

    assert_eq!(consistency.same_branch_count(0, 3), 2, "Wrong same-branch count");
    assert_eq!(consistency.different_branch_count(0, 1), 1, "Wrong different-branch count");
    assert_eq!(consistency.same_branch_count(0, 1), 1, "Wrong same-branch count");
    assert_eq!(consistency.similarity(0, 3), Some(1.0), "Wrong similarity");
    assert_eq!(consistency.similarity(0, 1), Some(0.5), "Wrong similarity");
    assert_eq!(consistency.similarity(0, 2), None, "A pair without shared loci has a similarity");
}

#[test]
fn edge_table_truncation() {
    let mut consistency = BranchConsistency::new(10);
    // Sequence i takes branch i % 2 at every locus.
    let signature: Vec<Option<usize>> = (0..10).map(|i| Some(i % 2)).collect();
    consistency.add_signature(&signature);
    consistency.add_signature(&signature);

    let table = consistency.edge_table(3);
    assert_eq!(table.len(), 3 * 10 / 2, "Wrong edge table size");
    for i in 1..table.len() {
        assert!(table[i - 1] >= table[i], "The edge table is not sorted by decreasing delta");
    }
    // Agreeing pairs (delta 2) outrank disagreeing pairs (delta -2).
    assert_eq!(table[0].0, 2, "Wrong best delta");
}

//-----------------------------------------------------------------------------

// End-to-end tests for `analyze_read`.

fn check_bubble_analysis(analysis: &ReadAnalysis) {
    assert_eq!(analysis.sequences.len(), 4, "Wrong number of sequences");
    let query = analysis.query_sequence_id();
    assert_eq!(query, 3, "The query is not the last sequence");

    // One bubble: the query and read 1 on one branch, read 2 on the other,
    // read 3 absent.
    assert_eq!(analysis.bubble_count(), 1, "Wrong number of branch loci");
    assert_eq!(
        analysis.signatures[0],
        vec![Some(0), Some(1), None, Some(0)],
        "Wrong branch signature"
    );

    assert_eq!(analysis.consistency.same_branch_count(query, 0), 1, "Wrong same-branch count");
    assert_eq!(analysis.consistency.different_branch_count(query, 1), 1, "Wrong different-branch count");
    assert_eq!(analysis.consistency.similarity(query, 0), Some(1.0), "Wrong similarity");
    assert_eq!(analysis.consistency.similarity(query, 2), None, "An absent pair has a similarity");

    let summary = analysis.bubble_summary();
    assert_eq!(summary.len(), 3, "Wrong number of summary rows");
    assert_eq!(summary[0], (0, 1, 0, Some(1.0), Some(0.0)), "Wrong summary for an agreeing read");
    assert_eq!(summary[1], (1, 0, 1, Some(0.0), Some(1.0)), "Wrong summary for a disagreeing read");
    assert_eq!(summary[2], (2, 0, 0, None, None), "Wrong summary for an absent read");
}

#[test]
fn marker_graph_pipeline() {
    let (db_file, database) = bubble_database("marker-graph-pipeline");
    let mut interface = crate::StoreInterface::new(&database).unwrap();

    let query = OrientedReadId::new(0, 0);
    let params = test_params(Backend::MarkerGraph);
    let analysis = analyze_read(query, &mut interface, &params).unwrap();

    assert!(matches!(analysis.graph, BackendGraph::MarkerGraph(_)), "Wrong backend graph");
    let (vertices, edges) = analysis.graph.size();
    assert_eq!(vertices, 6, "Wrong number of vertices");
    assert_eq!(edges, 6, "Wrong number of edges");
    check_bubble_analysis(&analysis);

    drop(interface);
    drop(database);
    fs::remove_file(&db_file).unwrap();
}

#[test]
fn de_bruijn_pipeline() {
    let (db_file, database) = bubble_database("de-bruijn-pipeline");
    let mut interface = crate::StoreInterface::new(&database).unwrap();

    let query = OrientedReadId::new(0, 0);
    let params = test_params(Backend::DeBruijn);
    let analysis = analyze_read(query, &mut interface, &params).unwrap();

    match &analysis.graph {
        BackendGraph::DeBruijn(graph, histograms) => {
            assert_eq!(graph.live_vertex_count(), 6, "Wrong number of vertices");
            // Tokens 1, 2, 4 appear in three sequences plus the query.
            assert_eq!(histograms.total.get(4), Some(&2), "Wrong coverage histogram");
        },
        BackendGraph::MarkerGraph(_) => panic!("Wrong backend graph"),
    }
    check_bubble_analysis(&analysis);

    drop(interface);
    drop(database);
    fs::remove_file(&db_file).unwrap();
}

#[test]
fn strict_thresholds_remove_the_bubble() {
    let (db_file, database) = bubble_database("strict-thresholds");
    let mut interface = crate::StoreInterface::new(&database).unwrap();

    // The branch taken by read 2 alone cannot meet a coverage threshold of 2.
    let mut params = test_params(Backend::MarkerGraph);
    params.min_total_coverage = 2;
    let query = OrientedReadId::new(0, 0);
    let analysis = analyze_read(query, &mut interface, &params).unwrap();
    assert_eq!(analysis.bubble_count(), 0, "A bubble survived the coverage thresholds");

    drop(interface);
    drop(database);
    fs::remove_file(&db_file).unwrap();
}

//-----------------------------------------------------------------------------

// Report smoke tests over a full analysis.

#[test]
fn analysis_reports() {
    let (db_file, database) = bubble_database("analysis-reports");
    let mut interface = crate::StoreInterface::new(&database).unwrap();

    let query = OrientedReadId::new(0, 0);
    let params = test_params(Backend::MarkerGraph);
    let analysis = analyze_read(query, &mut interface, &params).unwrap();

    let mut out: Vec<u8> = Vec::new();
    formats::write_bubble_summary(&mut out, &analysis).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("1-0,"), "The bubble summary does not name the oriented reads");
    assert!(text.contains(",-"), "The bubble summary does not use a sentinel for undefined ratios");

    let mut out: Vec<u8> = Vec::new();
    formats::write_read_similarity_graph(&mut out, &analysis, params.neighbor_count).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("graph G{"), "Wrong similarity graph format");
    assert!(text.contains("color=cyan"), "The query vertex is not highlighted");
    assert!(text.contains("color=red"), "A disagreeing read is not highlighted");

    let mut out: Vec<u8> = Vec::new();
    formats::write_consensus_graph(&mut out, &analysis).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("digraph MarkerGraph {"), "Wrong consensus graph format");
    assert!(text.contains("color=blue"), "The query path is not highlighted");

    let mut out: Vec<u8> = Vec::new();
    formats::write_similarity_matrix(&mut out, &analysis.consistency).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 4, "Wrong similarity matrix size");

    drop(interface);
    drop(database);
    fs::remove_file(&db_file).unwrap();
}

//-----------------------------------------------------------------------------

use super::*;

//-----------------------------------------------------------------------------

// Utility functions.

// The vertex containing the given position, if it is live.
fn vertex_at(graph: &MarkerGraph, sequence_id: SequenceId, position: u32) -> Option<usize> {
    for (index, vertex) in graph.vertices.iter().enumerate() {
        if vertex.occurrences().contains(&Occurrence { sequence_id, position }) {
            return Some(index);
        }
    }
    None
}

// Two neighbors branching at one locus, a neighbor away from the locus,
// and the query. The query is the last sequence.
fn bubble_graph() -> MarkerGraph {
    let mut graph = MarkerGraph::new();
    graph.add_sequence(&[1, 9, 2]);
    graph.add_sequence(&[1, 8, 2]);
    graph.add_sequence(&[3, 4]);
    let query = graph.add_sequence(&[1, 9, 2]);
    graph.done_adding_sequences();

    graph.merge(query, 0, &[[0, 0], [1, 1], [2, 2]]);
    graph.merge(query, 1, &[[0, 0], [2, 2]]);
    graph.done_merging();
    graph
}

//-----------------------------------------------------------------------------

// Tests for building the graph.

#[test]
fn cells_partition_into_vertices() {
    let graph = bubble_graph();
    let total_cells: usize = graph.sequences.iter().map(|sequence| sequence.len()).sum();
    let total_coverage: usize = graph.vertices.iter().map(|vertex| vertex.coverage()).sum();
    assert_eq!(total_coverage, total_cells, "The vertices do not partition the cells");

    // Every position is in exactly one vertex.
    for sequence_id in 0..graph.sequence_count() {
        for position in 0..graph.sequences[sequence_id].len() {
            let matches = graph.vertices.iter().filter(|vertex| {
                vertex.occurrences().contains(&Occurrence {
                    sequence_id, position: position as u32,
                })
            }).count();
            assert_eq!(matches, 1, "Position {} of sequence {} is in {} vertices",
                position, sequence_id, matches);
        }
    }
}

#[test]
fn merged_positions_share_a_vertex() {
    let graph = bubble_graph();
    let shared_start = vertex_at(&graph, 3, 0).unwrap();
    assert_eq!(vertex_at(&graph, 0, 0), Some(shared_start), "Merged positions are in different vertices");
    assert_eq!(vertex_at(&graph, 1, 0), Some(shared_start), "Merged positions are in different vertices");

    let branch = vertex_at(&graph, 3, 1).unwrap();
    assert_eq!(vertex_at(&graph, 0, 1), Some(branch), "Merged positions are in different vertices");
    assert_ne!(vertex_at(&graph, 1, 1), Some(branch), "Unmerged positions share a vertex");

    let vertex = graph.vertex(shared_start);
    assert_eq!(vertex.coverage(), 3, "Wrong coverage for a merged vertex");
    assert_eq!(vertex.sequence_ids(), vec![0, 1, 3], "Wrong sequences for a merged vertex");
    assert!(!vertex.contains_sequence(2), "Wrong membership for a merged vertex");
}

#[test]
fn edges_follow_sequences() {
    let graph = bubble_graph();
    let start = vertex_at(&graph, 3, 0).unwrap();
    let branch9 = vertex_at(&graph, 3, 1).unwrap();
    let branch8 = vertex_at(&graph, 1, 1).unwrap();
    let end = vertex_at(&graph, 3, 2).unwrap();

    let mut truth = vec![
        (start, branch9, vec![0, 3]),
        (branch9, end, vec![0, 3]),
        (start, branch8, vec![1]),
        (branch8, end, vec![1]),
        (vertex_at(&graph, 2, 0).unwrap(), vertex_at(&graph, 2, 1).unwrap(), vec![2]),
    ];
    truth.sort();
    let mut edges: Vec<(usize, usize, Vec<SequenceId>)> = graph.live_edges()
        .map(|edge| (edge.from, edge.to, edge.sequence_ids.clone()))
        .collect();
    edges.sort();
    assert_eq!(edges, truth, "Wrong edges");
}

#[test]
#[should_panic]
fn merge_rejects_token_mismatch() {
    let mut graph = MarkerGraph::new();
    graph.add_sequence(&[1, 9]);
    graph.add_sequence(&[1, 8]);
    graph.done_adding_sequences();
    graph.merge(0, 1, &[[1, 1]]);
}

#[test]
#[should_panic]
fn no_sequences_after_done_adding() {
    let mut graph = MarkerGraph::new();
    graph.add_sequence(&[1, 2]);
    graph.done_adding_sequences();
    graph.add_sequence(&[3, 4]);
}

//-----------------------------------------------------------------------------

// Tests for simplification.

#[test]
fn self_edges() {
    let mut graph = MarkerGraph::new();
    graph.add_sequence(&[5, 5]);
    graph.add_sequence(&[5]);
    graph.done_adding_sequences();
    // Both positions of the first sequence merge with the second sequence,
    // collapsing them into one vertex.
    graph.merge(0, 1, &[[0, 0]]);
    graph.merge(0, 1, &[[1, 0]]);
    graph.done_merging();

    assert_eq!(graph.live_edge_count(), 1, "Wrong number of edges");
    let removed = graph.remove_self_edges();
    assert_eq!(removed, 1, "The self edge was not removed");
    assert_eq!(graph.live_edge_count(), 0, "Unexpected live edges remain");
}

#[test]
fn coverage_filter_and_isolated_vertices() {
    let mut graph = bubble_graph();
    let branch8 = vertex_at(&graph, 1, 1).unwrap();
    let same_strand = vec![true, true, true, true];

    // This removes the edges supported only by sequence 1 or sequence 2.
    let removed = graph.remove_low_coverage_edges(2, 0, 0, &same_strand);
    assert_eq!(removed, 3, "Wrong number of low-coverage edges");

    let removed = graph.remove_isolated_vertices();
    assert_eq!(removed, 3, "Wrong number of isolated vertices");
    assert!(!graph.is_live_vertex(branch8), "A disconnected branch vertex survived");
}

#[test]
fn strand_aware_coverage_filter() {
    let mut graph = MarkerGraph::new();
    graph.add_sequence(&[1, 2]);
    graph.add_sequence(&[1, 2]);
    let query = graph.add_sequence(&[1, 2]);
    graph.done_adding_sequences();
    graph.merge(query, 0, &[[0, 0], [1, 1]]);
    graph.merge(query, 1, &[[0, 0], [1, 1]]);
    graph.done_merging();
    assert_eq!(graph.live_edge_count(), 1, "Wrong number of edges");

    // All support is on the query strand.
    let same_strand = vec![true, true, true];
    let removed = graph.remove_low_coverage_edges(3, 1, 1, &same_strand);
    assert_eq!(removed, 1, "A single-strand edge survived");
}

//-----------------------------------------------------------------------------

// Tests for bubbles.

#[test]
fn single_bubble() {
    let graph = bubble_graph();
    let bubbles = graph.find_bubbles();
    assert_eq!(bubbles.len(), 1, "Wrong number of bubbles");

    let bubble = &bubbles[0];
    let branch9 = vertex_at(&graph, 3, 1).unwrap();
    let branch8 = vertex_at(&graph, 1, 1).unwrap();
    let mut branches = vec![branch9, branch8];
    branches.sort_unstable();
    assert_eq!(bubble.branches, branches, "Wrong branch vertices");

    // The query and sequence 0 take one branch, sequence 1 the other, and
    // sequence 2 is absent from the locus.
    let nine_branch = bubble.branches.iter().position(|index| *index == branch9).unwrap();
    let truth = vec![
        Some(nine_branch), Some(1 - nine_branch), None, Some(nine_branch),
    ];
    assert_eq!(bubble.branch_table, truth, "Wrong branch table");
}

#[test]
fn bubble_requires_disjoint_branches() {
    let mut graph = MarkerGraph::new();
    // The first sequence visits both branch tokens.
    graph.add_sequence(&[1, 9, 2, 1, 8, 2]);
    graph.add_sequence(&[1, 8, 2]);
    let query = graph.add_sequence(&[1, 9, 2]);
    graph.done_adding_sequences();
    graph.merge(query, 0, &[[0, 0], [1, 1], [2, 2]]);
    graph.merge(query, 0, &[[0, 3], [2, 5]]);
    graph.merge(query, 1, &[[0, 0], [2, 2]]);
    graph.merge(0, 1, &[[3, 0], [4, 1], [5, 2]]);
    graph.done_merging();

    let bubbles = graph.find_bubbles();
    assert!(bubbles.is_empty(), "A bubble with overlapping branch sets was reported");
}

#[test]
fn no_bubble_without_shared_flanks() {
    let mut graph = MarkerGraph::new();
    graph.add_sequence(&[1, 9, 2]);
    let query = graph.add_sequence(&[3, 8, 2]);
    graph.done_adding_sequences();
    graph.merge(query, 0, &[[2, 2]]);
    graph.done_merging();

    let bubbles = graph.find_bubbles();
    assert!(bubbles.is_empty(), "A bubble without a shared predecessor was reported");
}

//-----------------------------------------------------------------------------

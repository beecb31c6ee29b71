//! # Mini-assembly: local consensus analysis of stored read alignments.
//!
//! This is a prototype for analyzing the stored pairwise alignments of a single
//! oriented read. The alignments and the marker sequences of the reads are
//! stored in a SQLite database, and one analysis run builds a small local
//! assembly around the query read.
//!
//! # Alignment store
//!
//! Reads are represented as sequences of marker tokens, with a separate token
//! sequence for each orientation of the read. Each pairwise alignment is a
//! strictly increasing sequence of aligned marker ordinal pairs, stored once in
//! a strand-canonical form: the first read on strand 0. Table `Markers` stores
//! the token sequences and table `Alignments` stores the compressed alignments,
//! indexed by both reads.
//!
//! See [`AlignmentBase`], [`StoreData`], and [`StoreInterface`] for the
//! database interface, and [`Alignment`] and [`OrientedReadId`] for the related
//! structures. Module [`canonical`] transforms stored alignments into the frame
//! of an arbitrary query oriented read.
//!
//! # Mini-assembly
//!
//! [`analyze::analyze_read`] canonicalizes the alignments of a query read,
//! projects the matched spans of the aligned reads into marker-token sequences,
//! and builds a local consensus graph with one of two backends: a windowed De
//! Bruijn graph ([`de_bruijn`]) or a union-find marker graph
//! ([`marker_graph`]). The graph is simplified with strand-aware coverage
//! thresholds, and the loci where the sequences split into mutually exclusive
//! branches yield pairwise branch agreement statistics between the reads.
//!
//! [`analyze::analyze_coverage`] is a simpler per-ordinal coverage analysis of
//! the same alignments. Module [`formats`] writes the CSV and Graphviz reports
//! of both analyses.

pub mod alignment;
pub mod analyze;
pub mod canonical;
pub mod db;
pub mod de_bruijn;
pub mod error;
pub mod formats;
pub mod marker_graph;
pub mod utils;

pub use alignment::{Alignment, AlignmentRecord, MarkerToken, OrientedReadId, ReadId, Strand, StoredAlignmentInformation};
pub use analyze::{AnalysisParams, Backend, ReadAnalysis};
pub use db::{AlignmentBase, StoreData, StoreInterface};
pub use error::{Error, Result};

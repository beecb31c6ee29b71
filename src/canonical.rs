//! Canonicalizing stored alignments around a query oriented read.
//!
//! Alignments are persisted in a strand-canonical form with the first read on
//! strand 0. The functions in this module reorient them so that the first
//! coordinate always refers to a chosen query oriented read, swapping the two
//! ordinal columns and reverse complementing as necessary. Stored alignments
//! are validated before they are reoriented, as corruption in the store must
//! surface here as an error and not as a broken transform or a failure deep
//! inside a graph backend.
//!
//! [`SequenceSet`] then projects the marker-token sequences that take part in
//! a mini-assembly: the full sequence of the query and the matched span of
//! each aligned neighbor.

use crate::{Alignment, OrientedReadId, MarkerToken, StoredAlignmentInformation, StoreInterface};
use crate::{Error, Result};


//-----------------------------------------------------------------------------

// Decompresses an alignment and checks it against the stored summary.
fn decompress_and_check(
    store: &mut StoreInterface, alignment_id: u32, expected_pairs: u32
) -> Result<Alignment> {
    let payload = store.payload(alignment_id)?;
    let alignment = Alignment::decompress(&payload)?;
    if alignment.len() != expected_pairs as usize {
        return Err(Error::DataIntegrity(format!(
            "Alignment {}: decompressed {} pairs, expected {}",
            alignment_id, alignment.len(), expected_pairs
        )));
    }
    if alignment.is_empty() {
        return Err(Error::DataIntegrity(format!(
            "Alignment {} has no ordinal pairs", alignment_id
        )));
    }
    Ok(alignment)
}

// Validates a decompressed alignment against the marker counts of its reads.
// This must happen in the stored orientation, before any transform: the
// transforms assume in-range ordinals.
fn validate(
    store: &mut StoreInterface, alignment: &Alignment,
    oriented0: OrientedReadId, oriented1: OrientedReadId
) -> Result<()> {
    alignment.check_strictly_increasing()?;
    let count0 = store.marker_count(oriented0)? as u32;
    let count1 = store.marker_count(oriented1)? as u32;
    alignment.check_ordinal_ranges(count0, count1)
}

/// Returns all stored alignments involving the query, reoriented for the query.
///
/// Each returned alignment has the query as its first coordinate. This may
/// require swapping the two ordinal columns (if the stored first read differs
/// from the query read) and then reverse complementing (if the strand still
/// differs): each ordinal is reflected within its read and the pair order is
/// reversed.
///
/// # Errors
///
/// Returns [`Error::DataIntegrity`] if a stored alignment cannot be decoded,
/// does not match its summary marker count, is not strictly increasing, or
/// references out-of-range ordinals. Validation happens in the stored
/// orientation, before the transforms.
pub fn stored_alignments(
    query: OrientedReadId, store: &mut StoreInterface
) -> Result<Vec<StoredAlignmentInformation>> {
    let mut result = Vec::new();

    for alignment_id in store.alignment_ids(query.read_id())? {
        let record = store.record(alignment_id)?;
        let [mut stored0, mut stored1] = record.oriented_reads();
        let mut alignment = decompress_and_check(store, alignment_id, record.marker_count)?;
        validate(store, &alignment, stored0, stored1)?;

        // Swap, if needed.
        if stored0.read_id() != query.read_id() {
            alignment.swap();
            std::mem::swap(&mut stored0, &mut stored1);
        }

        // Reverse complement, if needed.
        if stored0.strand() != query.strand() {
            let count0 = store.marker_count(stored0)? as u32;
            let count1 = store.marker_count(stored1)? as u32;
            alignment.reverse_complement(count0, count1);
            stored0.flip_strand();
            stored1.flip_strand();
        }
        assert_eq!(stored0, query, "Canonicalization did not reach the query orientation");

        result.push(StoredAlignmentInformation {
            alignment_id, alignment,
            oriented_read_id: stored1,
        });
    }

    Ok(result)
}

/// Returns the stored alignments between the query and the given partners.
///
/// Like [`stored_alignments`], but only alignments whose canonicalized partner
/// is in `partners` are returned. The swap and reverse complement decisions are
/// made from the summary record before filtering, so the partner is looked up
/// in its query-relative orientation and the payload is only decompressed for
/// alignments that pass the filter.
///
/// # Panics
///
/// Panics if `partners` is not sorted.
pub fn stored_alignments_among(
    query: OrientedReadId, partners: &[OrientedReadId], store: &mut StoreInterface
) -> Result<Vec<StoredAlignmentInformation>> {
    for i in 1..partners.len() {
        assert!(partners[i - 1] < partners[i], "The partner list must be sorted");
    }

    let mut result = Vec::new();
    for alignment_id in store.alignment_ids(query.read_id())? {
        let record = store.record(alignment_id)?;
        let [original0, original1] = record.oriented_reads();
        let (mut stored0, mut stored1) = (original0, original1);

        // Decide on the transform before filtering, using the summary only.
        let do_swap = stored0.read_id() != query.read_id();
        if do_swap {
            std::mem::swap(&mut stored0, &mut stored1);
        }
        let do_reverse_complement = stored0.strand() != query.strand();
        if do_reverse_complement {
            stored0.flip_strand();
            stored1.flip_strand();
        }
        assert_eq!(stored0, query, "Canonicalization did not reach the query orientation");

        // Skip alignments to partners we are not interested in.
        if partners.binary_search(&stored1).is_err() {
            continue;
        }

        // Apply the transform consistently with the decisions above.
        let mut alignment = decompress_and_check(store, alignment_id, record.marker_count)?;
        validate(store, &alignment, original0, original1)?;
        if do_swap {
            alignment.swap();
        }
        if do_reverse_complement {
            let count0 = store.marker_count(stored0)? as u32;
            let count1 = store.marker_count(stored1)? as u32;
            alignment.reverse_complement(count0, count1);
        }

        result.push(StoredAlignmentInformation {
            alignment_id, alignment,
            oriented_read_id: stored1,
        });
    }

    Ok(result)
}

//-----------------------------------------------------------------------------

/// Identifier of a sequence in a [`SequenceSet`] or a graph backend.
///
/// Sequence identifiers are assigned in insertion order. The graph backends in
/// [`crate::de_bruijn`] and [`crate::marker_graph`] use the same identifiers as
/// the sequence set they were built from.
pub type SequenceId = usize;

/// The marker-token sequences taking part in one mini-assembly.
///
/// Sequence identifiers are local indexes: the aligned neighbors come first, in
/// the order of the canonicalized alignments, and the query is stored last with
/// its full marker sequence. For each neighbor only the matched span of the
/// alignment is projected. The first and last ordinals translate local
/// (window-relative) ordinals back to read coordinates.
#[derive(Clone, Debug)]
pub struct SequenceSet {
    sequences: Vec<Vec<MarkerToken>>,
    oriented_read_ids: Vec<OrientedReadId>,
    first_ordinals: Vec<u32>,
    last_ordinals: Vec<u32>,
}

impl SequenceSet {
    /// Projects the sequences for the query and its canonicalized alignments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataIntegrity`] if a matched span does not fit within
    /// the stored marker sequence of its read.
    pub fn extract(
        query: OrientedReadId,
        alignments: &[StoredAlignmentInformation],
        store: &mut StoreInterface
    ) -> Result<Self> {
        let count = alignments.len() + 1;
        let mut sequences = Vec::with_capacity(count);
        let mut oriented_read_ids = Vec::with_capacity(count);
        let mut first_ordinals = Vec::with_capacity(count);
        let mut last_ordinals = Vec::with_capacity(count);

        // The matched span of each aligned neighbor.
        for stored in alignments.iter() {
            let oriented_read = stored.oriented_read_id;
            let tokens = store.marker_tokens(oriented_read)?;
            let first = stored.alignment.first_ordinal(1);
            let last = stored.alignment.last_ordinal(1);
            if last as usize >= tokens.len() {
                return Err(Error::DataIntegrity(format!(
                    "Alignment {}: matched span ends at ordinal {} but {} has {} markers",
                    stored.alignment_id, last, oriented_read, tokens.len()
                )));
            }
            sequences.push(tokens[first as usize..=last as usize].to_vec());
            oriented_read_ids.push(oriented_read);
            first_ordinals.push(first);
            last_ordinals.push(last);
        }

        // The full marker sequence of the query, stored last.
        let tokens = store.marker_tokens(query)?;
        let marker_count = tokens.len() as u32;
        sequences.push(tokens);
        oriented_read_ids.push(query);
        first_ordinals.push(0);
        last_ordinals.push(marker_count.saturating_sub(1));

        Ok(SequenceSet {
            sequences,
            oriented_read_ids,
            first_ordinals, last_ordinals,
        })
    }

    /// Returns the number of sequences, including the query.
    #[inline]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns `true` if the set contains only the query.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequences.len() <= 1
    }

    /// Returns the sequence identifier of the query.
    #[inline]
    pub fn query_sequence_id(&self) -> usize {
        self.sequences.len() - 1
    }

    /// Returns the projected token sequence with the given identifier.
    #[inline]
    pub fn sequence(&self, sequence_id: usize) -> &[MarkerToken] {
        &self.sequences[sequence_id]
    }

    /// Returns the oriented read behind the given sequence.
    #[inline]
    pub fn oriented_read(&self, sequence_id: usize) -> OrientedReadId {
        self.oriented_read_ids[sequence_id]
    }

    /// Returns the oriented reads behind all sequences, in sequence order.
    #[inline]
    pub fn oriented_read_ids(&self) -> &[OrientedReadId] {
        &self.oriented_read_ids
    }

    /// Returns the read-coordinate ordinal of the first projected marker.
    #[inline]
    pub fn first_ordinal(&self, sequence_id: usize) -> u32 {
        self.first_ordinals[sequence_id]
    }

    /// Returns the read-coordinate ordinal of the last projected marker.
    #[inline]
    pub fn last_ordinal(&self, sequence_id: usize) -> u32 {
        self.last_ordinals[sequence_id]
    }

    /// Translates a local ordinal within a projected sequence to a read coordinate.
    #[inline]
    pub fn to_read_ordinal(&self, sequence_id: usize, local_ordinal: u32) -> u32 {
        self.first_ordinals[sequence_id] + local_ordinal
    }

    /// Returns `true` if the given sequence is on the same strand as the query.
    #[inline]
    pub fn is_same_strand(&self, sequence_id: usize) -> bool {
        let query_strand = self.oriented_read_ids[self.query_sequence_id()].strand();
        self.oriented_read_ids[sequence_id].strand() == query_strand
    }
}

//-----------------------------------------------------------------------------

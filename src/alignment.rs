//! Structures for representing marker-level alignments between oriented reads.
//!
//! An [`Alignment`] is an ordered correspondence between marker ordinals of two
//! oriented reads. Alignments are persisted in a strand-canonical form, with the
//! first read on strand 0 (see [`AlignmentRecord`]). [`crate::canonical`] reorients
//! them so that a chosen query read is always the first coordinate.
//!
//! All coordinates are marker ordinals: zero-based positions in the marker
//! sequence of a read. Nucleotide coordinates do not appear anywhere in this crate.

use crate::{Error, utils};
use crate::utils::VarintIter;

use std::fmt::Display;
use std::io::Write;

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Identifier of a read in the read store.
pub type ReadId = u32;

/// Strand of a read: 0 for the stored orientation, 1 for its reverse complement.
pub type Strand = u32;

/// Opaque identifier of the marker k-mer at one ordinal of a read's marker sequence.
///
/// Tokens are owned by the marker store and are only compared for equality.
pub type MarkerToken = u64;

/// A read together with a traversal strand.
///
/// The canonical integer encoding is `read_id * 2 + strand`, which doubles as the
/// key of the marker table in [`crate::AlignmentBase`]. The total order of oriented
/// reads is the order of their encodings.
///
/// # Examples
///
/// ```
/// use mini_assembly::OrientedReadId;
///
/// let fwd = OrientedReadId::new(17, 0);
/// assert_eq!(fwd.value(), 34);
/// assert_eq!(fwd.to_string(), "17-0");
///
/// let rev = fwd.reverse_complement();
/// assert_eq!(rev.read_id(), 17);
/// assert_eq!(rev.strand(), 1);
/// assert!(fwd < rev);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrientedReadId {
    value: u32,
}

impl OrientedReadId {
    /// Creates an oriented read from a read identifier and a strand.
    ///
    /// # Panics
    ///
    /// Panics if `strand` is not 0 or 1.
    pub fn new(read_id: ReadId, strand: Strand) -> Self {
        assert!(strand < 2, "Invalid strand {} for read {}", strand, read_id);
        OrientedReadId { value: read_id * 2 + strand }
    }

    /// Creates an oriented read from its canonical integer encoding.
    #[inline]
    pub fn from_value(value: u32) -> Self {
        OrientedReadId { value }
    }

    /// Returns the canonical integer encoding.
    #[inline]
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Returns the read identifier.
    #[inline]
    pub fn read_id(&self) -> ReadId {
        self.value / 2
    }

    /// Returns the strand.
    #[inline]
    pub fn strand(&self) -> Strand {
        self.value & 1
    }

    /// Toggles the strand without changing the underlying read.
    #[inline]
    pub fn flip_strand(&mut self) {
        self.value ^= 1;
    }

    /// Returns the same read on the opposite strand.
    #[inline]
    pub fn reverse_complement(&self) -> Self {
        OrientedReadId { value: self.value ^ 1 }
    }
}

impl Display for OrientedReadId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}-{}", self.read_id(), self.strand())
    }
}

//-----------------------------------------------------------------------------

/// An ordered sequence of aligned ordinal pairs between two oriented reads.
///
/// Pair `[ordinal0, ordinal1]` states that the marker at `ordinal0` in the first
/// read is aligned with the marker at `ordinal1` in the second read. A valid
/// alignment is strictly increasing in both coordinates; there are no crossing
/// matches. The first and last pairs define the matched span on each side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alignment {
    /// The aligned ordinal pairs.
    pub ordinals: Vec<[u32; 2]>,
}

impl Alignment {
    /// Creates an alignment from the given ordinal pairs.
    pub fn new(ordinals: Vec<[u32; 2]>) -> Self {
        Alignment { ordinals }
    }

    /// Returns the number of aligned marker pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    /// Returns `true` if the alignment contains no pairs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// Returns the first aligned ordinal on the given side.
    ///
    /// # Panics
    ///
    /// Panics if the alignment is empty or `side > 1`.
    #[inline]
    pub fn first_ordinal(&self, side: usize) -> u32 {
        self.ordinals.first().unwrap()[side]
    }

    /// Returns the last aligned ordinal on the given side.
    ///
    /// # Panics
    ///
    /// Panics if the alignment is empty or `side > 1`.
    #[inline]
    pub fn last_ordinal(&self, side: usize) -> u32 {
        self.ordinals.last().unwrap()[side]
    }

    /// Swaps the roles of the two oriented reads.
    pub fn swap(&mut self) {
        for pair in self.ordinals.iter_mut() {
            pair.swap(0, 1);
        }
    }

    /// Reverse complements the alignment.
    ///
    /// Each ordinal is reflected within its read (`ordinal` becomes
    /// `marker_count - 1 - ordinal`) and the pairs are reversed so that the
    /// result is again increasing in both coordinates.
    ///
    /// # Arguments
    ///
    /// * `marker_count0`: Number of markers in the first oriented read.
    /// * `marker_count1`: Number of markers in the second oriented read.
    pub fn reverse_complement(&mut self, marker_count0: u32, marker_count1: u32) {
        for pair in self.ordinals.iter_mut() {
            pair[0] = marker_count0 - 1 - pair[0];
            pair[1] = marker_count1 - 1 - pair[1];
        }
        self.ordinals.reverse();
    }

    /// Checks that the ordinals are strictly increasing in both coordinates.
    ///
    /// Returns [`Error::DataIntegrity`] on the first violation, as crossing or
    /// repeated matches indicate upstream corruption.
    pub fn check_strictly_increasing(&self) -> Result<(), Error> {
        for i in 1..self.ordinals.len() {
            let prev = self.ordinals[i - 1];
            let curr = self.ordinals[i];
            if curr[0] <= prev[0] || curr[1] <= prev[1] {
                return Err(Error::DataIntegrity(format!(
                    "Alignment is not strictly increasing at pair {}: ({}, {}) followed by ({}, {})",
                    i, prev[0], prev[1], curr[0], curr[1]
                )));
            }
        }
        Ok(())
    }

    /// Checks that all ordinals are within the marker counts of the two reads.
    ///
    /// Returns [`Error::DataIntegrity`] on the first out-of-range ordinal.
    pub fn check_ordinal_ranges(&self, marker_count0: u32, marker_count1: u32) -> Result<(), Error> {
        for (i, pair) in self.ordinals.iter().enumerate() {
            if pair[0] >= marker_count0 || pair[1] >= marker_count1 {
                return Err(Error::DataIntegrity(format!(
                    "Ordinal pair {} ({}, {}) is out of range for marker counts ({}, {})",
                    i, pair[0], pair[1], marker_count0, marker_count1
                )));
            }
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

// An ordinal reconstructed from a delta. The first pair uses base 0, so it is
// handled the same way. Returns [`None`] if the ordinal does not fit in `u32`.
fn checked_ordinal(base: u32, delta: u64) -> Option<u32> {
    let delta = u32::try_from(delta).ok()?;
    base.checked_add(delta)
}

/// Encoding / decoding the compressed payload stored in the database.
impl Alignment {
    /// Compresses the alignment into the payload format used in the store.
    ///
    /// The pairs are delta-encoded as varints and then deflate-compressed.
    /// The alignment must be strictly increasing in both coordinates.
    /// See [`Alignment::decompress`] for decoding.
    pub fn compress(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        utils::encode_varint(self.ordinals.len() as u64, &mut buffer);
        let mut prev = [0u32; 2];
        for (i, pair) in self.ordinals.iter().enumerate() {
            if i == 0 {
                utils::encode_varint(pair[0] as u64, &mut buffer);
                utils::encode_varint(pair[1] as u64, &mut buffer);
            } else {
                utils::encode_varint((pair[0] - prev[0]) as u64, &mut buffer);
                utils::encode_varint((pair[1] - prev[1]) as u64, &mut buffer);
            }
            prev = *pair;
        }

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&buffer).unwrap(); // Writing to memory cannot fail.
        encoder.finish().unwrap()
    }

    /// Decompresses an alignment from its stored payload.
    ///
    /// Returns [`Error::DataIntegrity`] if the payload cannot be decoded or an
    /// ordinal does not fit in 32 bits. Nothing is assumed about the payload:
    /// a corrupt blob must come back as an error, not as an arithmetic fault.
    pub fn decompress(payload: &[u8]) -> Result<Self, Error> {
        let mut decoder = DeflateDecoder::new(payload);
        let mut buffer = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut buffer).map_err(|x| {
            Error::DataIntegrity(format!("Cannot inflate an alignment payload: {}", x))
        })?;

        let mut iter = VarintIter::new(&buffer);
        let count = iter.next().ok_or(
            Error::DataIntegrity(String::from("Alignment payload is missing the pair count"))
        )?;
        // Each pair takes at least two bytes in the decoded buffer.
        if count > buffer.len() as u64 {
            return Err(Error::DataIntegrity(format!(
                "Alignment payload is too short for {} pairs", count
            )));
        }
        let mut ordinals: Vec<[u32; 2]> = Vec::with_capacity(count as usize);
        let mut prev = [0u32; 2];
        for i in 0..count {
            let delta0 = iter.next();
            let delta1 = iter.next();
            if delta0.is_none() || delta1.is_none() {
                return Err(Error::DataIntegrity(format!(
                    "Alignment payload is truncated at pair {} of {}", i, count
                )));
            }
            let ordinal0 = checked_ordinal(prev[0], delta0.unwrap());
            let ordinal1 = checked_ordinal(prev[1], delta1.unwrap());
            if ordinal0.is_none() || ordinal1.is_none() {
                return Err(Error::DataIntegrity(format!(
                    "Alignment payload overflows an ordinal at pair {} of {}", i, count
                )));
            }
            let pair = [ordinal0.unwrap(), ordinal1.unwrap()];
            ordinals.push(pair);
            prev = pair;
        }
        if !iter.is_at_end() {
            return Err(Error::DataIntegrity(String::from(
                "Alignment payload contains trailing data"
            )));
        }

        Ok(Alignment { ordinals })
    }
}

//-----------------------------------------------------------------------------

/// Persisted summary of a stored alignment.
///
/// The alignment is stored with its first read on strand 0. If `is_same_strand`
/// is true, the second read is also on strand 0; otherwise it is on strand 1.
/// The payload itself is stored separately; see [`crate::StoreInterface::payload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// The two reads of the alignment.
    pub read_ids: [ReadId; 2],
    /// Is the second read on the same strand as the first?
    pub is_same_strand: bool,
    /// Number of aligned marker pairs.
    pub marker_count: u32,
}

impl AlignmentRecord {
    /// Returns the two oriented reads in the stored orientation.
    pub fn oriented_reads(&self) -> [OrientedReadId; 2] {
        [
            OrientedReadId::new(self.read_ids[0], 0),
            OrientedReadId::new(self.read_ids[1], if self.is_same_strand { 0 } else { 1 }),
        ]
    }
}

//-----------------------------------------------------------------------------

/// A stored alignment reoriented for a specific query.
///
/// The first coordinate of `alignment` refers to the query oriented read and the
/// second to `oriented_read_id`. See [`crate::canonical::stored_alignments`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredAlignmentInformation {
    /// Identifier of the alignment in the store.
    pub alignment_id: u32,
    /// The canonicalized alignment.
    pub alignment: Alignment,
    /// The other oriented read of the alignment.
    pub oriented_read_id: OrientedReadId,
}

//-----------------------------------------------------------------------------

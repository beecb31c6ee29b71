use super::*;

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

//-----------------------------------------------------------------------------

// Tests for `OrientedReadId`.

#[test]
fn oriented_read_encoding() {
    for read_id in 0..10 {
        for strand in 0..2 {
            let oriented = OrientedReadId::new(read_id, strand);
            assert_eq!(oriented.read_id(), read_id, "Wrong read id");
            assert_eq!(oriented.strand(), strand, "Wrong strand");
            assert_eq!(oriented.value(), read_id * 2 + strand, "Wrong encoding");
            assert_eq!(OrientedReadId::from_value(oriented.value()), oriented, "Wrong decoding");
        }
    }
}

#[test]
fn oriented_read_flip() {
    let mut oriented = OrientedReadId::new(42, 0);
    let flipped = oriented.reverse_complement();
    assert_eq!(flipped.read_id(), 42, "Flipping changed the read id");
    assert_eq!(flipped.strand(), 1, "Flipping did not change the strand");
    oriented.flip_strand();
    assert_eq!(oriented, flipped, "flip_strand and reverse_complement disagree");
    oriented.flip_strand();
    assert_eq!(oriented, OrientedReadId::new(42, 0), "Double flip is not the identity");
}

#[test]
fn oriented_read_order() {
    let ids = [
        OrientedReadId::new(1, 0), OrientedReadId::new(1, 1),
        OrientedReadId::new(2, 0), OrientedReadId::new(2, 1),
    ];
    for i in 1..ids.len() {
        assert!(ids[i - 1] < ids[i], "Oriented reads are not ordered by value");
    }
}

//-----------------------------------------------------------------------------

// Tests for `Alignment`: transforms.

fn example_alignment() -> Alignment {
    Alignment::new(vec![[2, 0], [4, 1], [5, 3], [8, 4], [11, 7]])
}

#[test]
fn alignment_swap() {
    let mut alignment = example_alignment();
    alignment.swap();
    let truth = vec![[0, 2], [1, 4], [3, 5], [4, 8], [7, 11]];
    assert_eq!(alignment.ordinals, truth, "Wrong ordinals after a swap");
    alignment.swap();
    assert_eq!(alignment, example_alignment(), "Double swap is not the identity");
}

#[test]
fn alignment_reverse_complement() {
    let mut alignment = example_alignment();
    let (n0, n1) = (12, 8);
    alignment.reverse_complement(n0, n1);
    assert!(alignment.check_strictly_increasing().is_ok(), "Reverse complement broke the order");
    let truth = vec![[0, 0], [3, 3], [6, 4], [7, 6], [9, 7]];
    assert_eq!(alignment.ordinals, truth, "Wrong ordinals after reverse complement");
    alignment.reverse_complement(n0, n1);
    assert_eq!(alignment, example_alignment(), "Double reverse complement is not the identity");
}

#[test]
fn alignment_spans() {
    let alignment = example_alignment();
    assert_eq!(alignment.first_ordinal(0), 2, "Wrong first ordinal on side 0");
    assert_eq!(alignment.last_ordinal(0), 11, "Wrong last ordinal on side 0");
    assert_eq!(alignment.first_ordinal(1), 0, "Wrong first ordinal on side 1");
    assert_eq!(alignment.last_ordinal(1), 7, "Wrong last ordinal on side 1");
}

#[test]
fn strictly_increasing_rejects_crossing() {
    // Strictly increasing.
    assert!(example_alignment().check_strictly_increasing().is_ok());

    // Out of order in the second coordinate.
    let crossing = Alignment::new(vec![[2, 5], [4, 3]]);
    let result = crossing.check_strictly_increasing();
    assert!(matches!(result, Err(Error::DataIntegrity(_))), "Crossing matches were accepted");

    // Repeated ordinal in the first coordinate.
    let repeated = Alignment::new(vec![[2, 1], [2, 3]]);
    let result = repeated.check_strictly_increasing();
    assert!(matches!(result, Err(Error::DataIntegrity(_))), "A repeated ordinal was accepted");
}

#[test]
fn ordinal_ranges() {
    let alignment = example_alignment();
    assert!(alignment.check_ordinal_ranges(12, 8).is_ok(), "Valid ranges were rejected");
    let result = alignment.check_ordinal_ranges(11, 8);
    assert!(matches!(result, Err(Error::DataIntegrity(_))), "An out-of-range ordinal was accepted");
}

//-----------------------------------------------------------------------------

// Tests for `Alignment`: payload encoding.

#[test]
fn payload_round_trip() {
    let alignment = example_alignment();
    let payload = alignment.compress();
    let decompressed = Alignment::decompress(&payload);
    assert!(decompressed.is_ok(), "Failed to decompress: {}", decompressed.unwrap_err());
    assert_eq!(decompressed.unwrap(), alignment, "Wrong alignment after a payload round trip");
}

#[test]
fn payload_round_trip_empty() {
    let alignment = Alignment::default();
    let payload = alignment.compress();
    let decompressed = Alignment::decompress(&payload);
    assert!(decompressed.is_ok(), "Failed to decompress: {}", decompressed.unwrap_err());
    assert_eq!(decompressed.unwrap(), alignment, "Wrong empty alignment after a round trip");
}

#[test]
fn payload_round_trip_random() {
    let mut rng = StdRng::seed_from_u64(0x42424242);
    for _ in 0..20 {
        let len = rng.gen_range(1..500);
        let mut ordinals: Vec<[u32; 2]> = Vec::with_capacity(len);
        let mut prev = [0u32; 2];
        for i in 0..len {
            let pair = if i == 0 {
                [rng.gen_range(0..10), rng.gen_range(0..10)]
            } else {
                [prev[0] + rng.gen_range(1..5), prev[1] + rng.gen_range(1..5)]
            };
            ordinals.push(pair);
            prev = pair;
        }
        let alignment = Alignment::new(ordinals);
        let payload = alignment.compress();
        let decompressed = Alignment::decompress(&payload);
        assert!(decompressed.is_ok(), "Failed to decompress: {}", decompressed.unwrap_err());
        assert_eq!(decompressed.unwrap(), alignment, "Wrong alignment after a random round trip");
    }
}

#[test]
fn payload_rejects_garbage() {
    let result = Alignment::decompress(b"this is not a deflate stream");
    assert!(matches!(result, Err(Error::DataIntegrity(_))), "Garbage payload was accepted");
}

// A valid deflate stream around arbitrary varint content.
fn deflate(buffer: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(buffer).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn payload_rejects_ordinal_overflow() {
    // The first ordinal does not fit in 32 bits.
    let mut buffer = Vec::new();
    utils::encode_varint(1, &mut buffer);
    utils::encode_varint(u32::MAX as u64 + 1, &mut buffer);
    utils::encode_varint(0, &mut buffer);
    let result = Alignment::decompress(&deflate(&buffer));
    assert!(matches!(result, Err(Error::DataIntegrity(_))), "An oversized ordinal was accepted");

    // The second delta wraps the ordinal around.
    let mut buffer = Vec::new();
    utils::encode_varint(2, &mut buffer);
    utils::encode_varint(0, &mut buffer);
    utils::encode_varint(u32::MAX as u64, &mut buffer);
    utils::encode_varint(1, &mut buffer);
    utils::encode_varint(1, &mut buffer);
    let result = Alignment::decompress(&deflate(&buffer));
    assert!(matches!(result, Err(Error::DataIntegrity(_))), "A wrapping delta was accepted");
}

#[test]
fn payload_rejects_excessive_pair_count() {
    let mut buffer = Vec::new();
    utils::encode_varint(1 << 40, &mut buffer);
    let result = Alignment::decompress(&deflate(&buffer));
    assert!(matches!(result, Err(Error::DataIntegrity(_))), "An oversized pair count was accepted");
}

//-----------------------------------------------------------------------------

// Tests for `AlignmentRecord`.

#[test]
fn record_oriented_reads() {
    let same = AlignmentRecord { read_ids: [3, 7], is_same_strand: true, marker_count: 5 };
    assert_eq!(
        same.oriented_reads(),
        [OrientedReadId::new(3, 0), OrientedReadId::new(7, 0)],
        "Wrong oriented reads for a same-strand record"
    );

    let opposite = AlignmentRecord { read_ids: [3, 7], is_same_strand: false, marker_count: 5 };
    assert_eq!(
        opposite.oriented_reads(),
        [OrientedReadId::new(3, 0), OrientedReadId::new(7, 1)],
        "Wrong oriented reads for an opposite-strand record"
    );
}

//-----------------------------------------------------------------------------

use jksn_core::{
    parse, ChecksumAlgorithm, DecodeErrorKind, Decoder, JksnError, Limits, LongDouble, Placement,
    Value,
};
use xxhash_rust::xxh3::xxh3_64;

/// Decode without header through a fresh decoder.
fn value(bytes: &[u8]) -> Value {
    parse(bytes, false).expect("decode failed")
}

/// Decode without header and return the structural error kind.
fn kind(bytes: &[u8]) -> DecodeErrorKind {
    let err = parse(bytes, false).expect_err("decode should fail");
    err.decode_kind().cloned().unwrap_or_else(|| panic!("not a decode error: {err}"))
}

/// Wrap raw content (magic included or not) with a valid checksum trailer.
fn with_checksum(content: &[u8]) -> Vec<u8> {
    let mut out = content.to_vec();
    out.extend_from_slice(&xxh3_64(content).to_be_bytes());
    out
}

/// Wrap one encoded frame in an in-stream checksum frame.
fn checksum_frame(algorithm: ChecksumAlgorithm, placement: Placement, inner: &[u8]) -> Vec<u8> {
    let digest = algorithm.digest(inner);
    let mut out = vec![algorithm.control(placement)];
    match placement {
        Placement::Leading => {
            out.extend_from_slice(&digest);
            out.extend_from_slice(inner);
        }
        Placement::Trailing => {
            out.extend_from_slice(inner);
            out.extend_from_slice(&digest);
        }
    }
    out
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn decode_specials() {
    assert_eq!(value(&[0x00]), Value::Undefined);
    assert_eq!(value(&[0x01]), Value::Null);
    assert_eq!(value(&[0x02]), Value::Bool(false));
    assert_eq!(value(&[0x03]), Value::Bool(true));
    assert_eq!(value(&[0xa0]), Value::Unspecified);
}

#[test]
fn decode_ints() {
    assert_eq!(value(&[0x1a]), Value::Int(10));
    assert_eq!(value(&[0x1d, 0x2a]), Value::Int(42));
    assert_eq!(value(&[0x1d, 0x80]), Value::Int(-128));
    assert_eq!(value(&[0x1c, 0xff, 0x00]), Value::Int(-256));
    assert_eq!(value(&[0x1b, 0x7f, 0xff, 0xff, 0xff]), Value::Int(i32::MAX as i64));
    assert_eq!(value(&[0x1f, 0x82, 0x2c]), Value::Int(300));
    assert_eq!(value(&[0x1e, 0x82, 0x2c]), Value::Int(-300));
}

#[test]
fn negative_varint_reaches_i64_min() {
    let mut bytes = vec![0x1e, 0x81];
    bytes.extend_from_slice(&[0x80; 8]);
    bytes.push(0x00);
    assert_eq!(value(&bytes), Value::Int(i64::MIN));

    bytes[0] = 0x1f;
    assert_eq!(kind(&bytes), DecodeErrorKind::IntegerOverflow);
}

#[test]
fn decode_floats() {
    assert!(matches!(value(&[0x20]), Value::Double(d) if d.is_nan()));
    assert_eq!(value(&[0x2f]), Value::Double(f64::INFINITY));
    assert_eq!(value(&[0x2e]), Value::Double(f64::NEG_INFINITY));
    assert_eq!(value(&[0x2d, 0x3f, 0xc0, 0x00, 0x00]), Value::Float(1.5));
    let mut bytes = vec![0x2c];
    bytes.extend_from_slice(&4.2e100f64.to_bits().to_be_bytes());
    assert_eq!(value(&bytes), Value::Double(4.2e100));
    assert_eq!(
        value(&[0x2b, 0x3f, 0xff, 0x80, 0, 0, 0, 0, 0, 0, 0]),
        Value::LongDouble(LongDouble::from_f64(1.0))
    );
}

// ============================================================================
// Strings, blobs and references
// ============================================================================

#[test]
fn decode_utf8_and_utf16_strings() {
    assert_eq!(value(b"\x45hello"), Value::from("hello"));
    assert_eq!(value(&[0x32, 0x2d, 0x4e, 0x87, 0x65]), Value::from("中文"));
    assert_eq!(value(&[0x4e, 0x02, b'o', b'k']), Value::from("ok"));
}

#[test]
fn invalid_text_is_rejected() {
    assert_eq!(kind(&[0x41, 0xff]), DecodeErrorKind::InvalidUtf8);
    // Lone high surrogate.
    assert_eq!(kind(&[0x31, 0x00, 0xd8]), DecodeErrorKind::InvalidUtf16);
}

#[test]
fn blobs_accept_any_bytes() {
    assert_eq!(value(&[0x52, 0xff, 0xfe]), Value::blob(vec![0xffu8, 0xfe]));
}

#[test]
fn container_reference_resolves_earlier_literal() {
    let v = value(&[0x82, 0x82, 0x11, 0x12, 0x6c, 0x00]);
    assert_eq!(v, Value::array([Value::array([1, 2]), Value::array([1, 2])]));
}

#[test]
fn string_reference_in_same_stream() {
    let v = value(&[0x82, 0x42, b'a', b'b', 0x3c, 0x00]);
    assert_eq!(v, Value::array(["ab", "ab"]));
}

#[test]
fn reference_to_empty_slot_fails() {
    assert_eq!(kind(&[0x3c, 0x05]), DecodeErrorKind::EmptySlot(5));
}

#[test]
fn reference_to_wrong_kind_fails() {
    assert_eq!(
        kind(&[0x82, 0x42, b'a', b'b', 0x5c, 0x00]),
        DecodeErrorKind::SlotKindMismatch {
            slot: 0,
            expected: "blob",
            found: "string",
        }
    );
}

// ============================================================================
// Integers relative to the previous integer
// ============================================================================

#[test]
fn delta_ints_follow_previous_int() {
    let v = value(&[0x85, 0x1d, 0x64, 0xb1, 0xb9, 0xbd, 0x1f, 0x1c, 0x03, 0xe8]);
    assert_eq!(v, Value::array([100, 101, 99, 130, 1000]));
}

#[test]
fn delta_without_base_fails() {
    assert_eq!(kind(&[0xb1]), DecodeErrorKind::DeltaWithoutBase);
}

#[test]
fn delta_overflow_fails() {
    let mut bytes = vec![0x82, 0x1f];
    bytes.extend_from_slice(&[0xff; 8]);
    bytes.push(0x7f);
    bytes.push(0xb1);
    assert_eq!(kind(&bytes), DecodeErrorKind::IntegerOverflow);
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn decode_object() {
    let v = value(&[0x92, 0x41, b'a', 0x11, 0x41, b'b', 0x12]);
    assert_eq!(v, Value::object([("a", 1), ("b", 2)]));
}

#[test]
fn duplicate_object_key_fails() {
    assert_eq!(
        kind(&[0x92, 0x11, 0x01, 0x11, 0x02]),
        DecodeErrorKind::DuplicateKey
    );
}

#[test]
fn swapped_array_rebuilds_rows() {
    // Column "a" has two cells, column "b" only one.
    let v = value(&[0xa2, 0x41, b'a', 0x82, 0x11, 0x12, 0x41, b'b', 0x81, 0x13]);
    assert_eq!(
        v,
        Value::array([
            Value::object([("a", 1), ("b", 3)]),
            Value::object([("a", 2)]),
        ])
    );
}

#[test]
fn swapped_array_skips_unspecified_cells() {
    let v = value(&[0xa1, 0x41, b'a', 0x82, 0xa0, 0x12]);
    assert_eq!(
        v,
        Value::array([Value::empty_object(), Value::object([("a", 2)])])
    );
}

#[test]
fn swapped_column_must_be_array() {
    assert_eq!(
        kind(&[0xa1, 0x41, b'a', 0x11]),
        DecodeErrorKind::SwappedColumnNotArray
    );
}

#[test]
fn swapped_cell_budget_applies() {
    // Preload a 20-element array into slot 0, then use it as all 10 columns.
    let mut bytes = vec![0x71, 0x8e, 20];
    bytes.extend_from_slice(&[0x11; 20]);
    bytes.push(0xaa);
    for name in 0..10u8 {
        bytes.extend_from_slice(&[0x10 + name, 0x6c, 0x00]);
    }

    let rows = value(&bytes);
    assert_eq!(rows.len().unwrap(), 20);
    assert_eq!(rows.at(&Value::Int(19)).unwrap().len().unwrap(), 10);

    let exact = Limits {
        max_swapped_cells: 200,
        ..Limits::default()
    };
    assert!(Decoder::with_limits(exact).parse(&bytes, false).is_ok());

    let tight = Limits {
        max_swapped_cells: 100,
        ..Limits::default()
    };
    let err = Decoder::with_limits(tight).parse(&bytes, false).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::TooManySwappedCells(100)));
}

#[test]
fn swapped_cell_budget_spans_the_whole_call() {
    // Two swapped arrays of 2 x 2 cells each.
    let one = [0xa2, 0x41, b'a', 0x82, 0x11, 0x12, 0x41, b'b', 0x82, 0x13, 0x14];
    let mut bytes = vec![0x82];
    bytes.extend_from_slice(&one);
    bytes.extend_from_slice(&one);
    let limits = Limits {
        max_swapped_cells: 6,
        ..Limits::default()
    };
    let mut dec = Decoder::with_limits(limits);
    let err = dec.parse(&bytes, false).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::TooManySwappedCells(6)));
    // The budget is per call.
    assert!(dec.parse(&one, false).is_ok());
    assert!(dec.parse(&one, false).is_ok());
}

#[test]
fn lengthless_array_ends_at_unspecified() {
    assert_eq!(value(&[0xc8, 0x11, 0x12, 0xa0]), Value::array([1, 2]));
    assert_eq!(value(&[0xc8, 0xa0]), Value::empty_array());
}

// ============================================================================
// Non-value frames
// ============================================================================

#[test]
fn pragma_is_skipped() {
    assert_eq!(value(&[0xff, 0x11, 0x12]), Value::Int(2));
}

#[test]
fn preload_fills_cache() {
    assert_eq!(value(&[0x71, 0x42, b'a', b'b', 0x3c, 0x00]), Value::from("ab"));
}

#[test]
fn clear_frame_empties_session_cache() {
    let mut dec = Decoder::new();
    dec.parse(&[0x42, b'a', b'b'], false).unwrap();
    assert_eq!(dec.cache().len(), 1);
    let err = dec.parse(&[0x70, 0x3c, 0x00], false).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::EmptySlot(0)));
}

#[test]
fn embedded_json_literal() {
    let mut bytes = vec![0x0f, 0x47];
    bytes.extend_from_slice(br#"{"a":1}"#);
    assert_eq!(value(&bytes), Value::object([("a", 1)]));
}

#[test]
fn embedded_json_must_be_text() {
    assert!(matches!(kind(&[0x0f, 0x11]), DecodeErrorKind::JsonLiteral(_)));
    let mut bytes = vec![0x0f, 0x42];
    bytes.extend_from_slice(b"{]");
    assert!(matches!(kind(&bytes), DecodeErrorKind::JsonLiteral(_)));
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn unknown_control_bytes_fail() {
    for control in [0x04u8, 0x21, 0x60, 0x6d, 0xc0, 0xf6, 0xfe] {
        assert_eq!(kind(&[control]), DecodeErrorKind::InvalidTag(control), "control {control:#04x}");
    }
}

#[test]
fn empty_input_fails() {
    assert_eq!(kind(&[]), DecodeErrorKind::UnexpectedEof);
}

#[test]
fn declared_length_beyond_input_fails() {
    assert_eq!(kind(&[0x4e, 0xff, b'a']), DecodeErrorKind::UnexpectedEof);
    assert_eq!(kind(&[0x8f, 0xff, 0xff, 0xff, 0x7f]), DecodeErrorKind::UnexpectedEof);
}

#[test]
fn trailing_bytes_fail() {
    let err = parse(&[0x01, 0x01], false).unwrap_err();
    assert!(matches!(
        err,
        JksnError::Decode {
            offset: 1,
            kind: DecodeErrorKind::TrailingBytes(1)
        }
    ));
}

#[test]
fn nesting_limit_applies() {
    let limits = Limits {
        max_nesting_depth: 2,
        ..Limits::default()
    };
    let mut dec = Decoder::with_limits(limits);
    assert!(dec.parse(&[0x81, 0x81, 0x10], false).is_ok());
    let err = dec.parse(&[0x81, 0x81, 0x81, 0x10], false).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::NestingTooDeep(2)));
}

#[test]
fn input_size_limit_applies() {
    let limits = Limits {
        max_input_size: 4,
        ..Limits::default()
    };
    let err = Decoder::with_limits(limits)
        .parse(&[0x85, 0x11, 0x12, 0x13, 0x14, 0x15], false)
        .unwrap_err();
    assert_eq!(
        err.decode_kind(),
        Some(&DecodeErrorKind::InputTooLarge { size: 6, max: 4 })
    );
}

// ============================================================================
// Header and checksum
// ============================================================================

#[test]
fn header_stream_decodes() {
    let bytes = with_checksum(b"jk!\x1d\x2a");
    assert_eq!(parse(&bytes, true).unwrap(), Value::Int(42));
}

#[test]
fn bad_checksum_is_checksum_error() {
    let mut bytes = with_checksum(b"jk!\x1d\x2a");
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let err = parse(&bytes, true).unwrap_err();
    assert!(err.is_checksum_error());
    assert!(err.is_decode_error());
}

#[test]
fn missing_magic_behind_valid_checksum() {
    let bytes = with_checksum(&[0x01]);
    let err = parse(&bytes, true).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::MissingHeader));
}

#[test]
fn stream_shorter_than_trailer_fails() {
    let err = parse(&[0x01], true).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::UnexpectedEof));
}

// ============================================================================
// Checksum frames
// ============================================================================

#[test]
fn leading_sha256_frame_verifies() {
    let inner = [0x82, 0x42, b'a', b'b', 0x11];
    let bytes = checksum_frame(ChecksumAlgorithm::Sha256, Placement::Leading, &inner);
    assert_eq!(bytes[0], 0xf4);
    assert_eq!(bytes.len(), 1 + 32 + inner.len());
    assert_eq!(value(&bytes), Value::array([Value::from("ab"), Value::Int(1)]));
}

#[test]
fn trailing_crc32_frame_verifies() {
    let inner = [0x91, 0x41, b'k', 0x1d, 0x2a];
    let bytes = checksum_frame(ChecksumAlgorithm::Crc32, Placement::Trailing, &inner);
    assert_eq!(bytes[0], 0xf9);
    assert_eq!(value(&bytes), Value::object([("k", 42)]));
}

#[test]
fn trailing_djb_digest_of_single_byte() {
    // DJB over the one byte 0x11 is 0x11 itself.
    assert_eq!(value(&[0xf8, 0x11, 0x11]), Value::Int(1));
    assert!(parse(&[0xf8, 0x11, 0x12], false).unwrap_err().is_checksum_error());
}

#[test]
fn every_checksum_frame_kind_verifies() {
    let inner = b"\x45hello";
    for algorithm in ChecksumAlgorithm::ALL {
        for placement in [Placement::Leading, Placement::Trailing] {
            let bytes = checksum_frame(algorithm, placement, inner);
            assert_eq!(value(&bytes), Value::from("hello"), "{algorithm:?} {placement:?}");
        }
    }
}

#[test]
fn checksum_frame_mismatch_is_checksum_error() {
    let inner = [0x82, 0x11, 0x12];
    for placement in [Placement::Leading, Placement::Trailing] {
        let mut bytes = checksum_frame(ChecksumAlgorithm::Md5, placement, &inner);
        // Corrupt the payload, not the digest.
        let payload_at = match placement {
            Placement::Leading => 1 + 16 + 1,
            Placement::Trailing => 2,
        };
        bytes[payload_at] = 0x13;
        let err = parse(&bytes, false).unwrap_err();
        assert!(err.is_checksum_error(), "{placement:?}: {err}");
        assert!(err.to_string().contains("md5"));
    }
}

#[test]
fn truncated_checksum_frame_fails() {
    let bytes = checksum_frame(ChecksumAlgorithm::Sha1, Placement::Trailing, &[0x11]);
    assert_eq!(kind(&bytes[..bytes.len() - 1]), DecodeErrorKind::UnexpectedEof);
    assert_eq!(kind(&[0xf3, 0x00]), DecodeErrorKind::UnexpectedEof);
}

#[test]
fn checksummed_literal_enters_cache() {
    let mut bytes = vec![0x82];
    bytes.extend(checksum_frame(
        ChecksumAlgorithm::Sha512,
        Placement::Trailing,
        &[0x42, b'a', b'b'],
    ));
    bytes.extend_from_slice(&[0x3c, 0x00]);
    assert_eq!(value(&bytes), Value::array(["ab", "ab"]));
}

// ============================================================================
// Session state
// ============================================================================

#[test]
fn failed_parse_rolls_back_cache_and_last_int() {
    let mut dec = Decoder::new();
    dec.parse(&[0x82, 0x42, b'a', b'b', 0x1d, 0x64], false).unwrap();
    assert_eq!(dec.cache().len(), 2);

    // Inserts "cd" and sets the previous int to 7, then hits a bad tag.
    let err = dec.parse(&[0x83, 0x42, b'c', b'd', 0x17, 0x04], false);
    assert!(err.is_err());
    assert_eq!(dec.cache().len(), 2);
    assert_eq!(dec.cache().lookup(&Value::from("cd")), None);

    // The previous int is still 100: +1 decodes to 101.
    assert_eq!(dec.parse(&[0xb1], false).unwrap(), Value::Int(101));
}

#[test]
fn failed_parse_restores_cleared_cache() {
    let mut dec = Decoder::new();
    dec.parse(&[0x42, b'a', b'b'], false).unwrap();

    // Clears the cache, inserts "cd", then hits a bad tag.
    assert!(dec.parse(&[0x70, 0x82, 0x42, b'c', b'd', 0x04], false).is_err());
    assert_eq!(dec.cache().len(), 1);
    assert_eq!(dec.cache().lookup(&Value::from("cd")), None);
    assert_eq!(dec.parse(&[0x3c, 0x00], false).unwrap(), Value::from("ab"));
}

#[test]
fn failed_checksum_frame_rolls_back() {
    let mut dec = Decoder::new();
    let mut bytes = checksum_frame(ChecksumAlgorithm::Crc32, Placement::Trailing, &[0x42, b'x', b'y']);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    assert!(dec.parse(&bytes, false).unwrap_err().is_checksum_error());
    assert!(dec.cache().is_empty());
}

#[test]
fn parse_reader_reads_to_end() {
    let mut input: &[u8] = &[0x82, 0x11, 0x12];
    let v = Decoder::new().parse_reader(&mut input, false).unwrap();
    assert_eq!(v, Value::array([1, 2]));
}

//! JKSN wire constants and integer field helpers.
//!
//! Every frame starts with a control byte. The high nibble selects the frame
//! family; for strings, blobs and containers the low nibble is either an
//! inline length or one of three size classes:
//!
//! - `0x?e`: one-byte length follows
//! - `0x?d`: two-byte big-endian length follows
//! - `0x?f`: varint length follows
//!
//! Control byte values are part of the stream format and must never change.

/// Optional stream header.
pub const MAGIC: &[u8; 3] = b"jk!";

/// Size of the xxh3-64 checksum trailer written after the last frame.
pub const CHECKSUM_LEN: usize = 8;

// Special values
pub const UNDEFINED: u8 = 0x00;
pub const NULL: u8 = 0x01;
pub const FALSE: u8 = 0x02;
pub const TRUE: u8 = 0x03;
pub const JSON_LITERAL: u8 = 0x0f;

// Integers
pub const INT_INLINE: u8 = 0x10;
pub const INT_INLINE_MAX: i64 = 0xa;
pub const INT_32: u8 = 0x1b;
pub const INT_16: u8 = 0x1c;
pub const INT_8: u8 = 0x1d;
pub const INT_NEG_VARINT: u8 = 0x1e;
pub const INT_POS_VARINT: u8 = 0x1f;

// Floating point
pub const DOUBLE_NAN: u8 = 0x20;
pub const LONG_DOUBLE: u8 = 0x2b;
pub const DOUBLE: u8 = 0x2c;
pub const FLOAT: u8 = 0x2d;
pub const DOUBLE_NEG_INF: u8 = 0x2e;
pub const DOUBLE_POS_INF: u8 = 0x2f;

// Strings and blobs
pub const UTF16: u8 = 0x30;
pub const UTF16_INLINE_MAX: usize = 0xb;
pub const STRING_REF: u8 = 0x3c;
pub const UTF8: u8 = 0x40;
pub const UTF8_INLINE_MAX: usize = 0xc;
pub const BLOB: u8 = 0x50;
pub const BLOB_INLINE_MAX: usize = 0xb;
pub const BLOB_REF: u8 = 0x5c;
pub const CONTAINER_REF: u8 = 0x6c;

// Reference cache refreshers: 0x70 clears, 0x71.. preload N values
pub const CACHE_CLEAR: u8 = 0x70;
pub const CACHE_PRELOAD_INLINE_MAX: usize = 0xc;

// Containers
pub const ARRAY: u8 = 0x80;
pub const OBJECT: u8 = 0x90;
pub const CONTAINER_INLINE_MAX: usize = 0xc;
pub const UNSPECIFIED: u8 = 0xa0;
pub const SWAPPED_ARRAY: u8 = 0xa0;

// Delta-encoded integers
pub const DELTA: u8 = 0xb0;
pub const DELTA_POS_INLINE_MAX: i64 = 5;
pub const DELTA_NEG_INLINE_MIN: i64 = -5;
pub const DELTA_32: u8 = 0xbb;
pub const DELTA_16: u8 = 0xbc;
pub const DELTA_8: u8 = 0xbd;
pub const DELTA_NEG_VARINT: u8 = 0xbe;
pub const DELTA_POS_VARINT: u8 = 0xbf;

pub const LENGTHLESS_ARRAY: u8 = 0xc8;
pub const PRAGMA: u8 = 0xff;

// Size-class low nibbles
pub const SIZE_U8: u8 = 0xe;
pub const SIZE_U16: u8 = 0xd;
pub const SIZE_VARINT: u8 = 0xf;

/// Pick the control byte and length field for a sized frame.
///
/// `base` is the family's high nibble; `inline_max` the largest length that
/// fits in the low nibble.
pub fn size_class(base: u8, inline_max: usize, len: usize) -> (u8, Vec<u8>) {
    if len <= inline_max {
        (base | len as u8, Vec::new())
    } else if len <= 0xff {
        (base | SIZE_U8, vec![len as u8])
    } else if len <= 0xffff {
        (base | SIZE_U16, (len as u16).to_be_bytes().to_vec())
    } else {
        (base | SIZE_VARINT, encode_varint(len as u64))
    }
}

/// Encode an unsigned value as a big-endian base-128 varint.
///
/// Groups of seven bits are written most significant first; every byte but
/// the last carries the continuation bit (0x80).
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value != 0 {
        out.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    out.reverse();
    out
}

/// Which fixed-width or varint class a signed integer (or delta) lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntClass {
    I8,
    I16,
    I32,
    PosVarint,
    NegVarint,
}

impl IntClass {
    /// Narrowest class for `value`. Magnitudes in `0x8000..0x200000` are
    /// cheaper as a three-byte varint than as an `i32`.
    pub fn of(value: i64) -> Self {
        if (-0x80..=0x7f).contains(&value) {
            IntClass::I8
        } else if (-0x8000..=0x7fff).contains(&value) {
            IntClass::I16
        } else if (-0x8000_0000..=-0x20_0000).contains(&value)
            || (0x20_0000..=0x7fff_ffff).contains(&value)
        {
            IntClass::I32
        } else if value >= 0 {
            IntClass::PosVarint
        } else {
            IntClass::NegVarint
        }
    }

    /// The extra bytes following the control byte.
    pub fn encode(self, value: i64) -> Vec<u8> {
        match self {
            IntClass::I8 => vec![value as i8 as u8],
            IntClass::I16 => (value as i16).to_be_bytes().to_vec(),
            IntClass::I32 => (value as i32).to_be_bytes().to_vec(),
            IntClass::PosVarint | IntClass::NegVarint => encode_varint(value.unsigned_abs()),
        }
    }

    /// Control byte in the plain integer family.
    pub fn int_control(self) -> u8 {
        match self {
            IntClass::I8 => INT_8,
            IntClass::I16 => INT_16,
            IntClass::I32 => INT_32,
            IntClass::PosVarint => INT_POS_VARINT,
            IntClass::NegVarint => INT_NEG_VARINT,
        }
    }

    /// Control byte in the delta integer family.
    pub fn delta_control(self) -> u8 {
        match self {
            IntClass::I8 => DELTA_8,
            IntClass::I16 => DELTA_16,
            IntClass::I32 => DELTA_32,
            IntClass::PosVarint => DELTA_POS_VARINT,
            IntClass::NegVarint => DELTA_NEG_VARINT,
        }
    }
}

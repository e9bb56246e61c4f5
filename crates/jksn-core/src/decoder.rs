//! JKSN decoder: rebuilds a [`Value`] tree from a framed byte stream.
//!
//! The decoder mirrors the encoder's session state: every literal string,
//! blob and container it reads is inserted into its [`ReferenceCache`] after
//! the frame is complete, and every integer updates the previous-integer
//! register used by delta frames.
//!
//! With the header flag the checksum trailer is verified before any frame is
//! walked. A failing call restores the cache and register to their state
//! before the call, so the decoder stays usable afterwards.
//!
//! Accepted in addition to what the encoder emits: embedded JSON literals
//! (`0x0f`), cache refreshers (`0x70`..`0x7f`), lengthless arrays (`0xc8`),
//! checksum frames (`0xf0`..`0xf5`, `0xf8`..`0xfd`, see [`crate::checksum`])
//! and pragmas (`0xff`).

use std::io::Read;

use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::ReferenceCache;
use crate::checksum::{self, ChecksumAlgorithm, Placement};
use crate::error::{DecodeErrorKind, JksnError, Result};
use crate::limits::Limits;
use crate::long_double::LongDouble;
use crate::types::{Kind, Map, Value};
use crate::wire;

/// Decode `bytes` with a fresh decoder (no cross-call back-references).
pub fn parse(bytes: &[u8], header: bool) -> Result<Value> {
    Decoder::new().parse(bytes, header)
}

/// A reusable decoder whose session state persists across [`Decoder::parse`]
/// calls.
#[derive(Debug, Default)]
pub struct Decoder {
    cache: ReferenceCache,
    last_int: Option<i64>,
    limits: Limits,
    // Swapped-array cells spread into rows during the current call.
    swapped_cells: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    /// Decode one root value. The whole input must be consumed.
    pub fn parse(&mut self, bytes: &[u8], header: bool) -> Result<Value> {
        if bytes.len() > self.limits.max_input_size {
            return Err(JksnError::decode(
                0,
                DecodeErrorKind::InputTooLarge {
                    size: bytes.len(),
                    max: self.limits.max_input_size,
                },
            ));
        }

        let last_int = self.last_int;
        self.swapped_cells = 0;
        self.cache.checkpoint();
        match self.parse_stream(bytes, header) {
            Ok(value) => {
                self.cache.commit();
                debug!(
                    kind = %value.kind(),
                    bytes = bytes.len(),
                    header,
                    cached = self.cache.len(),
                    "decoded value"
                );
                Ok(value)
            }
            Err(err) => {
                self.cache.rollback();
                self.last_int = last_int;
                debug!(error = %err, bytes = bytes.len(), "decode failed, session state rolled back");
                Err(err)
            }
        }
    }

    /// Read `reader` to the end and decode it as one stream.
    pub fn parse_reader<R: Read>(&mut self, reader: &mut R, header: bool) -> Result<Value> {
        let mut bytes = Vec::new();
        reader
            .take(self.limits.max_input_size as u64 + 1)
            .read_to_end(&mut bytes)?;
        self.parse(&bytes, header)
    }

    fn parse_stream(&mut self, bytes: &[u8], header: bool) -> Result<Value> {
        let mut reader = if header {
            let content = verify_checksum(bytes)?;
            if !content.starts_with(wire::MAGIC) {
                return Err(JksnError::decode(0, DecodeErrorKind::MissingHeader));
            }
            Reader::new(content, wire::MAGIC.len())
        } else {
            Reader::new(bytes, 0)
        };

        let value = self.value(&mut reader, 0)?;
        if reader.remaining() > 0 {
            return Err(JksnError::decode(
                reader.pos,
                DecodeErrorKind::TrailingBytes(reader.remaining()),
            ));
        }
        Ok(value)
    }

    fn enter(&self, at: usize, depth: usize) -> Result<()> {
        if depth >= self.limits.max_nesting_depth {
            return Err(JksnError::decode(
                at,
                DecodeErrorKind::NestingTooDeep(self.limits.max_nesting_depth),
            ));
        }
        Ok(())
    }

    /// Next value frame, consuming any cache refreshers and pragmas before it.
    fn value(&mut self, r: &mut Reader<'_>, depth: usize) -> Result<Value> {
        loop {
            let at = r.pos;
            let control = r.byte()?;
            match control {
                wire::CACHE_CLEAR => self.cache.clear(),
                0x71..=0x7f => {
                    self.enter(at, depth)?;
                    let count = r.size(control, wire::CACHE_PRELOAD_INLINE_MAX)?;
                    for _ in 0..count {
                        self.value(r, depth + 1)?;
                    }
                }
                wire::PRAGMA => {
                    self.enter(at, depth)?;
                    self.value(r, depth + 1)?;
                }
                _ => return self.frame(r, control, at, depth),
            }
        }
    }

    fn frame(&mut self, r: &mut Reader<'_>, control: u8, at: usize, depth: usize) -> Result<Value> {
        let value = match control {
            wire::UNDEFINED => Value::Undefined,
            wire::NULL => Value::Null,
            wire::FALSE => Value::Bool(false),
            wire::TRUE => Value::Bool(true),
            wire::JSON_LITERAL => {
                self.enter(at, depth)?;
                let text = match self.value(r, depth + 1)? {
                    Value::String(text) => text,
                    other => {
                        return Err(JksnError::decode(
                            at,
                            DecodeErrorKind::JsonLiteral(format!(
                                "expected a string, found {}",
                                other.kind()
                            )),
                        ))
                    }
                };
                let json: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| JksnError::decode(at, DecodeErrorKind::JsonLiteral(e.to_string())))?;
                Value::from(json)
            }

            0x10..=0x1a => self.int(i64::from(control & 0x0f)),
            wire::INT_32 => self.int(i64::from(i32::from_be_bytes(r.array()?))),
            wire::INT_16 => self.int(i64::from(i16::from_be_bytes(r.array()?))),
            wire::INT_8 => self.int(i64::from(r.byte()? as i8)),
            wire::INT_NEG_VARINT => {
                let magnitude = r.varint()?;
                let value = 0i64
                    .checked_sub_unsigned(magnitude)
                    .ok_or_else(|| JksnError::decode(at, DecodeErrorKind::IntegerOverflow))?;
                self.int(value)
            }
            wire::INT_POS_VARINT => {
                let value = i64::try_from(r.varint()?)
                    .map_err(|_| JksnError::decode(at, DecodeErrorKind::IntegerOverflow))?;
                self.int(value)
            }

            wire::DOUBLE_NAN => Value::Double(f64::NAN),
            wire::LONG_DOUBLE => Value::LongDouble(LongDouble::from_be_bytes(r.array()?)),
            wire::DOUBLE => Value::Double(f64::from_bits(u64::from_be_bytes(r.array()?))),
            wire::FLOAT => Value::Float(f32::from_bits(u32::from_be_bytes(r.array()?))),
            wire::DOUBLE_NEG_INF => Value::Double(f64::NEG_INFINITY),
            wire::DOUBLE_POS_INF => Value::Double(f64::INFINITY),

            wire::STRING_REF => self.reference(r, at, "string", |v| v.is_string())?,
            wire::BLOB_REF => self.reference(r, at, "blob", |v| v.is_blob())?,
            wire::CONTAINER_REF => {
                self.reference(r, at, "container", |v| v.is_array() || v.is_object())?
            }

            0x30..=0x3f => {
                let units = r.size(control, wire::UTF16_INLINE_MAX)?;
                let byte_len = units.checked_mul(2).ok_or_else(|| r.eof())?;
                let bytes = r.take(byte_len)?;
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let text = String::from_utf16(&units)
                    .map_err(|_| JksnError::decode(at, DecodeErrorKind::InvalidUtf16))?;
                self.remember(Value::string(text))
            }
            0x40..=0x4f => {
                let len = r.size(control, wire::UTF8_INLINE_MAX)?;
                let text = std::str::from_utf8(r.take(len)?)
                    .map_err(|_| JksnError::decode(at, DecodeErrorKind::InvalidUtf8))?;
                self.remember(Value::string(text))
            }
            0x50..=0x5f => {
                let len = r.size(control, wire::BLOB_INLINE_MAX)?;
                let bytes = r.take(len)?;
                self.remember(Value::blob(bytes))
            }

            0x80..=0x8f => {
                self.enter(at, depth)?;
                let len = r.size(control, wire::CONTAINER_INLINE_MAX)?;
                let mut items = Vec::with_capacity(len.min(r.remaining()));
                for _ in 0..len {
                    items.push(self.value(r, depth + 1)?);
                }
                self.remember(Value::from(items))
            }
            0x90..=0x9f => {
                self.enter(at, depth)?;
                let len = r.size(control, wire::CONTAINER_INLINE_MAX)?;
                let mut map = Map::new();
                for _ in 0..len {
                    let key_at = r.pos;
                    let key = self.value(r, depth + 1)?;
                    let value = self.value(r, depth + 1)?;
                    if map.insert(key, value).is_some() {
                        return Err(JksnError::decode(key_at, DecodeErrorKind::DuplicateKey));
                    }
                }
                self.remember(Value::from(map))
            }
            wire::UNSPECIFIED => Value::Unspecified,
            0xa1..=0xaf => {
                self.enter(at, depth)?;
                let columns = r.size(control, wire::CONTAINER_INLINE_MAX)?;
                let rows = self.swapped_rows(r, columns, depth)?;
                self.remember(Value::from(rows))
            }

            0xb0..=0xbf => {
                let delta: i64 = match control {
                    0xb0..=0xb5 => i64::from(control & 0x0f),
                    0xb6..=0xba => i64::from(control & 0x0f) - 11,
                    wire::DELTA_32 => i64::from(i32::from_be_bytes(r.array()?)),
                    wire::DELTA_16 => i64::from(i16::from_be_bytes(r.array()?)),
                    wire::DELTA_8 => i64::from(r.byte()? as i8),
                    wire::DELTA_NEG_VARINT => 0i64
                        .checked_sub_unsigned(r.varint()?)
                        .ok_or_else(|| JksnError::decode(at, DecodeErrorKind::IntegerOverflow))?,
                    _ => i64::try_from(r.varint()?)
                        .map_err(|_| JksnError::decode(at, DecodeErrorKind::IntegerOverflow))?,
                };
                let base = self
                    .last_int
                    .ok_or_else(|| JksnError::decode(at, DecodeErrorKind::DeltaWithoutBase))?;
                let value = i64::try_from(i128::from(base) + i128::from(delta))
                    .map_err(|_| JksnError::decode(at, DecodeErrorKind::IntegerOverflow))?;
                self.int(value)
            }

            wire::LENGTHLESS_ARRAY => {
                self.enter(at, depth)?;
                let mut items = Vec::new();
                loop {
                    let item = self.value(r, depth + 1)?;
                    if item.is_unspecified() {
                        break;
                    }
                    items.push(item);
                }
                self.remember(Value::from(items))
            }

            _ => match ChecksumAlgorithm::from_control(control) {
                Some((algorithm, placement)) => {
                    self.checksummed(r, at, depth, algorithm, placement)?
                }
                None => return Err(JksnError::decode(at, DecodeErrorKind::InvalidTag(control))),
            },
        };
        Ok(value)
    }

    /// Value wrapped by a checksum frame, verified against its digest.
    fn checksummed(
        &mut self,
        r: &mut Reader<'_>,
        at: usize,
        depth: usize,
        algorithm: ChecksumAlgorithm,
        placement: Placement,
    ) -> Result<Value> {
        self.enter(at, depth)?;
        let leading = match placement {
            Placement::Leading => Some(r.take(algorithm.digest_len())?),
            Placement::Trailing => None,
        };
        let start = r.pos;
        let value = self.value(r, depth + 1)?;
        let buf = r.buf;
        let covered = &buf[start..r.pos];
        let expected = match leading {
            Some(digest) => digest,
            None => r.take(algorithm.digest_len())?,
        };
        let actual = algorithm.digest(covered);
        if actual != expected {
            return Err(JksnError::Checksum {
                algorithm: algorithm.name(),
                expected: checksum::hex(expected),
                actual: checksum::hex(&actual),
            });
        }
        Ok(value)
    }

    fn int(&mut self, value: i64) -> Value {
        self.last_int = Some(value);
        Value::Int(value)
    }

    /// Insert a freshly decoded literal into the cache if it qualifies.
    fn remember(&mut self, value: Value) -> Value {
        if ReferenceCache::is_cacheable(&value) {
            self.cache.insert(value.clone());
        }
        value
    }

    fn reference(
        &self,
        r: &mut Reader<'_>,
        at: usize,
        expected: &'static str,
        accepts: impl Fn(&Value) -> bool,
    ) -> Result<Value> {
        let slot = r.byte()?;
        let value = self
            .cache
            .get(slot)
            .ok_or_else(|| JksnError::decode(at, DecodeErrorKind::EmptySlot(slot)))?;
        if !accepts(value) {
            return Err(JksnError::decode(
                at,
                DecodeErrorKind::SlotKindMismatch {
                    slot,
                    expected,
                    found: value.kind().name(),
                },
            ));
        }
        Ok(value.clone())
    }

    /// Rebuild row objects from `columns` (name, column array) pairs.
    fn swapped_rows(&mut self, r: &mut Reader<'_>, columns: usize, depth: usize) -> Result<Vec<Value>> {
        let mut rows: Vec<Map> = Vec::new();
        for _ in 0..columns {
            let name_at = r.pos;
            let name = self.value(r, depth + 1)?;
            let column_at = r.pos;
            let column = self.value(r, depth + 1)?;
            let Value::Array(cells) = column else {
                return Err(JksnError::decode(column_at, DecodeErrorKind::SwappedColumnNotArray));
            };
            self.swapped_cells = self.swapped_cells.saturating_add(cells.len());
            if self.swapped_cells > self.limits.max_swapped_cells {
                return Err(JksnError::decode(
                    column_at,
                    DecodeErrorKind::TooManySwappedCells(self.limits.max_swapped_cells),
                ));
            }
            if rows.len() < cells.len() {
                rows.resize_with(cells.len(), Map::new);
            }
            for (row, cell) in rows.iter_mut().zip(cells.iter()) {
                if cell.kind() == Kind::Unspecified {
                    continue;
                }
                if row.insert(name.clone(), cell.clone()).is_some() {
                    return Err(JksnError::decode(name_at, DecodeErrorKind::DuplicateKey));
                }
            }
        }
        Ok(rows.into_iter().map(Value::from).collect())
    }
}

/// Split off and check the checksum trailer, returning the covered bytes.
fn verify_checksum(bytes: &[u8]) -> Result<&[u8]> {
    let Some(split) = bytes.len().checked_sub(wire::CHECKSUM_LEN) else {
        return Err(JksnError::decode(bytes.len(), DecodeErrorKind::UnexpectedEof));
    };
    let (content, trailer) = bytes.split_at(split);
    let mut expected = [0u8; wire::CHECKSUM_LEN];
    expected.copy_from_slice(trailer);
    let expected = u64::from_be_bytes(expected);
    let actual = xxh3_64(content);
    if expected != actual {
        return Err(JksnError::Checksum {
            algorithm: "xxh3-64",
            expected: format!("{expected:016x}"),
            actual: format!("{actual:016x}"),
        });
    }
    Ok(content)
}

/// Cursor over the input with offsets for error reporting.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn eof(&self) -> JksnError {
        JksnError::decode(self.buf.len(), DecodeErrorKind::UnexpectedEof)
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self.buf.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.eof());
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Big-endian base-128 varint of at most 64 bits.
    fn varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        loop {
            let b = self.byte()?;
            if value >> 57 != 0 {
                return Err(JksnError::decode(start, DecodeErrorKind::IntegerOverflow));
            }
            value = (value << 7) | u64::from(b & 0x7f);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
    }

    /// Length carried by a sized control byte: inline in the low nibble or in
    /// a following u8 / u16 / varint field.
    fn size(&mut self, control: u8, inline_max: usize) -> Result<usize> {
        let low = control & 0x0f;
        let len = match low {
            wire::SIZE_U8 => usize::from(self.byte()?),
            wire::SIZE_U16 => usize::from(u16::from_be_bytes(self.array()?)),
            wire::SIZE_VARINT => {
                let at = self.pos;
                usize::try_from(self.varint()?)
                    .map_err(|_| JksnError::decode(at, DecodeErrorKind::IntegerOverflow))?
            }
            _ if usize::from(low) <= inline_max => usize::from(low),
            _ => {
                return Err(JksnError::decode(
                    self.pos.saturating_sub(1),
                    DecodeErrorKind::InvalidTag(control),
                ))
            }
        };
        Ok(len)
    }
}

//! JKSN encoder: turns a [`Value`] tree into a framed byte stream.
//!
//! Encoding runs in three passes over an intermediate frame tree:
//!
//! 1. **Build**: every value becomes a [`Frame`] holding its control byte,
//!    length/number field and raw payload. Each value is built once. For a
//!    list of objects the row frames can be regrouped into row/column swapped
//!    form, and the shorter of the two layouts is kept. This pass does not
//!    touch session state.
//! 2. **Optimize**: frames are visited in output order. Repeated strings,
//!    blobs and containers become one-byte back-references into the
//!    [`ReferenceCache`], and integers close to the previous integer become
//!    delta frames.
//! 3. **Write**: the frame tree is flattened into bytes, optionally wrapped in
//!    the `jk!` header and the checksum trailer.
//!
//! # Example
//! ```
//! use jksn_core::{Encoder, Value};
//! let mut enc = Encoder::new();
//! let bytes = enc.dump(&Value::Int(42), false).unwrap();
//! assert_eq!(bytes, vec![0x1d, 0x2a]);
//! ```

use std::io::Write;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::ReferenceCache;
use crate::error::{JksnError, Result};
use crate::limits::Limits;
use crate::types::{Map, Value};
use crate::wire::{self, IntClass};

/// Encode `value` with a fresh encoder (no cross-call back-references).
pub fn dump(value: &Value, header: bool) -> Result<Vec<u8>> {
    Encoder::new().dump(value, header)
}

/// A reusable encoder. Its reference cache and previous-integer register
/// persist across [`Encoder::dump`] calls, so a later dump may refer back to
/// values emitted by an earlier one.
#[derive(Debug, Default)]
pub struct Encoder {
    cache: ReferenceCache,
    last_int: Option<i64>,
    limits: Limits,
    pending_reset: bool,
}

impl Encoder {
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

    /// Forget every cached value. The next dump starts with a cache-clear
    /// frame so that a decoder sharing this session clears in lockstep.
    pub fn reset_cache(&mut self) {
        self.cache.clear();
        self.pending_reset = true;
    }

    /// Encode one value. With `header`, the output is `jk!`, the frames, and an
    /// 8-byte big-endian xxh3-64 of everything before it.
    ///
    /// Fails only when the tree nests deeper than the configured limit, in
    /// which case the session state is left untouched.
    pub fn dump(&mut self, value: &Value, header: bool) -> Result<Vec<u8>> {
        let mut root = self.build(value, 0)?;
        self.optimize(&mut root);

        let mut out = Vec::with_capacity(root.encoded_len(usize::MAX) + 16);
        if header {
            out.extend_from_slice(wire::MAGIC);
        }
        if self.pending_reset {
            out.push(wire::CACHE_CLEAR);
            self.pending_reset = false;
        }
        root.write(&mut out);
        if header {
            let checksum = xxh3_64(&out);
            out.extend_from_slice(&checksum.to_be_bytes());
        }

        debug!(
            kind = %value.kind(),
            bytes = out.len(),
            header,
            cached = self.cache.len(),
            "encoded value"
        );
        Ok(out)
    }

    /// Encode `value` and write the bytes to `writer`.
    pub fn dump_to<W: Write>(&mut self, value: &Value, header: bool, writer: &mut W) -> Result<()> {
        let bytes = self.dump(value, header)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    // ========================================================================
    // Build pass
    // ========================================================================

    fn build(&self, value: &Value, depth: usize) -> Result<Frame> {
        let frame = match value {
            Value::Undefined => Frame::plain(wire::UNDEFINED),
            Value::Null => Frame::plain(wire::NULL),
            Value::Bool(false) => Frame::plain(wire::FALSE),
            Value::Bool(true) => Frame::plain(wire::TRUE),
            Value::Int(i) => build_int(*i),
            Value::Float(f) => Frame::plain(wire::FLOAT).with_data(f.to_bits().to_be_bytes().to_vec()),
            Value::Double(d) => build_double(*d),
            Value::LongDouble(l) => {
                Frame::plain(wire::LONG_DOUBLE).with_data(l.to_be_bytes().to_vec())
            }
            Value::String(s) => build_string(s).cacheable(value),
            Value::Blob(b) => {
                let (control, data) = wire::size_class(wire::BLOB, wire::BLOB_INLINE_MAX, b.len());
                Frame::plain(control)
                    .with_data(data)
                    .with_payload(b.to_vec())
                    .cacheable(value)
            }
            Value::Array(items) => self.build_array(items, depth)?.cacheable(value),
            Value::Object(map) => self.build_object(map, depth)?.cacheable(value),
            Value::Unspecified => Frame::plain(wire::UNSPECIFIED),
        };
        Ok(frame)
    }

    fn enter(&self, depth: usize) -> Result<()> {
        if depth >= self.limits.max_nesting_depth {
            return Err(JksnError::Encode(format!(
                "value nests deeper than {} levels",
                self.limits.max_nesting_depth
            )));
        }
        Ok(())
    }

    fn build_array(&self, items: &[Value], depth: usize) -> Result<Frame> {
        self.enter(depth)?;
        let children = items
            .iter()
            .map(|item| self.build(item, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        Ok(arrange(items, children))
    }

    fn build_object(&self, map: &Map, depth: usize) -> Result<Frame> {
        self.enter(depth)?;
        let (control, data) = wire::size_class(wire::OBJECT, wire::CONTAINER_INLINE_MAX, map.len());
        let mut children = Vec::with_capacity(map.len() * 2);
        for (key, value) in map {
            children.push(self.build(key, depth + 1)?);
            children.push(self.build(value, depth + 1)?);
        }
        Ok(Frame::plain(control).with_data(data).with_children(children))
    }

    // ========================================================================
    // Optimize pass
    // ========================================================================

    fn optimize(&mut self, frame: &mut Frame) {
        match std::mem::replace(&mut frame.kind, FrameKind::Plain) {
            FrameKind::Int(value) => {
                if let Some(last) = self.last_int {
                    if let Some((control, data)) = delta_form(value, last) {
                        if data.len() < frame.data.len() {
                            frame.control = control;
                            frame.data = data;
                        }
                    }
                }
                self.last_int = Some(value);
            }
            FrameKind::Cacheable(value) => {
                if let Some(slot) = self.cache.lookup(&value) {
                    trace!(slot, kind = %value.kind(), "cache hit");
                    frame.control = reference_control(&value);
                    frame.data = vec![slot];
                    frame.payload.clear();
                    frame.children.clear();
                    return;
                }
                for child in &mut frame.children {
                    self.optimize(child);
                }
                self.cache.insert(value);
            }
            FrameKind::Plain => {
                for child in &mut frame.children {
                    self.optimize(child);
                }
            }
        }
    }
}

/// What the optimize pass may do with a frame.
#[derive(Debug)]
enum FrameKind {
    Plain,
    Int(i64),
    Cacheable(Value),
}

/// One node of the wire tree: `control data payload children...`.
#[derive(Debug)]
struct Frame {
    control: u8,
    data: Vec<u8>,
    payload: Vec<u8>,
    children: Vec<Frame>,
    kind: FrameKind,
}

impl Frame {
    fn plain(control: u8) -> Self {
        Self {
            control,
            data: Vec::new(),
            payload: Vec::new(),
            children: Vec::new(),
            kind: FrameKind::Plain,
        }
    }

    fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    fn with_children(mut self, children: Vec<Frame>) -> Self {
        self.children = children;
        self
    }

    fn cacheable(mut self, value: &Value) -> Self {
        if ReferenceCache::is_cacheable(value) {
            self.kind = FrameKind::Cacheable(value.clone());
        }
        self
    }

    /// Encoded size counting `levels` levels of the tree (1 = this frame only).
    fn encoded_len(&self, levels: usize) -> usize {
        let own = 1 + self.data.len() + self.payload.len();
        if levels <= 1 {
            return own;
        }
        own + self
            .children
            .iter()
            .map(|child| child.encoded_len(levels - 1))
            .sum::<usize>()
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.control);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.payload);
        for child in &self.children {
            child.write(out);
        }
    }
}

fn build_int(value: i64) -> Frame {
    let frame = if (0..=wire::INT_INLINE_MAX).contains(&value) {
        Frame::plain(wire::INT_INLINE | value as u8)
    } else {
        let class = IntClass::of(value);
        Frame::plain(class.int_control()).with_data(class.encode(value))
    };
    Frame {
        kind: FrameKind::Int(value),
        ..frame
    }
}

fn build_double(value: f64) -> Frame {
    if value.to_bits() == f64::NAN.to_bits() {
        Frame::plain(wire::DOUBLE_NAN)
    } else if value == f64::INFINITY {
        Frame::plain(wire::DOUBLE_POS_INF)
    } else if value == f64::NEG_INFINITY {
        Frame::plain(wire::DOUBLE_NEG_INF)
    } else {
        Frame::plain(wire::DOUBLE).with_data(value.to_bits().to_be_bytes().to_vec())
    }
}

fn build_string(s: &str) -> Frame {
    let utf16_units = s.encode_utf16().count();
    if utf16_units * 2 < s.len() {
        let (control, data) = wire::size_class(wire::UTF16, wire::UTF16_INLINE_MAX, utf16_units);
        let payload = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
        Frame::plain(control).with_data(data).with_payload(payload)
    } else {
        let (control, data) = wire::size_class(wire::UTF8, wire::UTF8_INLINE_MAX, s.len());
        Frame::plain(control)
            .with_data(data)
            .with_payload(s.as_bytes().to_vec())
    }
}

/// Array frame over the already built `children` of `items`. Lists of
/// objects switch to the swapped form when its first three levels are shorter.
fn arrange(items: &[Value], children: Vec<Frame>) -> Frame {
    let (control, data) = wire::size_class(wire::ARRAY, wire::CONTAINER_INLINE_MAX, items.len());
    let straight = Frame::plain(control).with_data(data).with_children(children);
    if !swappable(items) {
        return straight;
    }
    if swapped_len(items, &straight.children) < straight.encoded_len(3) {
        trace!(rows = items.len(), "using row/column swapped array");
        swap(items, straight.children)
    } else {
        straight
    }
}

/// Size of the first three levels of the swapped form of `rows`, computed
/// from the straight row frames. Column headers are counted in straight form.
fn swapped_len(rows: &[Value], frames: &[Frame]) -> usize {
    let mut position: FxHashMap<&Value, usize> = FxHashMap::default();
    let mut present: Vec<usize> = Vec::new();
    let mut len = 0;
    for (row, frame) in rows.iter().zip(frames) {
        let Value::Object(map) = row else { continue };
        for (key, pair) in map.keys().zip(frame.children.chunks_exact(2)) {
            let column = *position.entry(key).or_insert_with(|| {
                present.push(0);
                len += pair[0].encoded_len(2);
                present.len() - 1
            });
            present[column] += 1;
            len += pair[1].encoded_len(1);
        }
    }

    let (_, data) = wire::size_class(wire::SWAPPED_ARRAY, wire::CONTAINER_INLINE_MAX, present.len());
    let (_, column_data) = wire::size_class(wire::ARRAY, wire::CONTAINER_INLINE_MAX, rows.len());
    let missing: usize = present.iter().map(|n| rows.len() - n).sum();
    len + 1 + data.len() + present.len() * (1 + column_data.len()) + missing
}

/// One column of a swapped array under construction.
struct Column<'a> {
    key: &'a Value,
    key_frame: Frame,
    cells: Vec<Frame>,
}

/// Regroup straight row frames into the swapped form: for each key, in order
/// of first appearance, the key frame followed by an array of that key's value
/// frame in every row, `Unspecified` where the row lacks it.
fn swap(rows: &[Value], frames: Vec<Frame>) -> Frame {
    let mut position: FxHashMap<&Value, usize> = FxHashMap::default();
    let mut columns: Vec<Column<'_>> = Vec::new();
    for (index, (row, frame)) in rows.iter().zip(frames).enumerate() {
        let Value::Object(map) = row else { continue };
        let mut children = frame.children.into_iter();
        for key in map.keys() {
            let (Some(key_frame), Some(value_frame)) = (children.next(), children.next()) else {
                break;
            };
            let column = *position.entry(key).or_insert_with(|| {
                columns.push(Column {
                    key,
                    key_frame,
                    cells: Vec::with_capacity(rows.len()),
                });
                columns.len() - 1
            });
            let cells = &mut columns[column].cells;
            pad_cells(cells, index);
            cells.push(value_frame);
        }
    }

    let (control, data) =
        wire::size_class(wire::SWAPPED_ARRAY, wire::CONTAINER_INLINE_MAX, columns.len());
    let mut children = Vec::with_capacity(columns.len() * 2);
    for mut column in columns {
        pad_cells(&mut column.cells, rows.len());
        let items: Vec<Value> = rows
            .iter()
            .map(|row| row.get(column.key.clone()).cloned().unwrap_or(Value::Unspecified))
            .collect();
        let frame = arrange(&items, column.cells);
        children.push(column.key_frame);
        children.push(frame.cacheable(&Value::from(items)));
    }
    Frame::plain(control).with_data(data).with_children(children)
}

fn pad_cells(cells: &mut Vec<Frame>, len: usize) {
    while cells.len() < len {
        cells.push(Frame::plain(wire::UNSPECIFIED));
    }
}

/// A list qualifies for the swapped form when every row is an object, at least
/// one row has a key, and no row holds `Unspecified` (it would be read back as
/// a missing cell).
fn swappable(rows: &[Value]) -> bool {
    let mut has_columns = false;
    for row in rows {
        let Value::Object(map) = row else {
            return false;
        };
        if map.values().any(Value::is_unspecified) {
            return false;
        }
        has_columns |= !map.is_empty();
    }
    has_columns
}

/// Delta frame for `value` relative to `last`, if the delta is smaller in
/// magnitude than the value itself.
fn delta_form(value: i64, last: i64) -> Option<(u8, Vec<u8>)> {
    let delta = value.checked_sub(last)?;
    if delta.unsigned_abs() >= value.unsigned_abs() {
        return None;
    }
    let form = match delta {
        0..=wire::DELTA_POS_INLINE_MAX => (wire::DELTA | delta as u8, Vec::new()),
        wire::DELTA_NEG_INLINE_MIN..=-1 => (wire::DELTA | (delta + 11) as u8, Vec::new()),
        _ => {
            let class = IntClass::of(delta);
            (class.delta_control(), class.encode(delta))
        }
    };
    Some(form)
}

fn reference_control(value: &Value) -> u8 {
    match value {
        Value::String(_) => wire::STRING_REF,
        Value::Blob(_) => wire::BLOB_REF,
        _ => wire::CONTAINER_REF,
    }
}

//! # jksn-core
//!
//! Pure-Rust encoder and decoder for **JKSN**, a compact binary format for a
//! JSON-superset value model.
//!
//! On top of JSON, a [`Value`] can hold `undefined`, 32-bit floats, x87
//! extended-precision numbers, raw blobs, non-string object keys and an
//! `unspecified` placeholder. The format shrinks streams by back-referencing
//! repeated strings, blobs and containers through a 256-slot cache that an
//! [`Encoder`] and its [`Decoder`] keep in lockstep, by delta-coding nearby
//! integers, and by storing lists of objects column by column when that is
//! shorter.
//!
//! ## Quick start
//!
//! ```rust
//! use jksn_core::{dump, parse, Value};
//!
//! let value = Value::object([
//!     ("name", Value::from("Alice")),
//!     ("scores", Value::array([95, 87, 92])),
//! ]);
//! let bytes = dump(&value, true).unwrap();
//! assert_eq!(&bytes[..3], b"jk!");
//! assert_eq!(parse(&bytes, true).unwrap(), value);
//! ```
//!
//! Reusing one [`Encoder`] lets later dumps refer back to earlier ones; the
//! matching [`Decoder`] must then parse the outputs in the same order.
//!
//! ```rust
//! use jksn_core::{Decoder, Encoder, Value};
//!
//! let mut enc = Encoder::new();
//! let mut dec = Decoder::new();
//! let v = Value::from("repeated text");
//! let first = enc.dump(&v, false).unwrap();
//! let second = enc.dump(&v, false).unwrap();
//! assert!(second.len() < first.len());
//! assert_eq!(dec.parse(&first, false).unwrap(), v);
//! assert_eq!(dec.parse(&second, false).unwrap(), v);
//! ```
//!
//! ## Modules
//!
//! - [`types`]: `Value`, its total order and structural hash
//! - [`long_double`]: 80-bit extended-precision numbers
//! - [`cache`]: the back-reference table
//! - [`checksum`]: digests for in-stream checksum frames
//! - [`encoder`]: `Value` → bytes
//! - [`decoder`]: bytes → `Value`
//! - [`json`]: JSON text bridge
//! - [`limits`]: nesting and input-size limits
//! - [`wire`]: control bytes and integer field helpers
//! - [`error`]: error types

pub mod cache;
pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod json;
pub mod limits;
pub mod long_double;
pub mod types;
pub mod wire;

pub use cache::{ReferenceCache, CACHE_SLOTS};
pub use checksum::{ChecksumAlgorithm, Placement};
pub use decoder::{parse, Decoder};
pub use encoder::{dump, Encoder};
pub use error::{DecodeErrorKind, JksnError, Result};
pub use json::{decode_json, encode_json, from_json, to_json, to_json_pretty};
pub use limits::Limits;
pub use long_double::LongDouble;
pub use types::{Kind, Map, Value};

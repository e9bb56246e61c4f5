//! 80-bit x87 extended-precision floats.
//!
//! Rust has no native extended-precision type, so [`LongDouble`] stores the
//! raw representation: a 16-bit sign/exponent word and a 64-bit significand
//! with an explicit integer bit. On the wire it occupies ten big-endian bytes.
//!
//! Conversions from `f64` and `i64` are exact. Conversion to `f64` rounds to
//! nearest, ties to even, including gradual underflow into subnormals.

use std::cmp::Ordering;
use std::fmt;

const EXP_MASK: u16 = 0x7fff;
const SIGN_BIT: u16 = 0x8000;
const EXP_BIAS: i32 = 16383;
const INT_BIT: u64 = 1 << 63;

const F64_FRAC_MASK: u64 = (1 << 52) - 1;
const F64_EXP_BIAS: i32 = 1023;

/// Extended-precision float in x87 80-bit layout.
///
/// Equality and ordering are defined over the bit pattern (IEEE total order),
/// so `NaN == NaN` for identical payloads and `-0.0 < +0.0`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LongDouble {
    sign_exp: u16,
    mantissa: u64,
}

/// A finite, non-zero value normalized so the integer bit is set:
/// `value = mantissa * 2^(exp - 63)`.
enum Unpacked {
    Zero,
    Finite { mantissa: u64, exp: i32 },
    Infinite,
    Nan,
}

impl LongDouble {
    pub const ZERO: LongDouble = LongDouble {
        sign_exp: 0,
        mantissa: 0,
    };

    pub const WIRE_SIZE: usize = 10;

    pub const fn from_parts(sign_exp: u16, mantissa: u64) -> Self {
        Self { sign_exp, mantissa }
    }

    pub const fn sign_exp(&self) -> u16 {
        self.sign_exp
    }

    pub const fn mantissa(&self) -> u64 {
        self.mantissa
    }

    pub fn from_be_bytes(bytes: [u8; 10]) -> Self {
        let sign_exp = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut mantissa = [0u8; 8];
        mantissa.copy_from_slice(&bytes[2..]);
        Self {
            sign_exp,
            mantissa: u64::from_be_bytes(mantissa),
        }
    }

    pub fn to_be_bytes(&self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..2].copy_from_slice(&self.sign_exp.to_be_bytes());
        out[2..].copy_from_slice(&self.mantissa.to_be_bytes());
        out
    }

    /// Exact widening from `f64`.
    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let sign = if bits >> 63 == 1 { SIGN_BIT } else { 0 };
        let exp = ((bits >> 52) & 0x7ff) as i32;
        let frac = bits & F64_FRAC_MASK;

        if exp == 0x7ff {
            // Infinity keeps a bare integer bit; NaN keeps its payload (quiet bit lands on bit 62).
            return Self {
                sign_exp: sign | EXP_MASK,
                mantissa: INT_BIT | (frac << 11),
            };
        }
        if exp == 0 {
            if frac == 0 {
                return Self {
                    sign_exp: sign,
                    mantissa: 0,
                };
            }
            let lz = frac.leading_zeros() as i32;
            let biased = EXP_BIAS + 63 - 1074 - lz;
            return Self {
                sign_exp: sign | biased as u16,
                mantissa: frac << lz,
            };
        }
        let biased = exp - F64_EXP_BIAS + EXP_BIAS;
        Self {
            sign_exp: sign | biased as u16,
            mantissa: INT_BIT | (frac << 11),
        }
    }

    /// Exact widening from `i64` (the 64-bit significand holds any `i64`).
    pub fn from_i64(value: i64) -> Self {
        if value == 0 {
            return Self::ZERO;
        }
        let sign = if value < 0 { SIGN_BIT } else { 0 };
        let magnitude = value.unsigned_abs();
        let lz = magnitude.leading_zeros() as i32;
        Self {
            sign_exp: sign | (EXP_BIAS + 63 - lz) as u16,
            mantissa: magnitude << lz,
        }
    }

    pub fn is_sign_negative(&self) -> bool {
        self.sign_exp & SIGN_BIT != 0
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.unpack(), Unpacked::Nan)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.unpack(), Unpacked::Infinite)
    }

    pub fn is_finite(&self) -> bool {
        matches!(self.unpack(), Unpacked::Zero | Unpacked::Finite { .. })
    }

    fn unpack(&self) -> Unpacked {
        let biased = self.sign_exp & EXP_MASK;
        if biased == EXP_MASK {
            return if self.mantissa & !INT_BIT == 0 {
                Unpacked::Infinite
            } else {
                Unpacked::Nan
            };
        }
        if self.mantissa == 0 {
            return Unpacked::Zero;
        }
        // Denormals share the exponent of the smallest normal.
        let exp = if biased == 0 {
            1 - EXP_BIAS
        } else {
            biased as i32 - EXP_BIAS
        };
        let lz = self.mantissa.leading_zeros();
        Unpacked::Finite {
            mantissa: self.mantissa << lz,
            exp: exp - lz as i32,
        }
    }

    /// Round to the nearest `f64` (ties to even). Values beyond the `f64`
    /// range become infinities, tiny values underflow to subnormals or zero.
    pub fn to_f64(&self) -> f64 {
        let sign = if self.is_sign_negative() { 1u64 << 63 } else { 0 };
        let (mantissa, exp) = match self.unpack() {
            Unpacked::Zero => return f64::from_bits(sign),
            Unpacked::Infinite => return f64::from_bits(sign | (0x7ff << 52)),
            Unpacked::Nan => {
                let mut frac = (self.mantissa >> 11) & F64_FRAC_MASK;
                if frac == 0 {
                    frac = 1 << 51;
                }
                return f64::from_bits(sign | (0x7ff << 52) | frac);
            }
            Unpacked::Finite { mantissa, exp } => (mantissa, exp),
        };

        if exp >= 1 - F64_EXP_BIAS {
            let mut exp = exp;
            let mut keep = round_shift(mantissa as u128, 11);
            if keep == 1 << 53 {
                keep >>= 1;
                exp += 1;
            }
            if exp > F64_EXP_BIAS {
                return f64::from_bits(sign | (0x7ff << 52));
            }
            let biased = (exp + F64_EXP_BIAS) as u64;
            return f64::from_bits(sign | (biased << 52) | (keep as u64 & F64_FRAC_MASK));
        }

        // Subnormal result: value = f * 2^-1074.
        let shift = (-1011 - exp) as u32;
        if shift >= 66 {
            return f64::from_bits(sign);
        }
        // A carry into bit 52 yields the smallest normal, which is the correct encoding.
        f64::from_bits(sign | round_shift(mantissa as u128, shift) as u64)
    }

    /// The exact integer value, if this is a finite integral number that fits in `i128`.
    pub fn to_i128_exact(&self) -> Option<i128> {
        let (mantissa, exp) = match self.unpack() {
            Unpacked::Zero => return Some(0),
            Unpacked::Finite { mantissa, exp } => (mantissa, exp),
            Unpacked::Infinite | Unpacked::Nan => return None,
        };
        let shift = exp - 63;
        let magnitude: u128 = if shift >= 0 {
            if shift > 63 {
                return None;
            }
            (mantissa as u128) << shift
        } else {
            let right = (-shift) as u32;
            if right > 63 || mantissa & ((1u64 << right) - 1) != 0 {
                return None;
            }
            (mantissa >> right) as u128
        };
        let magnitude = magnitude as i128;
        Some(if self.is_sign_negative() {
            -magnitude
        } else {
            magnitude
        })
    }

    /// IEEE-style total order over representations.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }

    fn order_key(&self) -> i128 {
        let magnitude = (((self.sign_exp & EXP_MASK) as i128) << 64) | self.mantissa as i128;
        if self.is_sign_negative() {
            -magnitude - 1
        } else {
            magnitude
        }
    }
}

/// `value >> shift`, rounded to nearest with ties to even.
fn round_shift(value: u128, shift: u32) -> u128 {
    let keep = value >> shift;
    let rem = value & ((1u128 << shift) - 1);
    let half = 1u128 << (shift - 1);
    if rem > half || (rem == half && keep & 1 == 1) {
        keep + 1
    } else {
        keep
    }
}

impl From<f64> for LongDouble {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<f32> for LongDouble {
    fn from(value: f32) -> Self {
        Self::from_f64(value as f64)
    }
}

impl From<i64> for LongDouble {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl PartialOrd for LongDouble {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LongDouble {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl fmt::Display for LongDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl fmt::Debug for LongDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LongDouble({} = {:#06x}:{:#018x})",
            self.to_f64(),
            self.sign_exp,
            self.mantissa
        )
    }
}

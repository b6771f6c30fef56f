//! Security level: scrypt cost parameters packed into one byte
//!
//! ```text
//! bit   7 6 5 | 4 3 2 | 1 0
//!       n_exp | r_exp | p_exp
//!
//! N = 2^(n_exp + 14)   16384 ..= 2097152
//! r = 2^(r_exp + 3)    8 ..= 1024
//! p = 2^p_exp          1 ..= 8
//! ```
//!
//! Every byte decodes to valid parameters. Encoding is strict: each
//! parameter must be an exact power of two inside its range.
//!
//! This is layout version [`LAYOUT_VERSION`]. Ciphertext produced under a
//! different layout is not readable with this one.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Version of the bit layout described in the module docs
pub const LAYOUT_VERSION: u8 = 1;

const N_EXP_SHIFT: u32 = 5;
const R_EXP_SHIFT: u32 = 2;

const N_EXP_OFFSET: u32 = 14;
const R_EXP_OFFSET: u32 = 3;
const P_EXP_OFFSET: u32 = 0;

const N_EXP_BITS: u32 = 3;
const R_EXP_BITS: u32 = 3;
const P_EXP_BITS: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityLevelError {
    #[error("Security level {0} is outside 0..=255")]
    OutOfRange(i64),
    #[error("Invalid scrypt parameter {name}={value}")]
    InvalidParameter { name: &'static str, value: u32 },
    #[error("Unknown security level: {0}")]
    UnknownPreset(String),
}

/// scrypt cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CostParameters {
    /// CPU/memory cost
    pub n: u32,
    /// Block size
    pub r: u32,
    /// Parallelization
    pub p: u32,
}

impl CostParameters {
    pub const fn new(n: u32, r: u32, p: u32) -> Self {
        Self { n, r, p }
    }

    /// log2(N), as taken by the `scrypt` crate
    pub fn log_n(&self) -> u8 {
        self.n.trailing_zeros() as u8
    }

    /// Approximate working memory of one derivation in bytes (128 * r * N)
    pub fn memory_bytes(&self) -> u64 {
        128 * u64::from(self.r) * u64::from(self.n)
    }
}

/// One-byte KDF cost tag
///
/// Serializes as its integer value. Deserializes from an integer or from
/// any string [`FromStr`] accepts, so config files can name a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    /// N=32768, r=16, p=1
    pub const DEFAULT: SecurityLevel = SecurityLevel(0b0010_0100);
    /// N=65536, r=16, p=1
    pub const HIGH: SecurityLevel = SecurityLevel(0b0100_0100);
    /// N=131072, r=32, p=1
    pub const PARANOID: SecurityLevel = SecurityLevel(0b0110_1000);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Unpack the cost parameters. Total over all 256 values.
    pub fn params(self) -> CostParameters {
        let n_exp = u32::from(self.0 >> N_EXP_SHIFT) & mask(N_EXP_BITS);
        let r_exp = u32::from(self.0 >> R_EXP_SHIFT) & mask(R_EXP_BITS);
        let p_exp = u32::from(self.0) & mask(P_EXP_BITS);

        CostParameters {
            n: 1 << (n_exp + N_EXP_OFFSET),
            r: 1 << (r_exp + R_EXP_OFFSET),
            p: 1 << (p_exp + P_EXP_OFFSET),
        }
    }

    /// Pack cost parameters into a level.
    ///
    /// Values are never rounded: a parameter that is not a power of two, or
    /// whose exponent falls outside its field, is rejected.
    pub fn from_params(params: &CostParameters) -> Result<Self, SecurityLevelError> {
        let n_exp = field_exponent("N", params.n, N_EXP_OFFSET, N_EXP_BITS)?;
        let r_exp = field_exponent("r", params.r, R_EXP_OFFSET, R_EXP_BITS)?;
        let p_exp = field_exponent("p", params.p, P_EXP_OFFSET, P_EXP_BITS)?;

        Ok(Self((n_exp << N_EXP_SHIFT) | (r_exp << R_EXP_SHIFT) | p_exp))
    }

    /// Name of the preset this level equals, if any
    pub fn preset_name(self) -> Option<&'static str> {
        match self {
            Self::DEFAULT => Some("default"),
            Self::HIGH => Some("high"),
            Self::PARANOID => Some("paranoid"),
            _ => None,
        }
    }
}

fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

fn field_exponent(
    name: &'static str,
    value: u32,
    offset: u32,
    bits: u32,
) -> Result<u8, SecurityLevelError> {
    let invalid = SecurityLevelError::InvalidParameter { name, value };
    if !value.is_power_of_two() {
        return Err(invalid);
    }
    let exp = value.trailing_zeros();
    if exp < offset || exp - offset > mask(bits) {
        return Err(invalid);
    }
    Ok((exp - offset) as u8)
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for SecurityLevel {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> Self {
        level.0
    }
}

impl TryFrom<i64> for SecurityLevel {
    type Error = SecurityLevelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| SecurityLevelError::OutOfRange(value))
    }
}

impl TryFrom<CostParameters> for SecurityLevel {
    type Error = SecurityLevelError;

    fn try_from(params: CostParameters) -> Result<Self, Self::Error> {
        Self::from_params(&params)
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.preset_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Accepts a preset name, a decimal byte, or a `0x` hex byte.
impl FromStr for SecurityLevel {
    type Err = SecurityLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "default" => return Ok(Self::DEFAULT),
            "high" => return Ok(Self::HIGH),
            "paranoid" => return Ok(Self::PARANOID),
            _ => {}
        }

        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return u8::from_str_radix(hex, 16)
                .map(Self)
                .map_err(|_| SecurityLevelError::UnknownPreset(s.to_string()));
        }

        match trimmed.parse::<i64>() {
            Ok(value) => Self::try_from(value),
            Err(_) => Err(SecurityLevelError::UnknownPreset(s.to_string())),
        }
    }
}

impl Serialize for SecurityLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

struct SecurityLevelVisitor;

impl<'de> Visitor<'de> for SecurityLevelVisitor {
    type Value = SecurityLevel;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a security level byte or preset name")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        SecurityLevel::try_from(value).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        u8::try_from(value)
            .map(SecurityLevel)
            .map_err(|_| E::custom(format!("Security level {} is outside 0..=255", value)))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for SecurityLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SecurityLevelVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_levels() {
        assert_eq!(
            SecurityLevel::new(0).params(),
            CostParameters::new(16384, 8, 1)
        );
        assert_eq!(
            SecurityLevel::new(255).params(),
            CostParameters::new(2_097_152, 1024, 8)
        );
    }

    #[test]
    fn test_presets() {
        assert_eq!(SecurityLevel::DEFAULT.value(), 0x24);
        assert_eq!(
            SecurityLevel::DEFAULT.params(),
            CostParameters::new(32768, 16, 1)
        );
        assert_eq!(
            SecurityLevel::HIGH.params(),
            CostParameters::new(65536, 16, 1)
        );
        assert_eq!(
            SecurityLevel::PARANOID.params(),
            CostParameters::new(131072, 32, 1)
        );
        assert_eq!(SecurityLevel::default(), SecurityLevel::DEFAULT);
    }

    #[test]
    fn test_every_byte_roundtrips() {
        for value in 0..=u8::MAX {
            let level = SecurityLevel::new(value);
            let params = level.params();
            assert!(params.n.is_power_of_two());
            assert!((16384..=2_097_152).contains(&params.n));
            assert!((8..=1024).contains(&params.r));
            assert!((1..=8).contains(&params.p));
            assert_eq!(SecurityLevel::from_params(&params).unwrap(), level);
        }
    }

    #[test]
    fn test_out_of_range_params_rejected() {
        assert_eq!(
            SecurityLevel::from_params(&CostParameters::new(8192, 8, 1)),
            Err(SecurityLevelError::InvalidParameter {
                name: "N",
                value: 8192
            })
        );
        assert_eq!(
            SecurityLevel::from_params(&CostParameters::new(16384, 8, 0)),
            Err(SecurityLevelError::InvalidParameter { name: "p", value: 0 })
        );
        assert!(SecurityLevel::from_params(&CostParameters::new(4_194_304, 8, 1)).is_err());
        assert!(SecurityLevel::from_params(&CostParameters::new(16384, 4, 1)).is_err());
        assert!(SecurityLevel::from_params(&CostParameters::new(16384, 2048, 1)).is_err());
        assert!(SecurityLevel::from_params(&CostParameters::new(16384, 8, 16)).is_err());
    }

    #[test]
    fn test_non_power_of_two_not_rounded() {
        assert!(SecurityLevel::from_params(&CostParameters::new(20000, 8, 1)).is_err());
        assert!(SecurityLevel::from_params(&CostParameters::new(16384, 12, 1)).is_err());
        assert!(SecurityLevel::from_params(&CostParameters::new(16384, 8, 3)).is_err());
    }

    #[test]
    fn test_integer_validation() {
        assert_eq!(
            SecurityLevel::try_from(-1i64),
            Err(SecurityLevelError::OutOfRange(-1))
        );
        assert_eq!(
            SecurityLevel::try_from(2000i64),
            Err(SecurityLevelError::OutOfRange(2000))
        );
        assert_eq!(SecurityLevel::try_from(0i64).unwrap().value(), 0);
        assert_eq!(SecurityLevel::try_from(255i64).unwrap().value(), 255);
    }

    #[test]
    fn test_parse() {
        assert_eq!("default".parse::<SecurityLevel>().unwrap(), SecurityLevel::DEFAULT);
        assert_eq!("HIGH".parse::<SecurityLevel>().unwrap(), SecurityLevel::HIGH);
        assert_eq!(
            " paranoid ".parse::<SecurityLevel>().unwrap(),
            SecurityLevel::PARANOID
        );
        assert_eq!("0x24".parse::<SecurityLevel>().unwrap(), SecurityLevel::DEFAULT);
        assert_eq!("17".parse::<SecurityLevel>().unwrap().value(), 17);
        assert_eq!(
            "300".parse::<SecurityLevel>(),
            Err(SecurityLevelError::OutOfRange(300))
        );
        assert!(matches!(
            "extreme".parse::<SecurityLevel>(),
            Err(SecurityLevelError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for value in 0..=u8::MAX {
            let level = SecurityLevel::new(value);
            assert_eq!(level.to_string().parse::<SecurityLevel>().unwrap(), level);
        }
        assert_eq!(SecurityLevel::HIGH.to_string(), "high");
        assert_eq!(SecurityLevel::new(1).to_string(), "1");
    }

    #[test]
    fn test_log_n_and_memory() {
        let params = SecurityLevel::DEFAULT.params();
        assert_eq!(params.log_n(), 15);
        assert_eq!(params.memory_bytes(), 64 * 1024 * 1024);
    }

    #[test]
    fn test_serde_forms() {
        assert_eq!(serde_json::to_string(&SecurityLevel::DEFAULT).unwrap(), "36");
        assert_eq!(
            serde_json::from_str::<SecurityLevel>("36").unwrap(),
            SecurityLevel::DEFAULT
        );
        assert_eq!(
            serde_json::from_str::<SecurityLevel>("\"paranoid\"").unwrap(),
            SecurityLevel::PARANOID
        );
        assert_eq!(
            serde_json::from_str::<SecurityLevel>("\"0x44\"").unwrap(),
            SecurityLevel::HIGH
        );

        assert!(serde_json::from_str::<SecurityLevel>("256").is_err());
        assert!(serde_json::from_str::<SecurityLevel>("-1").is_err());
        assert!(serde_json::from_str::<SecurityLevel>("\"extreme\"").is_err());
        assert!(serde_json::from_str::<SecurityLevel>("1.5").is_err());

        for value in [0u8, 17, 255] {
            let level = SecurityLevel::new(value);
            let json = serde_json::to_string(&level).unwrap();
            assert_eq!(serde_json::from_str::<SecurityLevel>(&json).unwrap(), level);
        }
    }
}

//! Token amounts exchanged with the incentive layer.
//!
//! Amounts are fixed-point integers in base units (u128). One whole token is
//! `10^18` base units, matching the ledger's token contracts.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Base units per whole token.
pub const BASE_UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// A token amount in base units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Convert a whole-token quantity into base units, saturating on overflow.
    pub fn from_whole_tokens(tokens: u64) -> Self {
        Self((tokens as u128).saturating_mul(BASE_UNITS_PER_TOKEN))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = TypesError;

    /// Accepts decimal (`"1500"`) or `0x`-prefixed hex (`"0x5dc"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u128::from_str_radix(hex, 16),
            None => s.parse::<u128>(),
        };
        parsed
            .map(Self)
            .map_err(|e| TypesError::InvalidAmount(format!("{s}: {e}")))
    }
}

// Serialized as a decimal string: TOML and JSON integers cannot hold u128.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal/hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v as u128))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u128::try_from(v)
                    .map(Amount)
                    .map_err(|_| E::custom("amount must not be negative"))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_tokens_scale_to_base_units() {
        assert_eq!(Amount::from_whole_tokens(2).raw(), 2 * BASE_UNITS_PER_TOKEN);
        assert_eq!(Amount::from_whole_tokens(0), Amount::ZERO);
    }

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!("1500".parse::<Amount>().unwrap(), Amount::new(1500));
        assert_eq!("0x5dc".parse::<Amount>().unwrap(), Amount::new(1500));
        assert!("-3".parse::<Amount>().is_err());
    }

    #[test]
    fn deserializes_from_number_or_string() {
        let a: Amount = serde_json::from_str("42").unwrap();
        let b: Amount = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Amount>("-1").is_err());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Amount::new(u128::MAX)).unwrap();
        assert_eq!(json, format!("\"{}\"", u128::MAX));
    }
}

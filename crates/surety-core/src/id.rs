//! 32-byte identifiers, hex-encoded (64 chars) on every wire surface.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("expected 64 hex characters, got {0}")]
    BadLength(usize),
    #[error("invalid hex: {0}")]
    BadHex(String),
}

fn parse_hex32(s: &str) -> Result<[u8; 32], ParseIdError> {
    let s = s.trim().trim_start_matches("0x");
    if s.len() != 64 {
        return Err(ParseIdError::BadLength(s.len()));
    }
    let bytes = hex::decode(s).map_err(|e| ParseIdError::BadHex(e.to_string()))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

macro_rules! hex_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Short prefix is enough to identify in logs.
                write!(f, "{}({}…)", stringify!($name), &hex::encode(&self.0[..4]))
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex32(s).map($name)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
                ser.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
                let s = String::deserialize(de)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

hex_id! {
    /// Identity of a staked agent.
    AgentId
}
hex_id! {
    /// An external controlling account (holds funds outside custody).
    AccountId
}
hex_id! {
    /// Content-derived claim identifier.
    ClaimId
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_hex() {
        let id = AgentId([0xab; 32]);
        let s = id.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(s.parse::<AgentId>().unwrap(), id);
    }

    #[test]
    fn accepts_0x_prefix() {
        let s = format!("0x{}", hex::encode([7u8; 32]));
        assert_eq!(s.parse::<AccountId>().unwrap(), AccountId([7u8; 32]));
    }

    #[test]
    fn rejects_wrong_length_and_bad_hex() {
        assert!(matches!(
            "abcd".parse::<ClaimId>(),
            Err(ParseIdError::BadLength(4))
        ));
        let bad = "zz".repeat(32);
        assert!(matches!(bad.parse::<ClaimId>(), Err(ParseIdError::BadHex(_))));
    }
}

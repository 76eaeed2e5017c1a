use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use hex::FromHex;
use quickcheck::Arbitrary;
use serde::{Deserialize, Serialize};

/// A [`serde`]-compatible wrapper around a hex-encoded byte sequence with `0x`
/// prefix, as returned by graph-node for `Bytes` scalars. Parsing and
/// deserializing from hex strings without the `0x` prefix is also allowed.
///
/// Prefer one of the descriptive aliases (e.g. [`crate::PoiBytes`]) over using
/// this type directly; fixed-size aliases reject values of the wrong length.
#[derive(
    Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::From,
)]
pub struct HexString<T>(pub T);

impl<T: AsRef<[u8]>> HexString<T> {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns `true` if the underlying byte sequence is empty. Only possible
    /// for variable-length hex strings.
    pub fn is_empty(&self) -> bool {
        self.0.as_ref().is_empty()
    }
}

impl<T: AsRef<[u8]>> Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_ref()))
    }
}

impl<T: FromHex> FromStr for HexString<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        T::from_hex(digits)
            .map(Self)
            .map_err(|_| format!("invalid hex string: {:?}", s))
    }
}

impl<T: AsRef<[u8]>> Serialize for HexString<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, T: FromHex> Deserialize<'de> for HexString<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<T> schemars::JsonSchema for HexString<T> {
    fn schema_name() -> String {
        "HexString".to_owned()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        gen.subschema_for::<String>()
    }
}

impl<T: Arbitrary> Arbitrary for HexString<T> {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self(T::arbitrary(g))
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A subgraph deployment ID, i.e. the IPFS CID of its manifest
/// (`Qm...`). Serialized as its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpfsCid(cid::Cid);

impl fmt::Display for IpfsCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IpfsCid {
    type Err = cid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        cid::Cid::from_str(s).map(Self)
    }
}

impl Serialize for IpfsCid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IpfsCid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//! Value types shared by all POIfier crates.

mod hex_string;
mod ipfs_cid;
mod network;
mod report;

pub use hex_string::HexString;
pub use ipfs_cid::IpfsCid;
pub use network::Network;
pub use report::{Report, ReportRecord, ReportSummary};

/// A PoI (proof of indexing) is always 32 bytes.
pub type PoiBytes = HexString<[u8; 32]>;

/// Note that block hashes have variable length, to easily deal with different
/// hash sizes across networks.
pub type BlockHash = HexString<Vec<u8>>;

/// Ethereum addresses, and indexers' as a consequence, are 20 bytes long.
pub type IndexerAddress = HexString<[u8; 20]>;

/// The placeholder indexer identity that reference PoIs are computed for.
/// Using the zero address instead of the real indexer's makes PoIs comparable
/// across indexers.
pub const REFERENCE_INDEXER: IndexerAddress = HexString([0u8; 20]);

pub mod mocks;

use std::str::FromStr;

use poifier_common_types::{BlockHash, HexString, IpfsCid, Network, PoiBytes};
use poifier_index_node_client::{BlockPointer, IndexingStatus, SubgraphHealth};

use crate::directory::Dataset;

pub const DEPLOYMENT_A: &str = "QmNY7gDNXHECV8SXoEY7hbfg4BX1aDMxTBDiFuG4huaSGA";
pub const DEPLOYMENT_B: &str = "QmeYTH2fK2wv96XvnCGH2eyKFE8kmRfo53zYVy5dKysZtH";
pub const DEPLOYMENT_C: &str = "QmWyf3dtqJnhuCpzEDTNmNFYc5tjxTrXhGcUUmGHdg2gtj";

/// Parses the [`IpfsCid`] of a subgraph deployment.
pub fn ipfs_cid(deployment: impl Into<String>) -> IpfsCid {
    IpfsCid::from_str(&deployment.into()).unwrap()
}

pub fn network(name: &str) -> Network {
    name.parse().unwrap()
}

/// A 32-byte block hash filled with `byte`.
pub fn block_hash(byte: u8) -> BlockHash {
    HexString(vec![byte; 32])
}

/// A PoI filled with `byte`.
pub fn poi(byte: u8) -> PoiBytes {
    HexString([byte; 32])
}

pub fn status(
    deployment: &str,
    health: SubgraphHealth,
    network_name: &str,
    latest_block: Option<u64>,
) -> IndexingStatus {
    IndexingStatus {
        deployment: ipfs_cid(deployment),
        health,
        network: network(network_name),
        latest_block: latest_block.map(|number| BlockPointer { number, hash: None }),
    }
}

pub fn dataset(deployment: &str, network_name: &str, head_block: u64) -> Dataset {
    Dataset {
        id: ipfs_cid(deployment),
        network: network(network_name),
        head_block,
    }
}

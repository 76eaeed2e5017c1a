use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};
use poifier_common_types::{IndexerAddress, Network, REFERENCE_INDEXER};
use poifier_index_node_client::{IndexNodeClient, PoiRequest, RealIndexNode, SubgraphHealth};
use prometheus::{IntCounterVec, Opts};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

const DEPLOYMENT: &str = "QmNY7gDNXHECV8SXoEY7hbfg4BX1aDMxTBDiFuG4huaSGA";
const BLOCK_HASH: &str = "0x4fa8c9c9a8b0d06e5ba7e4b5d9b0f8e1a3b4c5d6e7f8091a2b3c4d5e6f708192";

const DEPLOYMENT_NOT_STARTED: &str = "QmeYTH2fK2wv96XvnCGH2eyKFE8kmRfo53zYVy5dKysZtH";
const DEPLOYMENT_SYNCING: &str = "QmWyf3dtqJnhuCpzEDTNmNFYc5tjxTrXhGcUUmGHdg2gtj";

/// Answers like graph-node's status API would, based on the query and
/// variables it receives.
fn fake_graph_node(request: &Value) -> Value {
    let query = request["query"].as_str().unwrap_or_default();
    let variables = &request["variables"];

    if query.contains("indexingStatuses") {
        json!({ "data": { "indexingStatuses": [
            {
                "subgraph": DEPLOYMENT,
                "health": "healthy",
                "chains": [{
                    "network": "mainnet",
                    "latestBlock": { "number": "12345678", "hash": BLOCK_HASH }
                }]
            },
            {
                "subgraph": DEPLOYMENT_NOT_STARTED,
                "health": "healthy",
                "chains": []
            },
            {
                "subgraph": DEPLOYMENT_SYNCING,
                "health": "healthy",
                "chains": [{ "network": "gnosis", "latestBlock": null }]
            },
            {
                "subgraph": "not-a-cid",
                "health": "failed",
                "chains": [{ "network": "mainnet", "latestBlock": null }]
            }
        ]}})
    } else if query.contains("blockHashFromNumber") {
        match variables["blockNumber"].as_i64() {
            Some(12345000) => json!({ "data": { "blockHashFromNumber": BLOCK_HASH } }),
            _ => json!({ "data": { "blockHashFromNumber": null } }),
        }
    } else if query.contains("proofOfIndexing") {
        assert_eq!(variables["subgraph"], DEPLOYMENT);
        assert_eq!(variables["indexer"], REFERENCE_INDEXER.to_string());
        match variables["blockNumber"].as_i64() {
            Some(12345000) => json!({ "data": { "proofOfIndexing": format!("0x{}", "ab".repeat(32)) } }),
            Some(12343000) => json!({ "data": { "proofOfIndexing": "" } }),
            Some(12342000) => json!({ "data": { "proofOfIndexing": "0x" } }),
            _ => json!({ "data": { "proofOfIndexing": null } }),
        }
    } else {
        json!({ "errors": [{ "message": "unknown query" }] })
    }
}

/// Reports a healthy deployment with a malformed network name.
fn graph_node_with_invalid_healthy_status(_request: &Value) -> Value {
    json!({ "data": { "indexingStatuses": [
        {
            "subgraph": DEPLOYMENT,
            "health": "healthy",
            "chains": [{
                "network": "not a network!",
                "latestBlock": { "number": "12345678", "hash": BLOCK_HASH }
            }]
        }
    ]}})
}

/// Fails every query with a GraphQL error payload.
fn graph_node_with_errors(_request: &Value) -> Value {
    json!({ "errors": [{ "message": "store error: database unavailable" }], "data": null })
}

async fn start_fake_graph_node_with(respond: fn(&Value) -> Value) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route(
        "/graphql",
        post(move |Json(request): Json<Value>| async move { Json(respond(&request)) }),
    );
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

    format!("http://{}/graphql", addr).parse().unwrap()
}

async fn start_fake_graph_node() -> Url {
    start_fake_graph_node_with(fake_graph_node).await
}

fn index_node(endpoint: Url) -> Arc<RealIndexNode> {
    let requests =
        IntCounterVec::new(Opts::new("foo", "bar"), &["query", "success"]).unwrap();
    Arc::new(RealIndexNode::new(endpoint, requests))
}

fn poi_request(block_number: u64) -> PoiRequest {
    PoiRequest {
        deployment: DEPLOYMENT.parse().unwrap(),
        block_number,
        block_hash: BLOCK_HASH.parse().unwrap(),
        indexer: REFERENCE_INDEXER,
    }
}

#[tokio::test]
async fn indexing_statuses_skip_deployments_that_have_not_started() {
    //// Given
    let index_node = index_node(start_fake_graph_node().await);

    //// When
    let statuses = index_node.indexing_statuses().await.unwrap();

    //// Then
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].deployment.to_string(), DEPLOYMENT);
    assert_eq!(statuses[0].health, SubgraphHealth::Healthy);
    assert_eq!(statuses[0].latest_block.as_ref().unwrap().number, 12345678);
    assert_eq!(statuses[1].deployment.to_string(), DEPLOYMENT_SYNCING);
    assert_eq!(statuses[1].latest_block, None);
}

#[tokio::test]
async fn invalid_status_of_healthy_deployment_fails_the_query() {
    let index_node = index_node(
        start_fake_graph_node_with(graph_node_with_invalid_healthy_status).await,
    );

    let err = index_node.indexing_statuses().await.unwrap_err();

    assert!(format!("{:#}", err).contains(DEPLOYMENT));
}

#[tokio::test]
async fn graphql_errors_fail_the_query() {
    let index_node = index_node(start_fake_graph_node_with(graph_node_with_errors).await);
    let mainnet: Network = "mainnet".parse().unwrap();

    let err = index_node.clone().indexing_statuses().await.unwrap_err();
    assert!(format!("{:#}", err).contains("database unavailable"));

    assert!(index_node.clone().block_hash(&mainnet, 12345000).await.is_err());
    assert!(index_node
        .proof_of_indexing(poi_request(12345000))
        .await
        .is_err());
}

#[tokio::test]
async fn block_hash_lookup() {
    let index_node = index_node(start_fake_graph_node().await);
    let mainnet: Network = "mainnet".parse().unwrap();

    let hash = index_node
        .clone()
        .block_hash(&mainnet, 12345000)
        .await
        .unwrap();
    assert_eq!(hash.unwrap().to_string(), BLOCK_HASH);

    let unknown = index_node.block_hash(&mainnet, 999).await.unwrap();
    assert_eq!(unknown, None);
}

#[tokio::test]
async fn proof_of_indexing_present_and_absent() {
    let index_node = index_node(start_fake_graph_node().await);

    let poi = index_node
        .clone()
        .proof_of_indexing(poi_request(12345000))
        .await
        .unwrap();
    assert_eq!(poi.unwrap().to_string(), format!("0x{}", "ab".repeat(32)));

    let absent = index_node
        .proof_of_indexing(poi_request(12344000))
        .await
        .unwrap();
    assert_eq!(absent, None);
}

#[tokio::test]
async fn empty_proofs_of_indexing_are_absent() {
    let index_node = index_node(start_fake_graph_node().await);

    for block_number in [12343000, 12342000] {
        let poi = index_node
            .clone()
            .proof_of_indexing(poi_request(block_number))
            .await
            .unwrap();
        assert_eq!(poi, None, "block #{}", block_number);
    }
}

#[tokio::test]
async fn unreachable_index_node_fails() {
    // Nothing listens on the discard port.
    let index_node = index_node("http://127.0.0.1:9/graphql".parse().unwrap());
    assert!(index_node.indexing_statuses().await.is_err());
}

#[test]
fn reference_indexer_is_zero_address() {
    let zero: IndexerAddress = "0x0000000000000000000000000000000000000000".parse().unwrap();
    assert_eq!(REFERENCE_INDEXER, zero);
}

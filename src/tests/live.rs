use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::support::{FlakyWatchStore, eventually};
use crate::config::WatchConfig;
use crate::error::MapperError;
use crate::mapper::{ConfigMapMapper, Mapper};
use crate::metrics::{CounterSink, NoOpSink};
use crate::source::{DocumentStore, MemoryDocumentStore};
use crate::store::MapStore;
use crate::watcher::Watcher;

const NAME: &str = "aws-auth";

fn watch_config() -> WatchConfig {
    WatchConfig {
        document_name: NAME.to_string(),
        retry_interval: Duration::from_millis(10),
    }
}

fn data(fields: &[(&str, &str)]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn accounts(ids: &[&str]) -> BTreeMap<String, String> {
    let body: String = ids.iter().map(|id| format!("- \"{id}\"\n")).collect();
    data(&[("mapAccounts", body.as_str())])
}

fn live(source: Arc<dyn DocumentStore>, metrics: Arc<CounterSink>) -> ConfigMapMapper {
    ConfigMapMapper::new(source, metrics, watch_config())
}

#[tokio::test]
async fn test_account_list_follows_document() {
    let source = Arc::new(MemoryDocumentStore::new());
    source.create(NAME, accounts(&["123", "345"])).unwrap();

    let mapper = live(source.clone(), Arc::new(CounterSink::new()));
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();

    eventually("first document", || mapper.is_account_allowed("345")).await;
    assert!(mapper.is_account_allowed("123"));

    source.create(NAME, accounts(&["567"])).unwrap();
    eventually("modified document", || mapper.is_account_allowed("567")).await;
    assert!(!mapper.is_account_allowed("345"));
    assert!(!mapper.is_account_allowed("123"));
    stop.cancel();
}

#[tokio::test]
async fn test_map_resolves_live_entries() {
    let source = Arc::new(MemoryDocumentStore::new());
    let mapper = live(source.clone(), Arc::new(CounterSink::new()));
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();

    source
        .create(
            NAME,
            data(&[
                (
                    "mapUsers",
                    "- userarn: arn:aws:iam::123:user/Matt\n  username: matlan\n  groups:\n  - system:masters\n",
                ),
                (
                    "mapRoles",
                    "- rolearnLike: arn:aws:iam::123:role/node-*\n  username: system:node:{{EC2PrivateDNSName}}\n  groups:\n  - system:nodes\n",
                ),
            ]),
        )
        .unwrap();

    eventually("user mapping", || mapper.map("arn:aws:iam::123:user/MATT").is_ok()).await;
    let user = mapper.map("arn:aws:iam::123:user/MATT").unwrap();
    assert_eq!(user.identity_arn, "arn:aws:iam::123:user/matt");
    assert_eq!(user.username, "matlan");

    let node = mapper
        .map("arn:aws:sts::123:assumed-role/node-group-1/i-0abc")
        .unwrap();
    assert_eq!(node.username, "system:node:{{EC2PrivateDNSName}}");
    assert_eq!(node.identity_arn, "arn:aws:iam::123:role/node-group-1");

    assert_eq!(mapper.map("arn:aws:iam::123:user/other"), Err(MapperError::NotMapped));
    stop.cancel();
}

#[tokio::test]
async fn test_delete_clears_tables() {
    let source = Arc::new(MemoryDocumentStore::new());
    source
        .create(
            NAME,
            data(&[
                (
                    "mapRoles",
                    "- rolearn: arn:aws:iam::123:role/admin\n  username: admin\n  groups:\n  - system:masters\n",
                ),
                ("mapAccounts", "- \"123\"\n"),
            ]),
        )
        .unwrap();
    let mapper = live(source.clone(), Arc::new(CounterSink::new()));
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();
    eventually("document", || mapper.map("arn:aws:iam::123:role/admin").is_ok()).await;
    assert!(mapper.is_account_allowed("123"));

    source.delete(NAME).unwrap();
    eventually("delete", || !mapper.is_account_allowed("123")).await;
    assert_eq!(
        mapper.map("arn:aws:iam::123:role/admin"),
        Err(MapperError::NotMapped)
    );
    assert_eq!(
        mapper.store().role_mapping("arn:aws:iam::123:role/admin"),
        Err(MapperError::RoleNotFound)
    );
    stop.cancel();
}

#[tokio::test]
async fn test_other_documents_are_ignored() {
    let source = Arc::new(MemoryDocumentStore::new());
    let mapper = live(source.clone(), Arc::new(CounterSink::new()));
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();

    source.create("something-else", accounts(&["999"])).unwrap();
    source.create(NAME, accounts(&["123"])).unwrap();
    eventually("document", || mapper.is_account_allowed("123")).await;
    assert!(!mapper.is_account_allowed("999"));
    stop.cancel();
}

#[tokio::test]
async fn test_partially_invalid_document_keeps_valid_records() {
    let source = Arc::new(MemoryDocumentStore::new());
    let metrics = Arc::new(CounterSink::new());
    let mapper = live(source.clone(), metrics.clone());
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();

    source
        .create(
            NAME,
            data(&[
                (
                    "mapRoles",
                    "- rolearn: arn:aws:iam::123:role/good\n  username: good\n  groups:\n  - g\n- rolearn: arn:aws:iam::123:role/bad\n  rolearnLike: arn:aws:iam::123:role/ba*\n  username: bad\n",
                ),
                ("mapAccounts", "- \"123\"\n"),
            ]),
        )
        .unwrap();

    eventually("partial snapshot", || metrics.partial_snapshots() == 1).await;
    assert_eq!(mapper.map("arn:aws:iam::123:role/good").unwrap().username, "good");
    assert_eq!(mapper.map("arn:aws:iam::123:role/bad"), Err(MapperError::NotMapped));
    assert!(mapper.is_account_allowed("123"));
    stop.cancel();
}

#[tokio::test]
async fn test_failed_watches_are_counted_and_retried() {
    let inner = Arc::new(MemoryDocumentStore::new());
    inner.create(NAME, accounts(&["123"])).unwrap();
    let source = Arc::new(FlakyWatchStore::new(inner, 3));
    let metrics = Arc::new(CounterSink::new());
    let mapper = live(source, metrics.clone());
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();

    eventually("recovery", || mapper.is_account_allowed("123")).await;
    assert_eq!(metrics.watch_failures(), 3);
    stop.cancel();
}

#[tokio::test]
async fn test_closed_stream_reconnects() {
    let source = Arc::new(MemoryDocumentStore::new());
    source.create(NAME, accounts(&["123"])).unwrap();
    let metrics = Arc::new(CounterSink::new());
    let mapper = live(source.clone(), metrics.clone());
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();
    eventually("document", || mapper.is_account_allowed("123")).await;

    source.disconnect_watchers().unwrap();
    source.create(NAME, accounts(&["456"])).unwrap();
    eventually("document after reconnect", || mapper.is_account_allowed("456")).await;
    assert_eq!(metrics.watch_failures(), 0);
    stop.cancel();
}

#[tokio::test]
async fn test_change_survives_a_burst_of_unrelated_writes() {
    let source = Arc::new(MemoryDocumentStore::new());
    source.create(NAME, accounts(&["123"])).unwrap();
    let mapper = live(source.clone(), Arc::new(CounterSink::new()));
    let stop = CancellationToken::new();
    mapper.start(stop.clone()).unwrap();
    eventually("document", || mapper.is_account_allowed("123")).await;

    // No await between writes: the watcher cannot keep up and falls behind.
    source.create(NAME, accounts(&["567"])).unwrap();
    for i in 0..200 {
        source.create(&format!("other-{i}"), accounts(&["999"])).unwrap();
    }

    eventually("change after burst", || mapper.is_account_allowed("567")).await;
    assert!(!mapper.is_account_allowed("123"));
    assert!(!mapper.is_account_allowed("999"));
    stop.cancel();
}

#[tokio::test]
async fn test_stop_ends_the_watcher() {
    let source = Arc::new(MemoryDocumentStore::new());
    let stop = CancellationToken::new();
    let handle = Watcher::new(
        source,
        MapStore::default(),
        Arc::new(NoOpSink),
        watch_config(),
        stop.clone(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(20)).await;
    stop.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("watcher did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_stop_interrupts_backoff() {
    let inner = Arc::new(MemoryDocumentStore::new());
    let source = Arc::new(FlakyWatchStore::new(inner, u32::MAX));
    let stop = CancellationToken::new();
    let handle = Watcher::new(
        source,
        MapStore::default(),
        Arc::new(NoOpSink),
        WatchConfig {
            retry_interval: Duration::from_secs(3600),
            ..watch_config()
        },
        stop.clone(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(20)).await;
    stop.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("watcher did not stop")
        .unwrap();
}

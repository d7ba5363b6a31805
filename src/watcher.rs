//! Keeps a [`MapStore`] in sync with the live mapping document.
//!
//! The watcher runs as one task: connect, consume events, reconnect when the
//! stream ends. A failed connect is reported to the metrics sink and retried
//! after a fixed pause. Every wait is raced against the stop token, so
//! cancelling it ends the task promptly.

use std::sync::Arc;
use std::time::SystemTime;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::parse_document;
use crate::config::WatchConfig;
use crate::metrics::{MetricsSink, SnapshotStats, WatchFailure};
use crate::source::{Document, DocumentStore, WatchEvent};
use crate::store::MapStore;
use crate::table::MappingTable;

pub struct Watcher {
    source: Arc<dyn DocumentStore>,
    store: MapStore,
    metrics: Arc<dyn MetricsSink>,
    config: WatchConfig,
    stop: CancellationToken,
}

impl Watcher {
    pub fn new(
        source: Arc<dyn DocumentStore>,
        store: MapStore,
        metrics: Arc<dyn MetricsSink>,
        config: WatchConfig,
        stop: CancellationToken,
    ) -> Self {
        Watcher {
            source,
            store,
            metrics,
            config,
            stop,
        }
    }

    /// Run the loop on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Watch until the stop token is cancelled.
    pub async fn run(self) {
        let name = self.config.document_name.as_str();

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            debug!(event = "Watch", phase = "Connecting", document = name);
            let connected = tokio::select! {
                _ = self.stop.cancelled() => break,
                connected = self.source.watch(name) => connected,
            };

            let mut events = match connected {
                Ok(events) => events,
                Err(e) => {
                    error!(
                        event = "Watch",
                        phase = "Connect",
                        document = name,
                        error = %e,
                        retry_in = ?self.config.retry_interval,
                        "Unable to watch mapping document"
                    );
                    self.metrics.on_watch_failure(&WatchFailure {
                        document_name: name.to_string(),
                        reason: e.to_string(),
                        retry_in: self.config.retry_interval,
                    });
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = sleep(self.config.retry_interval) => continue,
                    }
                }
            };
            info!(event = "Watch", phase = "Connected", document = name);

            loop {
                let next = tokio::select! {
                    _ = self.stop.cancelled() => None,
                    next = events.next() => Some(next),
                };
                match next {
                    None => break,
                    Some(Some(event)) => self.handle(event),
                    Some(None) => {
                        error!(
                            event = "Watch",
                            phase = "Closed",
                            document = name,
                            "Watch stream closed, reconnecting"
                        );
                        break;
                    }
                }
            }
        }

        info!(event = "Watch", phase = "Stopped", document = name);
    }

    fn handle(&self, event: WatchEvent) {
        let name = self.config.document_name.as_str();
        if event.document_name().is_some_and(|n| n != name) {
            debug!(event = "Watch", phase = "Skip", document = event.document_name());
            return;
        }

        match event {
            WatchEvent::Added(document) => {
                info!(event = "Watch", phase = "Added", document = name, version = document.version);
                self.apply(&document);
            }
            WatchEvent::Modified(document) => {
                info!(event = "Watch", phase = "Modified", document = name, version = document.version);
                self.apply(&document);
            }
            WatchEvent::Deleted(_) => {
                info!(event = "Watch", phase = "Deleted", document = name);
                self.replace(MappingTable::default(), 0);
            }
            WatchEvent::Error(message) => {
                warn!(event = "Watch", phase = "Error", document = name, error = message);
            }
        }
    }

    fn apply(&self, document: &Document) {
        let parsed = parse_document(&document.data);
        if let Some(errors) = parsed.error() {
            warn!(
                event = "Watch",
                phase = "Parse",
                document = document.name,
                errors = %errors,
                "Applying the valid part of a partially invalid document"
            );
        }
        let parse_errors = parsed.errors.len();
        self.replace(MappingTable::from_parsed(parsed), parse_errors);
    }

    fn replace(&self, table: MappingTable, parse_errors: usize) {
        match self.store.replace(table) {
            Ok(counts) => self.metrics.on_snapshot_replaced(&SnapshotStats {
                document_name: self.config.document_name.clone(),
                counts,
                parse_errors,
                replaced_at: SystemTime::now(),
            }),
            Err(e) => error!(event = "Watch", phase = "Replace", error = %e),
        }
    }
}

//! Document stores that misbehave on purpose, and polling helpers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SourceError;
use crate::source::{Document, DocumentStore, MemoryDocumentStore, WatchEvent};

/// Poll `check` until it holds, for up to two seconds.
pub(crate) async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Simulates a concurrent writer: the first `conflicts` updates are
/// preceded by a competing write, so they fail the version check.
pub(crate) struct ContendedStore {
    inner: Arc<MemoryDocumentStore>,
    remaining: AtomicU32,
    injected: AtomicU32,
}

impl ContendedStore {
    pub(crate) fn new(inner: Arc<MemoryDocumentStore>, conflicts: u32) -> Self {
        ContendedStore {
            inner,
            remaining: AtomicU32::new(conflicts),
            injected: AtomicU32::new(0),
        }
    }

    pub(crate) fn conflicts_injected(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for ContendedStore {
    async fn get(&self, name: &str) -> Result<Document, SourceError> {
        self.inner.get(name).await
    }

    async fn update(&self, document: Document) -> Result<Document, SourceError> {
        let contended = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if contended {
            self.injected.fetch_add(1, Ordering::SeqCst);
            let current = self.inner.get(&document.name).await?;
            self.inner.create(&current.name, current.data)?;
        }
        self.inner.update(document).await
    }

    async fn watch(&self, name: &str) -> Result<BoxStream<'static, WatchEvent>, SourceError> {
        self.inner.watch(name).await
    }
}

/// Refuses the first `failures` watch attempts.
pub(crate) struct FlakyWatchStore {
    inner: Arc<MemoryDocumentStore>,
    remaining: AtomicU32,
}

impl FlakyWatchStore {
    pub(crate) fn new(inner: Arc<MemoryDocumentStore>, failures: u32) -> Self {
        FlakyWatchStore {
            inner,
            remaining: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyWatchStore {
    async fn get(&self, name: &str) -> Result<Document, SourceError> {
        self.inner.get(name).await
    }

    async fn update(&self, document: Document) -> Result<Document, SourceError> {
        self.inner.update(document).await
    }

    async fn watch(&self, name: &str) -> Result<BoxStream<'static, WatchEvent>, SourceError> {
        let refused = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SourceError::Unavailable("connection refused".into()));
        }
        self.inner.watch(name).await
    }
}

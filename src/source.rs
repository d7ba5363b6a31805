//! The external document store the live backend reads and the update client
//! writes, plus an in-memory implementation.
//!
//! A document is a named string-to-string map with an opaque version. Writes
//! are conditional on the version the writer last read; watches deliver the
//! current document first and then every later change.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::ready;
use futures::stream::{self, BoxStream};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::error::SourceError;

const WATCH_BUFFER: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pub name: String,
    /// Opaque version, changed by every write.
    pub version: String,
    pub data: BTreeMap<String, String>,
}

impl Document {
    pub fn new(name: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        Document {
            name: name.into(),
            version: String::new(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(Document),
    Modified(Document),
    /// The named document was removed.
    Deleted(String),
    /// The source reported a problem without closing the stream.
    Error(String),
}

impl WatchEvent {
    /// Name of the document the event is about, if any.
    pub fn document_name(&self) -> Option<&str> {
        match self {
            WatchEvent::Added(doc) | WatchEvent::Modified(doc) => Some(&doc.name),
            WatchEvent::Deleted(name) => Some(name),
            WatchEvent::Error(_) => None,
        }
    }
}

/// Interface to the store holding mapping documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Document, SourceError>;

    /// Write `document` if the stored version still equals
    /// `document.version`; returns the document as stored, with its new
    /// version.
    async fn update(&self, document: Document) -> Result<Document, SourceError>;

    /// Watch one document. The stream ends when the source disconnects or
    /// can no longer guarantee that no change was missed.
    async fn watch(&self, name: &str) -> Result<BoxStream<'static, WatchEvent>, SourceError>;
}

struct State {
    documents: BTreeMap<String, Document>,
    last_version: u64,
    events: broadcast::Sender<WatchEvent>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }
}

/// A [`DocumentStore`] kept in process memory.
pub struct MemoryDocumentStore {
    state: Mutex<State>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        MemoryDocumentStore {
            state: Mutex::new(State {
                documents: BTreeMap::new(),
                last_version: 0,
                events,
            }),
        }
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, State>, SourceError> {
        self.state
            .lock()
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }

    /// Create or overwrite `name` without a version check.
    pub fn create(
        &self,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> Result<Document, SourceError> {
        let mut state = self.state()?;
        let document = Document {
            name: name.to_string(),
            version: state.next_version(),
            data,
        };
        let event = match state.documents.insert(name.to_string(), document.clone()) {
            Some(_) => WatchEvent::Modified(document.clone()),
            None => WatchEvent::Added(document.clone()),
        };
        // No receivers is not an error.
        let _ = state.events.send(event);
        Ok(document)
    }

    pub fn delete(&self, name: &str) -> Result<(), SourceError> {
        let mut state = self.state()?;
        if state.documents.remove(name).is_none() {
            return Err(SourceError::NotFound {
                name: name.to_string(),
            });
        }
        let _ = state.events.send(WatchEvent::Deleted(name.to_string()));
        Ok(())
    }

    /// End every open watch stream. Later watches are unaffected.
    pub fn disconnect_watchers(&self) -> Result<(), SourceError> {
        let mut state = self.state()?;
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        state.events = events;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, name: &str) -> Result<Document, SourceError> {
        self.state()?
            .documents
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                name: name.to_string(),
            })
    }

    async fn update(&self, document: Document) -> Result<Document, SourceError> {
        let mut state = self.state()?;
        let current = state
            .documents
            .get(&document.name)
            .ok_or_else(|| SourceError::NotFound {
                name: document.name.clone(),
            })?;
        if current.version != document.version {
            return Err(SourceError::Conflict {
                name: document.name.clone(),
                expected: document.version.clone(),
                actual: current.version.clone(),
            });
        }

        let stored = Document {
            version: state.next_version(),
            ..document
        };
        state.documents.insert(stored.name.clone(), stored.clone());
        let _ = state.events.send(WatchEvent::Modified(stored.clone()));
        debug!(event = "Source", phase = "Updated", name = stored.name, version = stored.version);
        Ok(stored)
    }

    async fn watch(&self, name: &str) -> Result<BoxStream<'static, WatchEvent>, SourceError> {
        // Subscribe before reading so no write between the two is lost.
        let (receiver, current) = {
            let state = self.state()?;
            (state.events.subscribe(), state.documents.get(name).cloned())
        };

        let name = name.to_string();
        let changes = stream::unfold(receiver, |mut receiver| async move {
            match receiver.recv().await {
                Ok(event) => Some((event, receiver)),
                // Skipped events may include the watched document; end the
                // stream so the watcher reconnects and replays it.
                Err(RecvError::Lagged(skipped)) => {
                    warn!(event = "Source", phase = "Lagged", skipped = skipped, "Watch fell behind, closing stream");
                    None
                }
                Err(RecvError::Closed) => None,
            }
        })
        .filter(move |event| ready(event.document_name().is_none_or(|n| n == name)));

        Ok(stream::iter(current.map(WatchEvent::Added))
            .chain(changes)
            .boxed())
    }
}

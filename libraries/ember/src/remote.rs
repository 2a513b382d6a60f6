//! The cloud half of the sync engine: one document per user.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Utc};
use futures::{FutureExt as _, future::BoxFuture};

use crate::store::Records;

/// A user's full record set as stored remotely.
///
/// Values are kept as parsed JSON so that the server can query into them
/// (e.g. find the user owning a billing customer id).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RemoteDocument {
    pub user_id: String,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl RemoteDocument {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            data: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Local values that aren't valid JSON are kept as JSON strings.
    pub fn from_records(user_id: impl Into<String>, records: &Records) -> Self {
        let data = records
            .iter()
            .map(|(key, raw)| {
                let value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
                (key.clone(), value)
            })
            .collect();
        Self {
            user_id: user_id.into(),
            data,
            updated_at: Utc::now(),
        }
    }

    pub fn to_records(&self) -> Records {
        self.data
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("remote store is unreachable")]
    Offline,
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Decode(e.to_string())
    }
}

pub trait RemoteStore: Send + Sync {
    fn load<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, RemoteError>>;

    /// Inserts or replaces the document for `document.user_id`.
    fn save<'a>(&'a self, document: &'a RemoteDocument) -> BoxFuture<'a, Result<(), RemoteError>>;

    /// Finds the document whose top-level `field` holds the string `value`.
    fn find_by_field<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, RemoteError>>;
}

/// A remote store that lives in memory, with a switch to simulate losing connectivity.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    documents: Mutex<BTreeMap<String, RemoteDocument>>,
    saves: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// How many successful saves have happened.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn insert(&self, document: RemoteDocument) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(document.user_id.clone(), document);
        }
    }

    pub fn document(&self, user_id: &str) -> Option<RemoteDocument> {
        self.documents.lock().ok()?.get(user_id).cloned()
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RemoteError::Offline)
        } else {
            Ok(())
        }
    }

    fn documents(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, RemoteDocument>>, RemoteError> {
        self.documents
            .lock()
            .map_err(|_| RemoteError::Transport("lock poisoned".to_string()))
    }
}

impl RemoteStore for MemoryRemote {
    fn load<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, RemoteError>> {
        async move {
            self.check_online()?;
            Ok(self.documents()?.get(user_id).cloned())
        }
        .boxed()
    }

    fn save<'a>(&'a self, document: &'a RemoteDocument) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            self.check_online()?;
            self.documents()?
                .insert(document.user_id.clone(), document.clone());
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    fn find_by_field<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, RemoteError>> {
        async move {
            self.check_online()?;
            Ok(self
                .documents()?
                .values()
                .find(|doc| doc.data.get(field).and_then(|v| v.as_str()) == Some(value))
                .cloned())
        }
        .boxed()
    }
}

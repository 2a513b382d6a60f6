//! # Sync Coordinator
//! Owns the relationship between the device's [`LocalStore`] and the user's [`RemoteDocument`].
//!
//! While an identity is attached, a single worker task per identity owns the debounce timer.
//! Every local write pokes the worker; the worker uploads the whole record set once no write
//! has arrived for [`SyncConfig::debounce`]. Detaching closes the worker's channel, which makes
//! it push anything still pending for the identity it was started with, then exit.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    remote::{RemoteDocument, RemoteStore},
    store::{LocalStore, Records, StoreResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// How long the store must be quiet before changes are pushed.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
        }
    }
}

/// Decides how a remote document and the local records are combined.
pub trait Reconcile: Send + Sync {
    /// Records to write locally after loading an existing document.
    fn pull(&self, remote: &RemoteDocument) -> Records;

    /// The document to upload for `local`, or `None` if nothing should be uploaded.
    fn push(&self, user_id: &str, local: &Records) -> Option<RemoteDocument>;
}

/// Whole-document last-writer-wins.
///
/// A pull writes every remote record over its local counterpart. Keys that exist only on the
/// device are left alone, and will be included in the next push.
#[derive(Debug, Default, Clone, Copy)]
pub struct WholeDocument;

impl Reconcile for WholeDocument {
    fn pull(&self, remote: &RemoteDocument) -> Records {
        remote.to_records()
    }

    fn push(&self, user_id: &str, local: &Records) -> Option<RemoteDocument> {
        if local.is_empty() {
            return None;
        }
        Some(RemoteDocument::from_records(user_id, local))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum AttachOutcome {
    /// The remote document was written over the local records.
    Pulled { records: usize },
    /// There was no remote document, so the local records were uploaded as the first one.
    Migrated { records: usize },
    /// Neither side had anything.
    Fresh,
    /// The remote store couldn't be reached. Local writes will still be pushed.
    Degraded(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { records: usize },
    /// There was nothing to upload.
    Skipped,
    Degraded(String),
}

/// Bookkeeping about uploads, for status displays and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub in_flight: bool,
    pub pushes: usize,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncState {
    fn mark_sync_started(&mut self) {
        self.in_flight = true;
    }

    fn mark_sync_finished(&mut self, error: Option<String>) {
        self.in_flight = false;
        self.last_finished = Some(Utc::now());
        if error.is_none() {
            self.pushes += 1;
        }
        self.last_error = error;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Command {
    Touched,
    Flush(oneshot::Sender<PushOutcome>),
}

struct Session {
    identity: Identity,
    commands: mpsc::UnboundedSender<Command>,
    /// `None` while `attach` is still loading; commands queue up until the worker starts.
    worker: Option<JoinHandle<Option<PushOutcome>>>,
}

/// Everything a push needs, captured for one identity.
#[derive(Clone)]
struct Pusher {
    user_id: String,
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    reconcile: Arc<dyn Reconcile>,
    state: Arc<Mutex<SyncState>>,
}

impl Pusher {
    async fn push(&self) -> PushOutcome {
        let records = match self.local.snapshot().await {
            StoreResult::Done(records) => records,
            StoreResult::Absent => Records::new(),
            StoreResult::Degraded(reason) => {
                lock(&self.state).last_error = Some(reason.clone());
                return PushOutcome::Degraded(reason);
            }
        };
        let Some(document) = self.reconcile.push(&self.user_id, &records) else {
            return PushOutcome::Skipped;
        };

        lock(&self.state).mark_sync_started();
        match self.remote.save(&document).await {
            Ok(()) => {
                log::info!("Pushed {} records for {}", records.len(), self.user_id);
                lock(&self.state).mark_sync_finished(None);
                PushOutcome::Pushed {
                    records: records.len(),
                }
            }
            Err(e) => {
                log::warn!("Push for {} failed: {e}", self.user_id);
                lock(&self.state).mark_sync_finished(Some(e.to_string()));
                PushOutcome::Degraded(e.to_string())
            }
        }
    }

    async fn run(
        self,
        debounce: Duration,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> Option<PushOutcome> {
        let mut pending = false;
        loop {
            let command = if pending {
                match tokio::time::timeout(debounce, commands.recv()).await {
                    Ok(command) => command,
                    Err(_quiet) => {
                        pending = false;
                        let _ = self.push().await;
                        continue;
                    }
                }
            } else {
                commands.recv().await
            };

            match command {
                Some(Command::Touched) => pending = true,
                Some(Command::Flush(reply)) => {
                    pending = false;
                    let _ = reply.send(self.push().await);
                }
                // detached
                None => return if pending { Some(self.push().await) } else { None },
            }
        }
    }
}

pub struct SyncCoordinator {
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    reconcile: Arc<dyn Reconcile>,
    config: SyncConfig,
    session: tokio::sync::Mutex<Option<Session>>,
    state: Arc<Mutex<SyncState>>,
}

impl SyncCoordinator {
    pub fn new(local: LocalStore, remote: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self::with_reconcile(local, remote, Arc::new(WholeDocument), config)
    }

    pub fn with_reconcile(
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        reconcile: Arc<dyn Reconcile>,
        config: SyncConfig,
    ) -> Self {
        Self {
            local: Arc::new(local),
            remote,
            reconcile,
            config,
            session: tokio::sync::Mutex::new(None),
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn config(&self) -> SyncConfig {
        self.config
    }

    pub fn sync_state(&self) -> SyncState {
        lock(&self.state).clone()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.session.lock().await.as_ref().map(|s| s.identity.clone())
    }

    pub async fn is_attached(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Signs an identity in. Any previously attached identity is detached first.
    ///
    /// The identity stays attached even if the remote store can't be reached, so that later
    /// writes are still pushed once it comes back. Writes made while the remote document is
    /// loading are queued for the worker, so they are pushed after the quiet period too.
    pub async fn attach(&self, identity: Identity) -> AttachOutcome {
        let _ = self.detach().await;

        let (commands, receiver) = mpsc::unbounded_channel();
        *self.session.lock().await = Some(Session {
            identity: identity.clone(),
            commands: commands.clone(),
            worker: None,
        });

        let pusher = self.pusher(&identity.user_id);
        let outcome = match self.remote.load(&identity.user_id).await {
            Ok(Some(document)) => {
                let records = self.reconcile.pull(&document);
                let written = self.local.write_all(&records).await;
                if written < records.len() {
                    log::warn!(
                        "Only {written} of {} records from the remote document were stored",
                        records.len()
                    );
                }
                AttachOutcome::Pulled { records: written }
            }
            Ok(None) => match pusher.push().await {
                PushOutcome::Pushed { records } => AttachOutcome::Migrated { records },
                PushOutcome::Skipped => AttachOutcome::Fresh,
                PushOutcome::Degraded(reason) => AttachOutcome::Degraded(reason),
            },
            Err(e) => {
                log::warn!("Could not load remote document for {}: {e}", identity.user_id);
                AttachOutcome::Degraded(e.to_string())
            }
        };

        let mut session = self.session.lock().await;
        match session.as_mut() {
            Some(current) if current.commands.same_channel(&commands) => {
                current.worker = Some(tokio::spawn(pusher.run(self.config.debounce, receiver)));
            }
            // detached while loading
            _ => log::info!("{} was detached before attaching finished", identity.user_id),
        }
        outcome
    }

    /// Signs the current identity out, pushing any pending change for it first.
    ///
    /// Returns the outcome of that final push, if there was one.
    pub async fn detach(&self) -> Option<PushOutcome> {
        let session = self.session.lock().await.take()?;
        let Session {
            identity,
            commands,
            worker,
        } = session;
        drop(commands);
        match worker?.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Sync worker for {} stopped abnormally: {e}", identity.user_id);
                None
            }
        }
    }

    /// Pushes immediately instead of waiting for the quiet period.
    /// Returns `None` when nobody is attached.
    pub async fn flush(&self) -> Option<PushOutcome> {
        let (reply, response) = oneshot::channel();
        {
            let session = self.session.lock().await;
            session.as_ref()?.commands.send(Command::Flush(reply)).ok()?;
        }
        response.await.ok()
    }

    pub async fn get(&self, key: &str) -> StoreResult<String> {
        self.local.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let result = self.local.set(key, value).await;
        if result.is_done() {
            self.touch().await;
        }
        result
    }

    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let result = self.local.delete(key).await;
        if result.is_done() {
            self.touch().await;
        }
        result
    }

    async fn touch(&self) {
        if let Some(session) = self.session.lock().await.as_ref() {
            // the worker only goes away once the session is taken
            let _ = session.commands.send(Command::Touched);
        }
    }

    fn pusher(&self, user_id: &str) -> Pusher {
        Pusher {
            user_id: user_id.to_string(),
            local: self.local.clone(),
            remote: self.remote.clone(),
            reconcile: self.reconcile.clone(),
            state: self.state.clone(),
        }
    }
}

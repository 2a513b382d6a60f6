//! This is a library for keeping a device's key-value records in sync with a per-user cloud document.
//! It was created for Daily Shine, so it doesn't include much that was not needed for that project.
//!
//! Syncing strategy:
//! 1. All state lives in a local key-value store first. Reads never touch the network, and writes
//!    never wait for it.
//! 2. Each signed-in user has exactly one remote document holding a copy of every record.
//! 3. When a user signs in:
//!   1. If the server already has a document for them, its records are written over the local ones.
//!   2. If it doesn't, the local records are uploaded as their first document.
//! 4. While signed in, every local write schedules an upload of the whole record set. Writes that
//!    arrive close together are coalesced into one upload once things go quiet.
//!
//! Failures on either side are never surfaced as errors: the local store reports them as degraded
//! results, and failed uploads are simply retried by the next write or the next sign-in.

pub mod coordinator;
pub mod remote;
pub mod store;

#[cfg(feature = "supabase")]
pub mod supabase;

pub use coordinator::{
    AttachOutcome, Identity, PushOutcome, Reconcile, SyncConfig, SyncCoordinator, SyncState,
    WholeDocument,
};
pub use remote::{MemoryRemote, RemoteDocument, RemoteError, RemoteStore};
pub use store::{Backend, FileBackend, LocalStore, MemoryBackend, Records, StorageError, StoreResult};

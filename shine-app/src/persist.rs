use std::{collections::BTreeMap, sync::Arc};

use ember::{
    LocalStore, Reconcile, Records, RemoteDocument, RemoteStore, StoreResult, SyncConfig,
    SyncCoordinator, WholeDocument,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use shine_types::keys;

/// Whole-document sync limited to Daily Shine's own records.
///
/// Anything else in local storage (device-only flags, other apps sharing the origin)
/// stays on the device.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShineDocument;

impl ShineDocument {
    pub fn coordinator(
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
    ) -> SyncCoordinator {
        SyncCoordinator::with_reconcile(local, remote, Arc::new(ShineDocument), config)
    }
}

impl Reconcile for ShineDocument {
    fn pull(&self, remote: &RemoteDocument) -> Records {
        WholeDocument.pull(remote)
    }

    fn push(&self, user_id: &str, local: &Records) -> Option<RemoteDocument> {
        let known: Records = local
            .iter()
            .filter(|(key, _)| keys::is_known(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        WholeDocument.push(user_id, &known)
    }
}

/// Reads a JSON record. A record that doesn't parse is treated as absent.
pub(crate) async fn load_json<T: DeserializeOwned>(sync: &SyncCoordinator, key: &str) -> Option<T> {
    let raw = sync.get(key).await.ok()?;
    serde_json::from_str(&raw)
        .inspect_err(|e| log::warn!("Ignoring unreadable record `{key}`: {e}"))
        .ok()
}

/// Reads a JSON object entry by entry, dropping only the entries that don't parse.
pub(crate) async fn load_json_map<K, V>(sync: &SyncCoordinator, key: &str) -> BTreeMap<K, V>
where
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
{
    let Some(raw) = load_json::<serde_json::Map<String, Value>>(sync, key).await else {
        return BTreeMap::new();
    };
    raw.into_iter()
        .filter_map(|(entry_key, entry)| {
            let parsed = serde_json::from_value(Value::String(entry_key.clone()))
                .and_then(|k| Ok((k, serde_json::from_value(entry)?)));
            parsed
                .inspect_err(|e| log::warn!("Ignoring unreadable entry `{entry_key}` in `{key}`: {e}"))
                .ok()
        })
        .collect()
}

pub(crate) async fn save_json<T: Serialize + ?Sized>(
    sync: &SyncCoordinator,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    match serde_json::to_string(value) {
        Ok(raw) => sync.set(key, &raw).await,
        Err(e) => {
            log::error!("Failed to serialize `{key}`: {e}");
            StoreResult::Degraded(e.to_string())
        }
    }
}

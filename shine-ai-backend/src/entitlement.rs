//! Reads and writes the paid-tier fields inside a user's synced document.

use ember::{RemoteDocument, RemoteError, RemoteStore};
use shine_types::{billing::EntitlementState, keys};

pub fn state_of(document: &RemoteDocument) -> EntitlementState {
    EntitlementState {
        is_premium: document
            .data
            .get(keys::PREMIUM)
            .and_then(|value| value.as_bool())
            .unwrap_or(false),
        stripe_customer_id: document
            .data
            .get(keys::STRIPE_CUSTOMER)
            .and_then(|value| value.as_str())
            .filter(|customer| !customer.is_empty())
            .map(str::to_string),
    }
}

/// Sets the entitlement fields on the user's document, keeping every other record.
/// Creates the document if the user has never synced.
pub async fn write(
    store: &dyn RemoteStore,
    user_id: &str,
    state: &EntitlementState,
) -> Result<(), RemoteError> {
    let mut document = store
        .load(user_id)
        .await?
        .unwrap_or_else(|| RemoteDocument::new(user_id));

    document
        .data
        .insert(keys::PREMIUM.to_string(), state.is_premium.into());
    document.data.insert(
        keys::STRIPE_CUSTOMER.to_string(),
        state.stripe_customer_id.clone().into(),
    );
    document.updated_at = chrono::Utc::now();

    log::info!(
        "user {user_id}: premium = {}, customer = {:?}",
        state.is_premium,
        state.stripe_customer_id
    );
    store.save(&document).await
}

/// The user whose document records `customer_id` as their Stripe customer.
pub async fn owner_of_customer(
    store: &dyn RemoteStore,
    customer_id: &str,
) -> Result<Option<String>, RemoteError> {
    Ok(store
        .find_by_field(keys::STRIPE_CUSTOMER, customer_id)
        .await?
        .map(|document| document.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember::MemoryRemote;

    #[tokio::test]
    async fn test_write_merges_into_existing_document() {
        let store = MemoryRemote::new();
        let mut document = RemoteDocument::new("u1");
        document
            .data
            .insert("shine-moods".to_string(), serde_json::json!({"2025-08-01": 4}));
        store.insert(document);

        let state = EntitlementState {
            is_premium: true,
            stripe_customer_id: Some("cus_1".to_string()),
        };
        write(&store, "u1", &state).await.unwrap();

        let saved = store.document("u1").unwrap();
        assert_eq!(saved.data["shine-moods"], serde_json::json!({"2025-08-01": 4}));
        assert_eq!(saved.data["shine-premium"], serde_json::json!(true));
        assert_eq!(saved.data["shine-stripe-customer"], serde_json::json!("cus_1"));
        assert_eq!(state_of(&saved), state);
        assert_eq!(
            owner_of_customer(&store, "cus_1").await.unwrap().as_deref(),
            Some("u1")
        );
    }

    #[tokio::test]
    async fn test_write_creates_missing_document() {
        let store = MemoryRemote::new();
        write(&store, "u2", &EntitlementState::default()).await.unwrap();

        let saved = store.document("u2").unwrap();
        assert_eq!(saved.data["shine-premium"], serde_json::json!(false));
        assert!(saved.data["shine-stripe-customer"].is_null());
        assert_eq!(owner_of_customer(&store, "cus_9").await.unwrap(), None);
    }
}

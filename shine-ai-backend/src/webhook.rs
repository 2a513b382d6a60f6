//! `POST /stripe/webhook`: keeps the entitlement in each user's document in step
//! with their Stripe subscription.
//!
//! Stripe signs the raw body; the `Stripe-Signature` header carries a timestamp
//! and one or more `v1` HMAC-SHA256 signatures of `"<timestamp>.<body>"`.

use std::collections::HashMap;

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use ember::{RemoteError, RemoteStore};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use shine_types::billing::{EntitlementState, WebhookAck};

use crate::{AppState, entitlement, error::ApiError};

/// How far a signature's timestamp may drift from now, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    Missing,
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("timestamp outside the tolerance window")]
    Expired,
    #[error("no signature matches the payload")]
    Mismatch,
}

/// Checks `header` against `payload` signed with `secret`, as of `now` (unix seconds).
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let matches = signatures.iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });
    if matches {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    customer: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    customer: String,
    status: String,
}

impl Subscription {
    fn grants_access(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }
}

#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("unexpected event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Applies one verified event to the document store.
async fn handle_event(store: &dyn RemoteStore, event: Event) -> Result<(), HandlerError> {
    match event.kind.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession = serde_json::from_value(event.data.object)?;
            let Some(user_id) = session.metadata.get("supabase_user_id") else {
                log::warn!("completed checkout without a user id, ignoring");
                return Ok(());
            };
            let state = EntitlementState {
                is_premium: true,
                stripe_customer_id: session.customer,
            };
            entitlement::write(store, user_id, &state).await?;
        }
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            let subscription: Subscription = serde_json::from_value(event.data.object)?;
            let is_premium =
                event.kind == "customer.subscription.updated" && subscription.grants_access();
            let Some(user_id) = entitlement::owner_of_customer(store, &subscription.customer).await?
            else {
                log::warn!("no user for customer {}, ignoring", subscription.customer);
                return Ok(());
            };
            let state = EntitlementState {
                is_premium,
                stripe_customer_id: Some(subscription.customer),
            };
            entitlement::write(store, &user_id, &state).await?;
        }
        other => log::debug!("ignoring {other} event"),
    }
    Ok(())
}

pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let (Some(_), Some(secret)) = (
        state.config.stripe_secret_key.as_deref(),
        state.config.stripe_webhook_secret.as_deref(),
    ) else {
        return Err(ApiError::internal("Stripe not configured"));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::Missing)
        .and_then(|header| verify_signature(&body, header, secret, chrono::Utc::now().timestamp()));
    if let Err(e) = signature {
        log::warn!("webhook signature verification failed: {e}");
        return Err(ApiError::bad_request("Invalid signature"));
    }

    let event: Event = serde_json::from_slice(&body).map_err(|e| {
        log::error!("signed webhook body is not an event: {e}");
        ApiError::internal("Webhook handler failed")
    })?;

    let Some(store) = state.store.as_deref() else {
        log::error!("received {} but no document store is configured", event.kind);
        return Err(ApiError::internal("Webhook handler failed"));
    };

    let kind = event.kind.clone();
    handle_event(store, event).await.map_err(|e| {
        log::error!("webhook handler error for {kind}: {e}");
        ApiError::internal("Webhook handler failed")
    })?;

    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app, config::Config, test_support};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use ember::{MemoryRemote, RemoteDocument};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt as _;

    const SECRET: &str = "whsec_test";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn config() -> Config {
        Config {
            stripe_secret_key: Some("sk_test".to_string()),
            stripe_webhook_secret: Some(SECRET.to_string()),
            ..Config::default()
        }
    }

    fn signed_event(event: Value) -> Request<Body> {
        let payload = event.to_string();
        Request::post("/stripe/webhook")
            .header("stripe-signature", sign(&payload, chrono::Utc::now().timestamp()))
            .body(Body::from(payload))
            .unwrap()
    }

    fn store_with_customer(user_id: &str, customer: &str, premium: bool) -> Arc<MemoryRemote> {
        let store = Arc::new(MemoryRemote::new());
        let mut document = RemoteDocument::new(user_id);
        document.data.insert("shine-premium".to_string(), json!(premium));
        document
            .data
            .insert("shine-stripe-customer".to_string(), json!(customer));
        document.data.insert("shine-streak".to_string(), json!(3));
        store.insert(document);
        store
    }

    #[test]
    fn test_verify_signature() {
        let payload = r#"{"type":"ping"}"#;
        let header = sign(payload, 1_700_000_000);
        assert_eq!(
            verify_signature(payload.as_bytes(), &header, SECRET, 1_700_000_100),
            Ok(())
        );
        assert_eq!(
            verify_signature(payload.as_bytes(), &header, SECRET, 1_700_000_301),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature(payload.as_bytes(), &header, "whsec_other", 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature(payload.as_bytes(), "v1=abcd", SECRET, 1_700_000_000),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let payload = "{}";
        let valid = sign(payload, 1_700_000_000);
        let header = format!("t=1700000000,v1=00ff,{}", valid.split(',').nth(1).unwrap());
        assert_eq!(
            verify_signature(payload.as_bytes(), &header, SECRET, 1_700_000_000),
            Ok(())
        );
    }

    #[tokio::test]
    async fn test_unconfigured_stripe_is_rejected() {
        let response = app(AppState::with_store(Config::default(), None))
            .oneshot(signed_event(json!({"type": "ping", "data": {"object": {}}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            test_support::json_body(response).await,
            json!({"error": "Stripe not configured"})
        );
    }

    #[tokio::test]
    async fn test_bad_signature_changes_nothing() {
        let store = store_with_customer("u1", "cus_1", true);
        let router = app(AppState::with_store(
            config(),
            Some(store.clone() as Arc<dyn RemoteStore>),
        ));

        let payload = json!({
            "type": "customer.subscription.deleted",
            "data": {"object": {"customer": "cus_1", "status": "canceled"}}
        })
        .to_string();
        let request = Request::post("/stripe/webhook")
            .header("stripe-signature", "t=1,v1=deadbeef")
            .body(Body::from(payload))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            test_support::json_body(response).await,
            json!({"error": "Invalid signature"})
        );
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_checkout_completed_grants_premium() {
        let store = Arc::new(MemoryRemote::new());
        let router = app(AppState::with_store(
            config(),
            Some(store.clone() as Arc<dyn RemoteStore>),
        ));

        let response = router
            .oneshot(signed_event(json!({
                "type": "checkout.session.completed",
                "data": {"object": {
                    "customer": "cus_1",
                    "metadata": {"supabase_user_id": "u1"}
                }}
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            test_support::json_body(response).await,
            json!({"received": true})
        );

        let document = store.document("u1").unwrap();
        assert_eq!(document.data["shine-premium"], json!(true));
        assert_eq!(document.data["shine-stripe-customer"], json!("cus_1"));
    }

    #[tokio::test]
    async fn test_replayed_checkout_is_idempotent() {
        let store = Arc::new(MemoryRemote::new());
        let router = app(AppState::with_store(
            config(),
            Some(store.clone() as Arc<dyn RemoteStore>),
        ));
        let completed = || {
            signed_event(json!({
                "type": "checkout.session.completed",
                "data": {"object": {"customer": "cus_1", "metadata": {"supabase_user_id": "u1"}}}
            }))
        };

        router.clone().oneshot(completed()).await.unwrap();
        let first = entitlement::state_of(&store.document("u1").unwrap());
        router.oneshot(completed()).await.unwrap();
        let second = store.document("u1").unwrap();

        assert_eq!(entitlement::state_of(&second), first);
        assert_eq!(second.data.len(), 2);
    }

    #[tokio::test]
    async fn test_subscription_status_drives_entitlement() {
        let store = store_with_customer("u1", "cus_1", true);
        let router = app(AppState::with_store(
            config(),
            Some(store.clone() as Arc<dyn RemoteStore>),
        ));

        let updated = |status: &str| {
            signed_event(json!({
                "type": "customer.subscription.updated",
                "data": {"object": {"customer": "cus_1", "status": status}}
            }))
        };

        router.clone().oneshot(updated("past_due")).await.unwrap();
        assert_eq!(store.document("u1").unwrap().data["shine-premium"], json!(false));

        router.clone().oneshot(updated("trialing")).await.unwrap();
        assert_eq!(store.document("u1").unwrap().data["shine-premium"], json!(true));

        let response = router
            .oneshot(signed_event(json!({
                "type": "customer.subscription.deleted",
                "data": {"object": {"customer": "cus_1", "status": "canceled"}}
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let document = store.document("u1").unwrap();
        assert_eq!(document.data["shine-premium"], json!(false));
        assert_eq!(document.data["shine-stripe-customer"], json!("cus_1"));
        assert_eq!(document.data["shine-streak"], json!(3));
    }

    #[tokio::test]
    async fn test_unknown_events_and_customers_are_acknowledged() {
        let store = Arc::new(MemoryRemote::new());
        let router = app(AppState::with_store(
            config(),
            Some(store.clone() as Arc<dyn RemoteStore>),
        ));

        let response = router
            .clone()
            .oneshot(signed_event(json!({"type": "invoice.paid", "data": {"object": {}}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(signed_event(json!({
                "type": "customer.subscription.deleted",
                "data": {"object": {"customer": "cus_unknown", "status": "canceled"}}
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store = Arc::new(MemoryRemote::new());
        store.set_offline(true);
        let router = app(AppState::with_store(
            config(),
            Some(store.clone() as Arc<dyn RemoteStore>),
        ));

        let response = router
            .oneshot(signed_event(json!({
                "type": "checkout.session.completed",
                "data": {"object": {"customer": "cus_1", "metadata": {"supabase_user_id": "u1"}}}
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            test_support::json_body(response).await,
            json!({"error": "Webhook handler failed"})
        );
    }

    #[tokio::test]
    async fn test_missing_store_is_reported() {
        let response = app(AppState::with_store(config(), None))
            .oneshot(signed_event(json!({"type": "invoice.paid", "data": {"object": {}}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

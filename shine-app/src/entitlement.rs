//! The device's copy of the user's paid-tier status.
//!
//! The remote document is authoritative: the billing webhook writes it, and a sync pull
//! brings it down. The checkout redirect and `verify` only update the local mirror early.

use ember::{Identity, SyncCoordinator};
use shine_types::{billing::EntitlementState, keys};

use crate::{
    client::{BackendClient, ClientError},
    persist::{load_json, save_json},
};

/// Owns `shine-premium` and `shine-stripe-customer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entitlement {
    state: EntitlementState,
}

impl Entitlement {
    pub async fn load(sync: &SyncCoordinator) -> Self {
        Self {
            state: EntitlementState {
                is_premium: load_json(sync, keys::PREMIUM).await.unwrap_or(false),
                stripe_customer_id: load_json::<Option<String>>(sync, keys::STRIPE_CUSTOMER)
                    .await
                    .flatten(),
            },
        }
    }

    pub fn state(&self) -> &EntitlementState {
        &self.state
    }

    pub fn is_premium(&self) -> bool {
        self.state.is_premium
    }

    pub fn stripe_customer_id(&self) -> Option<&str> {
        self.state.stripe_customer_id.as_deref()
    }

    pub async fn apply(&mut self, sync: &SyncCoordinator, state: EntitlementState) {
        if state == self.state {
            return;
        }
        self.state = state;
        let _ = save_json(sync, keys::PREMIUM, &self.state.is_premium).await;
        let _ = save_json(sync, keys::STRIPE_CUSTOMER, &self.state.stripe_customer_id).await;
    }

    /// Handles the query string the checkout page redirects back with.
    /// Returns `Some(upgraded)` if the query came from checkout.
    pub async fn handle_checkout_redirect(&mut self, sync: &SyncCoordinator, query: &str) -> Option<bool> {
        let upgraded = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .find(|(name, _)| name == "upgraded")
            .map(|(_, value)| value == "true")?;
        if upgraded && !self.state.is_premium {
            self.state.is_premium = true;
            let _ = save_json(sync, keys::PREMIUM, &true).await;
        }
        Some(upgraded)
    }

    /// Asks the backend for the authoritative status and mirrors it.
    pub async fn refresh(
        &mut self,
        sync: &SyncCoordinator,
        client: &BackendClient,
        identity: &Identity,
    ) -> Result<&EntitlementState, ClientError> {
        let verified = client.verify(identity).await?;
        self.apply(sync, verified.into()).await;
        Ok(&self.state)
    }

    /// The billing portal for managing the subscription, if there is one to manage.
    pub async fn portal_url(&self, client: &BackendClient) -> Option<Result<String, ClientError>> {
        let customer = self.stripe_customer_id()?;
        Some(client.portal(customer).await)
    }
}

//! A small Stripe API client covering the two hosted pages the app redirects to.
//!
//! Stripe takes form-encoded bodies with bracketed keys for nested fields
//! (`line_items[0][price]`), so requests are built as flat key/value lists.

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("stripe responded with {status}: {message}")]
    Stripe { status: u16, message: String },
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct HostedSession {
    url: String,
}

/// What goes into a subscription checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutParams<'a> {
    pub price_id: &'a str,
    pub user_id: &'a str,
    pub email: &'a str,
    pub origin: &'a str,
}

impl CheckoutParams<'_> {
    fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("customer_email", self.email.to_string()),
            ("metadata[supabase_user_id]", self.user_id.to_string()),
            ("line_items[0][price]", self.price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", format!("{}?upgraded=true", self.origin)),
            ("cancel_url", format!("{}?upgraded=false", self.origin)),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, api_base: &str, secret_key: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Creates a checkout session and returns the page to send the user to.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams<'_>,
    ) -> Result<String, BillingError> {
        self.create_session("/v1/checkout/sessions", &params.form())
            .await
    }

    /// Creates a billing-portal session for an existing customer.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError> {
        let form = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        self.create_session("/v1/billing_portal/sessions", &form)
            .await
    }

    async fn create_session(
        &self,
        path: &str,
        form: &[(&'static str, String)],
    ) -> Result<String, BillingError> {
        let response = self
            .http
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .map(|body| body.error.message)
                .unwrap_or(body);
            return Err(BillingError::Stripe {
                status: status.as_u16(),
                message,
            });
        }

        let session: HostedSession = response.json().await?;
        Ok(session.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::{
        Form, Json, Router,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_checkout_session_form() {
        let router = Router::new().route(
            "/v1/checkout/sessions",
            post(
                |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                    assert_eq!(headers["authorization"], "Bearer sk_test");
                    assert_eq!(form["mode"], "subscription");
                    assert_eq!(form["payment_method_types[0]"], "card");
                    assert_eq!(form["customer_email"], "a@b.c");
                    assert_eq!(form["metadata[supabase_user_id]"], "u1");
                    assert_eq!(form["line_items[0][price]"], "price_1");
                    assert_eq!(form["line_items[0][quantity]"], "1");
                    assert_eq!(form["success_url"], "https://shine.test?upgraded=true");
                    assert_eq!(form["cancel_url"], "https://shine.test?upgraded=false");
                    Json(serde_json::json!({"id": "cs_1", "url": "https://checkout.stripe.test/cs_1"}))
                },
            ),
        );
        let stripe = StripeClient::new(
            reqwest::Client::new(),
            &test_support::spawn(router).await,
            "sk_test",
        );

        let url = stripe
            .create_checkout_session(&CheckoutParams {
                price_id: "price_1",
                user_id: "u1",
                email: "a@b.c",
                origin: "https://shine.test",
            })
            .await
            .unwrap();
        assert_eq!(url, "https://checkout.stripe.test/cs_1");
    }

    #[tokio::test]
    async fn test_stripe_error_message_is_extracted() {
        let router = Router::new().route(
            "/v1/billing_portal/sessions",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": {"message": "No such customer: 'cus_x'"}})),
                )
            }),
        );
        let stripe = StripeClient::new(
            reqwest::Client::new(),
            &test_support::spawn(router).await,
            "sk_test",
        );

        let error = stripe
            .create_portal_session("cus_x", "https://shine.test")
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            BillingError::Stripe { status: 400, ref message } if message == "No such customer: 'cus_x'"
        ));
    }
}

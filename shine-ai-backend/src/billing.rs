//! `POST /stripe/checkout`, `/stripe/portal` and `/stripe/verify`.

use axum::{Json, extract::State};
use axum_extra::{TypedHeader, headers::Origin};
use shine_types::billing::{
    CheckoutRequest, PortalRequest, SessionUrl, VerifyRequest, VerifyResponse,
};

use crate::{
    AppState,
    entitlement,
    error::ApiError,
    stripe::{CheckoutParams, StripeClient},
};

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// The page Stripe returns to: the caller's origin, or the public app.
fn return_origin(state: &AppState, origin: Option<TypedHeader<Origin>>) -> String {
    origin
        .filter(|TypedHeader(origin)| !origin.is_null())
        .map(|TypedHeader(origin)| match origin.port() {
            Some(port) => format!("{}://{}:{port}", origin.scheme(), origin.hostname()),
            None => format!("{}://{}", origin.scheme(), origin.hostname()),
        })
        .unwrap_or_else(|| state.config.public_origin.clone())
}

fn stripe_client(state: &AppState) -> Result<StripeClient, ApiError> {
    let secret_key = state
        .config
        .stripe_secret_key
        .as_deref()
        .ok_or_else(|| ApiError::internal("Stripe not configured"))?;
    Ok(StripeClient::new(
        state.http.clone(),
        &state.config.stripe_api_base,
        secret_key,
    ))
}

pub async fn checkout(
    State(state): State<AppState>,
    origin: Option<TypedHeader<Origin>>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<SessionUrl>, ApiError> {
    let stripe = stripe_client(&state)?;
    let price_id = state
        .config
        .stripe_price_id
        .as_deref()
        .ok_or_else(|| ApiError::internal("Stripe not configured"))?;

    let (Some(user_id), Some(email)) = (non_empty(&request.user_id), non_empty(&request.email))
    else {
        return Err(ApiError::bad_request("Missing user info"));
    };

    let origin = return_origin(&state, origin);
    let url = stripe
        .create_checkout_session(&CheckoutParams {
            price_id,
            user_id,
            email,
            origin: &origin,
        })
        .await
        .map_err(|e| {
            log::error!("checkout session for {user_id} failed: {e}");
            ApiError::internal(e.to_string())
        })?;

    log::info!("checkout session created for {user_id}");
    Ok(Json(SessionUrl { url }))
}

pub async fn portal(
    State(state): State<AppState>,
    origin: Option<TypedHeader<Origin>>,
    Json(request): Json<PortalRequest>,
) -> Result<Json<SessionUrl>, ApiError> {
    let stripe = stripe_client(&state)?;
    let Some(customer_id) = non_empty(&request.stripe_customer_id) else {
        return Err(ApiError::bad_request("No customer ID"));
    };

    let origin = return_origin(&state, origin);
    let url = stripe
        .create_portal_session(customer_id, &origin)
        .await
        .map_err(|e| {
            log::error!("portal session for {customer_id} failed: {e}");
            ApiError::internal(e.to_string())
        })?;
    Ok(Json(SessionUrl { url }))
}

pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Some(store) = state.store.as_deref() else {
        return Err(ApiError::internal("Server not configured"));
    };
    let Some(user_id) = non_empty(&request.user_id) else {
        return Err(ApiError::bad_request("Missing userId"));
    };

    if non_empty(&request.email).is_some_and(|email| state.config.is_test_email(email)) {
        return Ok(Json(VerifyResponse {
            is_premium: true,
            stripe_customer_id: None,
            test_user: Some(true),
        }));
    }

    let current = match store.load(user_id).await {
        Ok(Some(document)) => entitlement::state_of(&document),
        Ok(None) => Default::default(),
        Err(e) => {
            log::warn!("could not load entitlement for {user_id}: {e}");
            Default::default()
        }
    };
    Ok(Json(VerifyResponse {
        is_premium: current.is_premium,
        stripe_customer_id: current.stripe_customer_id,
        test_user: None,
    }))
}

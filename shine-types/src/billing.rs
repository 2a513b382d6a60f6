use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default, tsify::Tsify)]
#[serde(rename_all = "camelCase")]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CheckoutRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, tsify::Tsify)]
#[serde(rename_all = "camelCase")]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct PortalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, tsify::Tsify)]
#[serde(rename_all = "camelCase")]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct VerifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, tsify::Tsify)]
#[serde(rename_all = "camelCase")]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct VerifyResponse {
    pub is_premium: bool,
    pub stripe_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_user: Option<bool>,
}

/// A hosted checkout or billing-portal page to redirect to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SessionUrl {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
}

/// Paid-tier access for an identity. The copy in the remote document is authoritative.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, tsify::Tsify)]
#[serde(rename_all = "camelCase")]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct EntitlementState {
    pub is_premium: bool,
    pub stripe_customer_id: Option<String>,
}

impl From<VerifyResponse> for EntitlementState {
    fn from(response: VerifyResponse) -> Self {
        Self {
            is_premium: response.is_premium,
            stripe_customer_id: response.stripe_customer_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_response_wire_names() {
        let response = VerifyResponse {
            is_premium: true,
            stripe_customer_id: None,
            test_user: Some(true),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"isPremium": true, "stripeCustomerId": null, "testUser": true})
        );
    }

    #[test]
    fn test_checkout_request_tolerates_missing_fields() {
        let request: CheckoutRequest = serde_json::from_str(r#"{"userId": "u1"}"#).unwrap();
        assert_eq!(request.user_id.as_deref(), Some("u1"));
        assert!(request.email.is_none());
    }
}

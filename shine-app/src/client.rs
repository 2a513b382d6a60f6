use ember::Identity;
use serde::{Serialize, de::DeserializeOwned};
use shine_types::{
    assist::{AiRequest, ProxyReply},
    billing::{CheckoutRequest, ErrorBody, PortalRequest, SessionUrl, VerifyRequest, VerifyResponse},
};

/// Where the backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub base_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let base_url = if cfg!(feature = "local-backend") {
            "http://localhost:8080"
        } else {
            "https://daily-shine-tau.vercel.app/api"
        };
        Self {
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with {status}: {message}")]
    Status { status: u16, message: String },
}

/// Talks to the backend's `/ai` and `/stripe/*` routes.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<Req: Serialize + ?Sized, Res: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Res, ClientError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    pub async fn complete(&self, request: &AiRequest) -> Result<ProxyReply, ClientError> {
        self.post("/ai", request).await
    }

    /// Returns the hosted checkout page to send the user to.
    pub async fn checkout(&self, identity: &Identity) -> Result<String, ClientError> {
        let request = CheckoutRequest {
            user_id: Some(identity.user_id.clone()),
            email: identity.email.clone(),
        };
        let session: SessionUrl = self.post("/stripe/checkout", &request).await?;
        Ok(session.url)
    }

    pub async fn portal(&self, stripe_customer_id: &str) -> Result<String, ClientError> {
        let request = PortalRequest {
            stripe_customer_id: Some(stripe_customer_id.to_string()),
        };
        let session: SessionUrl = self.post("/stripe/portal", &request).await?;
        Ok(session.url)
    }

    pub async fn verify(&self, identity: &Identity) -> Result<VerifyResponse, ClientError> {
        let request = VerifyRequest {
            user_id: Some(identity.user_id.clone()),
            email: identity.email.clone(),
        };
        self.post("/stripe/verify", &request).await
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use axum::Router;

    /// Serves `router` on an ephemeral port and returns its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let router = Router::new().route(
            "/stripe/portal",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "No customer ID"})),
                )
            }),
        );
        let client = BackendClient::new(ProxyConfig {
            base_url: test_server::spawn(router).await,
        });

        let error = client.portal("cus_1").await.unwrap_err();
        assert!(matches!(
            error,
            ClientError::Status { status: 400, ref message } if message == "No customer ID"
        ));
    }

    #[tokio::test]
    async fn test_checkout_sends_identity() {
        let router = Router::new().route(
            "/stripe/checkout",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body, serde_json::json!({"userId": "u1", "email": "a@b.c"}));
                Json(serde_json::json!({"url": "https://checkout.example/s1"}))
            }),
        );
        let client = BackendClient::new(ProxyConfig {
            base_url: format!("{}/", test_server::spawn(router).await),
        });
        let identity = Identity::new("u1", Some("a@b.c".to_string()));
        assert_eq!(
            client.checkout(&identity).await.unwrap(),
            "https://checkout.example/s1"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let client = BackendClient::new(ProxyConfig {
            base_url: "http://127.0.0.1:9".to_string(),
        });
        let request = AiRequest {
            model: None,
            max_tokens: None,
            system: String::new(),
            messages: vec![],
        };
        assert!(matches!(
            client.complete(&request).await,
            Err(ClientError::Transport(_))
        ));
    }
}

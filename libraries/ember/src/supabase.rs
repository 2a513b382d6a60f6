//! Utilities for syncing against a Supabase database.
//!
//! Documents live in the `user_data` table, one row per user:
//! `user_id` (unique), `data` (jsonb) and `updated_at`.

use futures::{FutureExt as _, future::BoxFuture};
use postgrest::Postgrest;

use crate::remote::{RemoteDocument, RemoteError, RemoteStore};

const TABLE: &str = "user_data";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SupabaseConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

pub struct SupabaseStore {
    client: Postgrest,
}

impl SupabaseStore {
    /// A store acting as a signed-in user. Row-level security limits it to that user's row.
    pub fn for_user(config: &SupabaseConfig, access_token: &str) -> Self {
        Self::with_credentials(&config.supabase_url, &config.supabase_anon_key, access_token)
    }

    /// A store that bypasses row-level security. Only for server-side use.
    pub fn service_role(supabase_url: &str, service_role_key: &str) -> Self {
        Self::with_credentials(supabase_url, service_role_key, service_role_key)
    }

    fn with_credentials(supabase_url: &str, api_key: &str, bearer: &str) -> Self {
        let client = Postgrest::new(format!("{}/rest/v1", supabase_url.trim_end_matches('/')))
            .insert_header("apikey", api_key)
            .insert_header("Authorization", format!("Bearer {bearer}"));
        Self { client }
    }

    async fn first_row(
        &self,
        column: String,
        value: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError> {
        let response = self
            .client
            .from(TABLE)
            .select("user_id,data,updated_at")
            .eq(column, value)
            .limit(1)
            .execute()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<RemoteDocument> = serde_json::from_str(&body)?;
        Ok(rows.into_iter().next())
    }
}

impl RemoteStore for SupabaseStore {
    fn load<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, RemoteError>> {
        self.first_row("user_id".to_string(), user_id).boxed()
    }

    fn save<'a>(&'a self, document: &'a RemoteDocument) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            let body = serde_json::to_string(document)?;
            let response = self
                .client
                .from(TABLE)
                .upsert(body)
                .on_conflict("user_id")
                .execute()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                log::error!("Failed to save document for {}: {status} - {body}", document.user_id);
                return Err(RemoteError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(())
        }
        .boxed()
    }

    fn find_by_field<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, RemoteError>> {
        self.first_row(format!("data->>{field}"), value).boxed()
    }
}

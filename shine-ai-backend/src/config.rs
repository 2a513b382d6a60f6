/// Settings read once from the environment at startup.
///
/// Every credential is optional: a route whose collaborator isn't configured answers
/// with an explicit error (or, for `/ai`, the fallback signal) instead of refusing to boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_price_id: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub supabase_url: Option<String>,
    pub supabase_service_role_key: Option<String>,
    /// Lowercased emails that are always entitled.
    pub pro_test_emails: Vec<String>,
    pub public_origin: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match var("PORT").map(|port| port.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(e)) => {
                log::warn!("ignoring invalid PORT: {e}");
                8080
            }
            None => 8080,
        };

        Self {
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            anthropic_base_url: var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_price_id: var("STRIPE_PRICE_ID"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: var("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            supabase_url: var("SUPABASE_URL"),
            supabase_service_role_key: var("SUPABASE_SERVICE_ROLE_KEY"),
            pro_test_emails: var("PRO_TEST_EMAILS")
                .map(|emails| {
                    emails
                        .split(',')
                        .map(|email| email.trim().to_lowercase())
                        .filter(|email| !email.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            public_origin: var("PUBLIC_ORIGIN")
                .unwrap_or_else(|| "https://daily-shine-tau.vercel.app".to_string()),
            port,
        }
    }

    pub fn is_test_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.pro_test_emails.contains(&email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.anthropic_base_url, "https://api.anthropic.com");
        assert_eq!(config.stripe_api_base, "https://api.stripe.com");
        assert_eq!(config.public_origin, "https://daily-shine-tau.vercel.app");
        assert!(config.anthropic_api_key.is_none());
        assert!(config.pro_test_emails.is_empty());
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = Config::from_lookup(lookup(&[
            ("STRIPE_SECRET_KEY", "  "),
            ("PORT", "not-a-port"),
            ("ANTHROPIC_API_KEY", "sk-test"),
        ]));
        assert!(config.stripe_secret_key.is_none());
        assert_eq!(config.port, 8080);
        assert_eq!(config.anthropic_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_test_emails_are_case_insensitive() {
        let config = Config::from_lookup(lookup(&[(
            "PRO_TEST_EMAILS",
            " Tester@Example.com,,friend@example.com ",
        )]));
        assert_eq!(
            config.pro_test_emails,
            vec!["tester@example.com", "friend@example.com"]
        );
        assert!(config.is_test_email("TESTER@example.com"));
        assert!(!config.is_test_email("someone@example.com"));
    }
}

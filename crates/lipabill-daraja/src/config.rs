//! Daraja client configuration, sourced from the environment.

use crate::DarajaError;

/// Which Daraja deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DarajaEnvironment {
    /// Safaricom developer sandbox.
    Sandbox,
    /// Live production API.
    Production,
}

impl DarajaEnvironment {
    /// API host for this environment.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke",
            Self::Production => "https://api.safaricom.co.ke",
        }
    }
}

/// Credentials and merchant parameters for the Daraja client.
#[derive(Clone)]
pub struct DarajaConfig {
    /// Consumer key issued by the Daraja developer portal.
    pub consumer_key: String,
    /// Consumer secret paired with the key.
    pub consumer_secret: String,
    /// Business shortcode receiving the payments (PartyB).
    pub shortcode: String,
    /// Lipa-na-M-Pesa online passkey, used to derive the request password.
    pub passkey: String,
    /// Publicly reachable URL Daraja delivers the result callback to.
    pub callback_url: String,
    pub environment: DarajaEnvironment,
    /// Per-request timeout. A hung upstream must not pin a request handler.
    pub timeout_secs: u64,
}

impl DarajaConfig {
    /// Load configuration from `MPESA_*` environment variables.
    ///
    /// `MPESA_CONSUMER_KEY`, `MPESA_CONSUMER_SECRET`, `MPESA_SHORTCODE`,
    /// `MPESA_PASSKEY`, and `MPESA_CALLBACK_URL` are required.
    /// `MPESA_ENVIRONMENT` defaults to `sandbox`; `MPESA_TIMEOUT_SECS`
    /// defaults to 30.
    pub fn from_env() -> Result<Self, DarajaError> {
        fn required(name: &'static str) -> Result<String, DarajaError> {
            std::env::var(name).map_err(|_| DarajaError::NotConfigured {
                reason: format!("{name} is not set"),
            })
        }

        let environment = match std::env::var("MPESA_ENVIRONMENT").as_deref() {
            Ok("production") => DarajaEnvironment::Production,
            _ => DarajaEnvironment::Sandbox,
        };
        let timeout_secs = std::env::var("MPESA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            consumer_key: required("MPESA_CONSUMER_KEY")?,
            consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            shortcode: required("MPESA_SHORTCODE")?,
            passkey: required("MPESA_PASSKEY")?,
            callback_url: required("MPESA_CALLBACK_URL")?,
            environment,
            timeout_secs,
        })
    }

    /// API host for the configured environment.
    pub fn base_url(&self) -> &'static str {
        self.environment.base_url()
    }
}

/// Redacts credentials so config can be logged safely.
impl std::fmt::Debug for DarajaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaConfig")
            .field("consumer_key", &"[REDACTED]")
            .field("consumer_secret", &"[REDACTED]")
            .field("shortcode", &self.shortcode)
            .field("passkey", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("environment", &self.environment)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DarajaConfig {
        DarajaConfig {
            consumer_key: "ck-123".into(),
            consumer_secret: "cs-456".into(),
            shortcode: "174379".into(),
            passkey: "pk-789".into(),
            callback_url: "https://example.com/callback".into(),
            environment: DarajaEnvironment::Sandbox,
            timeout_secs: 30,
        }
    }

    #[test]
    fn environment_selects_host() {
        assert_eq!(
            DarajaEnvironment::Sandbox.base_url(),
            "https://sandbox.safaricom.co.ke"
        );
        assert_eq!(
            DarajaEnvironment::Production.base_url(),
            "https://api.safaricom.co.ke"
        );
    }

    #[test]
    fn debug_redacts_credentials() {
        let rendered = format!("{:?}", test_config());
        assert!(!rendered.contains("ck-123"));
        assert!(!rendered.contains("cs-456"));
        assert!(!rendered.contains("pk-789"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("174379"));
    }
}

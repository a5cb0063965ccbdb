use thiserror::Error;

/// Failure while querying the marketplace for one item.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network trouble, 5xx, 429 or an unreadable body. Retried next cycle.
    #[error("transient failure fetching {subject}: {reason}")]
    Transient { subject: String, reason: String },

    /// Client error the marketplace will keep returning (e.g. unknown slug).
    #[error("fatal failure fetching {subject}: {reason}")]
    Fatal { subject: String, reason: String },
}

impl FetchError {
    pub fn transient(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn fatal(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fatal {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Failure of a single notification sink. Logged by the dispatcher, never propagated.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("webhook responded with status {0}")]
    WebhookStatus(u16),

    #[error("webhook request failed: {0}")]
    WebhookTransport(#[from] reqwest::Error),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("console write failed: {0}")]
    Console(#[from] std::io::Error),

    #[error("sound command failed: {0}")]
    Sound(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        let transient = FetchError::transient("fang_prime_blade", "HTTP 503");
        let fatal = FetchError::fatal("bad_slug", "HTTP 404");

        assert!(!transient.is_fatal());
        assert!(fatal.is_fatal());
        assert_eq!(
            fatal.to_string(),
            "fatal failure fetching bad_slug: HTTP 404"
        );
    }
}

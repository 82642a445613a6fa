//! Secret handling utilities.
//!
//! Re-exports secrecy types and provides helpers for working with
//! secrets in the dealer-sync context.

pub use secrecy::{ExposeSecret, SecretString};

/// Database URL with the password replaced, safe to log.
pub fn redacted_url(url: &SecretString) -> String {
    let raw = url.expose_secret();
    let Some((scheme, rest)) = raw.split_once("://") else {
        return "<redacted>".to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_hidden() {
        let url = SecretString::from("postgres://sync:hunter2@db:5432/sync");
        assert_eq!(redacted_url(&url), "postgres://sync:***@db:5432/sync");
    }

    #[test]
    fn url_without_credentials_is_unchanged() {
        let url = SecretString::from("postgres://localhost/sync");
        assert_eq!(redacted_url(&url), "postgres://localhost/sync");
    }
}

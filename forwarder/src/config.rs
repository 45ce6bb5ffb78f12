//! Configuration module for environment variable parsing.
//!
//! All required settings have no fallback: a missing or empty variable aborts
//! startup with [`ConfigError::Missing`] before the consumer starts.

use std::env;
use std::time::Duration;

use mailparse::addrparse;

use crate::error::ConfigError;
use crate::process::MailboxSet;

/// Default per-command timeout for the LMTP session.
pub const DEFAULT_LMTP_TIMEOUT_SECS: u64 = 30;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQS queue URL carrying SNS-wrapped SES receipt notifications
    pub sqs_queue_url: String,

    /// LMTP endpoint as `host:port`
    pub lmtp_host: String,

    /// Envelope sender used for every LMTP transaction
    pub lmtp_from: String,

    /// Known local mailboxes plus the catch-all default
    pub mailboxes: MailboxSet,

    // =========================================================================
    // Optional settings
    // =========================================================================

    /// Drop permanently malformed notifications once the queue has delivered
    /// them this many times. `None` leaves them for redelivery forever.
    pub max_receive_count: Option<u32>,

    /// Connect and per-command timeout for the LMTP session
    pub lmtp_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sqs_queue_url = required(&lookup, "SQS_QUEUE_URL")?;
        let lmtp_host = required(&lookup, "LMTP_HOST")?;
        let lmtp_from = required(&lookup, "LMTP_FROM")?;
        validate_address("LMTP_FROM", &lmtp_from)?;

        let known = parse_csv(&required(&lookup, "MAILBOXES")?);
        if known.is_empty() {
            return Err(ConfigError::Missing("MAILBOXES"));
        }
        for mailbox in &known {
            validate_address("MAILBOXES", mailbox)?;
        }

        let default_mailbox = required(&lookup, "DEFAULT_MAILBOX")?;
        validate_address("DEFAULT_MAILBOX", &default_mailbox)?;

        let max_receive_count = match optional(&lookup, "MAX_RECEIVE_COUNT") {
            None => None,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "MAX_RECEIVE_COUNT",
                        value: raw,
                        reason: "expected a positive integer".to_string(),
                    })
                }
            },
        };

        let lmtp_timeout_secs = match optional(&lookup, "LMTP_TIMEOUT_SECS") {
            None => DEFAULT_LMTP_TIMEOUT_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "LMTP_TIMEOUT_SECS",
                        value: raw,
                        reason: "expected a positive number of seconds".to_string(),
                    })
                }
            },
        };

        Ok(Config {
            sqs_queue_url,
            lmtp_host,
            lmtp_from,
            mailboxes: MailboxSet::new(known, default_mailbox),
            max_receive_count,
            lmtp_timeout: Duration::from_secs(lmtp_timeout_secs),
        })
    }
}

/// Read a required variable; unset and blank are both treated as missing.
fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or(ConfigError::Missing(name))
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a comma-separated list of strings.
fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reject values that are not a single bare `local@domain` address.
fn validate_address(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason,
    };

    let parsed = addrparse(value).map_err(|e| invalid(e.to_string()))?;
    match parsed.extract_single_info() {
        Some(info) if info.addr == value && value.contains('@') => Ok(()),
        _ => Err(invalid("expected a single mail address".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SQS_QUEUE_URL", "https://sqs.eu-west-1.amazonaws.com/123/inbound"),
            ("LMTP_HOST", "127.0.0.1:24"),
            ("LMTP_FROM", "forwarder@x.com"),
            ("MAILBOXES", "a@x.com, b@x.com,,"),
            ("DEFAULT_MAILBOX", "catchall@x.com"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_from_lookup_complete() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.lmtp_host, "127.0.0.1:24");
        assert_eq!(config.lmtp_from, "forwarder@x.com");
        assert_eq!(config.mailboxes.known(), ["a@x.com", "b@x.com"]);
        assert_eq!(config.mailboxes.default_mailbox(), "catchall@x.com");
        assert_eq!(config.max_receive_count, None);
        assert_eq!(config.lmtp_timeout, Duration::from_secs(DEFAULT_LMTP_TIMEOUT_SECS));
    }

    #[test]
    fn test_each_required_variable_is_enforced() {
        for name in [
            "SQS_QUEUE_URL",
            "LMTP_HOST",
            "LMTP_FROM",
            "MAILBOXES",
            "DEFAULT_MAILBOX",
        ] {
            let mut vars = base_vars();
            vars.remove(name);
            match load(&vars) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, name),
                other => panic!("expected Missing({name}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_value_is_missing() {
        let mut vars = base_vars();
        vars.insert("LMTP_HOST", "   ");
        assert!(matches!(load(&vars), Err(ConfigError::Missing("LMTP_HOST"))));

        vars = base_vars();
        vars.insert("MAILBOXES", " , ,");
        assert!(matches!(load(&vars), Err(ConfigError::Missing("MAILBOXES"))));
    }

    #[test]
    fn test_optional_settings() {
        let mut vars = base_vars();
        vars.insert("MAX_RECEIVE_COUNT", "5");
        vars.insert("LMTP_TIMEOUT_SECS", "10");
        let config = load(&vars).unwrap();

        assert_eq!(config.max_receive_count, Some(5));
        assert_eq!(config.lmtp_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_optional_settings() {
        let mut vars = base_vars();
        vars.insert("MAX_RECEIVE_COUNT", "0");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "MAX_RECEIVE_COUNT", .. })
        ));

        vars = base_vars();
        vars.insert("LMTP_TIMEOUT_SECS", "soon");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "LMTP_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn test_invalid_mailbox_address() {
        let mut vars = base_vars();
        vars.insert("MAILBOXES", "a@x.com,not-an-address");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "MAILBOXES", .. })
        ));
    }

    #[test]
    fn test_parse_csv() {
        assert_eq!(parse_csv("foo, bar, baz"), vec!["foo", "bar", "baz"]);
        assert!(parse_csv(" , ").is_empty());
    }
}

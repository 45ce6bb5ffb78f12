//! Recipient resolution against the configured local mailboxes.

use std::ops::Deref;

/// Known local mailboxes plus the catch-all used when none match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxSet {
    known: Vec<String>,
    default_mailbox: String,
}

impl MailboxSet {
    pub fn new(known: Vec<String>, default_mailbox: impl Into<String>) -> Self {
        Self {
            known,
            default_mailbox: default_mailbox.into(),
        }
    }

    pub fn known(&self) -> &[String] {
        &self.known
    }

    pub fn default_mailbox(&self) -> &str {
        &self.default_mailbox
    }

    pub fn contains(&self, address: &str) -> bool {
        self.known.iter().any(|m| m == address)
    }

    /// Keep the receipt recipients that are known mailboxes, in receipt
    /// order. Unknown addresses are dropped silently; if nothing is left the
    /// message goes to the default mailbox alone.
    pub fn resolve(&self, recipients: &[String]) -> ResolvedRecipients {
        let matched: Vec<String> = recipients
            .iter()
            .filter(|r| self.contains(r))
            .cloned()
            .collect();

        if matched.is_empty() {
            ResolvedRecipients::fallback(self.default_mailbox.clone())
        } else {
            ResolvedRecipients {
                addresses: matched,
                fallback: false,
            }
        }
    }
}

/// Non-empty, ordered delivery addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecipients {
    addresses: Vec<String>,
    fallback: bool,
}

impl ResolvedRecipients {
    fn fallback(default_mailbox: String) -> Self {
        Self {
            addresses: vec![default_mailbox],
            fallback: true,
        }
    }

    /// True when no receipt recipient matched and the default was used.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

impl Deref for ResolvedRecipients {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.addresses
    }
}

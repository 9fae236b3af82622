use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used to derive canonical ids for accounts issued by the legacy identity scheme.
const LEGACY_ACCOUNT_NAMESPACE: Uuid = Uuid::from_u128(0x5d1f_2c0a_8e4b_4f7d_9a61_0c3b_7e21_d845);

/// An account identifier as supplied by the identity provider.
///
/// Accounts migrated from the legacy provider still carry opaque string ids; current accounts
/// carry UUIDs. Everything past the HTTP boundary works with [`AccountRef::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "id", rename_all = "snake_case")]
pub enum AccountRef {
    Current(Uuid),
    Legacy(String),
}

impl AccountRef {
    /// Classifies a raw token subject.
    pub fn from_subject(subject: &str) -> Option<Self> {
        let subject = subject.trim();
        if subject.is_empty() {
            return None;
        }
        match Uuid::parse_str(subject) {
            Ok(id) => Some(AccountRef::Current(id)),
            Err(_) => Some(AccountRef::Legacy(subject.to_string())),
        }
    }

    /// Canonical account id, stable across both identity schemes.
    pub fn resolve(&self) -> Uuid {
        match self {
            AccountRef::Current(id) => *id,
            AccountRef::Legacy(raw) => Uuid::new_v5(&LEGACY_ACCOUNT_NAMESPACE, raw.as_bytes()),
        }
    }
}

impl Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRef::Current(id) => write!(f, "current:{id}"),
            AccountRef::Legacy(raw) => write!(f, "legacy:{raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_subjects_resolve_to_themselves() {
        let id = Uuid::new_v4();
        let account = AccountRef::from_subject(&id.to_string()).unwrap();
        assert_eq!(account, AccountRef::Current(id));
        assert_eq!(account.resolve(), id);
    }

    #[test]
    fn legacy_subjects_resolve_deterministically() {
        let first = AccountRef::from_subject("user_2aXk91").unwrap();
        let second = AccountRef::from_subject("user_2aXk91").unwrap();
        let other = AccountRef::from_subject("user_77b").unwrap();

        assert!(matches!(first, AccountRef::Legacy(_)));
        assert_eq!(first.resolve(), second.resolve());
        assert_ne!(first.resolve(), other.resolve());
    }

    #[test]
    fn blank_subject_is_rejected() {
        assert!(AccountRef::from_subject("   ").is_none());
    }
}

//! Logical directory entries.
//!
//! These are the owned, structured forms of what the directory hands out. The
//! packer turns them into caller-buffer entries; the packed entries convert
//! back into these types with `to_account`, `to_status` and
//! `to_group_record`.

use serde::{Deserialize, Serialize};

use crate::config::{AccountConfig, ShadowConfig};
use crate::policy::IdentityRecord;

/// Value of shadow aging fields that are not set.
pub const UNSET_DAYS: i64 = -1;

/// Value of the shadow flag field when it is not set.
pub const UNSET_FLAG: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// An account entry in passwd shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub password: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub home: String,
    pub shell: String,
}

impl Account {
    /// The account of `record` that answers to `login`.
    pub fn from_record(record: &IdentityRecord, login: &str, config: &AccountConfig) -> Self {
        Self {
            name: login.to_string(),
            password: config.password_placeholder.clone(),
            uid: record.local_id,
            gid: record.local_id,
            gecos: record.comment.clone(),
            home: config.home_for(login),
            shell: config.shell.clone(),
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}",
            self.name, self.password, self.uid, self.gid, self.gecos, self.home, self.shell
        )
    }
}

// ---------------------------------------------------------------------------
// Credential status
// ---------------------------------------------------------------------------

/// A credential-status entry in shadow shape. Aging fields are always unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub name: String,
    pub password: String,
    pub last_change: i64,
    pub min_days: i64,
    pub max_days: i64,
    pub warn_days: i64,
    pub inactive_days: i64,
    pub expire_date: i64,
    pub flag: u64,
}

impl CredentialStatus {
    pub fn from_login(login: &str, config: &ShadowConfig) -> Self {
        Self {
            name: login.to_string(),
            password: config.password_placeholder.clone(),
            last_change: UNSET_DAYS,
            min_days: UNSET_DAYS,
            max_days: UNSET_DAYS,
            warn_days: UNSET_DAYS,
            inactive_days: UNSET_DAYS,
            expire_date: UNSET_DAYS,
            flag: UNSET_FLAG,
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let days = |d: i64| {
            if d == UNSET_DAYS {
                String::new()
            } else {
                d.to_string()
            }
        };
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}:",
            self.name,
            self.password,
            days(self.last_change),
            days(self.min_days),
            days(self.max_days),
            days(self.warn_days),
            days(self.inactive_days),
            days(self.expire_date),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> IdentityRecord {
        IdentityRecord::parse_line("peter:user_41000:41000:51000:Y:peter@example.com").unwrap()
    }

    #[test]
    fn test_account_from_record() {
        let account = Account::from_record(&record(), "peter", &AccountConfig::default());
        assert_eq!(account.uid, 51000);
        assert_eq!(account.gid, 51000);
        assert_eq!(account.home, "/home/peter");
        assert_eq!(
            account.to_string(),
            "peter:x:51000:51000:peter@example.com:/home/peter:/bin/bash"
        );
    }

    #[test]
    fn test_credential_status_line() {
        let status = CredentialStatus::from_login("user_41000", &ShadowConfig::default());
        assert_eq!(status.to_string(), "user_41000:*:::::::");
        assert_eq!(status.flag, UNSET_FLAG);
    }
}

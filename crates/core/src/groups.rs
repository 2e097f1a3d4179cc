//! Derived group views.
//!
//! The policy file has no group lines. Groups are derived from the accounts
//! in one forward pass:
//!
//! | Kind | Name | Gid | Members |
//! |------|------|-----|---------|
//! | per-login | each login name | owning record's `local_id` | none |
//! | all users | `groups.all_users_name` | `groups.all_users_gid` | every login name |
//! | superusers | `groups.superusers_name` | `groups.superusers_gid` | login names of superusers |
//!
//! A record with a distinct preferred name yields two per-login groups that
//! share one gid.

use std::io::{BufRead, Seek};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GroupConfig;
use crate::errors::SourceError;
use crate::policy::PolicyReader;

/// A group entry. Members keep source order and are never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub gid: u32,
    pub members: Vec<String>,
}

impl GroupRecord {
    fn empty(name: &str, gid: u32) -> Self {
        Self {
            name: name.to_string(),
            gid,
            members: Vec::new(),
        }
    }
}

impl std::fmt::Display for GroupRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.gid, self.members.join(","))
    }
}

/// Every group derived from one pass over the policy file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUniverse {
    per_login: Vec<GroupRecord>,
    all_users: GroupRecord,
    superusers: GroupRecord,
}

impl GroupUniverse {
    /// Read the remaining records of `reader` and derive all groups.
    pub fn materialize<R: BufRead + Seek>(
        reader: &mut PolicyReader<R>,
        config: &GroupConfig,
    ) -> Result<Self, SourceError> {
        let mut universe = Self {
            per_login: Vec::new(),
            all_users: GroupRecord::empty(&config.all_users_name, config.all_users_gid),
            superusers: GroupRecord::empty(&config.superusers_name, config.superusers_gid),
        };

        while let Some(record) = reader.read_next()? {
            for login in record.login_names().iter() {
                universe
                    .per_login
                    .push(GroupRecord::empty(login, record.local_id));
                universe.all_users.members.push(login.to_string());
                if record.superuser {
                    universe.superusers.members.push(login.to_string());
                }
            }
        }

        debug!(
            per_login = universe.per_login.len(),
            users = universe.all_users.members.len(),
            superusers = universe.superusers.members.len(),
            "materialized group universe"
        );
        Ok(universe)
    }

    /// Total number of groups, aggregates included.
    pub fn len(&self) -> usize {
        self.per_login.len() + 2
    }

    /// Never true; the aggregate groups always exist.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Group at `index` in enumeration order: per-login groups, then all
    /// users, then superusers.
    pub fn get(&self, index: usize) -> Option<&GroupRecord> {
        let logins = self.per_login.len();
        match index {
            i if i < logins => self.per_login.get(i),
            i if i == logins => Some(&self.all_users),
            i if i == logins + 1 => Some(&self.superusers),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupRecord> {
        self.per_login
            .iter()
            .chain([&self.all_users, &self.superusers])
    }

    pub fn all_users(&self) -> &GroupRecord {
        &self.all_users
    }

    pub fn superusers(&self) -> &GroupRecord {
        &self.superusers
    }

    pub fn per_login(&self) -> &[GroupRecord] {
        &self.per_login
    }

    /// Aggregate groups are checked before per-login groups, so their
    /// configured names cannot be shadowed by a login name.
    pub fn find_by_name(&self, name: &str) -> Option<&GroupRecord> {
        self.lookup_order().find(|group| group.name == name)
    }

    /// First group with `gid`. When two per-login groups share a gid, the one
    /// derived first (the preferred name) wins.
    pub fn find_by_gid(&self, gid: u32) -> Option<&GroupRecord> {
        self.lookup_order().find(|group| group.gid == gid)
    }

    fn lookup_order(&self) -> impl Iterator<Item = &GroupRecord> {
        [&self.all_users, &self.superusers]
            .into_iter()
            .chain(self.per_login.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{MemorySource, PolicySource};

    fn universe(text: &str) -> GroupUniverse {
        let mut reader = MemorySource::new(text).open().unwrap();
        GroupUniverse::materialize(&mut reader, &GroupConfig::default()).unwrap()
    }

    const POLICY: &str = "\
peter:user_1:600:10600:Y:peter@example.com
:user_2:700:10700:N:two@example.com
user_3:user_3:800:10800:1:three@example.com
bad line
";

    #[test]
    fn test_per_login_groups() {
        let u = universe(POLICY);
        let names: Vec<_> = u.per_login().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["peter", "user_1", "user_2", "user_3"]);
        assert_eq!(u.per_login()[0].gid, 10600);
        assert_eq!(u.per_login()[1].gid, 10600);
        assert!(u.per_login().iter().all(|g| g.members.is_empty()));
    }

    #[test]
    fn test_aggregate_groups() {
        let u = universe(POLICY);
        assert_eq!(u.all_users().name, "loginpolicy");
        assert_eq!(u.all_users().gid, 10000);
        assert_eq!(
            u.all_users().members,
            vec!["peter", "user_1", "user_2", "user_3"]
        );
        assert_eq!(u.superusers().name, "loginpolicy_sudo");
        assert_eq!(u.superusers().members, vec!["peter", "user_1", "user_3"]);
    }

    #[test]
    fn test_enumeration_order() {
        let u = universe(POLICY);
        assert_eq!(u.len(), 6);
        assert_eq!(u.get(3).unwrap().name, "user_3");
        assert_eq!(u.get(4).unwrap().name, "loginpolicy");
        assert_eq!(u.get(5).unwrap().name, "loginpolicy_sudo");
        assert!(u.get(6).is_none());
        assert_eq!(u.iter().count(), 6);
    }

    #[test]
    fn test_empty_policy() {
        let u = universe("\n# nothing here\n");
        assert!(u.per_login().is_empty());
        assert_eq!(u.len(), 2);
        assert!(u.all_users().members.is_empty());
        assert!(u.superusers().members.is_empty());
        assert_eq!(u.get(0).unwrap().name, "loginpolicy");
    }

    #[test]
    fn test_find() {
        let u = universe(POLICY);
        assert_eq!(u.find_by_name("user_2").unwrap().gid, 10700);
        assert_eq!(u.find_by_name("loginpolicy_sudo").unwrap().members.len(), 3);
        assert!(u.find_by_name("nosuchgroup").is_none());

        assert_eq!(u.find_by_gid(10000).unwrap().name, "loginpolicy");
        assert_eq!(u.find_by_gid(10600).unwrap().name, "peter");
        assert!(u.find_by_gid(909090).is_none());
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(universe(POLICY), universe(POLICY));
    }

    #[test]
    fn test_display() {
        let u = universe(POLICY);
        assert_eq!(
            u.superusers().to_string(),
            "loginpolicy_sudo:10001:peter,user_1,user_3"
        );
        assert_eq!(u.per_login()[0].to_string(), "peter:10600:");
    }
}

//! The directory: point lookups and enumeration sessions over the three
//! databases (accounts, credential status, groups).
//!
//! Point lookups open a private scan of the policy source, take the first
//! match, pack it and drop the scan. They never touch an enumeration session.
//!
//! Each database has at most one enumeration session, guarded by its own
//! mutex so `begin`/`next`/`end` calls on one database are serialized while
//! the other databases and all point lookups proceed in parallel. `next`
//! opens a session implicitly, `begin` rewinds an open one and `end` is a
//! no-op on a closed one.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::config::DirectoryConfig;
use crate::cursor::{GroupCursor, RecordCursor};
use crate::errors::{LookupError, PackError};
use crate::groups::{GroupRecord, GroupUniverse};
use crate::models::{Account, CredentialStatus};
use crate::packer::{self, GroupEntry, PasswdEntry, ShadowEntry};
use crate::policy::{FileSource, IdentityRecord, PolicySource};

type RecordSession<S> = Mutex<Option<RecordCursor<<S as PolicySource>::Reader>>>;

/// Read-only identity directory backed by a [`PolicySource`].
pub struct Directory<S: PolicySource> {
    source: S,
    config: DirectoryConfig,
    accounts: RecordSession<S>,
    shadow: RecordSession<S>,
    groups: Mutex<Option<GroupCursor>>,
}

impl Directory<FileSource> {
    /// Directory over the policy file named in `config`.
    pub fn from_config(config: DirectoryConfig) -> Self {
        let source = FileSource::new(&config.policy.file);
        Self::new(source, config)
    }
}

impl<S: PolicySource> Directory<S> {
    pub fn new(source: S, config: DirectoryConfig) -> Self {
        info!(source = %source.describe(), "initializing directory");
        Self {
            source,
            config,
            accounts: Mutex::new(None),
            shadow: Mutex::new(None),
            groups: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub fn begin_accounts(&self) -> Result<(), LookupError> {
        debug!("begin accounts");
        self.begin_records(&self.accounts)
    }

    pub fn end_accounts(&self) {
        debug!("end accounts");
        end_session(&self.accounts, "accounts");
    }

    pub fn next_account<'a>(&self, buf: &'a mut [u8]) -> Result<PasswdEntry<'a>, LookupError> {
        self.next_record(
            &self.accounts,
            buf,
            |record, login| Account::from_record(record, login, &self.config.accounts),
            packer::pack_account,
        )
    }

    /// First account answering to `name`, by preferred or unique name.
    pub fn find_account_by_name<'a>(
        &self,
        name: &str,
        buf: &'a mut [u8],
    ) -> Result<PasswdEntry<'a>, LookupError> {
        debug!(name, "account lookup by name");
        self.find_record(
            buf,
            |record| {
                record
                    .answers_to(name)
                    .then(|| Account::from_record(record, name, &self.config.accounts))
            },
            packer::pack_account,
        )
    }

    /// First account with `uid`, named by its first login name.
    pub fn find_account_by_id<'a>(
        &self,
        uid: u32,
        buf: &'a mut [u8],
    ) -> Result<PasswdEntry<'a>, LookupError> {
        debug!(uid, "account lookup by id");
        self.find_record(
            buf,
            |record| {
                (record.local_id == uid).then(|| {
                    let login = record
                        .login_names()
                        .get(0)
                        .unwrap_or(record.unique_name.as_str());
                    Account::from_record(record, login, &self.config.accounts)
                })
            },
            packer::pack_account,
        )
    }

    // -----------------------------------------------------------------------
    // Credential status
    // -----------------------------------------------------------------------

    pub fn begin_shadow(&self) -> Result<(), LookupError> {
        debug!("begin shadow");
        self.begin_records(&self.shadow)
    }

    pub fn end_shadow(&self) {
        debug!("end shadow");
        end_session(&self.shadow, "shadow");
    }

    pub fn next_shadow<'a>(&self, buf: &'a mut [u8]) -> Result<ShadowEntry<'a>, LookupError> {
        self.next_record(
            &self.shadow,
            buf,
            |_, login| CredentialStatus::from_login(login, &self.config.shadow),
            packer::pack_status,
        )
    }

    pub fn find_shadow_by_name<'a>(
        &self,
        name: &str,
        buf: &'a mut [u8],
    ) -> Result<ShadowEntry<'a>, LookupError> {
        debug!(name, "shadow lookup by name");
        self.find_record(
            buf,
            |record| {
                record
                    .answers_to(name)
                    .then(|| CredentialStatus::from_login(name, &self.config.shadow))
            },
            packer::pack_status,
        )
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Open a group session, or rebuild the cached groups of an open one and
    /// rewind it.
    pub fn begin_groups(&self) -> Result<(), LookupError> {
        debug!("begin groups");
        let mut session = lock(&self.groups);
        *session = Some(GroupCursor::new(self.materialize()?));
        Ok(())
    }

    pub fn end_groups(&self) {
        debug!("end groups");
        let mut session = lock(&self.groups);
        if session.take().is_some() {
            info!(database = "groups", "enumeration session closed");
        }
    }

    pub fn next_group<'a>(&self, buf: &'a mut [u8]) -> Result<GroupEntry<'a>, LookupError> {
        let mut session = lock(&self.groups);
        if session.is_none() {
            *session = Some(GroupCursor::new(self.materialize()?));
        }
        let Some(cursor) = session.as_mut() else {
            return Err(LookupError::NotFound);
        };

        let group = cursor.peek().ok_or(LookupError::NotFound)?;
        let entry = self.pack_group(group, buf)?;
        cursor.advance();
        Ok(entry)
    }

    pub fn find_group_by_name<'a>(
        &self,
        name: &str,
        buf: &'a mut [u8],
    ) -> Result<GroupEntry<'a>, LookupError> {
        debug!(name, "group lookup by name");
        let universe = self.materialize()?;
        let group = universe.find_by_name(name).ok_or(LookupError::NotFound)?;
        Ok(self.pack_group(group, buf)?)
    }

    pub fn find_group_by_id<'a>(
        &self,
        gid: u32,
        buf: &'a mut [u8],
    ) -> Result<GroupEntry<'a>, LookupError> {
        debug!(gid, "group lookup by id");
        let universe = self.materialize()?;
        let group = universe.find_by_gid(gid).ok_or(LookupError::NotFound)?;
        Ok(self.pack_group(group, buf)?)
    }

    /// All groups, derived from a fresh scan.
    pub fn materialize(&self) -> Result<GroupUniverse, LookupError> {
        let mut reader = self.source.open()?;
        Ok(GroupUniverse::materialize(&mut reader, &self.config.groups)?)
    }

    fn pack_group<'a>(
        &self,
        group: &GroupRecord,
        buf: &'a mut [u8],
    ) -> Result<GroupEntry<'a>, PackError> {
        packer::pack_group(group, &self.config.groups.password_placeholder, buf)
    }

    // -----------------------------------------------------------------------
    // Shared record plumbing
    // -----------------------------------------------------------------------

    fn begin_records(&self, slot: &RecordSession<S>) -> Result<(), LookupError> {
        let mut session = lock(slot);
        if let Some(cursor) = session.as_mut() {
            if let Err(err) = cursor.rewind() {
                warn!(error = %err, "rewind failed, closing session");
                *session = None;
                return Err(err.into());
            }
            return Ok(());
        }
        *session = Some(RecordCursor::new(self.source.open()?));
        info!(source = %self.source.describe(), "enumeration session opened");
        Ok(())
    }

    fn next_record<'a, M, E>(
        &self,
        slot: &RecordSession<S>,
        buf: &'a mut [u8],
        build: impl Fn(&IdentityRecord, &str) -> M,
        pack: impl FnOnce(&M, &'a mut [u8]) -> Result<E, PackError>,
    ) -> Result<E, LookupError> {
        let mut session = lock(slot);
        if session.is_none() {
            *session = Some(RecordCursor::new(self.source.open()?));
            info!(source = %self.source.describe(), "enumeration session opened implicitly");
        }
        let Some(cursor) = session.as_mut() else {
            return Err(LookupError::NotFound);
        };

        let Some((record, login)) = cursor.peek()? else {
            return Err(LookupError::NotFound);
        };
        let model = build(record, login);

        match pack(&model, buf) {
            Ok(entry) => {
                cursor.advance();
                Ok(entry)
            }
            Err(err) => {
                debug!(error = %err, "entry does not fit, cursor kept in place");
                cursor.retreat()?;
                Err(err.into())
            }
        }
    }

    fn find_record<'a, M, E>(
        &self,
        buf: &'a mut [u8],
        select: impl Fn(&IdentityRecord) -> Option<M>,
        pack: impl FnOnce(&M, &'a mut [u8]) -> Result<E, PackError>,
    ) -> Result<E, LookupError> {
        let mut reader = self.source.open()?;
        while let Some(record) = reader.read_next()? {
            if let Some(model) = select(&record) {
                return Ok(pack(&model, buf)?);
            }
        }
        Err(LookupError::NotFound)
    }
}

fn end_session<C>(slot: &Mutex<Option<C>>, database: &str) {
    let mut session = lock(slot);
    if session.take().is_some() {
        info!(database, "enumeration session closed");
    }
}

/// Lock a session, recovering from poisoning. Sessions are only mutated
/// after a successful pack, so a panicking holder cannot leave one torn.
fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|poisoned| {
        warn!("session mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MemorySource;

    const POLICY: &str = "\
peter:user_1:600:10600:Y:peter@example.com
:user_2:700:10700:N:two@example.com
";

    fn directory() -> Directory<MemorySource> {
        Directory::new(MemorySource::new(POLICY), DirectoryConfig::default())
    }

    #[test]
    fn test_account_enumeration() {
        let dir = directory();
        let mut buf = [0u8; 256];
        let mut names = Vec::new();
        loop {
            match dir.next_account(&mut buf) {
                Ok(entry) => names.push(entry.name.to_string()),
                Err(LookupError::NotFound) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(names, vec!["peter", "user_1", "user_2"]);
    }

    #[test]
    fn test_account_lookups() {
        let dir = directory();
        let mut buf = [0u8; 256];
        assert_eq!(dir.find_account_by_name("user_1", &mut buf).unwrap().uid, 10600);
        assert_eq!(dir.find_account_by_id(10600, &mut buf).unwrap().name, "peter");
        assert!(matches!(
            dir.find_account_by_name("nosuchname", &mut buf),
            Err(LookupError::NotFound)
        ));
    }

    #[test]
    fn test_shadow_lookup() {
        let dir = directory();
        let mut buf = [0u8; 64];
        let entry = dir.find_shadow_by_name("peter", &mut buf).unwrap();
        assert_eq!(entry.password, "*");
    }

    #[test]
    fn test_group_retry_keeps_position() {
        let dir = directory();
        let mut small = [0u8; 4];
        let mut big = [0u8; 256];
        assert_eq!(dir.next_group(&mut big).unwrap().name, "peter");
        assert!(matches!(
            dir.next_group(&mut small),
            Err(LookupError::InsufficientCapacity { .. })
        ));
        assert_eq!(dir.next_group(&mut big).unwrap().name, "user_1");
    }

    #[test]
    fn test_unavailable_source() {
        let mut config = DirectoryConfig::default();
        config.policy.file = "/nonexistent/login_policy".into();
        let dir = Directory::from_config(config);
        let mut buf = [0u8; 64];
        assert!(matches!(
            dir.next_account(&mut buf),
            Err(LookupError::Unavailable(_))
        ));
        assert!(matches!(
            dir.begin_groups(),
            Err(LookupError::Unavailable(_))
        ));
        dir.end_groups();
        dir.end_accounts();
    }
}

//! Consistency checks that drive the directory the way the NSS host does.
//!
//! Every call goes through [`with_growing_buffer`], which starts at
//! [`INITIAL_BUFFER`] bytes and doubles on `TryAgain`. Each check produces a
//! [`CheckReport`]; a failure is any disagreement between enumeration and
//! point lookups, or any status other than the expected one.

use std::fmt::Debug;

use serde::Serialize;
use tracing::{debug, warn};

use loginpolicy_core::groups::GroupRecord;
use loginpolicy_core::models::{Account, CredentialStatus};
use loginpolicy_core::policy::PolicySource;
use loginpolicy_core::{Directory, LookupError};

pub const INITIAL_BUFFER: usize = 1024;

/// Largest buffer the harness will try before reporting `TryAgain` as-is.
pub const MAX_BUFFER: usize = 1 << 20;

/// Name that no policy line is expected to use.
const ABSENT_NAME: &str = "loginpolicy-absent-name";

/// Ids at or below this value never come from the policy file.
const ABSENT_ID: u32 = 0;

/// Run `call` with a fresh buffer, doubling its size until the entry fits.
pub fn with_growing_buffer<T>(
    mut call: impl FnMut(&mut [u8]) -> Result<T, LookupError>,
) -> Result<T, LookupError> {
    let mut size = INITIAL_BUFFER;
    loop {
        let mut buf = vec![0u8; size];
        match call(&mut buf) {
            Err(LookupError::InsufficientCapacity { needed, .. }) if size < MAX_BUFFER => {
                debug!(size, needed, "buffer too small, doubling");
                size *= 2;
            }
            other => return other,
        }
    }
}

/// `NotFound` becomes `None`; every other error is kept.
fn found<T>(result: Result<T, LookupError>) -> Result<Option<T>, LookupError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(LookupError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Enumerate a whole database from a fresh session.
fn enumerate<T>(
    begin: impl Fn() -> Result<(), LookupError>,
    next: impl Fn() -> Result<T, LookupError>,
    end: impl Fn(),
) -> Result<Vec<T>, LookupError> {
    begin()?;
    let mut entries = Vec::new();
    let outcome = loop {
        match found(next()) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => break Ok(entries),
            Err(err) => break Err(err),
        }
    };
    end();
    outcome
}

pub fn accounts<S: PolicySource>(dir: &Directory<S>) -> Result<Vec<Account>, LookupError> {
    enumerate(
        || dir.begin_accounts(),
        || with_growing_buffer(|buf| dir.next_account(buf).map(|e| e.to_account())),
        || dir.end_accounts(),
    )
}

pub fn groups<S: PolicySource>(dir: &Directory<S>) -> Result<Vec<GroupRecord>, LookupError> {
    enumerate(
        || dir.begin_groups(),
        || with_growing_buffer(|buf| dir.next_group(buf).map(|e| e.to_group_record())),
        || dir.end_groups(),
    )
}

pub fn shadow<S: PolicySource>(dir: &Directory<S>) -> Result<Vec<CredentialStatus>, LookupError> {
    enumerate(
        || dir.begin_shadow(),
        || with_growing_buffer(|buf| dir.next_shadow(buf).map(|e| e.to_status())),
        || dir.end_shadow(),
    )
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of one named check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub name: &'static str,
    pub checked: usize,
    pub failures: Vec<String>,
}

impl CheckReport {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn fail(&mut self, detail: String) {
        warn!(check = self.name, %detail, "check failed");
        self.failures.push(detail);
    }

    pub fn errors(&self) -> usize {
        self.failures.len()
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sum of failures over several reports.
pub fn total_errors(reports: &[CheckReport]) -> usize {
    reports.iter().map(CheckReport::errors).sum()
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness<'d, S: PolicySource> {
    dir: &'d Directory<S>,
}

impl<'d, S: PolicySource> Harness<'d, S> {
    pub fn new(dir: &'d Directory<S>) -> Self {
        Self { dir }
    }

    /// Every enumerated account is found again by id and by name.
    pub fn users(&self) -> CheckReport {
        let mut report = CheckReport::new("users");
        let entries = match accounts(self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                report.fail(format!("enumeration failed: {err}"));
                return report;
            }
        };

        for account in &entries {
            report.checked += 1;
            match with_growing_buffer(|buf| {
                self.dir
                    .find_account_by_id(account.uid, buf)
                    .map(|e| e.to_account())
            }) {
                Ok(by_id) if by_id.uid == account.uid => {}
                Ok(by_id) => report.fail(format!(
                    "uid {} answered with uid {}",
                    account.uid, by_id.uid
                )),
                Err(err) => report.fail(format!("uid {} ({}): {err}", account.uid, account.name)),
            }

            match with_growing_buffer(|buf| {
                self.dir
                    .find_account_by_name(&account.name, buf)
                    .map(|e| e.to_account())
            }) {
                Ok(by_name) if by_name == *account => {}
                Ok(by_name) => report.fail(format!(
                    "user {} answered with different entry: {by_name}",
                    account.name
                )),
                Err(err) => report.fail(format!("user {}: {err}", account.name)),
            }
        }
        report
    }

    /// Every enumerated group is found again by name and by gid.
    pub fn groups(&self) -> CheckReport {
        let mut report = CheckReport::new("groups");
        let entries = match groups(self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                report.fail(format!("enumeration failed: {err}"));
                return report;
            }
        };

        for group in &entries {
            report.checked += 1;
            match with_growing_buffer(|buf| {
                self.dir
                    .find_group_by_name(&group.name, buf)
                    .map(|e| e.to_group_record())
            }) {
                Ok(by_name) if by_name == *group => {}
                Ok(by_name) => report.fail(format!(
                    "group {} answered with different entry: {by_name}",
                    group.name
                )),
                Err(err) => report.fail(format!("group {}: {err}", group.name)),
            }

            match with_growing_buffer(|buf| {
                self.dir
                    .find_group_by_id(group.gid, buf)
                    .map(|e| e.to_group_record())
            }) {
                Ok(by_gid) if by_gid.gid == group.gid => {}
                Ok(by_gid) => report.fail(format!(
                    "gid {} answered with gid {}",
                    group.gid, by_gid.gid
                )),
                Err(err) => report.fail(format!("gid {} ({}): {err}", group.gid, group.name)),
            }
        }
        report
    }

    /// Every enumerated credential status is found again by name.
    pub fn shadow(&self) -> CheckReport {
        let mut report = CheckReport::new("shadow");
        let entries = match shadow(self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                report.fail(format!("enumeration failed: {err}"));
                return report;
            }
        };

        for status in &entries {
            report.checked += 1;
            match with_growing_buffer(|buf| {
                self.dir
                    .find_shadow_by_name(&status.name, buf)
                    .map(|e| e.to_status())
            }) {
                Ok(by_name) if by_name == *status => {}
                Ok(by_name) => report.fail(format!(
                    "shadow {} answered with different entry: {by_name}",
                    status.name
                )),
                Err(err) => report.fail(format!("shadow {}: {err}", status.name)),
            }
        }
        report
    }

    /// Lookups of absent keys report `NotFound`.
    pub fn errors(&self) -> CheckReport {
        let mut report = CheckReport::new("errors");
        let groups = &self.dir.config().groups;
        let absent_gid = (ABSENT_ID..)
            .find(|gid| *gid != groups.all_users_gid && *gid != groups.superusers_gid)
            .unwrap_or(ABSENT_ID);

        let probes: [(String, Result<(), LookupError>); 5] = [
            (
                format!("user {ABSENT_NAME}"),
                with_growing_buffer(|buf| self.dir.find_account_by_name(ABSENT_NAME, buf).map(drop)),
            ),
            (
                format!("uid {ABSENT_ID}"),
                with_growing_buffer(|buf| self.dir.find_account_by_id(ABSENT_ID, buf).map(drop)),
            ),
            (
                format!("shadow {ABSENT_NAME}"),
                with_growing_buffer(|buf| self.dir.find_shadow_by_name(ABSENT_NAME, buf).map(drop)),
            ),
            (
                format!("group {ABSENT_NAME}"),
                with_growing_buffer(|buf| self.dir.find_group_by_name(ABSENT_NAME, buf).map(drop)),
            ),
            (
                format!("gid {absent_gid}"),
                with_growing_buffer(|buf| self.dir.find_group_by_id(absent_gid, buf).map(drop)),
            ),
        ];

        for (probe, result) in probes {
            report.checked += 1;
            match result {
                Err(LookupError::NotFound) => {}
                Ok(()) => report.fail(format!("{probe}: unexpectedly found")),
                Err(err) => report.fail(format!("{probe}: expected not found, got {err}")),
            }
        }
        report
    }

    /// Session rules: `next` auto-begins, `begin` rewinds, `end` is
    /// idempotent and a later `next` starts over.
    pub fn idempotency(&self) -> CheckReport {
        let mut report = CheckReport::new("idempotency");
        let dir = self.dir;

        session_rules(
            &mut report,
            "users",
            || dir.begin_accounts(),
            || with_growing_buffer(|buf| dir.next_account(buf).map(|e| e.to_account())),
            || dir.end_accounts(),
        );
        session_rules(
            &mut report,
            "groups",
            || dir.begin_groups(),
            || with_growing_buffer(|buf| dir.next_group(buf).map(|e| e.to_group_record())),
            || dir.end_groups(),
        );
        session_rules(
            &mut report,
            "shadow",
            || dir.begin_shadow(),
            || with_growing_buffer(|buf| dir.next_shadow(buf).map(|e| e.to_status())),
            || dir.end_shadow(),
        );
        report
    }

    /// All checks, in order.
    pub fn check(&self) -> Vec<CheckReport> {
        vec![
            self.users(),
            self.groups(),
            self.shadow(),
            self.errors(),
            self.idempotency(),
        ]
    }
}

fn session_rules<T: PartialEq + Debug>(
    report: &mut CheckReport,
    database: &str,
    begin: impl Fn() -> Result<(), LookupError>,
    next: impl Fn() -> Result<T, LookupError>,
    end: impl Fn(),
) {
    report.checked += 1;
    let step = || -> Result<(), String> {
        end();
        let first = found(next()).map_err(|e| format!("first next: {e}"))?;
        found(next()).map_err(|e| format!("second next: {e}"))?;

        begin().map_err(|e| format!("begin: {e}"))?;
        let rewound = found(next()).map_err(|e| format!("next after begin: {e}"))?;
        if rewound != first {
            return Err(format!(
                "begin did not rewind: first {first:?}, then {rewound:?}"
            ));
        }

        end();
        end();
        let restarted = found(next()).map_err(|e| format!("next after end: {e}"))?;
        if restarted != first {
            return Err(format!(
                "next after end did not start over: first {first:?}, then {restarted:?}"
            ));
        }
        end();
        Ok(())
    };

    if let Err(detail) = step() {
        end();
        report.fail(format!("{database}: {detail}"));
    }
}

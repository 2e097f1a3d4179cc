//! Serializing entries into caller-supplied buffers.
//!
//! Every string is written NUL-terminated so the returned `&str` views can be
//! handed to C callers as `char *` unchanged. The exact size is computed
//! first and a buffer that is too small is rejected before any byte of it is
//! touched.
//!
//! Group layout, starting at the first pointer-aligned byte of the buffer:
//!
//! ```text
//! [padding][member ptr 0]...[member ptr n-1][NULL][member 0\0]...[member n-1\0][name\0][password\0]
//! ```
//!
//! Each pointer slot holds the native-endian address of its member string,
//! so the table is a valid `char **`.

use serde::Serialize;

use crate::errors::PackError;
use crate::groups::GroupRecord;
use crate::models::{Account, CredentialStatus};

const WORD: usize = std::mem::size_of::<usize>();

/// An [`Account`] packed into a caller buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswdEntry<'a> {
    pub name: &'a str,
    pub password: &'a str,
    pub uid: u32,
    pub gid: u32,
    pub gecos: &'a str,
    pub home: &'a str,
    pub shell: &'a str,
}

impl PasswdEntry<'_> {
    pub fn to_account(&self) -> Account {
        Account {
            name: self.name.to_string(),
            password: self.password.to_string(),
            uid: self.uid,
            gid: self.gid,
            gecos: self.gecos.to_string(),
            home: self.home.to_string(),
            shell: self.shell.to_string(),
        }
    }
}

/// A [`CredentialStatus`] packed into a caller buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowEntry<'a> {
    pub name: &'a str,
    pub password: &'a str,
    pub last_change: i64,
    pub min_days: i64,
    pub max_days: i64,
    pub warn_days: i64,
    pub inactive_days: i64,
    pub expire_date: i64,
    pub flag: u64,
}

impl ShadowEntry<'_> {
    pub fn to_status(&self) -> CredentialStatus {
        CredentialStatus {
            name: self.name.to_string(),
            password: self.password.to_string(),
            last_change: self.last_change,
            min_days: self.min_days,
            max_days: self.max_days,
            warn_days: self.warn_days,
            inactive_days: self.inactive_days,
            expire_date: self.expire_date,
            flag: self.flag,
        }
    }
}

/// A [`GroupRecord`] packed into a caller buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry<'a> {
    pub name: &'a str,
    pub password: &'a str,
    pub gid: u32,
    pub members: Vec<&'a str>,
    /// The NULL-terminated member pointer table inside the buffer.
    #[serde(skip)]
    pub member_table: &'a [u8],
}

impl GroupEntry<'_> {
    pub fn to_group_record(&self) -> GroupRecord {
        GroupRecord {
            name: self.name.to_string(),
            gid: self.gid,
            members: self.members.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Addresses stored in the member table, terminator included.
    pub fn member_addresses(&self) -> Vec<usize> {
        self.member_table
            .chunks_exact(WORD)
            .map(|slot| {
                let mut word = [0u8; WORD];
                word.copy_from_slice(slot);
                usize::from_ne_bytes(word)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Packing
// ---------------------------------------------------------------------------

/// Pack an account. Fails without writing if `buf` is too small.
pub fn pack_account<'a>(account: &Account, buf: &'a mut [u8]) -> Result<PasswdEntry<'a>, PackError> {
    let needed = strings_size([
        &account.name,
        &account.password,
        &account.gecos,
        &account.home,
        &account.shell,
    ]);
    ensure_capacity(needed, buf.len())?;

    let mut arena = Arena::new(buf);
    Ok(PasswdEntry {
        name: arena.put_str(&account.name),
        password: arena.put_str(&account.password),
        uid: account.uid,
        gid: account.gid,
        gecos: arena.put_str(&account.gecos),
        home: arena.put_str(&account.home),
        shell: arena.put_str(&account.shell),
    })
}

/// Pack a credential-status entry. Fails without writing if `buf` is too
/// small.
pub fn pack_status<'a>(
    status: &CredentialStatus,
    buf: &'a mut [u8],
) -> Result<ShadowEntry<'a>, PackError> {
    let needed = strings_size([&status.name, &status.password]);
    ensure_capacity(needed, buf.len())?;

    let mut arena = Arena::new(buf);
    Ok(ShadowEntry {
        name: arena.put_str(&status.name),
        password: arena.put_str(&status.password),
        last_change: status.last_change,
        min_days: status.min_days,
        max_days: status.max_days,
        warn_days: status.warn_days,
        inactive_days: status.inactive_days,
        expire_date: status.expire_date,
        flag: status.flag,
    })
}

/// Pack a group with its pointer table. Fails without writing if `buf` is
/// too small, alignment padding included.
pub fn pack_group<'a>(
    group: &GroupRecord,
    password: &str,
    buf: &'a mut [u8],
) -> Result<GroupEntry<'a>, PackError> {
    let padding = (WORD - buf.as_ptr() as usize % WORD) % WORD;
    let table_len = (group.members.len() + 1) * WORD;
    let needed = padding
        + table_len
        + strings_size(&group.members)
        + strings_size([&group.name])
        + password.len()
        + 1;
    ensure_capacity(needed, buf.len())?;

    let mut arena = Arena::new(buf);
    arena.take(padding);
    let table = arena.take(table_len);
    let members: Vec<&'a str> = group.members.iter().map(|m| arena.put_str(m)).collect();

    let (slots, terminator) = table.split_at_mut(members.len() * WORD);
    for (slot, member) in slots.chunks_exact_mut(WORD).zip(&members) {
        slot.copy_from_slice(&(member.as_ptr() as usize).to_ne_bytes());
    }
    terminator.fill(0);

    Ok(GroupEntry {
        members,
        member_table: table,
        name: arena.put_str(&group.name),
        password: arena.put_str(password),
        gid: group.gid,
    })
}

fn strings_size<I, S>(strings: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    strings.into_iter().map(|s| s.as_ref().len() + 1).sum()
}

fn ensure_capacity(needed: usize, available: usize) -> Result<(), PackError> {
    if available < needed {
        return Err(PackError::InsufficientCapacity { needed, available });
    }
    Ok(())
}

/// Bump allocator over the caller buffer. Callers check capacity first.
struct Arena<'a> {
    rest: &'a mut [u8],
}

impl<'a> Arena<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { rest: buf }
    }

    fn take(&mut self, len: usize) -> &'a mut [u8] {
        let rest = std::mem::take(&mut self.rest);
        let (head, tail) = rest.split_at_mut(len);
        self.rest = tail;
        head
    }

    fn put_str(&mut self, s: &str) -> &'a str {
        let slot = self.take(s.len() + 1);
        let (text, nul) = slot.split_at_mut(s.len());
        text.copy_from_slice(s.as_bytes());
        nul[0] = 0;
        let text: &'a [u8] = text;
        std::str::from_utf8(text).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountConfig, ShadowConfig};
    use crate::policy::IdentityRecord;

    fn account() -> Account {
        let record =
            IdentityRecord::parse_line("peter:user_41000:41000:51000:Y:peter@example.com")
                .unwrap();
        Account::from_record(&record, "peter", &AccountConfig::default())
    }

    fn group(members: &[&str]) -> GroupRecord {
        GroupRecord {
            name: "loginpolicy".into(),
            gid: 10000,
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_pack_account_round_trip() {
        let account = account();
        let mut buf = vec![0xAAu8; 256];
        let entry = pack_account(&account, &mut buf).unwrap();
        assert_eq!(entry.to_account(), account);
        assert_eq!(entry.name, "peter");
        assert_eq!(entry.uid, 51000);
    }

    #[test]
    fn test_pack_account_exact_capacity() {
        let account = account();
        // "peter" "x" "peter@example.com" "/home/peter" "/bin/bash", NUL each.
        let needed = 6 + 2 + 18 + 12 + 10;
        let mut buf = vec![0u8; needed];
        let entry = pack_account(&account, &mut buf).unwrap();
        assert_eq!(entry.shell, "/bin/bash");
        assert_eq!(buf[needed - 1], 0);
        assert_eq!(&buf[..6], b"peter\0");

        let mut short = vec![0u8; needed - 1];
        assert_eq!(
            pack_account(&account, &mut short),
            Err(PackError::InsufficientCapacity {
                needed,
                available: needed - 1
            })
        );
    }

    #[test]
    fn test_failed_pack_leaves_buffer_untouched() {
        let mut buf = vec![0xAAu8; 20];
        assert!(pack_account(&account(), &mut buf).is_err());
        assert!(buf.iter().all(|&b| b == 0xAA));

        let big = group(&["peter", "user_41000", "user_2"]);
        assert!(pack_group(&big, "x", &mut buf).is_err());
        assert!(buf.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_zero_capacity() {
        let mut empty: [u8; 0] = [];
        assert!(pack_account(&account(), &mut empty).is_err());
        let status = CredentialStatus::from_login("peter", &ShadowConfig::default());
        assert!(pack_status(&status, &mut empty).is_err());
        assert!(pack_group(&group(&[]), "x", &mut empty).is_err());
    }

    #[test]
    fn test_pack_status_round_trip() {
        let status = CredentialStatus::from_login("user_41000", &ShadowConfig::default());
        let mut buf = [0u8; 64];
        let entry = pack_status(&status, &mut buf).unwrap();
        assert_eq!(entry.to_status(), status);
        assert_eq!(&buf[..13], b"user_41000\0*\0");
    }

    #[test]
    fn test_pack_group_layout() {
        let group = group(&["peter", "user_41000", "peter"]);
        let mut buf = vec![0xAAu8; 256];
        let base = buf.as_ptr() as usize;
        let entry = pack_group(&group, "x", &mut buf).unwrap();

        assert_eq!(entry.to_group_record(), group);
        assert_eq!(entry.password, "x");

        let table_addr = entry.member_table.as_ptr() as usize;
        assert_eq!(table_addr % WORD, 0);
        assert!(table_addr - base < WORD);

        let addresses = entry.member_addresses();
        assert_eq!(addresses.len(), 4);
        for (addr, member) in addresses.iter().zip(&entry.members) {
            assert_eq!(*addr, member.as_ptr() as usize);
        }
        assert_eq!(addresses[3], 0);

        // Members follow the table, then name, then password.
        let first_member = entry.members[0].as_ptr() as usize;
        assert_eq!(first_member, table_addr + 4 * WORD);
        assert!((entry.name.as_ptr() as usize) > (entry.members[2].as_ptr() as usize));
        assert!((entry.password.as_ptr() as usize) > (entry.name.as_ptr() as usize));
    }

    #[test]
    fn test_pack_group_exact_capacity() {
        let group = group(&["ab", "c"]);
        let mut buf = vec![0u8; 128];
        for offset in 0..WORD {
            let region = &mut buf[offset..];
            let padding = (WORD - region.as_ptr() as usize % WORD) % WORD;
            let needed = padding + 3 * WORD + 3 + 2 + 12 + 2;

            let exact = &mut region[..needed];
            let entry = pack_group(&group, "x", exact).unwrap();
            assert_eq!(entry.members, vec!["ab", "c"]);

            let short = &mut buf[offset..offset + needed - 1];
            assert_eq!(
                pack_group(&group, "x", short),
                Err(PackError::InsufficientCapacity {
                    needed,
                    available: needed - 1
                })
            );
        }
    }

    #[test]
    fn test_pack_group_without_members() {
        let group = group(&[]);
        let mut buf = vec![0xAAu8; 64];
        let entry = pack_group(&group, "x", &mut buf).unwrap();
        assert!(entry.members.is_empty());
        assert_eq!(entry.member_addresses(), vec![0]);
    }

    #[test]
    fn test_pack_group_terminates_table_in_dirty_buffer() {
        for members in [&["a", "b"][..], &[][..]] {
            let group = group(members);
            let mut buf = vec![0xAAu8; 128];
            let entry = pack_group(&group, "x", &mut buf).unwrap();
            let addresses = entry.member_addresses();
            assert_eq!(addresses.len(), members.len() + 1);
            assert_eq!(addresses.last(), Some(&0));
            assert!(addresses[..members.len()].iter().all(|&a| a != 0));
        }
    }
}

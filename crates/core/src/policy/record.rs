//! One parsed line of the login policy file.
//!
//! The line format:
//!
//! ```text
//! preferred_name:unique_name:remote_id:local_id:superuser:comment[:extra...]
//! peter:user_41000:41000:51000:Y:peter@example.com
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::RecordError;

/// Ids at or below this value are reserved and make a line invalid.
pub const MIN_ID: u32 = 500;

/// A validated entry from the login policy file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Preferred login name. May be empty and is not stable over time.
    pub preferred_name: String,
    /// Stable login name.
    pub unique_name: String,
    /// Identifier in the upstream account system.
    pub remote_id: u32,
    /// Local uid, also used as the primary gid.
    pub local_id: u32,
    /// Whether the account belongs to the superusers group.
    pub superuser: bool,
    /// Free text, rendered as the gecos field.
    pub comment: String,
}

impl IdentityRecord {
    /// Parse one line (without its terminator).
    pub fn parse_line(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 6 {
            return Err(RecordError::TooFewFields(fields.len()));
        }

        let unique_name = fields[1];
        if unique_name.is_empty() {
            return Err(RecordError::EmptyField("unique_name"));
        }
        for name in [fields[0], unique_name] {
            if name.contains('/') || name == "." || name == ".." {
                return Err(RecordError::InvalidName(name.to_string()));
            }
        }
        let comment = fields[5];
        if comment.is_empty() {
            return Err(RecordError::EmptyField("comment"));
        }

        Ok(Self {
            preferred_name: fields[0].to_string(),
            unique_name: unique_name.to_string(),
            remote_id: parse_id("remote_id", fields[2])?,
            local_id: parse_id("local_id", fields[3])?,
            superuser: parse_flag(fields[4])?,
            comment: comment.to_string(),
        })
    }

    /// Login names exposed by this record, preferred name first.
    ///
    /// The preferred name is only included when it is non-empty and differs
    /// from the unique name.
    pub fn login_names(&self) -> LoginNames<'_> {
        let preferred = (!self.preferred_name.is_empty()
            && self.preferred_name != self.unique_name)
            .then_some(self.preferred_name.as_str());
        LoginNames {
            preferred,
            unique: &self.unique_name,
        }
    }

    /// Whether `name` is one of this record's login names.
    pub fn answers_to(&self, name: &str) -> bool {
        self.login_names().contains(name)
    }
}

/// The one or two login names of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginNames<'a> {
    preferred: Option<&'a str>,
    unique: &'a str,
}

impl<'a> LoginNames<'a> {
    /// Number of names (1 or 2).
    pub fn len(&self) -> usize {
        1 + usize::from(self.preferred.is_some())
    }

    /// Never true; a record always has its unique name.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Name at `index` in emission order.
    pub fn get(&self, index: usize) -> Option<&'a str> {
        match (self.preferred, index) {
            (Some(preferred), 0) => Some(preferred),
            (Some(_), 1) | (None, 0) => Some(self.unique),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> {
        self.preferred.into_iter().chain(std::iter::once(self.unique))
    }
}

fn parse_id(field: &'static str, value: &str) -> Result<u32, RecordError> {
    let id: u32 = value.parse().map_err(|_| RecordError::InvalidId {
        field,
        value: value.to_string(),
    })?;
    if id <= MIN_ID {
        return Err(RecordError::IdOutOfRange {
            field,
            value: id,
            min: MIN_ID,
        });
    }
    Ok(id)
}

fn parse_flag(value: &str) -> Result<bool, RecordError> {
    match value {
        "1" | "Y" => Ok(true),
        "0" | "N" => Ok(false),
        other => Err(RecordError::InvalidFlag(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_line() {
        let record =
            IdentityRecord::parse_line("peter:user_41000:41000:51000:Y:peter@example.com")
                .unwrap();
        assert_eq!(record.preferred_name, "peter");
        assert_eq!(record.unique_name, "user_41000");
        assert_eq!(record.remote_id, 41000);
        assert_eq!(record.local_id, 51000);
        assert!(record.superuser);
        assert_eq!(record.comment, "peter@example.com");
    }

    #[test]
    fn test_trailing_fields_ignored() {
        let record =
            IdentityRecord::parse_line(":user_600:600:10600:0:ops@example.com:extra:more")
                .unwrap();
        assert_eq!(record.preferred_name, "");
        assert!(!record.superuser);
        assert_eq!(record.comment, "ops@example.com");
    }

    #[test]
    fn test_flag_values() {
        for (flag, expected) in [("1", true), ("Y", true), ("0", false), ("N", false)] {
            let line = format!("a:b:600:600:{flag}:c");
            assert_eq!(IdentityRecord::parse_line(&line).unwrap().superuser, expected);
        }
        assert_eq!(
            IdentityRecord::parse_line("a:b:600:600:yes:c"),
            Err(RecordError::InvalidFlag("yes".into()))
        );
    }

    #[test]
    fn test_rejects_invalid_lines() {
        assert_eq!(
            IdentityRecord::parse_line("a:b:600:600:1"),
            Err(RecordError::TooFewFields(5))
        );
        assert_eq!(
            IdentityRecord::parse_line("a::600:600:1:c"),
            Err(RecordError::EmptyField("unique_name"))
        );
        assert_eq!(
            IdentityRecord::parse_line("a:b:600:600:1:"),
            Err(RecordError::EmptyField("comment"))
        );
        assert!(matches!(
            IdentityRecord::parse_line("a:b:abc:600:1:c"),
            Err(RecordError::InvalidId {
                field: "remote_id",
                ..
            })
        ));
        assert!(matches!(
            IdentityRecord::parse_line("a:b:600:500:1:c"),
            Err(RecordError::IdOutOfRange {
                field: "local_id",
                value: 500,
                ..
            })
        ));
        assert!(matches!(
            IdentityRecord::parse_line("a:b:100:600:1:c"),
            Err(RecordError::IdOutOfRange {
                field: "remote_id",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_path_like_names() {
        for line in [
            "/root:user_1:600:600:1:c",
            "peter:../etc:600:600:1:c",
            "..:user_1:600:600:1:c",
            "peter:.:600:600:1:c",
        ] {
            assert!(
                matches!(IdentityRecord::parse_line(line), Err(RecordError::InvalidName(_))),
                "{line}"
            );
        }
        assert!(IdentityRecord::parse_line("p.eter:user.1:600:600:1:c").is_ok());
    }

    #[test]
    fn test_ids_are_not_trimmed() {
        for line in ["a:b: 600:600:1:c", "a:b:600:600 :1:c"] {
            assert!(
                matches!(IdentityRecord::parse_line(line), Err(RecordError::InvalidId { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn test_login_names() {
        let record = IdentityRecord::parse_line("peter:user_1:600:600:1:c").unwrap();
        let names = record.login_names();
        assert_eq!(names.len(), 2);
        assert_eq!(names.iter().collect::<Vec<_>>(), vec!["peter", "user_1"]);
        assert_eq!(names.get(0), Some("peter"));
        assert_eq!(names.get(1), Some("user_1"));
        assert_eq!(names.get(2), None);
        assert!(record.answers_to("peter"));
        assert!(record.answers_to("user_1"));
        assert!(!record.answers_to("paul"));
    }

    #[test]
    fn test_login_names_collapse() {
        let same = IdentityRecord::parse_line("user_1:user_1:600:600:1:c").unwrap();
        assert_eq!(same.login_names().iter().collect::<Vec<_>>(), vec!["user_1"]);

        let empty = IdentityRecord::parse_line(":user_1:600:600:1:c").unwrap();
        assert_eq!(empty.login_names().len(), 1);
        assert_eq!(empty.login_names().get(0), Some("user_1"));
        assert_eq!(empty.login_names().get(1), None);
    }
}

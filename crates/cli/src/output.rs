//! Rendering of directory entries for `list` and `lookup`.

use std::fmt::Display;

use anyhow::{Context, Result};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use loginpolicy_core::groups::GroupRecord;
use loginpolicy_core::models::{Account, CredentialStatus};

/// Output format for entry listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One colon-separated line per entry, as in /etc/passwd.
    Line,
    Table,
    Json,
}

/// An entry that can be shown as a table row.
pub trait Row: Display + Serialize {
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

impl Row for Account {
    const HEADERS: &'static [&'static str] = &["Name", "UID", "GID", "GECOS", "Home", "Shell"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.uid.to_string(),
            self.gid.to_string(),
            self.gecos.clone(),
            self.home.clone(),
            self.shell.clone(),
        ]
    }
}

impl Row for GroupRecord {
    const HEADERS: &'static [&'static str] = &["Name", "GID", "Members"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.gid.to_string(),
            self.members.join(", "),
        ]
    }
}

impl Row for CredentialStatus {
    const HEADERS: &'static [&'static str] = &["Name", "Password", "Last change", "Expires"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.password.clone(),
            days(self.last_change),
            days(self.expire_date),
        ]
    }
}

/// Unset aging fields are negative and shown as a dash.
fn days(value: i64) -> String {
    if value < 0 {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Render `entries` in the requested format.
pub fn render<T: Row>(entries: &[T], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Line => Ok(entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(T::HEADERS.to_vec());
            for entry in entries {
                table.add_row(entry.cells());
            }
            Ok(table.to_string())
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(entries).context("failed to serialize entries")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupRecord {
        GroupRecord {
            name: "loginpolicy_sudo".into(),
            gid: 10001,
            members: vec!["peter".into(), "erin".into()],
        }
    }

    #[test]
    fn test_line_format() {
        let out = render(&[group()], OutputFormat::Line).unwrap();
        assert_eq!(out, "loginpolicy_sudo:10001:peter,erin");
        assert_eq!(render::<GroupRecord>(&[], OutputFormat::Line).unwrap(), "");
    }

    #[test]
    fn test_table_format() {
        let out = render(&[group()], OutputFormat::Table).unwrap();
        assert!(out.contains("Members"));
        assert!(out.contains("loginpolicy_sudo"));
        assert!(out.contains("peter, erin"));
    }

    #[test]
    fn test_json_format() {
        let out = render(&[group()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["gid"], 10001);
        assert_eq!(value[0]["members"][1], "erin");
    }

    #[test]
    fn test_unset_days() {
        assert_eq!(days(-1), "-");
        assert_eq!(days(-99999), "-");
        assert_eq!(days(19000), "19000");
    }
}

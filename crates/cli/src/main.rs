//! loginpolicy command-line harness.
//!
//! Drives the identity directory the way the NSS host does: enumerations with
//! grow-and-retry buffers, point lookups, and session checks. Also prints the
//! databases and generates / validates configuration files.

mod harness;
mod output;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use loginpolicy_core::config::DEFAULT_CONFIG_PATH;
use loginpolicy_core::policy::{FileSource, PolicySource};
use loginpolicy_core::{Directory, DirectoryConfig, LookupError};

use crate::harness::{with_growing_buffer, CheckReport, Harness};
use crate::output::OutputFormat;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// loginpolicy command-line harness.
#[derive(Parser, Debug)]
#[command(
    name = "loginpolicy",
    version,
    about = "Inspect and check a loginpolicy identity directory"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to $LOGINPOLICY_CONFIG,
    /// then /etc/loginpolicy.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Policy file to read instead of the configured one.
    #[arg(long, global = true)]
    policy_file: Option<PathBuf>,

    /// Log filter (e.g. "debug", "loginpolicy_core=trace"). Defaults to the
    /// configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enumerate accounts and look each one up by id and by name.
    Users,

    /// Enumerate groups and look each one up by name and by gid.
    Groups,

    /// Enumerate credential status entries and look each one up by name.
    Shadow,

    /// Check that absent names and ids are reported as not found.
    Errors,

    /// Check begin/next/end session rules on every database.
    Idempotency,

    /// Run every check and report the total error count.
    Check,

    /// Print a whole database.
    List {
        database: DatabaseKind,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Line)]
        format: OutputFormat,
    },

    /// Look up a single entry.
    Lookup {
        #[command(subcommand)]
        target: LookupTarget,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./loginpolicy.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DatabaseKind {
    Users,
    Groups,
    Shadow,
}

#[derive(Subcommand, Debug)]
enum LookupTarget {
    /// Account by name, or by uid when the key is numeric.
    User { key: String },
    /// Group by name, or by gid when the key is numeric.
    Group { key: String },
    /// Credential status by name.
    Shadow { name: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(DirectoryConfig::resolve_path);

    let level = cli
        .log_level
        .clone()
        .or_else(|| configured_level(&config_path))
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli, &config_path) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

/// Log level from the config file, if it can be read.
fn configured_level(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    DirectoryConfig::load_from_file(path)
        .ok()
        .map(|config| config.logging.level)
}

fn run(cli: Cli, config_path: &Path) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output).map(|()| ExitCode::SUCCESS),
        Commands::Validate => cmd_validate(config_path).map(|()| ExitCode::SUCCESS),
        command => {
            let config = load_config(config_path, cli.config.is_some(), cli.policy_file)?;
            let dir = Directory::from_config(config);

            match command {
                Commands::Users => Ok(print_reports(&[Harness::new(&dir).users()])),
                Commands::Groups => Ok(print_reports(&[Harness::new(&dir).groups()])),
                Commands::Shadow => Ok(print_reports(&[Harness::new(&dir).shadow()])),
                Commands::Errors => Ok(print_reports(&[Harness::new(&dir).errors()])),
                Commands::Idempotency => {
                    Ok(print_reports(&[Harness::new(&dir).idempotency()]))
                }
                Commands::Check => cmd_check(&dir),
                Commands::List { database, format } => {
                    cmd_list(&dir, database, format).map(|()| ExitCode::SUCCESS)
                }
                Commands::Lookup { target } => {
                    cmd_lookup(&dir, target).map(|()| ExitCode::SUCCESS)
                }
                Commands::Init { .. } | Commands::Validate => Ok(ExitCode::SUCCESS),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the configuration. An explicitly named file must exist; the default
/// location may be absent.
fn load_config(
    path: &Path,
    explicit: bool,
    policy_file: Option<PathBuf>,
) -> Result<DirectoryConfig> {
    let mut config = if explicit {
        DirectoryConfig::load_from_file(path).context("failed to load configuration file")?
    } else {
        DirectoryConfig::load_or_default(path).context("failed to load configuration file")?
    };

    if let Some(file) = policy_file {
        debug!(file = %file.display(), "policy file overridden on the command line");
        config.policy.file = file;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"# loginpolicy configuration
# Every section and key is optional; the values below are the defaults.

[policy]
file = "/var/lib/loginpolicy/login_policy"

[accounts]
password_placeholder = "x"
home_base = "/home"
shell = "/bin/bash"

[shadow]
password_placeholder = "*"

[groups]
password_placeholder = "x"
all_users_name = "loginpolicy"
all_users_gid = 10000
superusers_name = "loginpolicy_sudo"
superusers_gid = 10001

[logging]
level = "warn"
# file = "/var/log/loginpolicy/nss.log"
"#;

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Point [policy] file at your login policy file");
    println!(
        "  2. Validate with: loginpolicy validate --config {}",
        output.display()
    );
    println!(
        "  3. Install it as {} (or set $LOGINPOLICY_CONFIG)",
        DEFAULT_CONFIG_PATH
    );
    println!("  4. Run the checks: loginpolicy check");

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        DirectoryConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let policy = &config.policy.file;
    let policy_state = if policy.is_file() {
        "present"
    } else {
        "NOT FOUND"
    };

    println!();
    println!("Configuration summary:");
    println!("  Policy file   : {} ({})", policy.display(), policy_state);
    println!("  Home base     : {}", config.accounts.home_base.display());
    println!("  Shell         : {}", config.accounts.shell);
    println!(
        "  All users     : {} (gid {})",
        config.groups.all_users_name, config.groups.all_users_gid
    );
    println!(
        "  Superusers    : {} (gid {})",
        config.groups.superusers_name, config.groups.superusers_gid
    );
    println!("  Log level     : {}", config.logging.level);
    println!(
        "  Log file      : {}",
        config
            .logging
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not set".to_string())
    );

    if policy.is_file() {
        let dir = Directory::from_config(config.clone());
        let universe = dir.materialize().context("failed to read policy file")?;
        println!("  Login names   : {}", universe.all_users().members.len());
        println!(
            "  Superuser names: {}",
            universe.superusers().members.len()
        );
    } else {
        println!();
        println!(
            "{}",
            style::warn("Policy file does not exist yet; lookups will report unavailable")
        );
    }

    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn print_report(report: &CheckReport) {
    let summary = format!("{}: {} checked", report.name, report.checked);
    if report.passed() {
        println!("{}", style::success(&summary));
    } else {
        println!(
            "{}",
            style::error(&format!("{}, {} failed", summary, report.errors()))
        );
        for failure in &report.failures {
            println!("    {}", style::dim(failure));
        }
    }
}

fn print_reports(reports: &[CheckReport]) -> ExitCode {
    for report in reports {
        print_report(report);
    }
    if harness::total_errors(reports) == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn cmd_check(dir: &Directory<FileSource>) -> Result<ExitCode> {
    println!("{}", style::header(&format!("Checking {}", dir.source().describe())));
    println!();

    let reports = Harness::new(dir).check();
    let code = print_reports(&reports);

    println!();
    println!("total_errors={}", harness::total_errors(&reports));
    Ok(code)
}

fn cmd_list(
    dir: &Directory<FileSource>,
    database: DatabaseKind,
    format: OutputFormat,
) -> Result<()> {
    let rendered = match database {
        DatabaseKind::Users => {
            output::render(&harness::accounts(dir).context("failed to list users")?, format)
        }
        DatabaseKind::Groups => {
            output::render(&harness::groups(dir).context("failed to list groups")?, format)
        }
        DatabaseKind::Shadow => {
            output::render(&harness::shadow(dir).context("failed to list shadow")?, format)
        }
    }?;

    if !rendered.is_empty() {
        println!("{}", rendered);
    }
    Ok(())
}

fn cmd_lookup(dir: &Directory<FileSource>, target: LookupTarget) -> Result<()> {
    let (kind, key, result) = match target {
        LookupTarget::User { key } => {
            let result = match key.parse::<u32>() {
                Ok(uid) => with_growing_buffer(|buf| {
                    dir.find_account_by_id(uid, buf).map(|e| e.to_account().to_string())
                }),
                Err(_) => with_growing_buffer(|buf| {
                    dir.find_account_by_name(&key, buf)
                        .map(|e| e.to_account().to_string())
                }),
            };
            ("user", key, result)
        }
        LookupTarget::Group { key } => {
            let result = match key.parse::<u32>() {
                Ok(gid) => with_growing_buffer(|buf| {
                    dir.find_group_by_id(gid, buf)
                        .map(|e| e.to_group_record().to_string())
                }),
                Err(_) => with_growing_buffer(|buf| {
                    dir.find_group_by_name(&key, buf)
                        .map(|e| e.to_group_record().to_string())
                }),
            };
            ("group", key, result)
        }
        LookupTarget::Shadow { name } => {
            let result = with_growing_buffer(|buf| {
                dir.find_shadow_by_name(&name, buf)
                    .map(|e| e.to_status().to_string())
            });
            ("shadow entry", name, result)
        }
    };

    match result {
        Ok(line) => {
            println!("{}", line);
            Ok(())
        }
        Err(LookupError::NotFound) => anyhow::bail!("no {} matches '{}'", kind, key),
        Err(err) => Err(err).with_context(|| format!("{} lookup for '{}' failed", kind, key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("loginpolicy.toml");
        cmd_init(&path).unwrap();

        let written = DirectoryConfig::load_from_file(&path).unwrap();
        written.validate().unwrap();
        let defaults = DirectoryConfig::default();
        assert_eq!(written.policy.file, defaults.policy.file);
        assert_eq!(written.groups.all_users_gid, defaults.groups.all_users_gid);
        assert_eq!(written.groups.superusers_name, defaults.groups.superusers_name);
        assert_eq!(written.accounts.shell, defaults.accounts.shell);
        assert_eq!(written.logging.file, None);
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("loginpolicy.toml");
        std::fs::write(&path, "# keep me\n").unwrap();

        assert!(cmd_init(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# keep me\n");
    }

    #[test]
    fn test_load_config_policy_override() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent.toml");

        let config = load_config(&missing, false, Some("/tmp/policy".into())).unwrap();
        assert_eq!(config.policy.file, PathBuf::from("/tmp/policy"));

        assert!(load_config(&missing, true, None).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "loginpolicy",
            "--policy-file",
            "/tmp/policy",
            "list",
            "groups",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.policy_file, Some(PathBuf::from("/tmp/policy")));
        assert!(matches!(
            cli.command,
            Commands::List {
                database: DatabaseKind::Groups,
                format: OutputFormat::Json
            }
        ));

        let cli = Cli::try_parse_from(["loginpolicy", "lookup", "user", "51000"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Lookup {
                target: LookupTarget::User { .. }
            }
        ));
    }
}

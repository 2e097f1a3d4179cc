//! Terminal styling for harness reports.

use console::Style;

/// Green check mark, then the message.
pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

/// Red cross, then the message.
pub fn error(msg: &str) -> String {
    format!("{} {}", Style::new().red().apply_to("✗"), msg)
}

/// Yellow warning sign, then the message.
pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

/// Bold section title for a check run.
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// Dimmed detail line, used for individual check failures.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

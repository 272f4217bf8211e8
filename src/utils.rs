use colored::Colorize;

use crate::claim::{ClaimResult, ClaimStatus};

/// Format a claimed amount with color
pub fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount).yellow().to_string()
}

/// Colored status label for a claim result
pub fn format_status(status: ClaimStatus) -> String {
    match status {
        ClaimStatus::Claimed => status.as_str().green().to_string(),
        ClaimStatus::Failed => status.as_str().red().to_string(),
        ClaimStatus::Skipped => status.as_str().dimmed().to_string(),
    }
}

/// Error kind and reason only; never raw error chains
pub fn format_failure(result: &ClaimResult) -> String {
    match &result.error {
        Some(failure) => format!("{}: {}", failure.kind, truncate(&failure.reason, 60)),
        None => String::new(),
    }
}

/// Shorten text for table display
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format timestamp in human-readable format
pub fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}

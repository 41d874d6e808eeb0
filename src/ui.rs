use colored::Colorize;
use dsckit::{InvocationResult, Package};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print one package's drained output, channel by channel
pub fn package_result(package: &Package, result: &InvocationResult) {
    let status = if result.had_errors {
        "✗".red()
    } else {
        "✓".green()
    };
    println!();
    println!("{} {}", status, package.to_string().bold());
    print!("{}", format_sections(result));
}

/// Render the non-empty channels of a result as labeled blocks.
///
/// Channel text is already one tab-indented line per entry.
pub fn format_sections(result: &InvocationResult) -> String {
    let mut out = String::new();
    for (label, text) in result.sections() {
        out.push_str(&format!("  {label}:\n"));
        out.push_str(text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sections_in_channel_order() {
        let result = InvocationResult {
            error: "\tboom\n".to_string(),
            verbose: "\tone\n\ttwo\n".to_string(),
            ..Default::default()
        };
        assert_eq!(
            format_sections(&result),
            "  Verbose:\n\tone\n\ttwo\n  Error:\n\tboom\n"
        );
    }

    #[test]
    fn test_format_sections_empty() {
        assert_eq!(format_sections(&InvocationResult::default()), "");
    }
}

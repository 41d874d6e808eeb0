use anyhow::Result;
use colored::Colorize;
use dsckit::env::PATH_DELIMITER;
use dsckit::session::{helper_module_path, module_directory};
use std::path::Path;

use crate::Context;
use crate::config::{self, DscrunConfig};
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
}

pub fn run(_ctx: &Context) -> Result<()> {
    ui::header("dscrun Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    let config = check_config(&mut issues);
    check_engine(&config, &mut issues);
    check_modules(&config, &mut issues);
    check_search_path(&config, &mut issues);

    println!();
    if issues.is_empty() {
        ui::success("Ready to apply manifests");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        println!();
    }
}

fn ok_line(name: &str, desc: &str) {
    println!("  {} {} - {}", "✓".green(), name, desc.dimmed());
}

fn missing_line(name: &str, desc: &str) {
    println!("  {} {} - {} {}", "✗".red(), name, desc, "(missing)".red());
}

fn check_config(issues: &mut Vec<Issue>) -> DscrunConfig {
    ui::section("Configuration");

    let path = match config::config_path() {
        Ok(p) => p,
        Err(e) => {
            ui::error("Could not determine config directory");
            issues.push(Issue {
                category: "Configuration",
                summary: "Could not determine config directory".into(),
                detail: Some(format!("{e:#}")),
                fix: Some(format!("Set {}", crate::paths::ENV_CONFIG_DIR)),
            });
            return DscrunConfig::default();
        }
    };

    match DscrunConfig::load_from(&path) {
        Ok(Some(cfg)) => {
            ok_line(&path.display().to_string(), "loaded");
            cfg
        }
        Ok(None) => {
            ok_line(&path.display().to_string(), "not present, using defaults");
            DscrunConfig::default()
        }
        Err(e) => {
            println!(
                "  {} {} {}",
                "⚠".yellow(),
                path.display(),
                "(parse error)".yellow()
            );
            issues.push(Issue {
                category: "Configuration",
                summary: format!("{} has invalid format", config::CONFIG_FILE),
                detail: Some(format!("{e:#}")),
                fix: Some(format!("Edit {} and fix the issue", path.display())),
            });
            DscrunConfig::default()
        }
    }
}

fn check_engine(config: &DscrunConfig, issues: &mut Vec<Issue>) {
    ui::section("Engine");

    let executable = &config.engine.executable;
    match which::which(executable) {
        Ok(path) => ok_line(executable, &path.display().to_string()),
        Err(e) => {
            missing_line(executable, "PowerShell 7");
            issues.push(Issue {
                category: "Engine",
                summary: format!("{executable} was not found"),
                detail: Some(e.to_string()),
                fix: Some(
                    "Install PowerShell 7 or set engine.executable in dscrun.toml".to_string(),
                ),
            });
        }
    }
}

fn check_modules(config: &DscrunConfig, issues: &mut Vec<Issue>) {
    ui::section("Modules");

    let modules = module_directory(&config.engine.module_subpath);
    if modules.is_dir() {
        ok_line(&modules.display().to_string(), "module directory");
    } else {
        missing_line(&modules.display().to_string(), "module directory");
        issues.push(Issue {
            category: "Modules",
            summary: "Module directory does not exist".into(),
            detail: Some(modules.display().to_string()),
            fix: Some(format!(
                "Install the modules next to the dscrun executable under {}",
                config.engine.module_subpath.display()
            )),
        });
        return;
    }

    if let Some(helper) = helper_module_path(&modules, &config.engine.helper_module) {
        if helper.is_file() {
            ok_line(&config.engine.helper_module, "helper module");
        } else {
            missing_line(&config.engine.helper_module, "helper module");
            issues.push(Issue {
                category: "Modules",
                summary: format!("Helper module {} is missing", config.engine.helper_module),
                detail: Some(helper.display().to_string()),
                fix: None,
            });
        }
    }

    let resource = modules.join(&config.engine.resource);
    if resource.is_dir() {
        ok_line(&config.engine.resource, "DSC resource module");
    } else {
        missing_line(&config.engine.resource, "DSC resource module");
        issues.push(Issue {
            category: "Modules",
            summary: format!("Resource module {} is missing", config.engine.resource),
            detail: Some(resource.display().to_string()),
            fix: None,
        });
    }
}

fn check_search_path(config: &DscrunConfig, issues: &mut Vec<Issue>) {
    ui::section("Search Path");

    let variable = &config.engine.search_path_variable;
    if let Some(issue) = delimiter_issue(variable, cfg!(windows)) {
        println!("  {} {} {}", "⚠".yellow(), variable, "(delimiter)".yellow());
        issues.push(issue);
    }
    let modules = module_directory(&config.engine.module_subpath);
    let current = std::env::var(variable).unwrap_or_default();

    for entry in current.split(PATH_DELIMITER).filter(|e| !e.is_empty()) {
        ui::dim(entry);
    }

    if search_path_contains(&current, &modules) {
        ok_line(variable, "includes the module directory");
    } else {
        // The session appends it before starting the engine.
        ui::info(&format!(
            "{variable} will be extended with {} at session start",
            modules.display()
        ));
    }
}

/// Search path entries are joined with `;`, which only Windows PowerShell reads.
fn delimiter_issue(variable: &str, windows: bool) -> Option<Issue> {
    if windows {
        return None;
    }
    Some(Issue {
        category: "Search Path",
        summary: format!("{variable} is extended with '{PATH_DELIMITER}' separators"),
        detail: Some("PowerShell on Linux and macOS separates entries with ':'".to_string()),
        fix: Some("Run dscrun on Windows".to_string()),
    })
}

/// Whether `dir` appears as an entry of a `;`-separated search path.
fn search_path_contains(value: &str, dir: &Path) -> bool {
    let dir = dir.to_string_lossy();
    value
        .split(PATH_DELIMITER)
        .any(|entry| entry.trim_end_matches(['/', '\\']) == dir.trim_end_matches(['/', '\\']))
}

use anyhow::{Context as _, Result};
use colored::Colorize;
use dialoguer::Confirm;
use dsckit::backend::scripted::{RecordedCall, ScriptedEngine};
use dsckit::{
    DscMethod, EnvProvider, FailurePolicy, InvocationOutcome, Invoker, Manifest, MemoryEnv,
    ProcessEnv, SessionHost, ensure_module_search_path,
};
use dsckit::session::{helper_module_path, module_directory};
use std::path::Path;

use crate::Context;
use crate::cli::{ApplyArgs, RunArgs};
use crate::config::DscrunConfig;
use crate::progress::PackageProgress;
use crate::ui;

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let config = DscrunConfig::load()?.config;

    if args.delegate {
        return delegate(ctx, &config, &args.manifest, args.yes);
    }

    let invoker = invoker_for(&config, DscMethod::Set, args.continue_on_error);

    if args.dry_run {
        let manifest = dsckit::manifest::load(&args.manifest)?;
        return dry_run(&config, &manifest, &invoker);
    }

    run_file(ctx, &args.manifest, &invoker, !args.yes, || {
        SessionHost::create(&config.engine, &ProcessEnv)
    })
}

pub fn test(ctx: &Context, args: RunArgs) -> Result<()> {
    run_read_only(ctx, args, DscMethod::Test)
}

pub fn get(ctx: &Context, args: RunArgs) -> Result<()> {
    run_read_only(ctx, args, DscMethod::Get)
}

fn run_read_only(ctx: &Context, args: RunArgs, method: DscMethod) -> Result<()> {
    let config = DscrunConfig::load()?.config;
    let invoker = invoker_for(&config, method, args.continue_on_error);

    run_file(ctx, &args.manifest, &invoker, false, || {
        SessionHost::create(&config.engine, &ProcessEnv)
    })
}

/// Load the manifest at `path` and run it. `open_session` is only called
/// once the manifest parsed and holds at least one package.
fn run_file<F>(
    ctx: &Context,
    path: &Path,
    invoker: &Invoker,
    confirm: bool,
    open_session: F,
) -> Result<()>
where
    F: FnOnce() -> dsckit::Result<SessionHost>,
{
    let manifest = dsckit::manifest::load(path)?;

    print_plan(&manifest, invoker.method());
    if manifest.is_empty() {
        ui::info("Manifest has no packages");
        return Ok(());
    }

    if confirm && !confirm_proceed(&manifest)? {
        ui::info("Cancelled");
        return Ok(());
    }

    run_manifest(ctx, &manifest, invoker, open_session)
}

fn invoker_for(config: &DscrunConfig, method: DscMethod, continue_on_error: bool) -> Invoker {
    let policy = if continue_on_error {
        FailurePolicy::Continue
    } else {
        config.apply.policy
    };
    Invoker::from_config(&config.engine)
        .with_method(method)
        .with_policy(policy)
}

fn print_plan(manifest: &Manifest, method: DscMethod) {
    let count = manifest.len();
    let label = if count == 1 { "package" } else { "packages" };
    ui::header(&format!("{method}: {count} {label}"));
    for package in &manifest.packages {
        println!("  {} {}", "•".dimmed(), package);
    }
}

fn confirm_proceed(manifest: &Manifest) -> Result<bool> {
    println!();
    Confirm::new()
        .with_prompt(format!("Apply {} package(s)?", manifest.len()))
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

fn run_manifest<F>(
    ctx: &Context,
    manifest: &Manifest,
    invoker: &Invoker,
    open_session: F,
) -> Result<()>
where
    F: FnOnce() -> dsckit::Result<SessionHost>,
{
    let mut session = open_session()?;
    let mut progress = PackageProgress::new(invoker.method(), ctx.quiet);

    let applied = invoker.apply_with_callback(manifest, &mut session, &mut progress);
    drop(progress);
    let closed = session.close();
    let outcome = applied?;
    closed.context("Failed to release the engine session")?;

    print_report(manifest, &outcome);
    outcome.into_result()?;
    Ok(())
}

fn print_report(manifest: &Manifest, outcome: &InvocationOutcome) {
    ui::section("Results");
    for entry in &outcome.results {
        ui::package_result(&entry.package, &entry.result);
    }

    println!();
    let failed = outcome.failures().count();
    let invoked = outcome.results.len();
    if outcome.success {
        ui::success(&format!("{invoked} package(s) completed"));
    } else {
        ui::warn(&format!("{failed} of {invoked} invoked package(s) reported errors"));
    }
    if outcome.stopped_at.is_some() && invoked < manifest.len() {
        ui::dim(&format!(
            "Stopped early; {} package(s) not invoked (use --continue-on-error to run all)",
            manifest.len() - invoked
        ));
    }
}

fn delegate(ctx: &Context, config: &DscrunConfig, path: &Path, yes: bool) -> Result<()> {
    if !path.is_file() {
        return Err(dsckit::Error::NotFound(path.to_path_buf()).into());
    }
    ui::header("Delegating to Start-WinDSC");
    ui::kv("Input file", &path.display().to_string());

    if !yes {
        println!();
        let confirmed = Confirm::new()
            .with_prompt("Hand this file to the helper module?")
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Cancelled");
            return Ok(());
        }
    }

    let mut session = SessionHost::create(&config.engine, &ProcessEnv)?;
    let pb = if ctx.quiet {
        indicatif::ProgressBar::hidden()
    } else {
        crate::progress::spinner("Start-WinDSC")
    };
    let invoker = Invoker::from_config(&config.engine);
    let delegated = invoker.delegate_file(path, &mut session);
    pb.finish_and_clear();
    let closed = session.close();
    let result = delegated?;
    closed.context("Failed to release the engine session")?;

    print!("{}", ui::format_sections(&result));
    if result.had_errors {
        return Err(dsckit::Error::InvocationFailed {
            package: path.display().to_string(),
            version: "(Start-WinDSC)".to_string(),
            message: result.error,
        }
        .into());
    }
    ui::success("Delegated run completed");
    Ok(())
}

/// Run the manifest against the scripted engine and print each call.
fn dry_run(config: &DscrunConfig, manifest: &Manifest, invoker: &Invoker) -> Result<()> {
    ui::header("Dry run");

    let variable = &config.engine.search_path_variable;
    let env = match std::env::var(variable) {
        Ok(current) => MemoryEnv::with_var(variable, &current),
        Err(_) => MemoryEnv::new(),
    };
    let modules = module_directory(&config.engine.module_subpath);
    ensure_module_search_path(&env, variable, &modules.to_string_lossy());
    ui::kv(variable, &env.get(variable).unwrap_or_default());
    if let Some(helper) = helper_module_path(&modules, &config.engine.helper_module) {
        ui::kv("Helper module", &helper.display().to_string());
    }

    let engine = ScriptedEngine::new();
    let log = engine.log();
    let mut session = SessionHost::open(Box::new(engine))?;
    invoker.apply(manifest, &mut session)?;
    session.close()?;

    let calls = log.calls();
    ui::section(&format!("{} invocation(s) would be issued", calls.len()));
    for (i, call) in calls.iter().enumerate() {
        println!("  {} {}", format!("{}.", i + 1).bold(), describe_call(call)?);
    }
    Ok(())
}

fn describe_call(call: &RecordedCall) -> Result<String> {
    let arguments =
        serde_json::to_string(&call.arguments).context("Failed to render arguments")?;
    Ok(format!("{} {}", call.command, arguments))
}

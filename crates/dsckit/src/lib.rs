//! # dsckit
//!
//! Apply a JSON package manifest through a PowerShell DSC resource.
//!
//! This crate provides functionality for:
//! - Loading, validating and saving package manifests
//! - Bootstrapping the module search path the engine resolves resources from
//! - Hosting one long-lived engine session with deterministic release
//! - Invoking the DSC resource once per package and collecting its output
//!
//! ## Example
//!
//! ```no_run
//! use dsckit::{EngineConfig, Invoker, ProcessEnv, SessionHost};
//! use std::path::Path;
//!
//! let manifest = dsckit::manifest::load(Path::new("packages.json")).expect("Invalid manifest");
//!
//! let config = EngineConfig::default();
//! let mut session = SessionHost::create(&config, &ProcessEnv).expect("Engine unavailable");
//!
//! let outcome = Invoker::from_config(&config)
//!     .apply(&manifest, &mut session)
//!     .expect("Invocation failed");
//! for entry in &outcome.results {
//!     for (label, text) in entry.result.sections() {
//!         print!("{}: {label}\n{text}", entry.package);
//!     }
//! }
//! session.close().expect("Failed to release session");
//! ```
//!
//! ## Testing
//!
//! [`backend::scripted::ScriptedEngine`] stands in for `pwsh` and records
//! every command it receives:
//!
//! ```
//! use dsckit::backend::scripted::{ScriptedEngine, ScriptedResponse};
//! use dsckit::{Channel, Invoker, Manifest, Package, SessionHost};
//!
//! let engine = ScriptedEngine::new()
//!     .respond(ScriptedResponse::ok().line(Channel::Verbose, "installed"));
//! let log = engine.log();
//! let mut session = SessionHost::open(Box::new(engine)).unwrap();
//!
//! let manifest = Manifest::new(vec![Package::new("test.test", "1.0").unwrap()]);
//! let outcome = Invoker::default().apply(&manifest, &mut session).unwrap();
//! session.close().unwrap();
//!
//! assert!(outcome.success);
//! assert_eq!(outcome.results[0].result.verbose, "\tinstalled\n");
//! assert_eq!(log.calls()[0].command, "Invoke-DscResource");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod env;
pub mod error;
pub mod invoker;
pub mod manifest;
pub mod session;
pub mod streams;
pub mod types;

pub use env::{EnvProvider, MemoryEnv, ProcessEnv, ensure_module_search_path};
pub use error::{Error, ErrorCategory, Result};
pub use invoker::{InvokeCallback, Invoker};
pub use session::SessionHost;
pub use streams::{RawOutput, drain};
pub use types::{
    Channel, DscMethod, EngineConfig, FailurePolicy, InvocationOutcome, InvocationResult,
    Manifest, NamedArguments, Package, PackageOutcome,
};

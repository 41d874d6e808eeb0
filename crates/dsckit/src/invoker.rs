//! Drives one DSC resource invocation per manifest entry.

use std::path::Path;

use crate::error::{Error, Result};
use crate::session::SessionHost;
use crate::streams::drain;
use crate::types::{
    DscMethod, EngineConfig, FailurePolicy, InvocationOutcome, InvocationResult, Manifest,
    NamedArguments, Package, PackageOutcome,
};

/// Command that runs a DSC resource method.
pub const INVOKE_DSC_RESOURCE: &str = "Invoke-DscResource";

/// Helper module entry point that applies a whole manifest file itself.
pub const START_WINDSC: &str = "Start-WinDSC";

/// Observer for per-package progress.
pub trait InvokeCallback {
    /// Called before a package is invoked.
    fn on_package_start(&mut self, index: usize, total: usize, package: &Package);

    /// Called after a package's output was drained.
    fn on_package_complete(&mut self, index: usize, package: &Package, result: &InvocationResult);
}

/// No-op callback.
pub struct NoCallback;

impl InvokeCallback for NoCallback {
    fn on_package_start(&mut self, _index: usize, _total: usize, _package: &Package) {}
    fn on_package_complete(
        &mut self,
        _index: usize,
        _package: &Package,
        _result: &InvocationResult,
    ) {
    }
}

/// Applies manifests through a session.
#[derive(Debug, Clone)]
pub struct Invoker {
    resource: String,
    method: DscMethod,
    policy: FailurePolicy,
}

impl Invoker {
    /// Create an invoker for a DSC resource registration name.
    pub fn new(resource: impl Into<String>, method: DscMethod, policy: FailurePolicy) -> Self {
        Self {
            resource: resource.into(),
            method,
            policy,
        }
    }

    /// Invoker for the configured resource with `Set` and fail-fast.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.resource, DscMethod::Set, FailurePolicy::FailFast)
    }

    /// Use a different method.
    pub fn with_method(mut self, method: DscMethod) -> Self {
        self.method = method;
        self
    }

    /// Use a different failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Method this invoker calls.
    pub fn method(&self) -> DscMethod {
        self.method
    }

    /// Failure policy in effect.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Arguments for one package's invocation.
    pub fn arguments_for(&self, package: &Package) -> NamedArguments {
        NamedArguments::new()
            .text("Name", &self.resource)
            .text("ModuleName", &self.resource)
            .text("Method", self.method.as_str())
            .map("Property", package.properties())
    }

    /// Apply every package in manifest order.
    pub fn apply(&self, manifest: &Manifest, session: &mut SessionHost) -> Result<InvocationOutcome> {
        self.apply_with_callback(manifest, session, &mut NoCallback)
    }

    /// Apply every package, reporting progress to `callback`.
    ///
    /// With [`FailurePolicy::FailFast`] the run stops after the first package
    /// whose output reports errors. Engine transport errors always stop the
    /// run and are returned as `Err`.
    pub fn apply_with_callback<C: InvokeCallback>(
        &self,
        manifest: &Manifest,
        session: &mut SessionHost,
        callback: &mut C,
    ) -> Result<InvocationOutcome> {
        let total = manifest.len();
        let mut outcome = InvocationOutcome {
            results: Vec::with_capacity(total),
            success: true,
            stopped_at: None,
        };

        for (index, package) in manifest.packages.iter().enumerate() {
            log::info!(
                "[{}/{}] {} {}",
                index + 1,
                total,
                self.method,
                package
            );
            callback.on_package_start(index, total, package);

            let arguments = self.arguments_for(package);
            let result = drain(session.invoke(INVOKE_DSC_RESOURCE, &arguments)?);

            callback.on_package_complete(index, package, &result);
            let failed = result.had_errors;
            outcome.results.push(PackageOutcome {
                package: package.clone(),
                result,
            });

            if failed {
                outcome.success = false;
                log::warn!("{package} reported errors");
                if self.policy == FailurePolicy::FailFast {
                    outcome.stopped_at = Some(index);
                    if index + 1 < total {
                        log::info!("Stopping; {} package(s) not invoked", total - index - 1);
                    }
                    break;
                }
            }
        }

        Ok(outcome)
    }

    /// Hand a manifest file to the helper module's own entry point.
    pub fn delegate_file(&self, path: &Path, session: &mut SessionHost) -> Result<InvocationResult> {
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let arguments = NamedArguments::new().text("inputFile", path.to_string_lossy());
        log::info!("{START_WINDSC} {}", path.display());
        Ok(drain(session.invoke(START_WINDSC, &arguments)?))
    }
}

impl Default for Invoker {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::{ScriptedEngine, ScriptedLog, ScriptedResponse};
    use crate::manifest::parse_str;
    use crate::types::{ArgumentValue, Channel};

    fn session(engine: ScriptedEngine) -> (SessionHost, ScriptedLog) {
        let log = engine.log();
        (SessionHost::open(Box::new(engine)).unwrap(), log)
    }

    fn invoker() -> Invoker {
        Invoker::from_config(&EngineConfig::default())
    }

    fn two_packages() -> Manifest {
        parse_str(
            r#"{"packages":[
                {"packageIdentifier":"first.pkg","version":"1.0"},
                {"packageIdentifier":"second.pkg","version":"2.0"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_single_package_drives_one_invocation() {
        let manifest =
            parse_str(r#"{"packages":[{"packageIdentifier":"test.test","version":"1.0"}]}"#)
                .unwrap();
        let (mut host, log) = session(ScriptedEngine::new());

        let outcome = invoker().apply(&manifest, &mut host).unwrap();
        host.close().unwrap();

        assert!(outcome.success);
        let calls = log.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command, "Invoke-DscResource");

        let args = &calls[0].arguments;
        assert_eq!(
            args.get("Name").and_then(ArgumentValue::as_text),
            Some("WinDSCResourceDemo")
        );
        assert_eq!(
            args.get("ModuleName").and_then(ArgumentValue::as_text),
            Some("WinDSCResourceDemo")
        );
        assert_eq!(args.get("Method").and_then(ArgumentValue::as_text), Some("Set"));
        assert_eq!(
            args.get("Property").and_then(ArgumentValue::as_map),
            Some(
                &[
                    ("PackageIdentifier".to_string(), "test.test".to_string()),
                    ("Version".to_string(), "1.0".to_string()),
                ][..]
            )
        );
    }

    #[test]
    fn test_fail_fast_skips_remaining_packages() {
        let engine = ScriptedEngine::new()
            .respond(ScriptedResponse::failed("install failed"))
            .respond(ScriptedResponse::ok());
        let (mut host, log) = session(engine);

        let outcome = invoker().apply(&two_packages(), &mut host).unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.stopped_at, Some(0));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(log.calls().len(), 1);

        match outcome.into_result() {
            Err(Error::InvocationFailed { package, message, .. }) => {
                assert_eq!(package, "first.pkg");
                assert_eq!(message, "\tinstall failed\n");
            }
            other => panic!("expected InvocationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_continue_policy_invokes_everything() {
        let engine = ScriptedEngine::new()
            .respond(ScriptedResponse::failed("install failed"))
            .respond(ScriptedResponse::ok().line(Channel::Verbose, "installed"));
        let (mut host, log) = session(engine);

        let outcome = invoker()
            .with_policy(FailurePolicy::Continue)
            .apply(&two_packages(), &mut host)
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.stopped_at, None);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(log.calls().len(), 2);
        assert_eq!(outcome.results[1].result.verbose, "\tinstalled\n");
        assert_eq!(outcome.failures().count(), 1);
    }

    #[test]
    fn test_each_package_gets_its_own_result() {
        let engine = ScriptedEngine::new()
            .respond(ScriptedResponse::ok().line(Channel::Information, "one"))
            .respond(ScriptedResponse::ok().line(Channel::Information, "two"));
        let (mut host, _log) = session(engine);

        let outcome = invoker().apply(&two_packages(), &mut host).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.results[0].result.information, "\tone\n");
        assert_eq!(outcome.results[1].result.information, "\ttwo\n");
    }

    #[test]
    fn test_error_text_without_flag_is_not_failure() {
        let engine = ScriptedEngine::new()
            .respond(ScriptedResponse::ok().line(Channel::Error, "non-terminating"));
        let (mut host, log) = session(engine);

        let outcome = invoker().apply(&two_packages(), &mut host).unwrap();
        assert!(outcome.success);
        assert_eq!(log.calls().len(), 2);
    }

    #[test]
    fn test_empty_manifest_invokes_nothing() {
        let (mut host, log) = session(ScriptedEngine::new());
        let outcome = invoker().apply(&Manifest::default(), &mut host).unwrap();
        assert!(outcome.success);
        assert!(outcome.results.is_empty());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_method_is_configurable() {
        let (mut host, log) = session(ScriptedEngine::new());
        invoker()
            .with_method(DscMethod::Test)
            .apply(&two_packages(), &mut host)
            .unwrap();
        let calls = log.calls();
        assert!(calls.iter().all(|c| {
            c.arguments.get("Method").and_then(ArgumentValue::as_text) == Some("Test")
        }));
    }

    #[test]
    fn test_closed_session_propagates_error() {
        let (mut host, _log) = session(ScriptedEngine::new());
        host.close().unwrap();
        let err = invoker().apply(&two_packages(), &mut host).unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[test]
    fn test_callback_sees_every_package() {
        struct Recorder(Vec<String>);
        impl InvokeCallback for Recorder {
            fn on_package_start(&mut self, index: usize, total: usize, package: &Package) {
                self.0.push(format!("start {index}/{total} {package}"));
            }
            fn on_package_complete(
                &mut self,
                index: usize,
                _package: &Package,
                result: &InvocationResult,
            ) {
                self.0.push(format!("done {index} {}", result.had_errors));
            }
        }

        let (mut host, _log) = session(ScriptedEngine::new());
        let mut recorder = Recorder(Vec::new());
        invoker()
            .apply_with_callback(&two_packages(), &mut host, &mut recorder)
            .unwrap();

        assert_eq!(
            recorder.0,
            [
                "start 0/2 first.pkg 1.0",
                "done 0 false",
                "start 1/2 second.pkg 2.0",
                "done 1 false",
            ]
        );
    }

    #[test]
    fn test_delegate_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("packages.json");
        std::fs::write(&path, "{}").unwrap();

        let engine = ScriptedEngine::new()
            .respond(ScriptedResponse::ok().line(Channel::Verbose, "delegated"));
        let (mut host, log) = session(engine);

        let result = invoker().delegate_file(&path, &mut host).unwrap();
        assert_eq!(result.verbose, "\tdelegated\n");

        let calls = log.calls();
        let expected = path.to_string_lossy();
        assert_eq!(calls[0].command, "Start-WinDSC");
        assert_eq!(
            calls[0].arguments.get("inputFile").and_then(ArgumentValue::as_text),
            Some(&*expected)
        );
    }

    #[test]
    fn test_delegate_missing_file() {
        let (mut host, log) = session(ScriptedEngine::new());
        let err = invoker()
            .delegate_file(Path::new("/nonexistent/packages.json"), &mut host)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(log.calls().is_empty());
    }
}

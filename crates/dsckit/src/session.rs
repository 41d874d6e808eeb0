//! Session host: sole owner of the engine's execution context.
//!
//! A host is created once, used from one thread (`invoke` takes `&mut self`),
//! and released with [`SessionHost::close`]. Dropping an unclosed host still
//! releases the engine but logs it as a leak.

use std::path::{Path, PathBuf};

use crate::backend::Engine;
use crate::backend::pwsh::{PwshEngine, PwshOptions};
use crate::env::{EnvProvider, ensure_module_search_path};
use crate::error::{Error, Result};
use crate::streams::RawOutput;
use crate::types::{EngineConfig, NamedArguments};

/// Owner of one open engine.
pub struct SessionHost {
    engine: Option<Box<dyn Engine>>,
}

impl SessionHost {
    /// Bootstrap the module search path and open a `pwsh` session.
    pub fn create(config: &EngineConfig, env: &dyn EnvProvider) -> Result<Self> {
        let modules = module_directory(&config.module_subpath);
        ensure_module_search_path(
            env,
            &config.search_path_variable,
            &modules.to_string_lossy(),
        );

        let mut options = PwshOptions::new(&config.executable)
            .helper_module(helper_module_path(&modules, &config.helper_module));
        if let Some(value) = env.get(&config.search_path_variable) {
            options = options.env(&config.search_path_variable, value);
        }

        Self::open(Box::new(PwshEngine::new(options)))
    }

    /// Open a host over an already constructed engine.
    pub fn open(mut engine: Box<dyn Engine>) -> Result<Self> {
        log::debug!("Opening {} session", engine.name());
        engine.open().map_err(|e| match e {
            Error::EnvironmentSetupFailed { .. } => e,
            other => Error::setup(other.to_string()),
        })?;
        Ok(Self {
            engine: Some(engine),
        })
    }

    /// Run one command and return the engine's live output.
    ///
    /// Blocks until the engine finishes. The returned output should be
    /// drained before the next invocation.
    pub fn invoke(&mut self, command: &str, arguments: &NamedArguments) -> Result<&mut RawOutput> {
        let engine = self.engine.as_mut().ok_or(Error::SessionClosed)?;
        log::debug!("{} {} ({} argument(s))", engine.name(), command, arguments.len());
        engine.invoke(command, arguments)?;
        Ok(engine.output())
    }

    /// Whether the host still owns an open engine.
    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    /// Release the engine. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(mut engine) => {
                log::debug!("Closing {} session", engine.name());
                engine.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionHost {
    fn drop(&mut self) {
        if self.engine.is_some() {
            log::warn!("Session dropped without close(); releasing engine");
            if let Err(e) = self.close() {
                log::warn!("Failed to release engine: {e}");
            }
        }
    }
}

/// Module directory: the executable's directory joined with `subpath`.
///
/// Falls back to the bare relative `subpath` when the executable location is
/// unknown.
pub fn module_directory(subpath: &Path) -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|dir| dir.join(subpath))
        .unwrap_or_else(|| subpath.to_path_buf())
}

/// `<modules>/<name>/<name>.psm1`, or `None` when no helper is configured.
pub fn helper_module_path(modules: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    Some(modules.join(name).join(format!("{name}.psm1")))
}

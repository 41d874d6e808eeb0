//! Module search path bootstrapping.
//!
//! The engine finds the helper and resource modules through a `;`-separated
//! search path variable. Access goes through [`EnvProvider`] so tests never
//! touch the real process environment.
//!
//! Only the Windows delimiter is supported. PowerShell on Linux and macOS
//! separates entries with `:`, so a path extended there is not searchable.

use std::collections::HashMap;
use std::sync::Mutex;

/// Default search path variable read by PowerShell.
pub const MODULE_PATH_VARIABLE: &str = "PSModulePath";

/// Separator between search path entries.
pub const PATH_DELIMITER: char = ';';

/// Read/write access to environment variables.
pub trait EnvProvider: Send + Sync {
    /// Get a variable, `None` when unset.
    fn get(&self, name: &str) -> Option<String>;

    /// Set a variable.
    fn set(&self, name: &str, value: &str);
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn set(&self, name: &str, value: &str) {
        // SAFETY: the orchestrator is single-threaded; the variable is set
        // before the engine process is spawned and nothing reads the
        // environment concurrently.
        unsafe { std::env::set_var(name, value) };
    }
}

/// In-memory environment, for tests and dry runs.
#[derive(Default)]
pub struct MemoryEnv {
    vars: Mutex<HashMap<String, String>>,
}

impl MemoryEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment with one variable set.
    pub fn with_var(name: &str, value: &str) -> Self {
        let env = Self::new();
        env.set(name, value);
        env
    }
}

impl EnvProvider for MemoryEnv {
    fn get(&self, name: &str) -> Option<String> {
        match self.vars.lock() {
            Ok(vars) => vars.get(name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned(),
        }
    }

    fn set(&self, name: &str, value: &str) {
        match self.vars.lock() {
            Ok(mut vars) => vars.insert(name.to_string(), value.to_string()),
            Err(poisoned) => poisoned
                .into_inner()
                .insert(name.to_string(), value.to_string()),
        };
    }
}

/// Make sure `path` is part of the search path held in `variable`.
///
/// Unset variables are set to `path`; otherwise `;path` is appended unless the
/// current value already contains `path`. Calling this repeatedly has the same
/// effect as calling it once.
pub fn ensure_module_search_path(env: &dyn EnvProvider, variable: &str, path: &str) {
    match env.get(variable) {
        None => {
            log::debug!("Setting {variable} to {path}");
            env.set(variable, path);
        }
        Some(current) if current.contains(path) => {
            log::trace!("{variable} already contains {path}");
        }
        Some(current) => {
            let updated = format!("{current}{PATH_DELIMITER}{path}");
            log::debug!("Appending {path} to {variable}");
            env.set(variable, &updated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sets_absent_variable() {
        let env = MemoryEnv::new();
        ensure_module_search_path(&env, MODULE_PATH_VARIABLE, r"C:\app\PowerShell\Modules");
        assert_eq!(
            env.get(MODULE_PATH_VARIABLE).as_deref(),
            Some(r"C:\app\PowerShell\Modules")
        );
    }

    #[test]
    fn test_appends_to_existing_value() {
        let env = MemoryEnv::with_var(MODULE_PATH_VARIABLE, r"C:\Windows\Modules");
        ensure_module_search_path(&env, MODULE_PATH_VARIABLE, r"C:\app\Modules");
        assert_eq!(
            env.get(MODULE_PATH_VARIABLE).as_deref(),
            Some(r"C:\Windows\Modules;C:\app\Modules")
        );
    }

    #[test]
    fn test_idempotent() {
        let env = MemoryEnv::with_var(MODULE_PATH_VARIABLE, "/usr/share/modules");
        ensure_module_search_path(&env, MODULE_PATH_VARIABLE, "/opt/app/Modules");
        let first = env.get(MODULE_PATH_VARIABLE);
        ensure_module_search_path(&env, MODULE_PATH_VARIABLE, "/opt/app/Modules");
        ensure_module_search_path(&env, MODULE_PATH_VARIABLE, "/opt/app/Modules");
        assert_eq!(env.get(MODULE_PATH_VARIABLE), first);
    }

    #[test]
    fn test_idempotent_from_unset() {
        let env = MemoryEnv::new();
        ensure_module_search_path(&env, "CUSTOM_PATH", "/a");
        ensure_module_search_path(&env, "CUSTOM_PATH", "/a");
        assert_eq!(env.get("CUSTOM_PATH").as_deref(), Some("/a"));
    }

    #[test]
    fn test_substring_match_counts_as_present() {
        let env = MemoryEnv::with_var(MODULE_PATH_VARIABLE, "/opt/app/Modules/extra");
        ensure_module_search_path(&env, MODULE_PATH_VARIABLE, "/opt/app/Modules");
        assert_eq!(
            env.get(MODULE_PATH_VARIABLE).as_deref(),
            Some("/opt/app/Modules/extra")
        );
    }
}

//! Core types for DSC package orchestration.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Property name carrying the package identifier in the resource property bag.
pub const PROPERTY_PACKAGE_IDENTIFIER: &str = "PackageIdentifier";

/// Property name carrying the version in the resource property bag.
pub const PROPERTY_VERSION: &str = "Version";

/// A desired package state.
///
/// Fields are public so callers can edit a loaded manifest; the non-empty
/// invariant is re-checked before every serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package identifier (e.g., "Microsoft.PowerToys")
    pub package_identifier: String,
    /// Desired version
    pub version: String,
}

impl Package {
    /// Create a package, rejecting empty fields.
    pub fn new(package_identifier: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let package = Self {
            package_identifier: package_identifier.into(),
            version: version.into(),
        };
        package.validate()?;
        Ok(package)
    }

    /// Check the non-empty invariant.
    pub fn validate(&self) -> Result<()> {
        if self.package_identifier.is_empty() {
            return Err(Error::invalid("packageIdentifier is missing or empty"));
        }
        if self.version.is_empty() {
            return Err(Error::invalid(format!(
                "version is missing or empty for {}",
                self.package_identifier
            )));
        }
        Ok(())
    }

    /// Property bag handed to the DSC resource, in declaration order.
    pub fn properties(&self) -> Vec<(String, String)> {
        vec![
            (
                PROPERTY_PACKAGE_IDENTIFIER.to_string(),
                self.package_identifier.clone(),
            ),
            (PROPERTY_VERSION.to_string(), self.version.clone()),
        ]
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.package_identifier, self.version)
    }
}

/// Ordered list of desired package states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Packages in invocation order
    pub packages: Vec<Package>,
}

impl Manifest {
    /// Create a manifest from packages.
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    /// Validate every package, citing the first offending entry.
    pub fn validate(&self) -> Result<()> {
        for (index, package) in self.packages.iter().enumerate() {
            package.validate().map_err(|e| match e {
                Error::InvalidManifest { message } => {
                    Error::invalid(format!("packages[{index}]: {message}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Number of packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the manifest has no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// DSC resource method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DscMethod {
    /// Read the current state
    Get,
    /// Converge to the desired state
    #[default]
    Set,
    /// Check whether the desired state holds
    Test,
}

impl DscMethod {
    /// Method name as passed to `Invoke-DscResource`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DscMethod::Get => "Get",
            DscMethod::Set => "Set",
            DscMethod::Test => "Test",
        }
    }
}

impl fmt::Display for DscMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the invoker does after a package reports errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing package
    #[default]
    FailFast,
    /// Invoke every package and report failures at the end
    Continue,
}

/// Value of a named argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    /// Plain string
    Text(String),
    /// Ordered string-to-string mapping (becomes a hashtable)
    Map(Vec<(String, String)>),
}

impl ArgumentValue {
    /// Get the text value, if this is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgumentValue::Text(s) => Some(s),
            ArgumentValue::Map(_) => None,
        }
    }

    /// Get the entries, if this is a mapping.
    pub fn as_map(&self) -> Option<&[(String, String)]> {
        match self {
            ArgumentValue::Map(entries) => Some(entries),
            ArgumentValue::Text(_) => None,
        }
    }
}

impl Serialize for ArgumentValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ArgumentValue::Text(s) => serializer.serialize_str(s),
            ArgumentValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedArguments {
    entries: Vec<(String, ArgumentValue)>,
}

impl NamedArguments {
    /// Create an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string argument, replacing an existing one with the same name.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name.into(), ArgumentValue::Text(value.into()));
        self
    }

    /// Add a mapping argument, replacing an existing one with the same name.
    pub fn map(mut self, name: impl Into<String>, entries: Vec<(String, String)>) -> Self {
        self.insert(name.into(), ArgumentValue::Map(entries));
        self
    }

    fn insert(&mut self, name: String, value: ArgumentValue) {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Look up an argument by name.
    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate arguments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for NamedArguments {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One of the engine's output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Verbose stream
    Verbose,
    /// Information stream
    Information,
    /// Progress stream
    Progress,
    /// Warning stream
    Warning,
    /// Error stream
    Error,
}

impl Channel {
    /// All channels in report order.
    pub const ALL: [Channel; 5] = [
        Channel::Verbose,
        Channel::Information,
        Channel::Progress,
        Channel::Warning,
        Channel::Error,
    ];

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Verbose => "Verbose",
            Channel::Information => "Information",
            Channel::Progress => "Progress",
            Channel::Warning => "Warning",
            Channel::Error => "Error",
        }
    }
}

/// Drained output of one invocation.
///
/// Each field holds every entry of its channel, one tab-indented line per
/// entry, or an empty string when the channel was silent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationResult {
    /// Verbose channel text
    pub verbose: String,
    /// Information channel text
    pub information: String,
    /// Progress channel text
    pub progress: String,
    /// Warning channel text
    pub warning: String,
    /// Error channel text
    pub error: String,
    /// Engine's own aggregate error flag
    pub had_errors: bool,
}

impl InvocationResult {
    /// Text captured for a channel.
    pub fn channel(&self, channel: Channel) -> &str {
        match channel {
            Channel::Verbose => &self.verbose,
            Channel::Information => &self.information,
            Channel::Progress => &self.progress,
            Channel::Warning => &self.warning,
            Channel::Error => &self.error,
        }
    }

    /// Non-empty channels as `(label, text)` in report order.
    pub fn sections(&self) -> Vec<(&'static str, &str)> {
        Channel::ALL
            .iter()
            .map(|c| (c.label(), self.channel(*c)))
            .filter(|(_, text)| !text.is_empty())
            .collect()
    }

    /// Whether every channel is empty and no error was flagged.
    pub fn is_empty(&self) -> bool {
        !self.had_errors && Channel::ALL.iter().all(|c| self.channel(*c).is_empty())
    }
}

/// Result of applying one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    /// The package that was invoked
    pub package: Package,
    /// Drained engine output for it
    pub result: InvocationResult,
}

/// Result of one run over a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// Per-package results, in invocation order
    pub results: Vec<PackageOutcome>,
    /// Whether no package reported errors
    pub success: bool,
    /// Index of the package that stopped a fail-fast run
    pub stopped_at: Option<usize>,
}

impl InvocationOutcome {
    /// Packages whose invocation reported errors.
    pub fn failures(&self) -> impl Iterator<Item = &PackageOutcome> {
        self.results.iter().filter(|o| o.result.had_errors)
    }

    /// Convert a failed outcome into the first [`Error::InvocationFailed`].
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let first = self.failures().next().map(|failed| Error::InvocationFailed {
            package: failed.package.package_identifier.clone(),
            version: failed.package.version.clone(),
            message: failed.result.error.clone(),
        });
        match first {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// How to reach the DSC engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// PowerShell executable (name on PATH or full path)
    pub executable: String,
    /// Module directory, relative to the executable's directory
    pub module_subpath: PathBuf,
    /// Helper module pre-loaded into the session
    pub helper_module: String,
    /// DSC resource registration name (also its module name)
    pub resource: String,
    /// Environment variable holding the module search path
    pub search_path_variable: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: "pwsh".to_string(),
            module_subpath: PathBuf::from("PowerShell").join("Modules"),
            helper_module: "WinDSC".to_string(),
            resource: "WinDSCResourceDemo".to_string(),
            search_path_variable: crate::env::MODULE_PATH_VARIABLE.to_string(),
        }
    }
}

//! PowerShell engine backed by a persistent `pwsh` child process.
//!
//! The child reads one statement per line from stdin. A host script is
//! dot-sourced on open; it imports the helper module and defines a request
//! function that runs a command in the current runspace and reports the five
//! streams as a JSON envelope framed by marker lines on stdout.

use serde::{Deserialize, Deserializer, Serialize};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tempfile::TempDir;

use crate::backend::Engine;
use crate::error::{Error, Result};
use crate::streams::RawOutput;
use crate::types::{Channel, NamedArguments};

const BEGIN_MARKER: &str = "@@DSCRUN-BEGIN@@";
const END_MARKER: &str = "@@DSCRUN-END@@";
const HOST_SCRIPT_NAME: &str = "dscrun-host.ps1";

const HOST_SCRIPT: &str = r#"
function Write-DscrunEnvelope($Envelope) {
    [Console]::Out.WriteLine('@@DSCRUN-BEGIN@@')
    [Console]::Out.WriteLine(($Envelope | ConvertTo-Json -Compress -Depth 5))
    [Console]::Out.WriteLine('@@DSCRUN-END@@')
    [Console]::Out.Flush()
}

function ConvertTo-DscrunLines($Records) {
    ,[string[]]@($Records | ForEach-Object { $_.ToString() })
}

function Initialize-DscrunHost([string]$HelperModule) {
    try {
        try {
            Set-ExecutionPolicy -ExecutionPolicy Unrestricted -Scope Process -Force -ErrorAction Stop
        } catch {
        }
        if ($HelperModule) {
            Import-Module -Name $HelperModule -Force -ErrorAction Stop
        }
        Write-DscrunEnvelope @{ kind = 'ready' }
    } catch {
        Write-DscrunEnvelope @{ kind = 'failed'; message = $_.ToString() }
    }
}

function Invoke-DscrunRequest([string]$Request) {
    $req = $Request | ConvertFrom-Json -AsHashtable
    $ps = [PowerShell]::Create([System.Management.Automation.RunspaceMode]::CurrentRunspace)
    $thrown = $false
    try {
        $null = $ps.AddCommand($req['command'])
        foreach ($key in $req['arguments'].Keys) {
            $null = $ps.AddParameter($key, $req['arguments'][$key])
        }
        try {
            $null = $ps.Invoke()
        } catch {
            $thrown = $true
            $inner = if ($_.Exception.InnerException) { $_.Exception.InnerException } else { $_.Exception }
            $ps.Streams.Error.Add([System.Management.Automation.ErrorRecord]::new(
                $inner, 'DscrunInvokeFailed',
                [System.Management.Automation.ErrorCategory]::NotSpecified, $null))
        }
        Write-DscrunEnvelope @{
            kind = 'result'
            verbose = ConvertTo-DscrunLines $ps.Streams.Verbose
            information = ConvertTo-DscrunLines $ps.Streams.Information
            progress = ConvertTo-DscrunLines $ps.Streams.Progress
            warning = ConvertTo-DscrunLines $ps.Streams.Warning
            error = ConvertTo-DscrunLines $ps.Streams.Error
            hadErrors = [bool]($ps.HadErrors -or $thrown)
        }
    } finally {
        $ps.Dispose()
    }
}
"#;

/// How to launch the child process.
#[derive(Debug, Clone)]
pub struct PwshOptions {
    executable: String,
    helper_module: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl PwshOptions {
    /// Launch the given executable (name on PATH or full path).
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            helper_module: None,
            env: Vec::new(),
        }
    }

    /// Import this module file when the session opens.
    pub fn helper_module(mut self, path: Option<PathBuf>) -> Self {
        self.helper_module = path;
        self
    }

    /// Pass an environment variable to the child.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Envelope {
    Ready,
    Failed {
        #[serde(default)]
        message: Option<String>,
    },
    Result(StreamPayload),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    verbose: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    information: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    progress: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    warning: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    error: Vec<String>,
    #[serde(default)]
    had_errors: bool,
}

impl StreamPayload {
    fn append_to(self, output: &mut RawOutput) {
        let channels = [
            (Channel::Verbose, self.verbose),
            (Channel::Information, self.information),
            (Channel::Progress, self.progress),
            (Channel::Warning, self.warning),
            (Channel::Error, self.error),
        ];
        for (channel, lines) in channels {
            for line in lines {
                output.push(channel, line);
            }
        }
        if self.had_errors {
            output.set_had_errors(true);
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// PowerShell serializes a one-element array as a bare string and an empty
/// one as `null`.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(line)) => vec![line],
        Some(OneOrMany::Many(lines)) => lines,
    })
}

#[derive(Serialize)]
struct Request<'a> {
    command: &'a str,
    arguments: &'a NamedArguments,
}

/// Engine that talks to a long-lived `pwsh` process.
pub struct PwshEngine {
    options: PwshOptions,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: Arc<Mutex<String>>,
    stderr_reader: Option<JoinHandle<()>>,
    script_dir: Option<TempDir>,
    output: RawOutput,
}

impl PwshEngine {
    /// Create an unopened engine.
    pub fn new(options: PwshOptions) -> Self {
        Self {
            options,
            child: None,
            stdin: None,
            stdout: None,
            stderr: Arc::new(Mutex::new(String::new())),
            stderr_reader: None,
            script_dir: None,
            output: RawOutput::new(),
        }
    }

    fn stage_host_script() -> Result<(TempDir, PathBuf)> {
        let dir = tempfile::Builder::new().prefix("dscrun-").tempdir()?;
        let path = dir.path().join(HOST_SCRIPT_NAME);
        std::fs::write(&path, HOST_SCRIPT)?;
        Ok((dir, path))
    }

    fn spawn(&mut self) -> Result<()> {
        let mut command = Command::new(&self.options.executable);
        command
            .args([
                "-NoLogo",
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Unrestricted",
                "-Command",
                "-",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (name, value) in &self.options.env {
            command.env(name, value);
        }

        let mut child = command.spawn().map_err(|e| {
            Error::setup(format!(
                "failed to start {}: {e}",
                self.options.executable
            ))
        })?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take().map(BufReader::new);
        if let Some(stderr) = child.stderr.take() {
            self.stderr_reader = Some(spawn_stderr_reader(stderr, Arc::clone(&self.stderr)));
        }
        log::debug!(
            "Started {} (pid {})",
            self.options.executable,
            child.id()
        );
        self.child = Some(child);
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(Error::SessionClosed)?;
        log::trace!("pwsh <- {line}");
        writeln!(stdin, "{line}")?;
        stdin.flush()?;
        Ok(())
    }

    fn read_envelope(&mut self) -> Result<Envelope> {
        let stdout = self.stdout.as_mut().ok_or(Error::SessionClosed)?;
        let mut body = String::new();
        let mut inside = false;
        let mut line = String::new();

        loop {
            line.clear();
            if stdout.read_line(&mut line)? == 0 {
                return Err(Error::engine(format!(
                    "pwsh exited unexpectedly{}",
                    stderr_suffix(&self.stderr)
                )));
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            match trimmed {
                BEGIN_MARKER => {
                    inside = true;
                    body.clear();
                }
                END_MARKER if inside => break,
                _ if inside => body.push_str(trimmed),
                _ => log::trace!("pwsh -> {trimmed}"),
            }
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::engine(format!("malformed response from pwsh: {e}")))
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Some(mut stdin) = self.stdin.take() {
            // The child may already be gone; waiting below reports that.
            let _ = writeln!(stdin, "exit");
            let _ = stdin.flush();
        }
        self.stdout = None;

        let status = child.wait()?;
        if let Some(reader) = self.stderr_reader.take() {
            let _ = reader.join();
        }
        self.script_dir = None;
        log::debug!("pwsh exited with {status}");
        Ok(())
    }
}

impl Engine for PwshEngine {
    fn name(&self) -> &str {
        &self.options.executable
    }

    fn open(&mut self) -> Result<()> {
        let (dir, script) = Self::stage_host_script()?;
        self.script_dir = Some(dir);
        self.spawn()?;

        let helper = self
            .options
            .helper_module
            .as_deref()
            .map(quote_path)
            .unwrap_or_else(|| "''".to_string());
        let bootstrap = format!(
            ". {}; Initialize-DscrunHost -HelperModule {helper}",
            quote_path(&script)
        );

        let ready = self.send_line(&bootstrap).and_then(|()| self.read_envelope());
        match ready {
            Ok(Envelope::Ready) => Ok(()),
            Ok(Envelope::Failed { message }) => {
                let _ = self.shutdown();
                Err(Error::setup(
                    message.unwrap_or_else(|| "host initialization failed".to_string()),
                ))
            }
            Ok(Envelope::Result(_)) => {
                let _ = self.shutdown();
                Err(Error::setup("unexpected response while opening session"))
            }
            Err(e) => {
                let _ = self.shutdown();
                Err(Error::setup(e.to_string()))
            }
        }
    }

    fn invoke(&mut self, command: &str, arguments: &NamedArguments) -> Result<()> {
        let request = serde_json::to_string(&Request { command, arguments })?;
        self.send_line(&format!(
            "Invoke-DscrunRequest {}",
            quote_literal(&request)
        ))?;

        match self.read_envelope()? {
            Envelope::Result(payload) => {
                payload.append_to(&mut self.output);
                Ok(())
            }
            Envelope::Failed { message } => Err(Error::engine(
                message.unwrap_or_else(|| format!("{command} failed in host")),
            )),
            Envelope::Ready => Err(Error::engine("unexpected ready response")),
        }
    }

    fn output(&mut self) -> &mut RawOutput {
        &mut self.output
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }
}

impl Drop for PwshEngine {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            log::warn!("pwsh still running at drop; killing pid {}", child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn spawn_stderr_reader(
    stderr: impl Read + Send + 'static,
    buffer: Arc<Mutex<String>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(std::io::Result::ok) {
            log::debug!("pwsh stderr: {line}");
            let mut guard = match buffer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.push_str(&line);
            guard.push('\n');
        }
    })
}

fn stderr_suffix(buffer: &Arc<Mutex<String>>) -> String {
    let text = match buffer.lock() {
        Ok(guard) => guard.trim().to_string(),
        Err(poisoned) => poisoned.into_inner().trim().to_string(),
    };
    if text.is_empty() {
        String::new()
    } else {
        format!(": {text}")
    }
}

/// Quote text as a PowerShell single-quoted literal.
///
/// PowerShell also treats typographic single quotes as delimiters, so those
/// are doubled as well.
pub fn quote_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            quoted.push(c);
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn quote_path(path: &Path) -> String {
    quote_literal(&path.to_string_lossy())
}

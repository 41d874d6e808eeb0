//! In-memory engine that records calls and replays queued output.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::Engine;
use crate::error::{Error, Result};
use crate::streams::RawOutput;
use crate::types::{Channel, NamedArguments};

/// A command received by the scripted engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Command name
    pub command: String,
    /// Arguments as passed
    pub arguments: NamedArguments,
}

/// Canned output for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    lines: Vec<(Channel, String)>,
    had_errors: bool,
}

impl ScriptedResponse {
    /// A response with no output and no errors.
    pub fn ok() -> Self {
        Self::default()
    }

    /// A failed response with one error line.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::default().line(Channel::Error, message).had_errors(true)
    }

    /// Emit a line on a channel.
    pub fn line(mut self, channel: Channel, text: impl Into<String>) -> Self {
        self.lines.push((channel, text.into()));
        self
    }

    /// Set the engine's aggregate error flag.
    pub fn had_errors(mut self, had_errors: bool) -> Self {
        self.had_errors = had_errors;
        self
    }
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<RecordedCall>,
    opened: bool,
    closes: usize,
}

/// Handle for inspecting a scripted engine after it moved into a session.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLog {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedLog {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Whether `open` succeeded.
    pub fn opened(&self) -> bool {
        self.lock().opened
    }

    /// How many times `close` reached the engine.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }
}

/// Engine that never leaves the process.
///
/// Invocations without a queued response succeed silently.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    responses: VecDeque<ScriptedResponse>,
    output: RawOutput,
    log: ScriptedLog,
    open_error: Option<String>,
}

impl ScriptedEngine {
    /// Create an engine with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the output for the next invocation.
    pub fn respond(mut self, response: ScriptedResponse) -> Self {
        self.responses.push_back(response);
        self
    }

    /// Make `open` fail with the given message.
    pub fn fail_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Shared view of calls and lifecycle events.
    pub fn log(&self) -> ScriptedLog {
        self.log.clone()
    }
}

impl Engine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&mut self) -> Result<()> {
        if let Some(message) = &self.open_error {
            return Err(Error::setup(message.clone()));
        }
        self.log.lock().opened = true;
        Ok(())
    }

    fn invoke(&mut self, command: &str, arguments: &NamedArguments) -> Result<()> {
        self.log.lock().calls.push(RecordedCall {
            command: command.to_string(),
            arguments: arguments.clone(),
        });

        let response = self.responses.pop_front().unwrap_or_default();
        for (channel, text) in response.lines {
            self.output.push(channel, text);
        }
        if response.had_errors {
            self.output.set_had_errors(true);
        }
        Ok(())
    }

    fn output(&mut self) -> &mut RawOutput {
        &mut self.output
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::drain;

    #[test]
    fn test_records_calls_and_replays_output() {
        let mut engine = ScriptedEngine::new()
            .respond(ScriptedResponse::ok().line(Channel::Verbose, "hello"))
            .respond(ScriptedResponse::failed("nope"));
        let log = engine.log();
        engine.open().unwrap();

        let args = NamedArguments::new().text("Name", "x");
        engine.invoke("Invoke-DscResource", &args).unwrap();
        let first = drain(engine.output());
        assert_eq!(first.verbose, "\thello\n");
        assert!(!first.had_errors);

        engine.invoke("Invoke-DscResource", &args).unwrap();
        let second = drain(engine.output());
        assert!(second.had_errors);
        assert_eq!(second.error, "\tnope\n");

        engine.invoke("Invoke-DscResource", &args).unwrap();
        assert!(drain(engine.output()).is_empty());

        assert_eq!(log.calls().len(), 3);
        assert!(log.opened());
    }

    #[test]
    fn test_fail_open() {
        let mut engine = ScriptedEngine::new().fail_open("engine unavailable");
        let err = engine.open().unwrap_err();
        assert!(matches!(err, Error::EnvironmentSetupFailed { .. }));
        assert!(!engine.log().opened());
    }
}

//! Engine output channels and the destructive drain.

use crate::types::{Channel, InvocationResult};

/// Live output buffers of an engine.
///
/// Engines append to these while a command runs. Callers only ever see an
/// owned snapshot produced by [`drain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    verbose: Vec<String>,
    information: Vec<String>,
    progress: Vec<String>,
    warning: Vec<String>,
    error: Vec<String>,
    had_errors: bool,
}

impl RawOutput {
    /// Create empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry to a channel.
    pub fn push(&mut self, channel: Channel, entry: impl Into<String>) {
        self.lines_mut(channel).push(entry.into());
    }

    /// Record the engine's aggregate error flag.
    pub fn set_had_errors(&mut self, had_errors: bool) {
        self.had_errors = had_errors;
    }

    /// Engine's aggregate error flag.
    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    /// Entries currently buffered on a channel.
    pub fn lines(&self, channel: Channel) -> &[String] {
        match channel {
            Channel::Verbose => &self.verbose,
            Channel::Information => &self.information,
            Channel::Progress => &self.progress,
            Channel::Warning => &self.warning,
            Channel::Error => &self.error,
        }
    }

    fn lines_mut(&mut self, channel: Channel) -> &mut Vec<String> {
        match channel {
            Channel::Verbose => &mut self.verbose,
            Channel::Information => &mut self.information,
            Channel::Progress => &mut self.progress,
            Channel::Warning => &mut self.warning,
            Channel::Error => &mut self.error,
        }
    }

    /// Empty every channel and reset the error flag.
    pub fn clear(&mut self) {
        for channel in Channel::ALL {
            self.lines_mut(channel).clear();
        }
        self.had_errors = false;
    }
}

/// Capture and clear all channels.
///
/// `had_errors` comes from the engine's flag, not from whether the error
/// channel has text; the two can disagree.
pub fn drain(output: &mut RawOutput) -> InvocationResult {
    let result = InvocationResult {
        verbose: indent(output.lines(Channel::Verbose)),
        information: indent(output.lines(Channel::Information)),
        progress: indent(output.lines(Channel::Progress)),
        warning: indent(output.lines(Channel::Warning)),
        error: indent(output.lines(Channel::Error)),
        had_errors: output.had_errors(),
    };
    output.clear();
    result
}

fn indent(lines: &[String]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push('\t');
        text.push_str(line);
        text.push('\n');
    }
    text
}

//! Engine abstraction for DSC invocations.
//!
//! The [`Engine`] trait is the seam between the orchestrator and whatever
//! actually runs `Invoke-DscResource`:
//! - [`pwsh::PwshEngine`] drives a persistent `pwsh` child process
//! - [`scripted::ScriptedEngine`] records calls and replays canned output

pub mod pwsh;
pub mod scripted;

use crate::error::Result;
use crate::streams::RawOutput;
use crate::types::NamedArguments;

/// An execution context able to run engine commands.
///
/// Implementations are used from one thread at a time and are not required
/// to be `Sync`.
pub trait Engine: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Start the context. Called once before any invocation.
    fn open(&mut self) -> Result<()>;

    /// Run one command to completion, appending its output to
    /// [`output`](Engine::output).
    fn invoke(&mut self, command: &str, arguments: &NamedArguments) -> Result<()>;

    /// Output buffered since the last drain.
    fn output(&mut self) -> &mut RawOutput;

    /// Release the command handle, then the context.
    fn close(&mut self) -> Result<()>;
}

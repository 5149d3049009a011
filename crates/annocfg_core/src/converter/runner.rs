//! Running external tools

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Command;

/// What a finished process reported
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Runs a converter executable to completion
///
/// The gateway only talks to tools through this trait, so tests can swap in
/// a runner that fakes the tool and counts invocations.
pub trait ProcessRunner: Send + Sync {
    /// # Errors
    /// Returns an error if the process could not be started at all.
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput>;
}

/// Runner backed by [`std::process::Command`]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        log::debug!("Running {} {:?}", program.display(), args);
        let output = Command::new(program).args(args).output()?;
        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

//! Blocking subprocess plumbing for the tool adapter.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use crate::error::ToolError;

const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

pub(crate) struct StreamedExit {
    pub code: i32,
    /// Tail of the child's stderr, kept for error reports.
    pub diagnostics: String,
}

/// Run a program with stdin inherited and stdout/stderr streamed through
/// to the parent while the stderr tail is captured. Interactive prompts
/// from the package manager keep working; its diagnostics still end up in
/// the returned error on failure.
pub(crate) fn run_streaming(
    program: &Path,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<StreamedExit, ToolError> {
    let mut command = configured(program, args, cwd);
    command.stdin(Stdio::inherit());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let launch = |source| ToolError::Launch {
        program: program.display().to_string(),
        source,
    };

    let mut child = command.spawn().map_err(launch)?;
    let stdout = child.stdout.take().ok_or_else(|| {
        launch(io::Error::new(io::ErrorKind::BrokenPipe, "stdout missing"))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        launch(io::Error::new(io::ErrorKind::BrokenPipe, "stderr missing"))
    })?;

    let stdout_handle = thread::spawn(move || tee(stdout, io::stdout(), false));
    let stderr_handle = thread::spawn(move || tee(stderr, io::stderr(), true));

    let status = child.wait().map_err(launch)?;
    let _ = stdout_handle.join();
    let diagnostics = stderr_handle
        .join()
        .ok()
        .and_then(Result::ok)
        .unwrap_or_default();

    Ok(StreamedExit {
        code: status.code().unwrap_or(-1),
        diagnostics,
    })
}

/// Run a program with all three standard streams fully inherited,
/// returning the child's exit code.
pub(crate) fn run_inherited(
    program: &Path,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<i32, ToolError> {
    let mut command = configured(program, args, cwd);
    command.stdin(Stdio::inherit());
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());
    let status = command.status().map_err(|source| ToolError::Launch {
        program: program.display().to_string(),
        source,
    })?;
    Ok(status.code().unwrap_or(-1))
}

fn configured(program: &Path, args: &[String], cwd: Option<&Path>) -> Command {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command
}

fn tee<R: Read, W: Write>(mut reader: R, mut writer: W, capture: bool) -> io::Result<String> {
    let mut buf = [0u8; 8192];
    let mut captured: Vec<u8> = Vec::new();
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        writer.flush()?;
        if capture && captured.len() < MAX_DIAGNOSTIC_BYTES {
            let room = MAX_DIAGNOSTIC_BYTES - captured.len();
            captured.extend_from_slice(&buf[..n.min(room)]);
        }
    }
    Ok(String::from_utf8_lossy(&captured).into_owned())
}

//! Process execution with streamed output.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::debug;

use crate::error::{ConveyorError, Result};

/// Result of running a process.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if terminated by a signal).
    pub exit_code: Option<i32>,

    /// Whether the process exited with code 0.
    pub success: bool,
}

/// Options for running a process.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables added on top of the inherited environment.
    pub env: HashMap<String, String>,
}

/// A line of output from a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    /// The line text regardless of stream.
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(line) | OutputLine::Stderr(line) => line,
        }
    }
}

/// Program and arguments that run a script file with the given interpreter.
///
/// `bash`, `sh` and `pwsh`/`powershell` are honoured; anything else (including
/// the generic `script`) uses the platform default shell.
///
/// # Example
///
/// ```
/// use conveyor::shell::interpreter_command;
/// use std::path::Path;
///
/// let (program, args) = interpreter_command("bash", Path::new("/tmp/step.sh"));
/// assert_eq!(program, "bash");
/// assert_eq!(args, vec!["--noprofile", "--norc", "-e", "/tmp/step.sh"]);
/// ```
pub fn interpreter_command(interpreter: &str, script: &Path) -> (String, Vec<String>) {
    let path = script.display().to_string();
    match interpreter.to_lowercase().as_str() {
        "bash" => (
            "bash".to_string(),
            vec![
                "--noprofile".to_string(),
                "--norc".to_string(),
                "-e".to_string(),
                path,
            ],
        ),
        "sh" => ("sh".to_string(), vec!["-e".to_string(), path]),
        "pwsh" | "powershell" => (
            "pwsh".to_string(),
            vec![
                "-NoLogo".to_string(),
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-File".to_string(),
                path,
            ],
        ),
        _ => default_shell(path),
    }
}

/// File extension expected by the interpreter for generated scripts.
pub fn script_extension(interpreter: &str) -> &'static str {
    match interpreter.to_lowercase().as_str() {
        "pwsh" | "powershell" => "ps1",
        "bash" | "sh" => "sh",
        _ if cfg!(target_os = "windows") => "cmd",
        _ => "sh",
    }
}

fn default_shell(path: String) -> (String, Vec<String>) {
    if cfg!(target_os = "windows") {
        let shell = std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string());
        (shell, vec!["/D".to_string(), "/C".to_string(), path])
    } else {
        ("sh".to_string(), vec!["-e".to_string(), path])
    }
}

/// Run a program, handing each output line to `callback` as it arrives.
///
/// stdout and stderr are read on separate threads and funnelled through one
/// channel, so lines reach the callback on the calling thread. The call blocks
/// until the process exits.
pub fn execute_streaming(
    program: &str,
    args: &[String],
    options: &CommandOptions,
    callback: &mut dyn FnMut(OutputLine),
) -> Result<CommandResult> {
    let start = Instant::now();
    let command_line = display_command(program, args);

    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(command = %command_line, "Spawning process");

    let mut child = cmd.spawn().map_err(|e| {
        debug!(command = %command_line, error = %e, "Failed to spawn process");
        ConveyorError::CommandFailed {
            command: command_line.clone(),
            code: None,
        }
    })?;

    let (tx, rx) = mpsc::channel();

    let stdout_handle = child
        .stdout
        .take()
        .map(|out| spawn_reader(out, tx.clone(), OutputLine::Stdout));
    let stderr_handle = child
        .stderr
        .take()
        .map(|err| spawn_reader(err, tx, OutputLine::Stderr));

    for line in rx {
        callback(line);
    }

    join_reader(stdout_handle);
    join_reader(stderr_handle);

    let status = child.wait().map_err(|_| ConveyorError::CommandFailed {
        command: command_line.clone(),
        code: None,
    })?;

    let duration = start.elapsed();
    debug!(command = %command_line, code = ?status.code(), ?duration, "Process exited");

    Ok(CommandResult {
        exit_code: status.code(),
        success: status.success(),
    })
}

/// Forward each line of `source` until EOF.
///
/// Lines that are not valid UTF-8 are converted lossily; the pipe is always
/// drained so the child never blocks or dies on a closed reader.
fn spawn_reader<R: Read + Send + 'static>(
    source: R,
    tx: mpsc::Sender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_newline(&buf)).into_owned();
                    let _ = tx.send(wrap(line));
                }
            }
        }
    })
}

fn trim_newline(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

fn join_reader(handle: Option<thread::JoinHandle<()>>) {
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}

fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

use std::{
    ffi::OsString,
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
    process::Stdio,
};

use log::{debug, trace};
use thiserror::Error;
use tokio::{process::Command, runtime};

pub use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{0}")]
    ToolNotFound(String),
    #[error("{program} failed ({status})\n{stderr}")]
    Failure {
        program: String,
        status: ExitCode,
        stderr: String,
    },
    #[error("Cancelled")]
    Cancelled,
    #[error("Could not run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Exit status of a finished subprocess. `None` when it was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl ExitCode {
    pub fn success(&self) -> bool {
        self.0 == Some(0)
    }
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Fails with [`ProcessError::Cancelled`] once `cancel` has been triggered.
pub fn check_cancelled(cancel: &CancellationToken) -> Result<(), ProcessError> {
    if cancel.is_cancelled() {
        Err(ProcessError::Cancelled)
    } else {
        Ok(())
    }
}

/// A single subprocess call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .to_string()
    }

    /// Value following `flag` in the argument list.
    pub fn arg_after(&self, flag: &str) -> Option<&Path> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(Path::new)
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ExitCode,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn into_failure(self, invocation: &Invocation) -> ProcessError {
        ProcessError::Failure {
            program: invocation.program_name(),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Runs external tools and locates them on the search path.
pub trait ProcessRunner {
    /// Runs to completion, capturing output. A non-zero exit is not an error at this level.
    fn run(&self, invocation: &Invocation, cancel: &CancellationToken)
        -> Result<ProcessOutput, ProcessError>;

    fn which(&self, name: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessRunner;

impl ProcessRunner for OsProcessRunner {
    /// Blocks on the current runtime when called from one of its blocking threads,
    /// otherwise on a private single-threaded runtime.
    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        check_cancelled(cancel)?;
        match runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(run_child(invocation, cancel)),
            Err(_) => runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(run_child(invocation, cancel)),
        }
    }

    fn which(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

async fn run_child(
    invocation: &Invocation,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ProcessError> {
    debug!("Running {}", invocation);

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.dir {
        command.current_dir(dir);
    }
    let child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: invocation.program_name(),
        source,
    })?;

    // dropping the child on either branch kills it
    let output = tokio::select! {
        output = child.wait_with_output() => output?,
        () = cancel.cancelled() => {
            debug!("Killing {} after cancellation", invocation.program_name());
            return Err(ProcessError::Cancelled);
        }
    };

    let output = ProcessOutput {
        status: ExitCode(output.status.code()),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    trace!(
        "{} finished with {}: {} bytes of output",
        invocation.program_name(),
        output.status,
        output.stdout.len()
    );
    Ok(output)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet},
    };

    use super::*;

    /// Canned subprocess behaviour keyed by the effective build directory:
    /// the `-p` override when present, the working directory otherwise.
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub responses: HashMap<PathBuf, Vec<ProcessOutput>>,
        pub tools: HashSet<String>,
        pub calls: RefCell<Vec<Invocation>>,
        pub fallback: Option<ProcessOutput>,
    }

    impl ScriptedRunner {
        pub fn with_tools(tools: &[&str]) -> Self {
            ScriptedRunner {
                tools: tools.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn respond(&mut self, key: impl Into<PathBuf>, output: ProcessOutput) {
            self.responses.entry(key.into()).or_default().push(output);
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    pub fn ok(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            status: ExitCode(Some(0)),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            status: ExitCode(Some(code)),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(
            &self,
            invocation: &Invocation,
            cancel: &CancellationToken,
        ) -> Result<ProcessOutput, ProcessError> {
            check_cancelled(cancel)?;
            let key = invocation
                .arg_after("-p")
                .map(Path::to_path_buf)
                .or_else(|| invocation.dir.clone())
                .unwrap_or_default();
            let nth = self
                .calls
                .borrow()
                .iter()
                .filter(|call| {
                    call.arg_after("-p")
                        .map(Path::to_path_buf)
                        .or_else(|| call.dir.clone())
                        .unwrap_or_default()
                        == key
                })
                .count();
            self.calls.borrow_mut().push(invocation.clone());
            let output = self
                .responses
                .get(&key)
                .and_then(|outputs| outputs.get(nth).or_else(|| outputs.last()))
                .cloned()
                .or_else(|| self.fallback.clone())
                .unwrap_or_else(|| ok(""));
            Ok(output)
        }

        fn which(&self, name: &str) -> Option<PathBuf> {
            self.tools
                .contains(name)
                .then(|| PathBuf::from("/usr/bin").join(name))
        }
    }
}

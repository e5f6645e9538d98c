//! Child-process runner with line-based stdout/stderr forwarding.
//!
//! One reader thread per stream pushes lines into a bounded channel. The
//! calling thread drains it and invokes the sinks, so sinks only ever run on
//! the caller's thread. Per-stream order is FIFO; order across the two streams
//! is whatever the reader threads produce.

use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mirrorkit_log::Logger;

use crate::spec::{N_EXIT_CODE_GENERIC_FAILURE, ProcessError, SpecProcessInvocation};

/// Capacity of the line channel shared by both reader threads.
const N_LINE_CHANNEL_CAPACITY: usize = 256;
/// Poll interval while waiting for a child that closed its pipes.
const N_WAIT_POLL_MILLIS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumStreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug)]
enum EnumStreamMessage {
    Line(EnumStreamKind, String),
    Error(EnumStreamKind, io::Error),
    Finished(EnumStreamKind),
}

/// Launches child processes and forwards their output to sinks.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    logger: Logger,
}

impl ProcessRunner {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Run the invocation to completion and return its exit code.
    ///
    /// Never fails: any [`ProcessError`] is logged, its message is delivered
    /// to `sink_err`, and `1` is returned instead.
    pub fn start<O, E>(
        &self,
        spec_invocation: &SpecProcessInvocation,
        mut sink_out: O,
        mut sink_err: E,
    ) -> i32
    where
        O: FnMut(&str),
        E: FnMut(&str),
    {
        match self.run(spec_invocation, &mut sink_out, &mut sink_err) {
            Ok(n_exit_code) => n_exit_code,
            Err(e) => {
                let c_message = e.to_string();
                self.logger.error(&c_message);
                sink_err(&c_message);
                N_EXIT_CODE_GENERIC_FAILURE
            }
        }
    }

    /// [`Self::start`] with stdout lines logged at info and stderr lines at error.
    pub fn start_logged(&self, spec_invocation: &SpecProcessInvocation) -> i32 {
        match self.run_logged(spec_invocation) {
            Ok(n_exit_code) => n_exit_code,
            Err(e) => {
                self.logger.error(e.to_string());
                N_EXIT_CODE_GENERIC_FAILURE
            }
        }
    }

    /// [`Self::run`] with stdout lines logged at info and stderr lines at error.
    pub fn run_logged(&self, spec_invocation: &SpecProcessInvocation) -> Result<i32, ProcessError> {
        self.run(
            spec_invocation,
            |line| self.logger.info(line),
            |line| self.logger.error(line),
        )
    }

    /// Run the invocation and return the exit code, or the typed failure.
    ///
    /// Empty lines are dropped. Without `timeout` this blocks until the child
    /// exits, however long that takes. A child killed by a signal reports
    /// `128 + signal` on Unix.
    pub fn run<O, E>(
        &self,
        spec_invocation: &SpecProcessInvocation,
        mut sink_out: O,
        mut sink_err: E,
    ) -> Result<i32, ProcessError>
    where
        O: FnMut(&str),
        E: FnMut(&str),
    {
        let c_program = display_program(&spec_invocation.program);
        let mut command = Command::new(&spec_invocation.program);
        command
            .args(&spec_invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir_working) = &spec_invocation.dir_working {
            command.current_dir(dir_working);
        }

        self.logger.debug(format!(
            "[PROC] spawn {c_program} {:?}",
            spec_invocation.args
        ));
        let mut child = command.spawn().map_err(|e| ProcessError::Launch {
            program: c_program.clone(),
            source: e,
        })?;

        let (sender, receiver) = mpsc::sync_channel(N_LINE_CHANNEL_CAPACITY);
        let mut l_readers = Vec::with_capacity(2);
        if let Some(handle) = child.stdout.take() {
            l_readers.push(spawn_line_reader(handle, EnumStreamKind::Stdout, sender.clone()));
        }
        if let Some(handle) = child.stderr.take() {
            l_readers.push(spawn_line_reader(handle, EnumStreamKind::Stderr, sender.clone()));
        }
        drop(sender);

        let instant_deadline = spec_invocation.timeout.map(|t| Instant::now() + t);
        let b_streams_closed = self.drain_lines(
            &receiver,
            l_readers.len(),
            instant_deadline,
            &mut sink_out,
            &mut sink_err,
        );

        if !b_streams_closed {
            // Readers finish on their own once the killed child's pipes close.
            return Err(self.kill_timed_out(&mut child, &c_program, spec_invocation.timeout));
        }
        for handle in l_readers {
            let _ = handle.join();
        }

        let status = match wait_until(&mut child, instant_deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                return Err(self.kill_timed_out(&mut child, &c_program, spec_invocation.timeout));
            }
            Err(e) => {
                return Err(ProcessError::Wait {
                    program: c_program,
                    source: e,
                });
            }
        };

        let n_exit_code = exit_code_of(status);
        self.logger
            .debug(format!("[PROC] {c_program} exited with {n_exit_code}"));
        Ok(n_exit_code)
    }

    /// Deliver lines until every reader finished. `false` when the deadline hit first.
    fn drain_lines<O, E>(
        &self,
        receiver: &Receiver<EnumStreamMessage>,
        n_readers: usize,
        instant_deadline: Option<Instant>,
        sink_out: &mut O,
        sink_err: &mut E,
    ) -> bool
    where
        O: FnMut(&str),
        E: FnMut(&str),
    {
        let mut n_open = n_readers;
        while n_open > 0 {
            let message = match instant_deadline {
                None => match receiver.recv() {
                    Ok(v) => v,
                    Err(_) => return true,
                },
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match receiver.recv_timeout(remaining) {
                        Ok(v) => v,
                        Err(RecvTimeoutError::Timeout) => return false,
                        Err(RecvTimeoutError::Disconnected) => return true,
                    }
                }
            };

            match message {
                EnumStreamMessage::Line(EnumStreamKind::Stdout, line) => sink_out(&line),
                EnumStreamMessage::Line(EnumStreamKind::Stderr, line) => sink_err(&line),
                EnumStreamMessage::Error(kind, e) => {
                    self.logger
                        .warn(format!("[PROC] Failed to read {kind:?} of child: {e}"));
                }
                EnumStreamMessage::Finished(_) => n_open -= 1,
            }
        }
        true
    }

    fn kill_timed_out(
        &self,
        child: &mut Child,
        c_program: &str,
        timeout: Option<Duration>,
    ) -> ProcessError {
        if let Err(e) = child.kill() {
            self.logger
                .warn(format!("[PROC] Failed to kill {c_program}: {e}"));
        }
        let _ = child.wait();
        ProcessError::TimedOut {
            program: c_program.to_string(),
            timeout: timeout.unwrap_or_default(),
        }
    }
}

fn spawn_line_reader<R>(
    handle: R,
    kind: EnumStreamKind,
    sender: SyncSender<EnumStreamMessage>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(handle);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = trim_line_ending(&buf);
                    if line.is_empty() {
                        continue;
                    }
                    let line = String::from_utf8_lossy(line).into_owned();
                    if sender.send(EnumStreamMessage::Line(kind, line)).is_err() {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = sender.send(EnumStreamMessage::Error(kind, e));
                    break;
                }
            }
        }
        let _ = sender.send(EnumStreamMessage::Finished(kind));
    })
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Wait for exit, polling when a deadline is set. `Ok(None)` when it passed.
fn wait_until(child: &mut Child, instant_deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = instant_deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(N_WAIT_POLL_MILLIS));
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    N_EXIT_CODE_GENERIC_FAILURE
}

fn display_program(program: &OsStr) -> String {
    program.to_string_lossy().into_owned()
}

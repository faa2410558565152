//! The engine as a child process: stdin for commands, stdout for JSON answers.
//!
//! stdout is pumped line by line into a channel by a dedicated thread, so reads can be
//! bounded by a timeout on every platform (pipes have no portable read timeout).

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};

use crate::transport::{Framing, ResponseReader, TransportError};

fn create_process(command: &str, args: &[String], allow_stderr: bool) -> anyhow::Result<Child> {
    let mut cmd = Command::new(command);
    cmd.args(args).stdin(Stdio::piped()).stdout(Stdio::piped());
    if !allow_stderr {
        cmd.stderr(Stdio::null());
    }
    cmd.spawn()
        .with_context(|| format!("command '{command}' not found"))
}

/// Wait until `child` exits, for at most `max_duration`. Returns `true` if it did.
pub fn wait_for_exit(child: &mut Child, max_duration: Duration) -> bool {
    let deadline = Instant::now() + max_duration;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "engine exited");
                return true;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("could not poll engine process: {e}");
                return false;
            }
        }
        if Instant::now() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10).min(max_duration / 10));
    }
}

/// A running engine process.
///
/// The process is killed on drop if [`EngineProcess::shutdown`] was not called.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: ResponseReader,
    pump: Option<JoinHandle<()>>,
    cleaned_up: bool,
}

impl EngineProcess {
    /// Spawn `command args...` with piped stdin/stdout.
    ///
    /// stderr is discarded unless `allow_stderr` is set, in which case it is inherited.
    #[instrument(skip(args))]
    pub fn launch(
        command: &str,
        args: &[String],
        framing: Framing,
        allow_stderr: bool,
    ) -> anyhow::Result<EngineProcess> {
        let mut child = create_process(command, args, allow_stderr)?;
        let stdin = child.stdin.take();
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                anyhow::bail!("engine stdout was not captured");
            }
        };

        let (tx, rx) = mpsc::channel();
        let pump = thread::Builder::new()
            .name("engine-stdout".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("engine stdout closed: {e}");
                            break;
                        }
                    }
                }
            })
            .context("could not start engine output reader")?;

        info!(pid = child.id(), "engine process started");
        Ok(EngineProcess {
            child,
            stdin,
            reader: ResponseReader::new(rx, framing),
            pump: Some(pump),
            cleaned_up: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Write one command line.
    pub fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        trace!(line, "engine <-");
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    /// Discard output nobody asked for (banners, acknowledgements).
    pub fn drain(&self) -> Result<usize, TransportError> {
        self.reader.drain()
    }

    /// Send `line` and wait up to `timeout` for the framed JSON answer.
    pub fn request(&mut self, line: &str, timeout: Duration) -> Result<Value, TransportError> {
        self.drain()?;
        self.send_line(line)?;
        self.reader.read_response(timeout)
    }

    /// True while the process has not exited.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Graceful stop: send `farewell`, close stdin, wait `grace`, then kill.
    ///
    /// Never fails: a process that is already gone is fine.
    #[instrument(skip(self), fields(pid = self.child.id()))]
    pub fn shutdown(&mut self, farewell: &str, grace: Duration) {
        if self.cleaned_up {
            return;
        }
        if let Err(e) = self.send_line(farewell) {
            debug!("could not send '{farewell}': {e}");
        }
        drop(self.stdin.take());

        if !wait_for_exit(&mut self.child, grace) {
            debug!("engine still running after {grace:?}, killing it");
            if let Err(e) = self.try_kill() {
                warn!("could not kill engine process: {e:#}");
            }
        }
        self.cleaned_up = true;
        self.join_pump();
        info!("engine process stopped");
    }

    /// Kill the process and reap it.
    pub fn try_kill(&mut self) -> anyhow::Result<()> {
        self.child.kill().context("could not kill process")?;
        self.child.wait().context("could not reap process")?;
        self.cleaned_up = true;
        Ok(())
    }

    fn join_pump(&mut self) {
        // stdout of a dead process reaches EOF, the reader ends on its own
        if let Some(pump) = self.pump.take() {
            if pump.is_finished() {
                let _ = pump.join();
            }
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            drop(self.stdin.take());
            if let Err(e) = self.try_kill() {
                // already exited is the common case here
                debug!("engine cleanup on drop: {e:#}");
            }
        }
    }
}

// ABOUTME: Readiness Monitor: blocks after a start until the service's wait elapses.
// ABOUTME: `@whaler wait <duration>` markers in the output restart the countdown.

use super::terminal::{ResizeEvents, StdinBridge, current_size};
use crate::config::parse_duration;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::output::Output;
use crate::runtime::{ContainerInfo, FullRuntime, LogOptions, LogStream, OutputStream};
use crate::types::ContainerId;
use futures::StreamExt;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const WAIT_MARKER: &str = "@whaler wait";
const DEPRECATED_MARKER: &str = "@whaler ready in";

/// A readiness marker found in service output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub wait: Duration,
    pub deprecated: bool,
}

/// Find a readiness marker in a chunk of output.
///
/// The duration is the rest of the marker's line. A marker with an
/// unreadable duration is treated as ordinary output.
pub fn find_marker(chunk: &str) -> Option<Marker> {
    let (at, deprecated, len) = match chunk.find(WAIT_MARKER) {
        Some(at) => (at, false, WAIT_MARKER.len()),
        None => (chunk.find(DEPRECATED_MARKER)?, true, DEPRECATED_MARKER.len()),
    };
    let rest = &chunk[at + len..];
    let value = rest.lines().next().unwrap_or_default();
    parse_duration(value)
        .ok()
        .map(|wait| Marker { wait, deprecated })
}

/// What to do with one chunk of service output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scanned {
    Marker(Marker),
    /// Echo the text; `separate` asks for a blank line before it.
    Echo { text: String, separate: bool },
}

/// Tracks the start of each output section so the first chunk after the
/// start or a marker is set apart from preceding orchestrator messages.
#[derive(Debug)]
pub struct OutputScanner {
    section_start: bool,
}

impl Default for OutputScanner {
    fn default() -> Self {
        Self {
            section_start: true,
        }
    }
}

impl OutputScanner {
    pub fn scan(&mut self, chunk: &str) -> Scanned {
        if let Some(marker) = find_marker(chunk) {
            self.section_start = true;
            return Scanned::Marker(marker);
        }
        let separate = self.section_start && chunk != "\n" && chunk != "\r\n";
        self.section_start = false;
        Scanned::Echo {
            text: chunk.to_string(),
            separate,
        }
    }
}

pub struct ReadinessMonitor<'a, R: ?Sized> {
    runtime: &'a R,
    output: &'a Output,
    cancel: CancellationToken,
    terminal_size: fn() -> Option<(u16, u16)>,
}

impl<'a, R: FullRuntime + ?Sized> ReadinessMonitor<'a, R> {
    /// `cancel` is the invocation-wide interrupt; each wait derives its own child.
    pub fn new(runtime: &'a R, output: &'a Output, cancel: CancellationToken) -> Self {
        Self {
            runtime,
            output,
            cancel,
            terminal_size: current_size,
        }
    }

    #[cfg(test)]
    fn with_terminal_size(mut self, size: fn() -> Option<(u16, u16)>) -> Self {
        self.terminal_size = size;
        self
    }

    /// Start `container` and block until its readiness wait elapses.
    ///
    /// TTY containers are attached before the start so no output is lost;
    /// others have their logs followed from one second before the start.
    pub async fn start_and_wait(
        &self,
        container: &ContainerInfo,
        wait: Duration,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let id = &container.id;
        let detach = self.cancel.child_token();

        if container.tty {
            let io = self.runtime.attach_container(id).await?;
            let mut resize = ResizeEvents::listen();
            self.runtime.start_container(id).await?;
            self.resize(id, (self.terminal_size)()).await;

            let _bridge = container
                .attach_stdin
                .then(|| StdinBridge::attach(io.input, detach.clone(), diag));
            self.follow(&container.name, io.output, wait, &detach, Some(id), &mut resize, diag)
                .await
        } else {
            let since = SystemTime::now()
                .checked_sub(Duration::from_secs(1))
                .unwrap_or(SystemTime::UNIX_EPOCH);
            self.runtime.start_container(id).await?;
            let stream = self
                .runtime
                .container_logs(id, &LogOptions::follow_since(since))
                .await?;
            self.follow(
                &container.name,
                stream,
                wait,
                &detach,
                None,
                &mut ResizeEvents::disabled(),
                diag,
            )
            .await
        }
    }

    /// Echo `stream` until the active countdown elapses.
    ///
    /// The stream ending early does not end the wait.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn follow(
        &self,
        name: &str,
        mut stream: OutputStream,
        wait: Duration,
        detach: &CancellationToken,
        tty: Option<&ContainerId>,
        resize: &mut ResizeEvents,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let countdown = tokio::time::sleep(wait);
        tokio::pin!(countdown);
        let mut scanner = OutputScanner::default();
        let mut open = true;

        tracing::debug!(container = %name, wait = ?wait, "waiting for readiness");

        loop {
            tokio::select! {
                () = &mut countdown => {
                    tracing::debug!(container = %name, "readiness wait elapsed");
                    return Ok(());
                }
                () = detach.cancelled() => {
                    tracing::info!(container = %name, "detached from readiness wait");
                    return Err(Error::Interrupted(name.to_string()));
                }
                Some((width, height)) = resize.next() => {
                    if let Some(id) = tty {
                        self.resize(id, Some((width, height))).await;
                    }
                }
                item = stream.next(), if open => match item {
                    Some(Ok(line)) if line.stream == LogStream::Stderr => {
                        self.output.passthrough_stderr(&line.content);
                    }
                    Some(Ok(line)) => match scanner.scan(&line.content) {
                        Scanned::Marker(marker) => {
                            self.output.progress(&format!(
                                "\nWaiting {}s to make sure container is started.",
                                marker.wait.as_secs_f64()
                            ));
                            if marker.deprecated {
                                diag.warn(Warning::deprecated_marker(
                                    "\"@whaler ready in\" is deprecated, please use \"@whaler wait\" instead.",
                                ));
                            }
                            countdown.as_mut().reset(Instant::now() + marker.wait);
                        }
                        Scanned::Echo { text, separate } => {
                            if separate {
                                self.output.passthrough("\n");
                            }
                            self.output.passthrough(&text);
                        }
                    },
                    Some(Err(e)) => {
                        tracing::debug!(container = %name, "output stream failed: {}", e);
                        open = false;
                    }
                    None => open = false,
                },
            }
        }
    }

    async fn resize(&self, id: &ContainerId, size: Option<(u16, u16)>) {
        let Some((width, height)) = size else {
            return;
        };
        if let Err(e) = self.runtime.resize_tty(id, width, height).await {
            tracing::debug!(container = %id, "resize failed: {}", e);
        }
    }
}

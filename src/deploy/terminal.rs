// ABOUTME: Local terminal plumbing for interactive readiness waits.
// ABOUTME: Raw mode guard, stdin-to-container bridge and window resize events.

use crate::diagnostics::{Diagnostics, Warning};
use std::io::Read;
use std::pin::Pin;
use std::sync::OnceLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Ctrl-Alt-C as terminals send it in raw mode.
pub const DETACH_SEQUENCE: &[u8] = b"\x1b\x03";

/// Puts the terminal in raw mode and restores the previous mode on drop.
///
/// Guards nest: an inner guard leaves raw mode on if it was already on.
pub struct RawModeGuard {
    was_raw: bool,
}

impl RawModeGuard {
    pub fn enable() -> std::io::Result<Self> {
        let was_raw = crossterm::terminal::is_raw_mode_enabled()?;
        if !was_raw {
            crossterm::terminal::enable_raw_mode()?;
        }
        Ok(Self { was_raw })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if !self.was_raw
            && let Err(e) = crossterm::terminal::disable_raw_mode()
        {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Local stdin as chunks, read by one process-wide thread.
///
/// A blocking read cannot be cancelled, so the reader outlives every bridge
/// and only the consumer changes hands. Input typed between two bridges
/// stays queued for the next one.
type StdinChunks = Mutex<mpsc::UnboundedReceiver<Vec<u8>>>;

static STDIN: OnceLock<StdinChunks> = OnceLock::new();

fn local_stdin() -> &'static StdinChunks {
    STDIN.get_or_init(|| {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawned = std::thread::Builder::new()
            .name("whaler-stdin".into())
            .spawn(move || read_stdin(tx));
        if let Err(e) = spawned {
            tracing::warn!("failed to start the stdin reader: {}", e);
        }
        Mutex::new(rx)
    })
}

fn read_stdin(tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut stdin = std::io::stdin();
    let mut buf = [0u8; 1024];
    loop {
        match stdin.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

/// Forwards local stdin into an attached container until dropped.
///
/// Ctrl-Alt-C cancels `detach` instead of being forwarded.
pub struct StdinBridge {
    task: JoinHandle<()>,
    _raw: Option<RawModeGuard>,
}

impl StdinBridge {
    pub fn attach(
        input: Pin<Box<dyn AsyncWrite + Send>>,
        detach: CancellationToken,
        diag: &mut Diagnostics,
    ) -> Self {
        let raw = match RawModeGuard::enable() {
            Ok(guard) => Some(guard),
            Err(e) => {
                diag.warn(Warning::terminal(format!(
                    "could not switch the terminal to raw mode: {}",
                    e
                )));
                None
            }
        };

        let task = spawn_forward(local_stdin(), input, detach);
        Self { task, _raw: raw }
    }
}

impl Drop for StdinBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn spawn_forward(
    source: &'static StdinChunks,
    input: Pin<Box<dyn AsyncWrite + Send>>,
    detach: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut chunks = source.lock().await;
        forward(&mut chunks, input, detach).await;
    })
}

async fn forward(
    chunks: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    mut input: Pin<Box<dyn AsyncWrite + Send>>,
    detach: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            () = detach.cancelled() => break,
            chunk = chunks.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };
        if let Some(at) = find_detach(&chunk) {
            tracing::debug!("detach sequence received");
            if at > 0 && input.write_all(&chunk[..at]).await.is_ok() {
                let _ = input.flush().await;
            }
            detach.cancel();
            break;
        }
        if input.write_all(&chunk).await.is_err() || input.flush().await.is_err() {
            break;
        }
    }
}

/// Offset of the detach sequence within `chunk`.
pub fn find_detach(chunk: &[u8]) -> Option<usize> {
    chunk
        .windows(DETACH_SEQUENCE.len())
        .position(|w| w == DETACH_SEQUENCE)
}

/// Local terminal size changes, for forwarding to a container TTY.
pub struct ResizeEvents {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl ResizeEvents {
    pub fn disabled() -> Self {
        Self {
            #[cfg(unix)]
            signal: None,
        }
    }

    pub fn listen() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::window_change()) {
                Ok(signal) => Self {
                    signal: Some(signal),
                },
                Err(e) => {
                    tracing::debug!("resize events unavailable: {}", e);
                    Self::disabled()
                }
            }
        }
        #[cfg(not(unix))]
        {
            Self::disabled()
        }
    }

    /// Wait for the next resize and return the new `(columns, rows)`.
    /// Never resolves when disabled.
    pub async fn next(&mut self) -> Option<(u16, u16)> {
        #[cfg(unix)]
        if let Some(signal) = self.signal.as_mut() {
            signal.recv().await?;
            return current_size();
        }
        std::future::pending().await
    }
}

/// Current local terminal size, if stdout is a terminal.
pub fn current_size() -> Option<(u16, u16)> {
    crossterm::terminal::size().ok()
}

//! Stream relay: one task per child stream.
//!
//! A relay ends in one of three ways:
//! - end-of-stream (the child and everything holding the pipe closed it),
//! - the supervisor aborts it after the drain timeout, which closes the pipe,
//! - an unexpected read/write error, reported on the fault channel so the
//!   supervisor can end the current restart cycle.

use hookvisor_common::{RelayError, StreamType};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

const BUFFER_SIZE: usize = 8192;

/// How long a relay may keep draining after its child has exited.
///
/// A grandchild that inherited the pipe can keep it open indefinitely; past
/// this bound the pipe is closed from our side.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What a finished relay reports back to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub stream: StreamType,
    pub bytes_copied: u64,
    /// False when the relay had to be aborted before end-of-stream.
    pub drained: bool,
}

/// A running copy loop from one child pipe into one sink.
#[derive(Debug)]
pub struct OutputRelay {
    stream: StreamType,
    task: JoinHandle<Option<u64>>,
}

impl OutputRelay {
    /// Spawn a relay copying `source` into `sink`.
    ///
    /// The sink is owned by the relay and closed only after the source is
    /// exhausted. Unexpected I/O errors are sent on `faults`.
    pub fn spawn<R>(
        stream: StreamType,
        source: R,
        sink: File,
        faults: mpsc::UnboundedSender<RelayError>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let task = tokio::spawn(async move {
            match copy_stream(stream, source, sink).await {
                Ok(copied) => Some(copied),
                Err(e) => {
                    error!(%stream, error = %e, "Output relay failed");
                    if faults.send(e).is_err() {
                        debug!(%stream, "Fault receiver gone, relay error not forwarded");
                    }
                    None
                }
            }
        });

        debug!(%stream, "Output relay started");
        Self { stream, task }
    }

    /// Wait for the relay to drain, closing the pipe ourselves after
    /// `drain_timeout`.
    pub async fn join(mut self, drain_timeout: Duration) -> RelayReport {
        let stream = self.stream;
        match tokio::time::timeout(drain_timeout, &mut self.task).await {
            Ok(Ok(Some(bytes_copied))) => {
                debug!(%stream, bytes_copied, "Output relay drained");
                RelayReport {
                    stream,
                    bytes_copied,
                    drained: true,
                }
            }
            Ok(Ok(None)) => RelayReport {
                stream,
                bytes_copied: 0,
                drained: false,
            },
            Ok(Err(join_err)) => {
                warn!(%stream, error = %join_err, "Output relay task did not complete");
                RelayReport {
                    stream,
                    bytes_copied: 0,
                    drained: false,
                }
            }
            Err(_) => {
                warn!(
                    %stream,
                    timeout = ?drain_timeout,
                    "Pipe still open after child exit, closing it"
                );
                self.task.abort();
                RelayReport {
                    stream,
                    bytes_copied: 0,
                    drained: false,
                }
            }
        }
    }
}

async fn copy_stream<R>(stream: StreamType, mut source: R, mut sink: File) -> Result<u64, RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RelayError::new(stream, copied, e)),
        };

        sink.write_all(&buf[..n])
            .await
            .map_err(|e| RelayError::new(stream, copied, e))?;
        copied += n as u64;
    }

    sink.flush()
        .await
        .map_err(|e| RelayError::new(stream, copied, e))?;

    Ok(copied)
}

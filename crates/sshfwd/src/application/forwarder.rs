//! ConnectionForwarder: full-duplex relay between two byte streams.
//!
//! Each direction runs as its own tokio task, so a slow reader on one side
//! never stalls the other.  When either direction ends, whether by
//! end-of-stream or by an I/O error, both streams are closed: the finished
//! direction shuts down its writer and tells the opposite direction to stop.
//! A chunk the opposite direction has already read is still written before
//! it stops.
//!
//! `forward` returns only after both directions have finished and both
//! streams have been dropped.  It never fails outward; problems are logged.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::application::transport::Connection;

/// Size of the relay buffer used by each direction.
pub const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Byte counts for a finished relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Bytes read from the first stream and written to the second.
    pub sent: u64,
    /// Bytes read from the second stream and written to the first.
    pub received: u64,
}

/// How one relay direction ended.
#[derive(Debug)]
enum PumpOutcome {
    /// The reader reached end-of-stream.
    Finished(u64),
    /// Reading or writing failed.
    Failed(u64, io::Error),
    /// The opposite direction ended first.
    Aborted(u64),
}

impl PumpOutcome {
    fn bytes(&self) -> u64 {
        match self {
            PumpOutcome::Finished(n) | PumpOutcome::Failed(n, _) | PumpOutcome::Aborted(n) => *n,
        }
    }
}

/// Relays bytes between two connections until both directions are done.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionForwarder;

impl ConnectionForwarder {
    pub fn new() -> Self {
        Self
    }

    /// Relays `a` <-> `b` and closes both when finished.
    ///
    /// `label` identifies the connection in log records (normally the
    /// accepted peer's address).
    pub async fn forward(&self, a: Connection, b: Connection, label: &str) -> ForwardStats {
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);

        let (done_tx, _) = watch::channel(false);
        let done = Arc::new(done_tx);

        let outbound = tokio::spawn(pump(a_read, b_write, Arc::clone(&done)));
        let inbound = tokio::spawn(pump(b_read, a_write, done));

        let (outbound, inbound) = tokio::join!(outbound, inbound);
        let outbound = settle(label, "outbound", outbound);
        let inbound = settle(label, "inbound", inbound);

        let stats = ForwardStats {
            sent: outbound.bytes(),
            received: inbound.bytes(),
        };
        debug!(
            sent = stats.sent,
            received = stats.received,
            "{label}: relay finished"
        );
        info!("{label}: closed");
        stats
    }
}

fn settle(
    label: &str,
    direction: &str,
    joined: Result<PumpOutcome, tokio::task::JoinError>,
) -> PumpOutcome {
    match joined {
        Ok(PumpOutcome::Failed(n, e)) => {
            debug!("{label}: {direction} relay failed after {n} bytes: {e}");
            PumpOutcome::Failed(n, e)
        }
        Ok(PumpOutcome::Aborted(n)) => {
            debug!("{label}: {direction} relay aborted after {n} bytes");
            PumpOutcome::Aborted(n)
        }
        Ok(outcome) => outcome,
        Err(e) => {
            debug!("{label}: {direction} relay task ended abnormally: {e}");
            PumpOutcome::Aborted(0)
        }
    }
}

/// Copies `reader` into `writer` until EOF, an error, or the other direction
/// reports that it ended.  Whatever the outcome, `writer` is shut down and
/// the other direction is told to stop.
async fn pump<R, W>(mut reader: R, mut writer: W, done: Arc<watch::Sender<bool>>) -> PumpOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stop = done.subscribe();
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut copied = 0u64;

    let outcome = loop {
        let read = tokio::select! {
            r = reader.read(&mut buf) => r,
            _ = stopped(&mut stop) => break PumpOutcome::Aborted(copied),
        };
        let n = match read {
            Ok(0) => break PumpOutcome::Finished(copied),
            Ok(n) => n,
            Err(e) => break PumpOutcome::Failed(copied, e),
        };
        if let Err(e) = write_chunk(&mut writer, &buf[..n]).await {
            break PumpOutcome::Failed(copied, e);
        }
        copied += n as u64;
    };

    done.send_replace(true);
    let _ = writer.shutdown().await;
    outcome
}

/// Resolves once the stop flag is set.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

async fn write_chunk<W>(writer: &mut W, chunk: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(chunk).await?;
    writer.flush().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

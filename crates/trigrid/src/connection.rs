//! Socket plumbing: splits an accepted stream into the dispatcher's
//! read half and a spawned writer task.
//!
//! The writer owns the write half and drains the handle's outbound
//! channel, so any task can queue a frame without touching the socket.
//! Both the writer and the dispatcher's read loop select on the close
//! signal, which is how a forced close interrupts a blocked read.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::watch;

use trigrid_session::ConnectionHandle;

/// Sets a connection up: returns the handle, the read half for the
/// dispatcher, and the dispatcher's copy of the close signal. The
/// writer task is already running.
pub(crate) fn spawn(
    stream: TcpStream,
) -> (ConnectionHandle, OwnedReadHalf, watch::Receiver<bool>) {
    let (rd, mut wr) = stream.into_split();
    let (handle, mut outbound, mut closed) = ConnectionHandle::new();
    let conn_id = handle.id();
    let reader_closed = handle.closed();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = wr.write_all(&frame).await {
                            tracing::debug!(%conn_id, error = %e, "write failed");
                            break;
                        }
                    }
                    None => break,
                },
                _ = closed.changed() => break,
            }
        }
        let _ = wr.shutdown().await;
        tracing::debug!(%conn_id, "writer task finished");
    });

    (handle, rd, reader_closed)
}

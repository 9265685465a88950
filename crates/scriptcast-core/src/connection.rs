//! A single live link to a script-execution target.
//!
//! A `Connection` owns both halves of its TCP stream through two tasks:
//! a writer that drains queued frames, and a reader whose only job is to
//! observe the peer closing the socket (the protocol is send-only, so any
//! inbound bytes are discarded). The reader reports the port on the shared
//! close channel at most once; the hub turns that into a registry removal.

use std::net::IpAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Errors from a single connection attempt.
///
/// The scanner treats every variant identically: the port stays unclaimed
/// and is retried on the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect timed out")]
    Timeout,
}

/// An established link to the target listening on `port`.
///
/// The port doubles as connection identity: the registry never holds two
/// connections to the same port.
#[derive(Debug)]
pub struct Connection {
    port: u16,
    frame_tx: mpsc::UnboundedSender<Bytes>,
    reader: JoinHandle<()>,
    writer: Option<JoinHandle<()>>,
}

impl Connection {
    /// Attempt a connection to `host:port`, giving up after `timeout`.
    ///
    /// On timeout the pending attempt is dropped, which cancels it; a late
    /// success can never surface after the scan cycle has moved on.
    ///
    /// # Errors
    ///
    /// Returns `ConnectError` if the target refuses, the transport fails,
    /// or the timeout expires first.
    pub async fn open(
        host: IpAddr,
        port: u16,
        timeout: Duration,
        closed_tx: mpsc::UnboundedSender<u16>,
    ) -> Result<Self, ConnectError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ConnectError::Timeout)??;
        stream.set_nodelay(true)?;

        let (mut read_half, mut write_half) = stream.into_split();
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Bytes>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(e) = write_half.write_all(&frame).await {
                    warn!("[{port}] write failed: {e}");
                    break;
                }
                trace!("[{port}] wrote {} bytes", frame.len());
            }
        });

        let reader = tokio::spawn(async move {
            let mut sink = [0u8; 1024];
            loop {
                match read_half.read(&mut sink).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            debug!("[{port}] peer closed");
            let _ = closed_tx.send(port);
        });

        debug!("[{port}] connected");
        Ok(Self {
            port,
            frame_tx,
            reader,
            writer: Some(writer),
        })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Queue one frame for delivery.
    ///
    /// Fire-and-forget: a frame queued while the connection is tearing
    /// down is silently dropped.
    pub fn send(&self, frame: Bytes) {
        if self.frame_tx.send(frame).is_err() {
            debug!("[{}] dropped frame, connection closing", self.port);
        }
    }

    /// Close the connection after flushing queued frames.
    pub async fn shutdown(mut self) {
        self.reader.abort();
        if let Some(writer) = self.writer.take() {
            // Swapping the sender out closes the queue; the writer drains
            // what is left and exits.
            let (detached_tx, _detached_rx) = mpsc::unbounded_channel();
            drop(std::mem::replace(&mut self.frame_tx, detached_tx));
            let _ = writer.await;
        }
        debug!("[{}] closed", self.port);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // The writer exits on its own once the frame queue closes.
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_millis(500);

    async fn loopback_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_open_succeeds_against_listener() {
        let (listener, port) = loopback_listener().await;
        let (closed_tx, _closed_rx) = mpsc::unbounded_channel();

        let conn = Connection::open("127.0.0.1".parse().unwrap(), port, TIMEOUT, closed_tx)
            .await
            .unwrap();
        assert_eq!(conn.port(), port);

        drop(listener);
    }

    #[tokio::test]
    async fn test_open_refused_port_fails() {
        let (listener, port) = loopback_listener().await;
        drop(listener);

        let (closed_tx, _closed_rx) = mpsc::unbounded_channel();
        let result =
            Connection::open("127.0.0.1".parse().unwrap(), port, TIMEOUT, closed_tx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (listener, port) = loopback_listener().await;
        let (closed_tx, _closed_rx) = mpsc::unbounded_channel();

        let conn = Connection::open("127.0.0.1".parse().unwrap(), port, TIMEOUT, closed_tx)
            .await
            .unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();

        conn.send(Bytes::from_static(b"payload"));

        let mut received = [0u8; 7];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"payload");
    }

    #[tokio::test]
    async fn test_peer_close_reports_port_once() {
        let (listener, port) = loopback_listener().await;
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();

        let _conn = Connection::open("127.0.0.1".parse().unwrap(), port, TIMEOUT, closed_tx)
            .await
            .unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        drop(peer);

        let reported = tokio::time::timeout(Duration::from_secs(2), closed_rx.recv())
            .await
            .unwrap();
        assert_eq!(reported, Some(port));
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queued_frames() {
        let (listener, port) = loopback_listener().await;
        let (closed_tx, _closed_rx) = mpsc::unbounded_channel();

        let conn = Connection::open("127.0.0.1".parse().unwrap(), port, TIMEOUT, closed_tx)
            .await
            .unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();

        conn.send(Bytes::from_static(b"last words"));
        conn.shutdown().await;

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"last words");
    }
}

//! Bounded-time byte transport over a duplex stream.
//!
//! Every operation is wrapped in the transport's timeout and surfaces a
//! timeout-specific error when it elapses. The stream is owned exclusively and
//! released by [`Transport::close`] or by drop, whichever comes first.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument, trace};

use crate::config::Endpoint;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::timeout::with_timeout;

/// Owned connection plus the timeout applied to each blocking step
#[derive(Debug)]
pub struct Transport<S = TcpStream> {
    stream: Option<S>,
    timeout: Duration,
}

impl Transport<TcpStream> {
    /// Open a TCP connection to `endpoint`, giving up after `timeout`.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn open(endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        let connecting = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = establish(endpoint, timeout, connecting).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        debug!("Transport opened");
        Ok(Self::from_stream(stream, timeout))
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream
    pub fn from_stream(stream: S, timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> Result<&mut S> {
        self.stream.as_mut().ok_or(ProtocolError::ConnectionClosed)
    }

    /// Read exactly `n` bytes, accumulating across short reads.
    ///
    /// The whole read shares one deadline. A peer that closes before sending
    /// anything yields `EmptyResponse`; one that closes part-way yields a
    /// truncated-frame `FramingError`.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;

        with_timeout(timeout, ProtocolError::ReadTimeout, async move {
            let mut buf = vec![0u8; n];
            let mut filled = 0;
            while filled < n {
                let read = stream.read(&mut buf[filled..]).await.map_err(map_io)?;
                if read == 0 {
                    return Err(if filled == 0 {
                        ProtocolError::EmptyResponse
                    } else {
                        ProtocolError::FramingError(format!(
                            "{}: received {filled} of {n} bytes",
                            constants::ERR_TRUNCATED_FRAME
                        ))
                    });
                }
                filled += read;
                trace!(read, filled, wanted = n, "Partial read");
            }
            Ok(buf)
        })
        .await
    }

    /// Single read of at most `max` bytes. An empty result means the peer closed.
    pub async fn read_some(&mut self, max: usize) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;

        with_timeout(timeout, ProtocolError::ReadTimeout, async move {
            let mut buf = vec![0u8; max];
            let read = stream.read(&mut buf).await.map_err(map_io)?;
            buf.truncate(read);
            Ok(buf)
        })
        .await
    }

    /// Write and flush the complete buffer
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;

        with_timeout(timeout, ProtocolError::WriteTimeout, async move {
            stream.write_all(bytes).await.map_err(map_io)?;
            stream.flush().await.map_err(map_io)
        })
        .await
    }

    /// Shut the stream down and release it. Calling this again does nothing.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            match tokio::time::timeout(self.timeout, stream.shutdown()).await {
                Ok(Ok(())) => debug!("Transport closed"),
                Ok(Err(e)) => debug!(error = %e, "Shutdown failed, dropping stream"),
                Err(_) => debug!("Shutdown timed out, dropping stream"),
            }
        }
    }
}

/// Await `connecting` for at most `timeout`, classifying the outcome.
async fn establish<S, F>(endpoint: &Endpoint, timeout: Duration, connecting: F) -> Result<S>
where
    F: Future<Output = io::Result<S>>,
{
    match tokio::time::timeout(timeout, connecting).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ProtocolError::ConnectError {
            endpoint: endpoint.to_string(),
            source,
        }),
        Err(_) => Err(ProtocolError::ConnectTimeout),
    }
}

fn map_io(e: io::Error) -> ProtocolError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => ProtocolError::ConnectionClosed,
        _ => ProtocolError::Io(e),
    }
}

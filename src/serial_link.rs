use crate::prelude::*;
use crate::config::Source;
use crate::source::Sender;

use {
    bytes::Bytes,
    futures::StreamExt,
    net2::TcpStreamExt,
    std::time::Duration,
    tokio::io::AsyncRead,
    tokio::sync::mpsc::error::TrySendError,
    tokio_util::codec::{BytesCodec, FramedRead},
};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const RECONNECT_DELAY_SECS: u64 = 5; // Delay before reconnection attempts
const TCP_KEEPALIVE_SECS: u64 = 60; // TCP keepalive interval

/// Feeds raw controller bytes into the decoder's channel, either from a
/// serial-to-network bridge over TCP or from a capture file.
///
/// Chunks that do not fit into the channel are dropped, the same way a UART
/// FIFO overflows when it is not drained in time.
pub struct SerialLink {
    config: config::Vedirect,
    tx: Sender,
    overflowing: bool,
    bytes_forwarded: u64,
    bytes_dropped: u64,
}

impl SerialLink {
    pub fn new(config: config::Vedirect, tx: Sender) -> Self {
        Self {
            config,
            tx,
            overflowing: false,
            bytes_forwarded: 0,
            bytes_dropped: 0,
        }
    }

    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes_forwarded
    }

    pub fn bytes_dropped(&self) -> u64 {
        self.bytes_dropped
    }

    /// Runs until the receiving side goes away, or a non-looping replay
    /// reaches the end of its file.
    pub async fn start(&mut self) -> Result<()> {
        loop {
            let result = match self.config.source() {
                Source::Tcp => self.run_tcp().await,
                Source::File => self.run_file().await,
            };

            if self.tx.is_closed() {
                break;
            }

            match result {
                Ok(()) if self.config.source() == Source::File && !self.config.replay_loop() => {
                    info!("{}: replay finished", self.config.describe());
                    break;
                }
                Ok(()) => {}
                Err(e) => {
                    error!("{}: {}", self.config.describe(), e);
                    info!("{}: reconnecting in {}s", self.config.describe(), RECONNECT_DELAY_SECS);
                    tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                }
            }
        }

        info!(
            "{}: link exiting, {} bytes forwarded, {} dropped",
            self.config.describe(),
            self.bytes_forwarded,
            self.bytes_dropped
        );
        Ok(())
    }

    async fn run_tcp(&mut self) -> Result<()> {
        let host_port = (self.config.host().to_owned(), self.config.port());
        info!("attempting connection to {}", self.config.describe());

        let stream = match tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            tokio::net::TcpStream::connect(host_port),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => bail!("Failed to connect: {}", e),
            Err(_) => bail!("Connection timeout after {} seconds", CONNECT_TIMEOUT_SECS),
        };

        let std_stream = stream.into_std()?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("Failed to set TCP keepalive: {}", e);
        }
        let stream = tokio::net::TcpStream::from_std(std_stream)?;

        info!("{}: connection established", self.config.describe());

        let read_timeout = Duration::from_secs(self.config.read_timeout());
        let mut frames = FramedRead::new(stream, BytesCodec::new());

        loop {
            let chunk = match tokio::time::timeout(read_timeout, frames.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => bail!("Read error: {}", e),
                Ok(None) => bail!("Connection closed by peer"),
                Err(_) => bail!("No data received for {} seconds", read_timeout.as_secs()),
            };

            if !self.forward(chunk.freeze()) {
                return Ok(());
            }
        }
    }

    async fn run_file(&mut self) -> Result<()> {
        let file = tokio::fs::File::open(self.config.path())
            .await
            .map_err(|err| anyhow!("error opening {}: {}", self.config.path(), err))?;
        info!("{}: replaying", self.config.describe());

        self.replay(file).await
    }

    /// Forwards everything `reader` yields, pausing between chunks. Replay
    /// waits for room in the channel rather than dropping.
    pub async fn replay<R: AsyncRead + Unpin>(&mut self, reader: R) -> Result<()> {
        let delay = self.config.replay_chunk_delay();
        let mut frames = FramedRead::new(reader, BytesCodec::new());

        while let Some(chunk) = frames.next().await {
            let chunk = chunk?;
            let len = chunk.len() as u64;
            if self.tx.send(chunk.freeze()).await.is_err() {
                return Ok(());
            }
            self.bytes_forwarded += len;

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(())
    }

    /// Returns false once the receiving side is gone.
    fn forward(&mut self, chunk: Bytes) -> bool {
        let len = chunk.len() as u64;
        match self.tx.try_send(chunk) {
            Ok(()) => {
                if self.overflowing {
                    info!("{}: receive buffer drained, resuming", self.config.describe());
                    self.overflowing = false;
                }
                self.bytes_forwarded += len;
                true
            }
            Err(TrySendError::Full(_)) => {
                if !self.overflowing {
                    warn!("{}: receive buffer full, dropping input", self.config.describe());
                    self.overflowing = true;
                }
                self.bytes_dropped += len;
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

use crate::prelude::*;

use {
    bytes::{Buf, Bytes},
    std::collections::VecDeque,
    tokio::sync::mpsc::error::TryRecvError,
};

/// Something the frame handler can drain without waiting.
pub trait ByteSource {
    /// The next buffered byte, or None when nothing is buffered right now.
    fn read_byte(&mut self) -> Option<u8>;
}

impl ByteSource for VecDeque<u8> {
    fn read_byte(&mut self) -> Option<u8> {
        self.pop_front()
    }
}

pub type Sender = mpsc::Sender<Bytes>;

/// Receiving end of the channel the serial link writes chunks into.
pub struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
    pending: Bytes,
    closed: bool,
}

/// A bounded chunk channel; `capacity` counts chunks, not bytes.
pub fn channel(capacity: usize) -> (Sender, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ChannelSource::new(rx))
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            pending: Bytes::new(),
            closed: false,
        }
    }

    /// True once every sender is gone and nothing is left to read.
    pub fn is_closed(&self) -> bool {
        self.closed && !self.pending.has_remaining()
    }
}

impl ByteSource for ChannelSource {
    fn read_byte(&mut self) -> Option<u8> {
        loop {
            if self.pending.has_remaining() {
                return Some(self.pending.get_u8());
            }

            match self.rx.try_recv() {
                Ok(chunk) => self.pending = chunk,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        debug!("byte channel closed");
                    }
                    self.closed = true;
                    return None;
                }
            }
        }
    }
}

use crate::prelude::*;
use crate::source::ByteSource;
use crate::vedirect::hex::{AcceptAll, HexHandler};

use {
    serde::Serialize,
    std::collections::BTreeMap,
    std::sync::Arc,
    std::time::{Duration, Instant},
};

/// Name of the record that closes a text frame. Its value is a single raw
/// byte chosen so the whole frame sums to zero.
pub const CHECKSUM_TAG: &str = "CHECKSUM";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Record name -> record value of the last frame that passed its checksum.
pub type Snapshot = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Idle,
    RecordBegin,
    RecordName,
    RecordValue,
    Checksum,
    HexRecord,
}

// Clock {{{
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
} // }}}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct FrameStats {
    pub frames_valid: u64,
    pub frames_invalid: u64,
    pub hex_frames: u64,
    pub bytes_received: u64,
}

/// Byte-at-a-time decoder for the VE.Direct text protocol.
///
/// Bytes go in through [`FrameHandler::rx_data`] (or [`FrameHandler::poll`],
/// which drains a [`ByteSource`]). Records are collected into a pending frame
/// and only become visible through [`FrameHandler::snapshot`] once the
/// `Checksum` record closes the frame with a running sum of zero.
pub struct FrameHandler {
    state: State,
    checksum: u8,
    name: String,
    value: Vec<u8>,
    frame: Vec<(String, String)>,
    published: Arc<Snapshot>,
    last_update: Option<Instant>,
    poll_interval: Duration,
    hex_handler: Box<dyn HexHandler>,
    clock: Box<dyn Clock>,
    stats: FrameStats,
}

impl Default for FrameHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            checksum: 0,
            name: String::new(),
            value: Vec::new(),
            frame: Vec::new(),
            published: Arc::new(Snapshot::new()),
            last_update: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            hex_handler: Box::new(AcceptAll),
            clock: Box::new(MonotonicClock),
            stats: FrameStats::default(),
        }
    }

    pub fn with_hex_handler(mut self, hex_handler: Box<dyn HexHandler>) -> Self {
        self.hex_handler = hex_handler;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Drains every byte `source` has buffered right now, unless a frame
    /// validated less than `poll_interval` ago. Returns the number of bytes
    /// consumed.
    pub fn poll<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> usize {
        if !self.poll_due() {
            return 0;
        }

        let mut consumed = 0;
        while let Some(byte) = source.read_byte() {
            self.rx_data(byte);
            consumed += 1;
        }

        consumed
    }

    pub fn poll_due(&self) -> bool {
        match self.last_update {
            Some(last) => self.clock.now().saturating_duration_since(last) >= self.poll_interval,
            None => true,
        }
    }

    pub fn rx_data(&mut self, byte: u8) {
        self.stats.bytes_received += 1;

        if self.starts_hex_record(byte) {
            self.state = State::HexRecord;
        }
        if self.state != State::HexRecord {
            self.checksum = self.checksum.wrapping_add(byte);
        }
        let upper = byte.to_ascii_uppercase();

        match self.state {
            State::Idle => {
                // wait for the \n that starts a record, \r and anything else is noise
                if upper == b'\n' {
                    self.state = State::RecordBegin;
                }
            }
            State::RecordBegin => {
                self.name.clear();
                self.name.push(upper as char);
                self.state = State::RecordName;
            }
            State::RecordName => match upper {
                b'\t' => {
                    if self.name == CHECKSUM_TAG {
                        self.state = State::Checksum;
                    } else {
                        self.value.clear();
                        self.state = State::RecordValue;
                    }
                }
                b'#' => {} // stray byte seen in serial number fields
                _ => self.name.push(upper as char),
            },
            State::RecordValue => match byte {
                b'\n' => {
                    let name = std::mem::take(&mut self.name);
                    let value = String::from_utf8_lossy(&self.value).into_owned();
                    self.value.clear();
                    self.frame.push((name, value));
                    self.state = State::RecordBegin;
                }
                b'\r' => {}
                _ => self.value.push(byte),
            },
            State::Checksum => {
                let valid = self.checksum == 0;
                self.checksum = 0;
                self.state = State::Idle;
                self.frame_end(valid);
            }
            State::HexRecord => {
                if self.hex_handler.rx_data(upper) {
                    self.stats.hex_frames += 1;
                    self.checksum = 0;
                    self.state = State::Idle;
                    // a text frame cut by a hex record can never validate
                    if !self.frame.is_empty() {
                        debug!("hex record interrupted a frame, dropping {} records", self.frame.len());
                        self.frame.clear();
                    }
                }
            }
        }
    }

    /// A colon opens a hex record anywhere except on the checksum byte
    /// itself, which may legitimately be 0x3A.
    fn starts_hex_record(&self, byte: u8) -> bool {
        byte == b':' && self.state != State::Checksum
    }

    fn frame_end(&mut self, valid: bool) {
        if valid {
            let snapshot: Snapshot = self.frame.drain(..).collect();
            debug!("[CHECKSUM] valid frame with {} records", snapshot.len());
            self.published = Arc::new(snapshot);
            self.last_update = Some(self.clock.now());
            self.stats.frames_valid += 1;
        } else {
            warn!("[CHECKSUM] Invalid frame, dropping {} records", self.frame.len());
            self.stats.frames_invalid += 1;
        }

        self.frame.clear();
    }

    /// Value of `name` in the last validated frame, or "" when absent.
    /// Names are stored uppercased.
    pub fn get(&self, name: &str) -> &str {
        self.published.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.clone()
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Time since the last validated frame, None if no frame validated yet.
    pub fn data_age(&self) -> Option<Duration> {
        self.last_update
            .map(|last| self.clock.now().saturating_duration_since(last))
    }
}

use crate::prelude::*;

/// Receives the bytes of a `:`-prefixed hex record, leading colon included.
///
/// The frame handler stops forwarding bytes and returns to idle as soon as
/// `rx_data` reports the record complete.
pub trait HexHandler: Send {
    fn rx_data(&mut self, byte: u8) -> bool;
}

/// Treats every byte as a complete hex record.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl HexHandler for AcceptAll {
    fn rx_data(&mut self, _byte: u8) -> bool {
        true
    }
}

pub const MAX_HEX_RECORD_LEN: usize = 512;

/// Command nibble plus every payload byte plus the check byte sum to this.
pub const HEX_CHECKSUM: u8 = 0x55;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HexRecord {
    pub command: u8,
    pub payload: Vec<u8>,
}

impl HexRecord {
    /// Parses the characters between the colon and the newline, e.g. `154`
    /// for a ping. The trailing byte pair is the check byte and is not part
    /// of the payload.
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < 3 || body.len() % 2 == 0 {
            bail!("hex record has invalid length {}", body.len());
        }

        let command = nibble(body[0])?;
        let bytes = body[1..]
            .chunks(2)
            .map(|pair| -> Result<u8> { Ok((nibble(pair[0])? << 4) | nibble(pair[1])?) })
            .collect::<Result<Vec<u8>>>()?;

        let sum = bytes.iter().fold(command, |acc, b| acc.wrapping_add(*b));
        if sum != HEX_CHECKSUM {
            bail!("hex record checksum is 0x{:02X}, expected 0x{:02X}", sum, HEX_CHECKSUM);
        }

        let payload = bytes[..bytes.len() - 1].to_vec();
        Ok(Self { command, payload })
    }
}

fn nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(anyhow!("invalid hex digit 0x{:02X}", c)),
    }
}

/// Collects a hex record up to its terminating newline and checks it.
#[derive(Debug, Default)]
pub struct HexLineHandler {
    buf: Vec<u8>,
    last_record: Option<HexRecord>,
    records_valid: u64,
    records_invalid: u64,
}

impl HexLineHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_record(&self) -> Option<&HexRecord> {
        self.last_record.as_ref()
    }

    pub fn records_valid(&self) -> u64 {
        self.records_valid
    }

    pub fn records_invalid(&self) -> u64 {
        self.records_invalid
    }

    fn finish(&mut self) {
        match HexRecord::parse(&self.buf) {
            Ok(record) => {
                debug!("hex record: command {:X}, {} payload bytes", record.command, record.payload.len());
                self.last_record = Some(record);
                self.records_valid += 1;
            }
            Err(e) => {
                warn!("dropping hex record: {}", e);
                self.records_invalid += 1;
            }
        }
        self.buf.clear();
    }
}

impl HexHandler for HexLineHandler {
    fn rx_data(&mut self, byte: u8) -> bool {
        match byte {
            b':' if self.buf.is_empty() => false,
            b'\r' => false,
            b'\n' => {
                self.finish();
                true
            }
            _ => {
                self.buf.push(byte);
                if self.buf.len() > MAX_HEX_RECORD_LEN {
                    warn!("hex record exceeds {} bytes, abandoning", MAX_HEX_RECORD_LEN);
                    self.records_invalid += 1;
                    self.buf.clear();
                    return true;
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(handler: &mut HexLineHandler, bytes: &[u8]) -> Vec<bool> {
        bytes.iter().map(|b| handler.rx_data(*b)).collect()
    }

    #[test]
    fn accept_all_completes_on_every_byte() {
        let mut handler = AcceptAll;
        assert!(handler.rx_data(b':'));
        assert!(handler.rx_data(b'7'));
    }

    #[test]
    fn ping_record() {
        let mut handler = HexLineHandler::new();
        let done = feed(&mut handler, b":154\n");
        assert_eq!(done, vec![false, false, false, false, true]);
        assert_eq!(handler.records_valid(), 1);
        assert_eq!(
            handler.last_record(),
            Some(&HexRecord { command: 1, payload: vec![] })
        );
    }

    #[test]
    fn record_with_payload() -> Result<()> {
        let record = HexRecord::parse(b"51641F9")?;
        assert_eq!(record.command, 5);
        assert_eq!(record.payload, vec![0x16, 0x41]);
        Ok(())
    }

    #[test]
    fn bad_checksum_is_counted() {
        let mut handler = HexLineHandler::new();
        feed(&mut handler, b":155\r\n");
        assert_eq!(handler.records_valid(), 0);
        assert_eq!(handler.records_invalid(), 1);
        assert!(handler.last_record().is_none());
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(HexRecord::parse(b"15").is_err());
        assert!(HexRecord::parse(b"1G4").is_err());
        assert!(HexRecord::parse(b"").is_err());
    }

    #[test]
    fn overlong_record_is_abandoned() {
        let mut handler = HexLineHandler::new();
        assert!(!handler.rx_data(b':'));
        for _ in 0..MAX_HEX_RECORD_LEN {
            assert!(!handler.rx_data(b'A'));
        }
        assert!(handler.rx_data(b'A'));
        assert_eq!(handler.records_invalid(), 1);
    }
}

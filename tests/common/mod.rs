#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use vedirect_bridge::vedirect::Clock;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

pub struct Factory;

impl Factory {
    /// Text frame as a controller sends it, minus the checksum byte.
    pub fn frame_body(records: &[(&str, &str)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (name, value) in records {
            bytes.extend_from_slice(b"\r\n");
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(b'\t');
            bytes.extend_from_slice(value.as_bytes());
        }
        bytes.extend_from_slice(b"\r\nChecksum\t");
        bytes
    }

    pub fn sum(bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
    }

    /// Frame whose bytes sum to zero.
    pub fn frame(records: &[(&str, &str)]) -> Vec<u8> {
        let mut bytes = Self::frame_body(records);
        bytes.push(0u8.wrapping_sub(Self::sum(&bytes)));
        bytes
    }

    /// Frame whose checksum is off by one.
    pub fn corrupt_frame(records: &[(&str, &str)]) -> Vec<u8> {
        let mut bytes = Self::frame(records);
        if let Some(last) = bytes.last_mut() {
            *last = last.wrapping_add(1);
        }
        bytes
    }

    /// Valid frame ending in `checksum_byte`, balanced by idle noise sent
    /// ahead of it.
    pub fn frame_with_checksum_byte(records: &[(&str, &str)], checksum_byte: u8) -> Vec<u8> {
        let body = Self::frame_body(records);
        let needed = 0u8
            .wrapping_sub(Self::sum(&body))
            .wrapping_sub(checksum_byte);

        let mut bytes = match needed {
            0 => Vec::new(),
            b'\n' | b':' => vec![needed.wrapping_sub(1), 1],
            _ => vec![needed],
        };
        bytes.extend_from_slice(&body);
        bytes.push(checksum_byte);
        bytes
    }

    pub fn mppt_records() -> Vec<(&'static str, &'static str)> {
        vec![
            ("PID", "0xA053"),
            ("FW", "159"),
            ("SER#", "HQ2132QY2KR"),
            ("V", "13250"),
            ("I", "4100"),
            ("VPV", "36810"),
            ("PPV", "56"),
            ("CS", "3"),
            ("MPPT", "2"),
            ("OR", "0x00000000"),
            ("ERR", "0"),
            ("LOAD", "ON"),
            ("H19", "12345"),
            ("H20", "23"),
            ("H21", "148"),
            ("H22", "41"),
            ("H23", "201"),
            ("HSDS", "37"),
        ]
    }
}

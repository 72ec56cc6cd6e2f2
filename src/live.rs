use crate::vedirect::lookup;
use crate::vedirect::{FrameHandler, Snapshot};

use serde::Serialize;
use std::time::Duration;

/// Data older than this many poll intervals is flagged critical.
pub const AGE_CRITICAL_FACTOR: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Measurement {
    pub v: f64,
    pub u: &'static str,
}

impl Measurement {
    fn new(v: f64, u: &'static str) -> Self {
        Self { v, u }
    }
}

/// Human-readable view of the last validated frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LiveData {
    pub data_age: Option<u64>,
    pub age_critical: bool,

    #[serde(rename = "PID")]
    pub pid: String,
    #[serde(rename = "SER")]
    pub serial: String,
    #[serde(rename = "FW")]
    pub firmware: String,
    #[serde(rename = "LOAD")]
    pub load: String,
    #[serde(rename = "CS")]
    pub operating_state: String,
    #[serde(rename = "ERR")]
    pub error: String,
    #[serde(rename = "OR")]
    pub off_reason: String,
    #[serde(rename = "MPPT")]
    pub mppt: String,
    #[serde(rename = "HSDS")]
    pub day_sequence: Measurement,

    // battery
    #[serde(rename = "V")]
    pub battery_voltage: Measurement,
    #[serde(rename = "I")]
    pub battery_current: Measurement,

    // panel
    #[serde(rename = "VPV")]
    pub panel_voltage: Measurement,
    #[serde(rename = "PPV")]
    pub panel_power: Measurement,
    #[serde(rename = "H19")]
    pub yield_total: Measurement,
    #[serde(rename = "H20")]
    pub yield_today: Measurement,
    #[serde(rename = "H21")]
    pub max_power_today: Measurement,
    #[serde(rename = "H22")]
    pub yield_yesterday: Measurement,
    #[serde(rename = "H23")]
    pub max_power_yesterday: Measurement,
}

impl LiveData {
    pub fn new(handler: &FrameHandler) -> Self {
        Self::from_snapshot(&handler.snapshot(), handler.data_age(), handler.poll_interval())
    }

    pub fn from_snapshot(snapshot: &Snapshot, age: Option<Duration>, poll_interval: Duration) -> Self {
        let text = |name: &str| snapshot.get(name).cloned().unwrap_or_default();
        let number = |name: &str| {
            snapshot
                .get(name)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        // milli units to two decimals
        let milli = |name: &str| (number(name) / 10.0).round() / 100.0;
        // hundredths of a kWh
        let centi = |name: &str| number(name) / 100.0;

        let data_age = age.map(|a| a.as_secs());
        let age_critical = match age {
            Some(age) => age.as_secs() > (poll_interval * AGE_CRITICAL_FACTOR).as_secs(),
            None => true,
        };

        Self {
            data_age,
            age_critical,
            pid: lookup::pid_as_string(&text("PID")),
            serial: text("SER"),
            firmware: text("FW"),
            load: text("LOAD"),
            operating_state: lookup::cs_as_string(&text("CS")),
            error: lookup::err_as_string(&text("ERR")),
            off_reason: lookup::or_as_string(&text("OR")),
            mppt: lookup::mppt_as_string(&text("MPPT")),
            day_sequence: Measurement::new(number("HSDS").trunc(), "Days"),
            battery_voltage: Measurement::new(milli("V"), "V"),
            battery_current: Measurement::new(milli("I"), "A"),
            panel_voltage: Measurement::new(milli("VPV"), "V"),
            panel_power: Measurement::new(number("PPV").trunc(), "W"),
            yield_total: Measurement::new(centi("H19"), "kWh"),
            yield_today: Measurement::new(centi("H20"), "kWh"),
            max_power_today: Measurement::new(number("H21").trunc(), "W"),
            yield_yesterday: Measurement::new(centi("H22"), "kWh"),
            max_power_yesterday: Measurement::new(number("H23").trunc(), "W"),
        }
    }
}

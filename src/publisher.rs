use crate::prelude::*;
use crate::datalog_writer::DatalogWriter;
use crate::live::LiveData;
use crate::vedirect::FrameHandler;

use std::time::{Duration, Instant};

/// Decides when live data goes out: whenever a new frame validated, and at
/// least every `interval` regardless.
pub struct Publisher {
    check_interval: Duration,
    interval: Duration,
    last_check: Option<Instant>,
    last_publish: Option<Instant>,
    published_update: Option<Instant>,
    datalog: Option<DatalogWriter>,
    published: u64,
}

impl Publisher {
    pub fn new(config: &config::Publish) -> Result<Self> {
        let datalog = match config.datalog_file() {
            Some(path) => Some(DatalogWriter::new(path)?),
            None => None,
        };

        Ok(Self {
            check_interval: config.check_interval(),
            interval: config.interval(),
            last_check: None,
            last_publish: None,
            published_update: None,
            datalog,
            published: 0,
        })
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    /// Rate limited to one answer per `check_interval`; calls in between
    /// return false.
    pub fn due(&mut self, now: Instant, last_update: Option<Instant>) -> bool {
        if let Some(last_check) = self.last_check {
            if now.saturating_duration_since(last_check) < self.check_interval {
                return false;
            }
        }
        self.last_check = Some(now);

        let stale = match self.last_publish {
            Some(last_publish) => now.saturating_duration_since(last_publish) > self.interval,
            None => true,
        };

        stale || last_update != self.published_update
    }

    pub fn publish(&mut self, handler: &FrameHandler, now: Instant) -> Result<LiveData> {
        let live = LiveData::new(handler);

        self.last_publish = Some(now);
        self.published_update = handler.last_update();
        self.published += 1;

        info!(
            "{} [{}] {} {}V {}A, panel {}V {}W, age {}",
            live.pid,
            live.serial,
            live.operating_state,
            live.battery_voltage.v,
            live.battery_current.v,
            live.panel_voltage.v,
            live.panel_power.v,
            live.data_age.map(|a| format!("{}s", a)).unwrap_or_else(|| "n/a".to_string()),
        );
        if live.age_critical {
            warn!("VE.Direct data is stale");
        }

        if let Some(datalog) = &self.datalog {
            datalog.write_live(&live, &handler.snapshot())?;
        }

        Ok(live)
    }
}

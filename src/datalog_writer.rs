use crate::prelude::*;
use crate::live::LiveData;
use crate::vedirect::Snapshot;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct DatalogWriter {
    file: Arc<Mutex<std::fs::File>>,
    path: String,
    records_written: Arc<Mutex<u64>>,
}

impl DatalogWriter {
    pub fn new(path: &str) -> Result<Self> {
        info!("Opening datalog file at {}", path);

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open datalog file {}: {}", path, e);
                return Err(e.into());
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)) {
                error!("Failed to set permissions on datalog file {}: {}", path, e);
                return Err(e.into());
            }
        }

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path: path.to_string(),
            records_written: Arc::new(Mutex::new(0)),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends one JSON line holding the live view and the raw records it
    /// was built from.
    pub fn write_live(&self, live: &LiveData, raw: &Snapshot) -> Result<()> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let json_value = serde_json::json!({
            "utc_timestamp": timestamp,
            "live": live,
            "raw": raw,
        });
        let json_string = serde_json::to_string(&json_value)?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("Failed to lock datalog file"))?;
        if let Err(e) = writeln!(file, "{}", json_string).and_then(|_| file.flush()) {
            error!("Failed to write to datalog file {}: {}", self.path, e);
            return Err(e.into());
        }

        let mut records_written = self
            .records_written
            .lock()
            .map_err(|_| anyhow!("Failed to lock records counter"))?;
        *records_written += 1;
        debug!("Total records stored in datalog file: {}", *records_written);

        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.lock().map(|n| *n).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn snapshot() -> Snapshot {
        [("PID", "0xA053"), ("V", "13250"), ("CS", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_write_live() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("logs").join("vedirect.jsonl");
        let writer = DatalogWriter::new(path.to_str().unwrap())?;

        let raw = snapshot();
        let live = LiveData::from_snapshot(&raw, Some(Duration::from_secs(2)), Duration::from_secs(5));
        writer.write_live(&live, &raw)?;
        writer.write_live(&live, &raw)?;

        let contents = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(writer.records_written(), 2);

        let json: serde_json::Value = serde_json::from_str(lines[0])?;
        assert!(json["utc_timestamp"].is_u64());
        assert_eq!(json["raw"]["PID"], "0xA053");
        assert_eq!(json["live"]["PID"], "SmartSolar MPPT 75|15");
        assert_eq!(json["live"]["CS"], "Bulk");
        assert_eq!(json["live"]["V"]["v"], 13.25);
        assert_eq!(json["live"]["V"]["u"], "V");
        assert_eq!(json["live"]["data_age"], 2);

        Ok(())
    }

    #[test]
    fn appends_to_existing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("vedirect.jsonl");
        std::fs::write(&path, "{}\n")?;

        let writer = DatalogWriter::new(path.to_str().unwrap())?;
        let raw = Snapshot::new();
        writer.write_live(&LiveData::from_snapshot(&raw, None, Duration::from_secs(5)), &raw)?;

        let contents = std::fs::read_to_string(&path)?;
        assert_eq!(contents.lines().count(), 2);
        Ok(())
    }
}

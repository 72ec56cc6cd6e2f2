pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};
pub use tokio::sync::mpsc;

pub use crate::config::{self, Config};
pub use crate::options::Options;
pub use crate::source::{self, ByteSource, ChannelSource};
pub use crate::vedirect::{self, FrameHandler, FrameStats, Snapshot};

pub mod frame_handler;
pub mod hex;
pub mod lookup;

pub use frame_handler::{Clock, FrameHandler, FrameStats, MonotonicClock, Snapshot, State};
pub use hex::{AcceptAll, HexHandler, HexLineHandler};

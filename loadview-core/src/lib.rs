#![forbid(unsafe_code)]

mod aggregator;
mod delta;
mod endpoints;
mod error;
mod history;
pub mod stream;
mod totals;
mod trigger;

pub use aggregator::{Aggregator, Snapshot};
pub use delta::{Delta, RawDelta, decode_frame, decode_raw};
pub use endpoints::{Endpoints, START_TEST_PATH, STREAM_PATH};
pub use error::{Error, ErrorKind, Result};
pub use history::{HISTORY_CAPACITY, History, MAX_HISTORY_CAPACITY, Sample};
pub use stream::{
    ConnectionStatus, Control, EventFn, ReconnectPolicy, SessionHandle, StreamConfig,
    StreamEvent, StreamOutcome, StreamSession, control_channel, handle_frame,
};
pub use totals::CumulativeTotals;
pub use trigger::{TestRequest, TriggerClient};

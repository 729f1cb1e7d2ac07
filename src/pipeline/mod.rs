pub mod clock;
pub mod pump;
pub mod stats;

pub use clock::{FrameClock, IntervalClock, ManualClock, ManualTicker};
pub use pump::{FramePump, TickOutcome};
pub use stats::{PumpStats, StatsSnapshot};

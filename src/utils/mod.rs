pub mod clock;
pub mod duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use duration::{format_hms, format_hours, parse_hms, round_hours};

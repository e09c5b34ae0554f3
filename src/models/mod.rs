pub mod dose_log;
pub mod enums;
pub mod notification;
pub mod schedule;

pub use dose_log::*;
pub use notification::*;
pub use schedule::*;

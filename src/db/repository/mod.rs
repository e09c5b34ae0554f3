pub mod dose_log;
pub mod medication;
pub mod notification;
pub mod schedule;

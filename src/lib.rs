pub mod adjustment; // Schedule Adjustment Engine (one-time / permanent shifts)
pub mod collision; // Dose-spacing collision detection
pub mod compliance; // Per-slot and per-period compliance aggregation
pub mod config;
pub mod db;
pub mod dose_log; // Dose Log State Machine (confirm / skip / snooze)
pub mod error;
pub mod generator; // Dose-Time Generator (fixed_times / interval)
pub mod ids;
pub mod models;
pub mod reminders; // Due-reminder dispatch + notification settings
pub mod schedule; // Schedule lifecycle (create / update / delete)
pub mod time_slot; // Time-of-day classification + sleep windows

pub use error::ReminderError;

use tracing_subscriber::EnvFilter;

/// Initialize tracing with `RUST_LOG` or the crate default filter.
///
/// Call once from the embedding process; the engine itself only emits
/// events and never installs a subscriber on its own.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

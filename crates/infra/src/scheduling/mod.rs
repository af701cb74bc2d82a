//! Background scheduling of backup cycles.

pub mod backup_scheduler;
pub mod error;

pub use backup_scheduler::{BackupJob, BackupScheduler, BackupSchedulerConfig};
pub use error::{SchedulerError, SchedulerResult};

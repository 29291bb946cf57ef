mod log_record;
mod recovery_manager;

pub use log_record::LogRecord;
pub use recovery_manager::RecoveryManager;

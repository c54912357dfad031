//! On-disk format of the busline record log.
//!
//! The log is the only persisted artifact. Each entry is framed and
//! checksummed so a crash mid-append leaves at worst a torn tail, which
//! [`wal::scan`] detects and [`wal::LogWriter`] truncates away.

pub mod error;
pub mod wal;
pub mod codec;
pub mod fixtures;

pub use error::{PersistenceError, Result};
pub use wal::{LogEntry, LogHeader, LogScan, LogWriter};

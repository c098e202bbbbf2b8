//! Streaming, stateful DNP3 (IEEE 1815) wire dissector.
//!
//! Locates link-layer frames in an arbitrary byte stream, reassembles
//! multi-segment transport series per (source, destination) address pair,
//! parses the resulting application fragments, and reports everything
//! through the [`dissect::Hooks`] trait.
//!
//! ```
//! use dnp3dissect::config::DissectorSettings;
//! use dnp3dissect::dissect::Dissector;
//! use dnp3dissect::output::EventLog;
//!
//! let mut dissector = Dissector::new(&DissectorSettings::default(), EventLog::default());
//! dissector.feed(&[0x05, 0x64]); // partial frame: buffered, nothing emitted
//! let log = dissector.finish();
//! assert!(log.events.is_empty());
//! ```

pub mod app;
#[cfg(feature = "capture")]
pub mod capture;
pub mod config;
pub mod context;
pub mod dissect;
pub mod error;
pub mod link;
pub mod output;
pub mod transport;

pub use config::Config;
pub use dissect::{Dissector, DissectorStats, Hooks};
pub use error::{DissectError, Result};

//! Grid-status pipeline: placeholder history, timeline stitching, status
//! classification and the risk countdown. Everything here is pure apart from
//! the jitter source behind [`history::HistorySource`].

pub mod history;
pub mod status;
pub mod timeline;

pub use history::{DiurnalSynthesizer, HistorySource};

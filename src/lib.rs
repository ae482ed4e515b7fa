//! Title-block annotation for rendered drawing pages.
//!
//! A reviewer draws the title block on the page image, confirms it, then marks the
//! drawing number, title, revision and other fields on a magnified crop. The result
//! is saved to the page record as a versioned fingerprint that field extraction
//! downstream consumes.

pub mod app;
pub mod client;
pub mod config;
pub mod contract;
pub mod crop;
pub mod error;
pub mod field;
pub mod fingerprint;
pub mod geometry;
pub mod record;
pub mod server;
pub mod session;
pub mod store;
pub mod task;

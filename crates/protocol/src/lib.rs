//! Wire types shared by the GRiD session tooling.
//!
//! This crate contains the serde-serializable shapes that cross a boundary:
//! persisted session artifacts (the browser's storage-state JSON) and
//! requests observed by network interception.
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **1:1 with the browser format**: artifacts round-trip through context restore

pub mod request;
pub mod storage;

pub use request::*;
pub use storage::*;

//! Crew membership, feed visibility, pokes and the capture-to-upload flow.
//!
//! Everything here is synchronous over [`crewplate_db::Database`] except the
//! capture pipeline and blob stores, which are async.

pub mod accounts;
pub mod blob;
pub mod capture;
pub mod codes;
mod convert;
pub mod error;
pub mod feed;
pub mod membership;
pub mod notifications;
pub mod posts;
pub mod retry;

pub use error::{CoreError, Result};

#[cfg(test)]
pub(crate) mod testutil;

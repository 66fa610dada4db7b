//! Domain types and pure logic shared by every Bloch crate.
//!
//! Nothing in here touches the database or the network: the preference
//! resolver and the notification descriptor are plain data plus functions so
//! they can be exercised directly in unit tests.

pub mod error;
pub mod notification;
pub mod preference;
pub mod types;

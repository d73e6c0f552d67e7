//! # Quell Core
//!
//! Types shared between the resolution pipeline, the filtering engine and the
//! query log.
//!
//! The query log never makes filtering decisions itself. It receives a
//! [`FilterResult`] from the filtering engine with every resolved query and
//! stores it verbatim, so the same type is used on both sides of that seam.
//!
//! ## Key Types
//!
//! - [`FilterResult`]: The filtering decision attached to a query
//! - [`Reason`]: Why a query was (or was not) filtered
//! - [`ResultRule`]: A rule that matched a query
//! - [`ClientProto`]: Transport the client used to reach the resolver

pub mod client;
pub mod error;
pub mod filtering;

pub use client::ClientProto;
pub use error::CoreError;
pub use filtering::{FilterResult, Reason, ResultRule};

//! # Contracts
//!
//! Shared interface contracts between the ingestion crates.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Record model
//! - `Item` is the unit of ingested content; it carries nested `MediaItem`s and `WebPage`s
//! - Every record kind serializes to a canonical JSON payload via [`Record`]
//! - Only items flagged `original` are forwarded to storage backends

mod backend;
mod config;
mod error;
mod item;
mod source;

pub use backend::*;
pub use config::*;
pub use error::*;
pub use item::*;
pub use source::*;

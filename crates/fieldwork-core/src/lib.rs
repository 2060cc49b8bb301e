//! Core types and trait definitions for fieldwork.
//!
//! Owners, widgets, metadata, the reference resolver and the [`store::Store`]
//! trait. No HTTP or database dependencies; the other crates build on it.

pub mod error;
pub mod metadata;
pub mod owner;
pub mod permission;
pub mod reference;
pub mod store;
pub mod validation;
pub mod widget;

pub use error::{Error, Result};

//! Core types for Nature Marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod locale;
pub mod price;

pub use id::*;
pub use locale::{Locale, LocaleError};
pub use price::Price;

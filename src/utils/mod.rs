//!
//! Utility module for the resolver.
//!
//! Re-exports amount conversion and formatting helpers used throughout the codebase.
/// Amount conversion and formatting
pub mod index;

pub use index::{btc_to_sat, format_btc_amount};

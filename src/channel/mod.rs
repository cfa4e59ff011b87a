//!
//! Short channel id handling.
//!
//! A short channel id points at a channel's funding output on chain: the block height, the
//! transaction's position in that block, and the output's position in that transaction.

/// Short channel id codec
mod short_id;

pub use short_id::ShortChannelId;

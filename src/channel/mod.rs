//! Channel subscriptions
//!
//! Channels are opaque names. A subscription is the pair `(uid, channel)`;
//! it exists independently of whether the uid currently has an open stream.

pub mod index;
pub mod pattern;

pub use index::ChannelIndex;
pub use pattern::{ChannelParams, ChannelPattern};

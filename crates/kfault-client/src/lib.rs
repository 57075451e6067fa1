//! Subscription and configuration client for the kfault channel.
//!
//! The [`builder`] functions validate caller intent against the
//! kernel-declared bounds and produce encoded request frames; nothing
//! invalid ever reaches the wire. [`Client`] pairs those builders with
//! a [`RequestEngine`](kfault_channel::RequestEngine) over any
//! [`ChannelIo`](kfault_channel::ChannelIo), and
//! [`Client::start`] is the standard bring-up sequence (open, enable,
//! register this process as receiver, default warn filter).

pub mod builder;
pub mod client;
pub mod error;

pub use builder::{
    build_set_parameters, build_status_request, build_subscribe_by_events, build_subscribe_by_type,
};
pub use client::Client;
pub use error::{ClientError, Result};

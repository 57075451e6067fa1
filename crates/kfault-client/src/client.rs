use tracing::{info, warn};

use kfault_channel::{Channel, ChannelIo, RequestEngine};
use kfault_wire::abi::{chan_attr, Level};
use kfault_wire::Frame;

use crate::builder;
use crate::error::{ClientError, Result};

/// High-level handle over the kfault channel: pairs the request
/// engine with a transport and exposes the configuration and
/// subscription operations.
///
/// Generic over [`ChannelIo`] so the request paths can be exercised
/// against scripted channels; production code uses `Client<Channel>`
/// via [`Client::start`].
#[derive(Debug)]
pub struct Client<C> {
    channel: C,
    engine: RequestEngine,
}

impl<C: ChannelIo> Client<C> {
    /// Wrap an already-open channel.
    pub fn with_channel(channel: C) -> Self {
        Self {
            channel,
            engine: RequestEngine::new(),
        }
    }

    /// Request channel statistics selected by `mask`.
    pub fn request_status(&mut self, mask: u64) -> Result<()> {
        let mut frame = builder::build_status_request(mask)?;
        self.send(&mut frame, "status request")
    }

    /// Set channel parameters: for each attribute id whose bit is set
    /// in `mask`, the value comes from the matching slot of `values`.
    pub fn set_parameters(&mut self, mask: u32, values: &[u32; chan_attr::COUNT]) -> Result<()> {
        let mut frame = builder::build_set_parameters(mask, values)?;
        self.send(&mut frame, "set-parameters request")
    }

    /// Register `port_id` as the notification receiver. Must be a
    /// real process identity, never 0.
    pub fn set_port_id(&mut self, port_id: u32) -> Result<()> {
        if port_id == 0 {
            return Err(ClientError::invalid("port id must be nonzero"));
        }
        let mut values = [0u32; chan_attr::COUNT];
        values[chan_attr::PORT_ID as usize] = port_id;
        self.set_parameters(chan_attr::mask(chan_attr::PORT_ID), &values)
    }

    /// Set the channel-wide severity floor.
    pub fn set_filter_level(&mut self, level: Level) -> Result<()> {
        builder::check_level(level.raw())?;
        let mut values = [0u32; chan_attr::COUNT];
        values[chan_attr::FILTER_LEVEL as usize] = level.raw();
        self.set_parameters(chan_attr::mask(chan_attr::FILTER_LEVEL), &values)
    }

    /// Enable or disable the kernel-side framework.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        let mut values = [0u32; chan_attr::COUNT];
        values[chan_attr::ENABLE as usize] = enabled as u32;
        self.set_parameters(chan_attr::mask(chan_attr::ENABLE), &values)
    }

    /// Subscribe to whole event categories at or above `level`.
    pub fn subscribe_by_type(&mut self, type_mask: u64, level: Level) -> Result<()> {
        let mut frame = builder::build_subscribe_by_type(type_mask, level.raw())?;
        self.send(&mut frame, "subscribe request")
    }

    /// Subscribe to the given concrete event ids at or above `level`.
    pub fn subscribe_by_events(&mut self, event_ids: &[u32], level: Level) -> Result<()> {
        let mut frame = builder::build_subscribe_by_events(event_ids, level.raw())?;
        self.send(&mut frame, "event subscribe request")
    }

    /// Borrow the underlying channel (for readiness waits and
    /// notification draining).
    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Consume the client and return the channel.
    pub fn into_channel(self) -> C {
        self.channel
    }

    fn send(&mut self, frame: &mut Frame, what: &'static str) -> Result<()> {
        let result = self.engine.send_request(&mut self.channel, frame);
        if let Err(err) = &result {
            warn!(%err, "error sending {what}");
        }
        result.map_err(ClientError::from)
    }
}

impl Client<Channel> {
    /// Open and configure the kfault channel: the standard bring-up
    /// sequence of enable, register this process as the receiver, and
    /// a warn severity floor.
    ///
    /// On a configuration failure after a successful open, the
    /// channel is closed before the error is returned.
    pub fn start() -> Result<Self> {
        let channel = Channel::open()?;
        let mut client = Client::with_channel(channel);

        let mut values = [0u32; chan_attr::COUNT];
        values[chan_attr::ENABLE as usize] = 1;
        // SAFETY: getpid(2) cannot fail.
        values[chan_attr::PORT_ID as usize] = unsafe { libc::getpid() } as u32;
        values[chan_attr::FILTER_LEVEL as usize] = Level::Warn.raw();
        let mask = chan_attr::mask(chan_attr::ENABLE)
            | chan_attr::mask(chan_attr::PORT_ID)
            | chan_attr::mask(chan_attr::FILTER_LEVEL);

        // An error here drops `client`, closing the freshly opened
        // endpoint before the failure propagates.
        client.set_parameters(mask, &values)?;
        info!("kfault channel started");
        Ok(client)
    }
}

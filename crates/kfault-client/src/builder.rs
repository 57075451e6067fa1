//! Request frame builders.
//!
//! Every builder validates its arguments against the kernel-declared
//! bounds first and only then encodes a frame, so an invalid request
//! never reaches the request engine. The builders are pure: no I/O,
//! no state.

use tracing::warn;

use kfault_wire::abi::{
    chan_attr, cmd, sub_attr, CATEGORY_MASK_ALL, EVENT_BASE, EVENT_MAX, LEVEL_MAX,
};
use kfault_wire::{attr, Frame};

use crate::error::{ClientError, Result};

/// Bytes in the dense event bitmap.
const EVENT_BITMAP_BYTES: usize = EVENT_MAX as usize / 8;

/// Encode a `GET_STATUS` request carrying the statistics selection
/// mask. Any mask is valid.
pub fn build_status_request(mask: u64) -> Result<Frame> {
    let mut frame = Frame::new(cmd::GET_STATUS);
    attr::put_u64(&mut frame, chan_attr::STAT_MASK, mask)?;
    Ok(frame)
}

/// Encode a `SET_CHANNEL` request.
///
/// `mask` selects which attribute ids to set; for each selected id the
/// 32-bit value comes from the matching slot of `values`. Bits outside
/// the settable allow-list are rejected before anything is encoded —
/// read-only attributes (backlog depth, the stat mask) cannot be
/// written even though their ids are otherwise valid.
pub fn build_set_parameters(mask: u32, values: &[u32; chan_attr::COUNT]) -> Result<Frame> {
    if mask & !chan_attr::SETTABLE != 0 {
        warn!(mask = format_args!("{mask:#x}"), "parameters to set are not allowed");
        return Err(ClientError::invalid(format!(
            "attribute mask {mask:#x} selects non-settable attributes"
        )));
    }

    let mut frame = Frame::new(cmd::SET_CHANNEL);
    for id in 1..chan_attr::COUNT as u16 {
        if mask & chan_attr::mask(id) != 0 {
            attr::put_u32(&mut frame, id, values[id as usize])?;
        }
    }
    Ok(frame)
}

/// Encode a `SUBSCRIBE` request filtering by category mask.
///
/// The mask must be nonzero and contain only valid category bits; the
/// level must lie below the declared maximum.
pub fn build_subscribe_by_type(type_mask: u64, level: u32) -> Result<Frame> {
    if type_mask == 0 || type_mask & !CATEGORY_MASK_ALL != 0 {
        return Err(ClientError::invalid(format!(
            "category mask {type_mask:#x} outside valid range {CATEGORY_MASK_ALL:#x}"
        )));
    }
    check_level(level)?;

    let mut frame = Frame::new(cmd::SUBSCRIBE);
    attr::put_u64(&mut frame, sub_attr::TYPE_MASK, type_mask)?;
    attr::put_u32(&mut frame, sub_attr::LEVEL, level)?;
    Ok(frame)
}

/// Encode a `SUBSCRIBE` request filtering by concrete event ids.
///
/// Each id is translated by the fixed event base offset into a bit of
/// a dense bitmap; duplicates are idempotent. The list must be
/// nonempty and every translated id must fall inside the declared
/// event range.
pub fn build_subscribe_by_events(event_ids: &[u32], level: u32) -> Result<Frame> {
    if event_ids.is_empty() {
        return Err(ClientError::invalid("empty event id list"));
    }
    check_level(level)?;

    let mut bitmap = [0u8; EVENT_BITMAP_BYTES];
    for &id in event_ids {
        let index = id
            .checked_sub(EVENT_BASE)
            .filter(|&index| index < EVENT_MAX)
            .ok_or_else(|| {
                ClientError::invalid(format!(
                    "event id {id} outside range {EVENT_BASE}..{}",
                    EVENT_BASE + EVENT_MAX
                ))
            })?;
        bitmap[index as usize / 8] |= 1 << (index % 8);
    }

    let mut frame = Frame::new(cmd::SUBSCRIBE);
    attr::put_u32(&mut frame, sub_attr::LEVEL, level)?;
    attr::put_bytes(&mut frame, sub_attr::EVENT_BITMAP, &bitmap)?;
    Ok(frame)
}

pub(crate) fn check_level(level: u32) -> Result<()> {
    if level >= LEVEL_MAX {
        return Err(ClientError::invalid(format!(
            "filter level {level} not below maximum {LEVEL_MAX}"
        )));
    }
    Ok(())
}

//! Type-length-value attribute codec.
//!
//! Each attribute is `{length: u16, type: u16, value: length-4 bytes}`
//! padded to the alignment boundary, appended in construction order.
//! Lookup is a linear scan — payloads hold a handful of attributes, so
//! anything cleverer would buy nothing. Duplicate ids are not rejected
//! here; `find` returns the first match.

use bytes::{Buf, BufMut};

use crate::error::{Result, WireError};
use crate::frame::{align, Frame};

/// Attribute header: length (2) + type (2).
pub const ATTR_HEADER_SIZE: usize = 4;

/// Append a 32-bit attribute.
pub fn put_u32(frame: &mut Frame, id: u16, value: u32) -> Result<()> {
    put_raw(frame, id, &value.to_ne_bytes())
}

/// Append a 64-bit attribute.
pub fn put_u64(frame: &mut Frame, id: u16, value: u64) -> Result<()> {
    put_raw(frame, id, &value.to_ne_bytes())
}

/// Append an opaque byte-blob attribute (bitmaps).
pub fn put_bytes(frame: &mut Frame, id: u16, value: &[u8]) -> Result<()> {
    put_raw(frame, id, value)
}

fn put_raw(frame: &mut Frame, id: u16, value: &[u8]) -> Result<()> {
    let total = ATTR_HEADER_SIZE + value.len();
    let padded = align(total);
    if padded > frame.remaining() {
        return Err(WireError::FrameFull {
            needed: padded,
            remaining: frame.remaining(),
        });
    }

    let start = frame.len();
    let mut dst = frame.raw_mut(start, padded);
    dst.put_u16_ne(total as u16);
    dst.put_u16_ne(id);
    dst.put_slice(value);
    // Padding bytes must not leak stale buffer contents.
    dst.fill(0);

    frame.set_len(start + padded);
    Ok(())
}

/// Decode the first matching attribute as a 32-bit value.
pub fn get_u32(frame: &Frame, id: u16) -> Result<u32> {
    let mut value = expect_len(frame, id, 4)?;
    Ok(value.get_u32_ne())
}

/// Decode the first matching attribute as a 64-bit value.
pub fn get_u64(frame: &Frame, id: u16) -> Result<u64> {
    let mut value = expect_len(frame, id, 8)?;
    Ok(value.get_u64_ne())
}

/// Borrow the first matching attribute's raw value bytes.
pub fn get_bytes(frame: &Frame, id: u16) -> Result<&[u8]> {
    find(frame, id).ok_or(WireError::NotFound { id })
}

/// Locate the first attribute with the given id. A structurally
/// malformed trailing attribute ends the scan.
pub fn find(frame: &Frame, id: u16) -> Option<&[u8]> {
    let payload = frame.payload();
    let mut offset = 0;
    while offset + ATTR_HEADER_SIZE <= payload.len() {
        let mut header = &payload[offset..offset + ATTR_HEADER_SIZE];
        let total = header.get_u16_ne() as usize;
        let attr_id = header.get_u16_ne();
        if total < ATTR_HEADER_SIZE || offset + total > payload.len() {
            return None;
        }
        if attr_id == id {
            return Some(&payload[offset + ATTR_HEADER_SIZE..offset + total]);
        }
        offset += align(total);
    }
    None
}

fn expect_len(frame: &Frame, id: u16, expected: usize) -> Result<&[u8]> {
    let value = find(frame, id).ok_or(WireError::NotFound { id })?;
    if value.len() != expected {
        return Err(WireError::BadLength {
            id,
            expected,
            got: value.len(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::cmd;
    use crate::frame::{ALIGNTO, FRAME_CAPACITY};

    #[test]
    fn u32_roundtrip() {
        let mut frame = Frame::new(cmd::SET_CHANNEL);
        put_u32(&mut frame, 3, 0xCAFE_F00D).unwrap();
        assert_eq!(get_u32(&frame, 3).unwrap(), 0xCAFE_F00D);
    }

    #[test]
    fn u64_roundtrip() {
        let mut frame = Frame::new(cmd::GET_STATUS);
        put_u64(&mut frame, 7, u64::MAX - 5).unwrap();
        assert_eq!(get_u64(&frame, 7).unwrap(), u64::MAX - 5);
    }

    #[test]
    fn bytes_roundtrip_with_padding() {
        let mut frame = Frame::new(cmd::SUBSCRIBE);
        // 5 value bytes force 3 bytes of padding.
        put_bytes(&mut frame, 2, &[1, 2, 3, 4, 5]).unwrap();
        put_u32(&mut frame, 3, 9).unwrap();
        assert_eq!(get_bytes(&frame, 2).unwrap(), &[1, 2, 3, 4, 5]);
        assert_eq!(get_u32(&frame, 3).unwrap(), 9);
        assert_eq!(frame.len() % ALIGNTO, 0);
    }

    #[test]
    fn mixed_attributes_decode_independently() {
        let mut frame = Frame::new(cmd::SUBSCRIBE);
        put_u64(&mut frame, 1, 0xFF).unwrap();
        put_u32(&mut frame, 3, 2).unwrap();
        put_bytes(&mut frame, 2, &[0xAA; 8]).unwrap();
        assert_eq!(get_u64(&frame, 1).unwrap(), 0xFF);
        assert_eq!(get_u32(&frame, 3).unwrap(), 2);
        assert_eq!(get_bytes(&frame, 2).unwrap(), &[0xAA; 8]);
    }

    #[test]
    fn missing_attribute_is_not_found() {
        let mut frame = Frame::new(cmd::SET_CHANNEL);
        put_u32(&mut frame, 1, 1).unwrap();
        let err = get_u32(&frame, 2).unwrap_err();
        assert!(matches!(err, WireError::NotFound { id: 2 }));
    }

    #[test]
    fn wrong_width_is_bad_length() {
        let mut frame = Frame::new(cmd::GET_STATUS);
        put_u64(&mut frame, 7, 1).unwrap();
        let err = get_u32(&frame, 7).unwrap_err();
        assert!(matches!(
            err,
            WireError::BadLength {
                id: 7,
                expected: 4,
                got: 8
            }
        ));
    }

    #[test]
    fn duplicate_ids_return_first() {
        let mut frame = Frame::new(cmd::SET_CHANNEL);
        put_u32(&mut frame, 1, 10).unwrap();
        put_u32(&mut frame, 1, 20).unwrap();
        assert_eq!(get_u32(&frame, 1).unwrap(), 10);
    }

    #[test]
    fn frame_full_is_checked_not_overrun() {
        let mut frame = Frame::new(cmd::SUBSCRIBE);
        let chunk = [0u8; 1024];
        loop {
            match put_bytes(&mut frame, 2, &chunk) {
                Ok(()) => continue,
                Err(WireError::FrameFull { remaining, .. }) => {
                    assert!(remaining < ATTR_HEADER_SIZE + chunk.len());
                    break;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(frame.len() <= FRAME_CAPACITY);
    }

    #[test]
    fn scan_stops_on_malformed_tail() {
        let mut frame = Frame::new(cmd::NOTIFY);
        // A bare attribute header claiming more bytes than exist.
        frame.push_payload(&100u16.to_ne_bytes()).unwrap();
        frame.push_payload(&9u16.to_ne_bytes()).unwrap();
        assert!(find(&frame, 9).is_none());
    }
}

use bytes::{Buf, BufMut};

use crate::error::{Result, WireError};

/// Total frame capacity in bytes, header included. Matches the kernel
/// side's per-message buffer; a message that fills the buffer exactly
/// has been truncated.
pub const FRAME_CAPACITY: usize = 8192;

/// Header layout: length (4) + type (2) + flags (2) + sequence (4) +
/// port id (4) = 16 bytes, all native-endian.
pub const HEADER_SIZE: usize = 16;

/// Header and attribute alignment boundary.
pub const ALIGNTO: usize = 4;

/// Round a length up to the next alignment boundary.
pub const fn align(len: usize) -> usize {
    (len + ALIGNTO - 1) & !(ALIGNTO - 1)
}

const OFF_LENGTH: usize = 0;
const OFF_TYPE: usize = 4;
const OFF_FLAGS: usize = 6;
const OFF_SEQUENCE: usize = 8;
const OFF_PORT_ID: usize = 12;

/// One complete protocol message: the kernel header plus a bounded
/// attribute payload, stored in a fixed buffer laid out exactly as it
/// travels on the wire.
///
/// A `Frame` is a plain value; callers stack-allocate one per request
/// or reply and copy it freely. The declared length never exceeds
/// [`FRAME_CAPACITY`] — the codec rejects attributes that would
/// overrun instead of truncating.
#[derive(Clone)]
pub struct Frame {
    buf: [u8; FRAME_CAPACITY],
}

impl Frame {
    /// Create a frame for the given message type, with an empty
    /// payload and every other header field zeroed.
    pub fn new(msg_type: u16) -> Self {
        let mut frame = Self::zeroed();
        frame.set_len(HEADER_SIZE);
        frame.set_msg_type(msg_type);
        frame
    }

    /// Create an all-zero frame, typically as a receive buffer.
    pub fn zeroed() -> Self {
        Self {
            buf: [0; FRAME_CAPACITY],
        }
    }

    /// Declared length of the frame in bytes, header included.
    pub fn len(&self) -> usize {
        self.read_u32(OFF_LENGTH) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len <= FRAME_CAPACITY);
        self.write_u32(OFF_LENGTH, len as u32);
    }

    pub fn msg_type(&self) -> u16 {
        self.read_u16(OFF_TYPE)
    }

    pub fn set_msg_type(&mut self, msg_type: u16) {
        self.write_u16(OFF_TYPE, msg_type);
    }

    pub fn flags(&self) -> u16 {
        self.read_u16(OFF_FLAGS)
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.write_u16(OFF_FLAGS, flags);
    }

    pub fn sequence(&self) -> u32 {
        self.read_u32(OFF_SEQUENCE)
    }

    pub fn set_sequence(&mut self, sequence: u32) {
        self.write_u32(OFF_SEQUENCE, sequence);
    }

    /// Sender identity; 0 for kernel-originated frames.
    pub fn port_id(&self) -> u32 {
        self.read_u32(OFF_PORT_ID)
    }

    pub fn set_port_id(&mut self, port_id: u32) {
        self.write_u32(OFF_PORT_ID, port_id);
    }

    /// The attribute payload region (everything after the header, up
    /// to the declared length).
    pub fn payload(&self) -> &[u8] {
        let len = self.len().clamp(HEADER_SIZE, FRAME_CAPACITY);
        &self.buf[HEADER_SIZE..len]
    }

    /// The declared-length prefix of the buffer, as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len().min(FRAME_CAPACITY)]
    }

    /// Payload capacity still available for attributes.
    pub fn remaining(&self) -> usize {
        FRAME_CAPACITY - self.len().min(FRAME_CAPACITY)
    }

    /// The whole backing buffer, for the transport to receive into.
    pub fn buf_mut(&mut self) -> &mut [u8; FRAME_CAPACITY] {
        &mut self.buf
    }

    pub(crate) fn raw_mut(&mut self, start: usize, len: usize) -> &mut [u8] {
        &mut self.buf[start..start + len]
    }

    /// Structural validation of a frame that was just received:
    /// `received` is the byte count the transport produced. The
    /// declared length must cover at least the header, must not claim
    /// more bytes than arrived, and must sit on an alignment boundary.
    pub fn validate_received(&self, received: usize) -> Result<()> {
        if received < HEADER_SIZE {
            return Err(WireError::Malformed("shorter than the fixed header"));
        }
        let declared = self.len();
        if declared < HEADER_SIZE {
            return Err(WireError::Malformed("declared length below header size"));
        }
        if declared > received {
            return Err(WireError::Malformed(
                "declared length exceeds received bytes",
            ));
        }
        if declared % ALIGNTO != 0 {
            return Err(WireError::Malformed("declared length misaligned"));
        }
        Ok(())
    }

    /// Embedded status of an error/acknowledgement frame: the first
    /// four payload bytes as a signed integer (0 = success, negative
    /// errno otherwise). `None` if the payload is too short.
    pub fn error_status(&self) -> Option<i32> {
        let payload = self.payload();
        if payload.len() < 4 {
            return None;
        }
        let mut status = &payload[..4];
        Some(status.get_i32_ne())
    }

    /// Append raw bytes to the payload without attribute framing.
    /// Used for fixed-shape payloads such as the ack status word.
    pub fn push_payload(&mut self, bytes: &[u8]) -> Result<()> {
        let start = self.len();
        if bytes.len() > self.remaining() {
            return Err(WireError::FrameFull {
                needed: bytes.len(),
                remaining: self.remaining(),
            });
        }
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        self.set_len(start + bytes.len());
        Ok(())
    }

    fn read_u16(&self, offset: usize) -> u16 {
        let mut src = &self.buf[offset..offset + 2];
        src.get_u16_ne()
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut src = &self.buf[offset..offset + 4];
        src.get_u32_ne()
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        let mut dst = &mut self.buf[offset..offset + 2];
        dst.put_u16_ne(value);
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        let mut dst = &mut self.buf[offset..offset + 4];
        dst.put_u32_ne(value);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.len())
            .field("msg_type", &self.msg_type())
            .field("flags", &self.flags())
            .field("sequence", &self.sequence())
            .field("port_id", &self.port_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::cmd;

    #[test]
    fn new_frame_has_empty_aligned_header() {
        let frame = Frame::new(cmd::GET_STATUS);
        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(frame.msg_type(), cmd::GET_STATUS);
        assert_eq!(frame.flags(), 0);
        assert_eq!(frame.sequence(), 0);
        assert_eq!(frame.port_id(), 0);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn header_fields_roundtrip() {
        let mut frame = Frame::new(cmd::SUBSCRIBE);
        frame.set_flags(0x5);
        frame.set_sequence(0xDEAD_BEEF);
        frame.set_port_id(4242);
        assert_eq!(frame.flags(), 0x5);
        assert_eq!(frame.sequence(), 0xDEAD_BEEF);
        assert_eq!(frame.port_id(), 4242);
        assert_eq!(frame.msg_type(), cmd::SUBSCRIBE);
    }

    #[test]
    fn validate_rejects_short_receive() {
        let frame = Frame::new(cmd::NOTIFY);
        let err = frame.validate_received(HEADER_SIZE - 1).unwrap_err();
        assert!(matches!(err, WireError::Malformed(_)));
    }

    #[test]
    fn validate_rejects_overclaimed_length() {
        let mut frame = Frame::new(cmd::NOTIFY);
        frame.push_payload(&[0u8; 8]).unwrap();
        let err = frame.validate_received(HEADER_SIZE).unwrap_err();
        assert!(matches!(err, WireError::Malformed(_)));
    }

    #[test]
    fn validate_accepts_exact_receive() {
        let mut frame = Frame::new(cmd::NOTIFY);
        frame.push_payload(&[0u8; 8]).unwrap();
        frame.validate_received(frame.len()).unwrap();
    }

    #[test]
    fn error_status_reads_first_payload_word() {
        let mut frame = Frame::new(cmd::ERROR);
        frame.push_payload(&(-13i32).to_ne_bytes()).unwrap();
        assert_eq!(frame.error_status(), Some(-13));
    }

    #[test]
    fn error_status_none_when_payload_short() {
        let frame = Frame::new(cmd::ERROR);
        assert_eq!(frame.error_status(), None);
    }

    #[test]
    fn push_payload_respects_capacity() {
        let mut frame = Frame::new(cmd::NOTIFY);
        let big = vec![0u8; FRAME_CAPACITY];
        let err = frame.push_payload(&big).unwrap_err();
        assert!(matches!(err, WireError::FrameFull { .. }));
    }

    #[test]
    fn wire_bytes_match_declared_length() {
        let mut frame = Frame::new(cmd::SET_CHANNEL);
        frame.push_payload(&[1, 2, 3, 4]).unwrap();
        assert_eq!(frame.as_bytes().len(), HEADER_SIZE + 4);
    }
}

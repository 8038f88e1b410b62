//! TCP stream framing for Diameter messages
//!
//! Diameter frames itself with the 4-byte word at the start of the header:
//! version byte followed by a 24-bit message length. The framer accumulates
//! whatever chunk sizes the socket delivers and peels off complete frames.
//! It never looks past the header; AVP parsing happens downstream.

use bytes::{Bytes, BytesMut};

use crate::message::DIAMETER_HEADER_SIZE;
use crate::DIAMETER_VERSION;

/// Reassembles complete Diameter frames from an arbitrary byte stream
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append newly read bytes and return every complete frame now available.
    ///
    /// If the buffer head is not a valid Diameter header (version byte not 1,
    /// or a declared length shorter than the header), framing is lost and
    /// cannot be recovered byte-by-byte; the whole accumulator is discarded
    /// so the stream can resynchronize on the next read.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            if self.buf.len() < DIAMETER_HEADER_SIZE {
                break;
            }

            if self.buf[0] != DIAMETER_VERSION {
                log::warn!(
                    "invalid diameter message header, discarding {} buffered bytes",
                    self.buf.len()
                );
                self.buf.clear();
                break;
            }

            let msg_len = ((self.buf[1] as usize) << 16)
                | ((self.buf[2] as usize) << 8)
                | self.buf[3] as usize;

            if msg_len < DIAMETER_HEADER_SIZE {
                log::warn!(
                    "declared message length {msg_len} below header size, discarding buffer"
                );
                self.buf.clear();
                break;
            }

            if self.buf.len() < msg_len {
                break;
            }

            frames.push(self.buf.split_to(msg_len).freeze());
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::cmd_code;
    use crate::message::Message;

    fn sample_frame() -> Bytes {
        let mut msg = Message::request(cmd_code::CAPABILITIES_EXCHANGE, false, 0);
        msg.header.hop_by_hop_id = 1;
        msg.header.end_to_end_id = 1;
        msg.encode().freeze()
    }

    #[test]
    fn test_whole_frame_in_one_push() {
        let frame = sample_frame();
        let mut framer = Framer::new();
        let out = framer.push(&frame);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], frame);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_byte_at_a_time_reassembly() {
        let frame = sample_frame();
        let mut framer = Framer::new();

        let mut out = Vec::new();
        for chunk in frame[..frame.len() - 3].chunks(1) {
            out.extend(framer.push(chunk));
        }
        assert!(out.is_empty());

        // final 3-byte remainder completes the frame
        out.extend(framer.push(&frame[frame.len() - 3..]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], frame);
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let frame = sample_frame();
        let mut both = Vec::new();
        both.extend_from_slice(&frame);
        both.extend_from_slice(&frame);

        let mut framer = Framer::new();
        let out = framer.push(&both);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], frame);
        assert_eq!(out[1], frame);
    }

    #[test]
    fn test_frame_split_across_pushes_with_second_frame() {
        let frame = sample_frame();
        let mut framer = Framer::new();

        let out = framer.push(&frame[..10]);
        assert!(out.is_empty());

        let mut rest = Vec::new();
        rest.extend_from_slice(&frame[10..]);
        rest.extend_from_slice(&frame);
        let out = framer.push(&rest);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_resync_on_corruption() {
        let mut framer = Framer::new();
        // garbage long enough to look at the version byte
        let garbage = [0x47u8; 32];
        let out = framer.push(&garbage);
        assert!(out.is_empty());
        assert_eq!(framer.buffered(), 0);

        // a fresh valid frame on the next read is accepted cleanly
        let frame = sample_frame();
        let out = framer.push(&frame);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], frame);
    }

    #[test]
    fn test_undersized_declared_length_discards() {
        let mut framer = Framer::new();
        let mut bad = vec![0u8; 20];
        bad[0] = 1; // version ok
        bad[3] = 4; // declared length 4, below header size
        let out = framer.push(&bad);
        assert!(out.is_empty());
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_short_buffer_waits() {
        let mut framer = Framer::new();
        assert!(framer.push(&[1, 0, 0]).is_empty());
        assert_eq!(framer.buffered(), 3);
    }
}

//! Vendor TCP wire framing (C1): 16-byte header + JSON body, with a streaming
//! reframer that tolerates partial reads and resyncs past corrupt bytes.

use crate::error::FrameError;

pub const SYNC_BYTE: u8 = 0x5A;
pub const PROTOCOL_VERSION: u8 = 0x01;
pub const HEADER_LEN: usize = 16;
pub const MIN_BODY_LEN: u32 = 1;
pub const MAX_BODY_LEN: u32 = 100_000;

/// A single decoded frame: message type plus raw body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u16,
    pub message_type: u16,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn body_str(&self) -> Result<&str, FrameError> {
        std::str::from_utf8(&self.body).map_err(|_| {
            FrameError::BodyNotJson(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
        })
    }

    pub fn body_json(&self) -> Result<serde_json::Value, FrameError> {
        serde_json::from_slice(&self.body).map_err(FrameError::BodyNotJson)
    }
}

/// Assembles a single frame's wire bytes for a given sequence number.
pub fn encode(sequence: u16, message_type: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(SYNC_BYTE);
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&message_type.to_be_bytes());
    out.extend_from_slice(&[0u8; 6]);
    out.extend_from_slice(body);
    out
}

/// Monotonic per-session sequence counter, wrapping at 2^16.
#[derive(Debug, Default)]
pub struct SequenceCounter(u16);

impl SequenceCounter {
    pub fn next(&mut self) -> u16 {
        let seq = self.0;
        self.0 = self.0.wrapping_add(1);
        seq
    }
}

struct TentativeHeader {
    sequence: u16,
    body_length: u32,
    message_type: u16,
}

fn parse_header(buf: &[u8]) -> Option<TentativeHeader> {
    if buf.len() < HEADER_LEN || buf[0] != SYNC_BYTE {
        return None;
    }
    let sequence = u16::from_be_bytes([buf[2], buf[3]]);
    let body_length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let message_type = u16::from_be_bytes([buf[8], buf[9]]);
    Some(TentativeHeader {
        sequence,
        body_length,
        message_type,
    })
}

/// Streaming reframer owned by an `AgvSession`'s receive task. Feed it chunks as
/// they arrive; it yields every complete frame it can extract, buffering the rest.
#[derive(Debug, Default)]
pub struct Reframer {
    buf: Vec<u8>,
}

impl Reframer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes just read from the socket and drains every frame now complete.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            if self.buf.len() < HEADER_LEN {
                break;
            }
            if self.buf[0] != SYNC_BYTE {
                let skip = self.buf[1..]
                    .iter()
                    .position(|&b| b == SYNC_BYTE)
                    .map(|p| p + 1);
                match skip {
                    Some(skip) => {
                        self.buf.drain(..skip);
                        continue;
                    }
                    None => {
                        self.buf.clear();
                        break;
                    }
                }
            }
            let header = match parse_header(&self.buf) {
                Some(h) => h,
                None => break,
            };
            if header.body_length < MIN_BODY_LEN || header.body_length > MAX_BODY_LEN {
                self.buf.drain(..1);
                continue;
            }
            let total = HEADER_LEN + header.body_length as usize;
            if self.buf.len() < total {
                break;
            }
            let body = self.buf[HEADER_LEN..total].to_vec();
            self.buf.drain(..total);
            frames.push(Frame {
                sequence: header.sequence,
                message_type: header.message_type,
                body,
            });
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_frame(seq: u16, msg_type: u16, body: &[u8]) -> Vec<u8> {
        encode(seq, msg_type, body)
    }

    #[test]
    fn round_trip_single_frame() {
        let bytes = one_frame(1, 9300, br#"{"a":1}"#);
        let mut r = Reframer::new();
        let frames = r.feed(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, 9300);
        assert_eq!(frames[0].body, br#"{"a":1}"#);
    }

    #[test]
    fn feeds_one_byte_at_a_time() {
        let bytes = one_frame(7, 5, b"{}");
        let mut r = Reframer::new();
        let mut out = Vec::new();
        for b in &bytes {
            out.extend(r.feed(&[*b]));
        }
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message_type, 5);
    }

    #[test]
    fn resyncs_past_garbage_prefix() {
        let mut stream = vec![0xFF, 0xFF];
        stream.extend(one_frame(1, 5, b"{}"));
        let mut r = Reframer::new();
        let frames = r.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, 5);
        assert_eq!(frames[0].body, b"{}");
    }

    #[test]
    fn scenario_3_from_spec() {
        let bytes: Vec<u8> = vec![
            0xFF, 0xFF, 0x5A, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x05, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x7B, 0x7D,
        ];
        let mut r = Reframer::new();
        let frames = r.feed(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, 5);
        assert_eq!(frames[0].body, b"{}");
    }

    #[test]
    fn resyncs_on_out_of_range_body_length() {
        let mut bad = vec![SYNC_BYTE, PROTOCOL_VERSION, 0, 1];
        bad.extend_from_slice(&0u32.to_be_bytes()); // body_length = 0, out of range
        bad.extend_from_slice(&5u16.to_be_bytes());
        bad.extend_from_slice(&[0u8; 6]);
        bad.extend(one_frame(2, 6, b"{}"));
        let mut r = Reframer::new();
        let frames = r.feed(&bad);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, 6);
    }

    #[test]
    fn waits_for_more_bytes_on_truncated_frame() {
        let bytes = one_frame(1, 5, b"{\"a\":1}");
        let mut r = Reframer::new();
        let frames = r.feed(&bytes[..HEADER_LEN + 2]);
        assert!(frames.is_empty());
        let frames = r.feed(&bytes[HEADER_LEN + 2..]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn body_length_boundaries_decode() {
        let min_body = vec![b'a'; MIN_BODY_LEN as usize];
        let mut r = Reframer::new();
        let frames = r.feed(&one_frame(1, 1, &min_body));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body.len(), MIN_BODY_LEN as usize);

        let max_body = vec![b'b'; MAX_BODY_LEN as usize];
        let mut r = Reframer::new();
        let frames = r.feed(&one_frame(2, 1, &max_body));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body.len(), MAX_BODY_LEN as usize);
    }

    #[test]
    fn double_sync_byte_does_not_deadlock() {
        let mut stream = vec![SYNC_BYTE];
        stream.extend(one_frame(1, 9, b"{}"));
        let mut r = Reframer::new();
        let frames = r.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, 9);
    }

    #[test]
    fn sequence_counter_wraps() {
        let mut c = SequenceCounter::default();
        for _ in 0..u16::MAX {
            c.next();
        }
        assert_eq!(c.next(), u16::MAX);
        assert_eq!(c.next(), 0);
    }

    use proptest::strategy::Strategy;

    proptest::proptest! {
        #[test]
        fn interleaved_frames_with_garbage_yield_exactly_those_frames(
            garbage in proptest::collection::vec((0u8..=0xFFu8).prop_filter("not sync byte", |b| *b != SYNC_BYTE), 0..8),
            types in proptest::collection::vec(0u16..=u16::MAX, 1..6),
        ) {
            let mut stream = garbage.clone();
            let mut expected = Vec::new();
            for (i, t) in types.iter().enumerate() {
                let body = format!("{{\"i\":{i}}}").into_bytes();
                stream.extend(one_frame(i as u16, *t, &body));
                expected.push((*t, body));
            }
            let mut r = Reframer::new();
            let frames = r.feed(&stream);
            prop_assert_eq!(frames.len(), expected.len());
            for (f, (t, body)) in frames.iter().zip(expected.iter()) {
                prop_assert_eq!(f.message_type, *t);
                prop_assert_eq!(&f.body, body);
            }
        }
    }
}

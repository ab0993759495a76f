//! Wire codec for the ArticBase framing
//!
//! Frames are little-endian and parsed with explicit offset readers; field
//! access never relies on host struct layout since the peer may be built
//! with a different toolchain.
//!
//! Request body:
//! ```text
//! u32  magic "ARTQ"
//! u16  method name length, followed by the name bytes
//! u8   parameter count, then per parameter: u8 tag + value
//! u32  payload length, followed by the payload bytes
//! ```
//!
//! Response body:
//! ```text
//! u32  magic "ARTR"
//! u8   flags (bit 0: succeeded)
//! i32  method result (0 = OK)
//! u64  event mask
//! u8   buffer count, then per buffer: u32 length + bytes
//! ```

use crate::request::{Param, Request};
use crate::response::Response;
use oa_core::NetError;

pub const REQUEST_MAGIC: u32 = u32::from_le_bytes(*b"ARTQ");
pub const RESPONSE_MAGIC: u32 = u32::from_le_bytes(*b"ARTR");

const PARAM_TAG_U8: u8 = 1;
const PARAM_TAG_U16: u8 = 2;
const PARAM_TAG_U32: u8 = 3;
const PARAM_TAG_I8: u8 = 4;
const PARAM_TAG_I32: u8 = 5;

const FLAG_SUCCEEDED: u8 = 1 << 0;

/// Serialize a request into a frame body
pub fn encode_request(req: &Request) -> Vec<u8> {
    let method = req.method().as_bytes();
    let mut out = Vec::with_capacity(16 + method.len());

    out.extend_from_slice(&REQUEST_MAGIC.to_le_bytes());
    out.extend_from_slice(&(method.len() as u16).to_le_bytes());
    out.extend_from_slice(method);

    out.push(req.params().len() as u8);
    for param in req.params() {
        match *param {
            Param::U8(v) => {
                out.push(PARAM_TAG_U8);
                out.push(v);
            }
            Param::U16(v) => {
                out.push(PARAM_TAG_U16);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Param::U32(v) => {
                out.push(PARAM_TAG_U32);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Param::I8(v) => {
                out.push(PARAM_TAG_I8);
                out.push(v as u8);
            }
            Param::I32(v) => {
                out.push(PARAM_TAG_I32);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    let payload = req.payload().unwrap_or(&[]);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);

    out
}

/// Parse a response frame body
pub fn decode_response(body: &[u8]) -> Result<Response, NetError> {
    let mut rd = Reader::new(body);

    let magic = rd.read_u32("magic")?;
    if magic != RESPONSE_MAGIC {
        return Err(NetError::MalformedFrame(format!(
            "bad response magic 0x{magic:08x}"
        )));
    }

    let flags = rd.read_u8("flags")?;
    let method_result = rd.read_u32("method result")? as i32;
    let event_mask = rd.read_u64("event mask")?;

    let buffer_count = rd.read_u8("buffer count")? as usize;
    let mut buffers = Vec::with_capacity(buffer_count);
    for i in 0..buffer_count {
        let len = rd.read_u32("buffer length")? as usize;
        let data = rd.read_bytes(len, "buffer data")?;
        if data.len() != len {
            return Err(NetError::MalformedFrame(format!(
                "buffer {i} truncated: expected {len} bytes"
            )));
        }
        buffers.push(data.to_vec());
    }

    Ok(Response::new(
        (flags & FLAG_SUCCEEDED) != 0,
        method_result,
        event_mask,
        buffers,
        body.len(),
    ))
}

/// Bounds-checked little-endian reader over a byte buffer
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8], NetError> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(NetError::MalformedFrame(format!(
                "short frame reading {what} at offset 0x{:x}",
                self.pos
            ))),
        }
    }

    fn read_u8(&mut self, what: &str) -> Result<u8, NetError> {
        Ok(self.read_bytes(1, what)?[0])
    }

    fn read_u32(&mut self, what: &str) -> Result<u32, NetError> {
        let b = self.read_bytes(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self, what: &str) -> Result<u64, NetError> {
        let b = self.read_bytes(8, what)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request_layout() {
        let mut req = Request::new("Process_ReadCode");
        req.add_param_i32(0x20);
        req.add_param_i32(0x1000);
        let body = encode_request(&req);

        assert_eq!(&body[0..4], b"ARTQ");
        assert_eq!(u16::from_le_bytes([body[4], body[5]]), 16);
        assert_eq!(&body[6..22], b"Process_ReadCode");
        assert_eq!(body[22], 2); // param count
        assert_eq!(body[23], 5); // i32 tag
        assert_eq!(
            i32::from_le_bytes([body[24], body[25], body[26], body[27]]),
            0x20
        );
        // empty payload trailer
        assert_eq!(&body[body.len() - 4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_response() {
        let mut body = Vec::new();
        body.extend_from_slice(b"ARTR");
        body.push(1); // succeeded
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&0u64.to_le_bytes());
        body.push(1); // one buffer
        body.extend_from_slice(&4u32.to_le_bytes());
        body.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let resp = decode_response(&body).unwrap();
        assert!(resp.succeeded());
        assert_eq!(resp.method_result(), 0);
        assert_eq!(resp.get_buffer(0), Some(&[0xde, 0xad, 0xbe, 0xef][..]));
        assert_eq!(resp.wire_size(), body.len());
    }

    #[test]
    fn test_decode_response_bad_magic() {
        let body = b"NOPE\x01\x00\x00\x00\x00".to_vec();
        assert!(decode_response(&body).is_err());
    }

    #[test]
    fn test_decode_response_truncated_buffer() {
        let mut body = Vec::new();
        body.extend_from_slice(b"ARTR");
        body.push(1);
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&0u64.to_le_bytes());
        body.push(1);
        body.extend_from_slice(&100u32.to_le_bytes()); // claims 100 bytes
        body.extend_from_slice(&[1, 2, 3]); // delivers 3

        assert!(decode_response(&body).is_err());
    }
}

//! RPC response access

/// A parsed RPC response.
///
/// Buffers are opaque and addressed by index; callers must validate the
/// length of every buffer against the size they expect before trusting the
/// bytes. A length mismatch is a protocol error, not a partial read.
#[derive(Debug, Clone)]
pub struct Response {
    succeeded: bool,
    method_result: i32,
    event_mask: u64,
    buffers: Vec<Vec<u8>>,
    wire_size: usize,
}

impl Response {
    pub(crate) fn new(
        succeeded: bool,
        method_result: i32,
        event_mask: u64,
        buffers: Vec<Vec<u8>>,
        wire_size: usize,
    ) -> Self {
        Self {
            succeeded,
            method_result,
            event_mask,
            buffers,
            wire_size,
        }
    }

    /// Whether the server handled the request at all
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Numeric method result; 0 means success
    pub fn method_result(&self) -> i32 {
        self.method_result
    }

    /// Semantic event bits the server attached to this transfer
    pub fn event_mask(&self) -> u64 {
        self.event_mask
    }

    /// Response buffer by index, if present
    pub fn get_buffer(&self, index: usize) -> Option<&[u8]> {
        self.buffers.get(index).map(|b| b.as_slice())
    }

    /// Response buffer by index, moved out
    pub fn take_buffer(&mut self, index: usize) -> Option<Vec<u8>> {
        if index < self.buffers.len() {
            Some(std::mem::take(&mut self.buffers[index]))
        } else {
            None
        }
    }

    /// Total bytes this response occupied on the wire
    pub fn wire_size(&self) -> usize {
        self.wire_size
    }
}

/// Builder used by tests and by server-side mocks
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    succeeded: bool,
    method_result: i32,
    event_mask: u64,
    buffers: Vec<Vec<u8>>,
}

impl ResponseBuilder {
    pub fn ok() -> Self {
        Self {
            succeeded: true,
            ..Default::default()
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn method_result(mut self, result: i32) -> Self {
        self.method_result = result;
        self
    }

    pub fn event_mask(mut self, mask: u64) -> Self {
        self.event_mask = mask;
        self
    }

    pub fn buffer(mut self, data: Vec<u8>) -> Self {
        self.buffers.push(data);
        self
    }

    pub fn build(self) -> Response {
        let wire_size = self.buffers.iter().map(|b| b.len()).sum();
        Response::new(
            self.succeeded,
            self.method_result,
            self.event_mask,
            self.buffers,
            wire_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_access() {
        let resp = ResponseBuilder::ok()
            .buffer(vec![1, 2, 3])
            .buffer(vec![4])
            .build();

        assert!(resp.succeeded());
        assert_eq!(resp.method_result(), 0);
        assert_eq!(resp.get_buffer(0), Some(&[1u8, 2, 3][..]));
        assert_eq!(resp.get_buffer(1), Some(&[4u8][..]));
        assert_eq!(resp.get_buffer(2), None);
    }
}

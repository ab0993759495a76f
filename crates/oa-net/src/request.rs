//! RPC request construction

/// Typed scalar parameter attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I32(i32),
}

/// Maximum number of scalar parameters a single request may carry
pub const MAX_PARAMS: usize = 8;

/// A named RPC request.
///
/// Carries a method name, an ordered list of typed scalar parameters and at
/// most one opaque payload (used by the server-side logging call).
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    params: Vec<Param>,
    payload: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            params: Vec::new(),
            payload: None,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    fn push(&mut self, param: Param) {
        debug_assert!(self.params.len() < MAX_PARAMS, "too many request parameters");
        self.params.push(param);
    }

    pub fn add_param_u8(&mut self, value: u8) {
        self.push(Param::U8(value));
    }

    pub fn add_param_u16(&mut self, value: u16) {
        self.push(Param::U16(value));
    }

    pub fn add_param_u32(&mut self, value: u32) {
        self.push(Param::U32(value));
    }

    pub fn add_param_i8(&mut self, value: i8) {
        self.push(Param::I8(value));
    }

    pub fn add_param_i32(&mut self, value: i32) {
        self.push(Param::I32(value));
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = Some(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_params_ordered() {
        let mut req = Request::new("Process_ReadCode");
        req.add_param_i32(0x1000);
        req.add_param_i32(0x800);

        assert_eq!(req.method(), "Process_ReadCode");
        assert_eq!(req.params(), &[Param::I32(0x1000), Param::I32(0x800)]);
        assert!(req.payload().is_none());
    }
}

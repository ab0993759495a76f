//! apt service: applet manager surface touched by provisioning

use parking_lot::Mutex;

/// Argument delivered to the next applet launch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverArg {
    pub param: Vec<u8>,
}

/// Applet manager
pub struct Apt {
    deliver_arg: Mutex<Option<DeliverArg>>,
}

impl Apt {
    pub fn new() -> Self {
        Self {
            deliver_arg: Mutex::new(None),
        }
    }

    /// Stage an argument for the next applet boot
    pub fn set_deliver_arg(&self, arg: DeliverArg) {
        *self.deliver_arg.lock() = Some(arg);
    }

    pub fn deliver_arg(&self) -> Option<DeliverArg> {
        self.deliver_arg.lock().clone()
    }
}

impl Default for Apt {
    fn default() -> Self {
        Self::new()
    }
}

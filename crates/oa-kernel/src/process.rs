//! Process objects created from a codeset

use crate::codeset::CodeSet;
use crate::resource_limit::ResourceLimit;
use oa_core::KernelError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Process ID type
pub type ProcessId = u32;

/// Descriptor value meaning "slot unused" in the exheader capability array
const CAP_DESCRIPTOR_EMPTY: u32 = 0xFFFF_FFFF;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Running,
    Terminated,
}

/// A kernel process built from a codeset
pub struct Process {
    process_id: ProcessId,
    codeset: CodeSet,
    inner: Mutex<ProcessInner>,
}

#[derive(Default)]
struct ProcessInner {
    state: Option<RunState>,
    resource_limit: Option<Arc<ResourceLimit>>,
    ideal_processor: u8,
    kernel_caps: Vec<u32>,
}

struct RunState {
    priority: i32,
    stack_size: u32,
    state: ProcessState,
}

impl Process {
    pub(crate) fn new(process_id: ProcessId, codeset: CodeSet) -> Self {
        Self {
            process_id,
            codeset,
            inner: Mutex::new(ProcessInner::default()),
        }
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn program_id(&self) -> u64 {
        self.codeset.program_id
    }

    pub fn codeset(&self) -> &CodeSet {
        &self.codeset
    }

    pub fn resource_limit(&self) -> Option<Arc<ResourceLimit>> {
        self.inner.lock().resource_limit.clone()
    }

    pub fn set_resource_limit(&self, limit: Arc<ResourceLimit>) {
        self.inner.lock().resource_limit = Some(limit);
    }

    pub fn ideal_processor(&self) -> u8 {
        self.inner.lock().ideal_processor
    }

    pub fn set_ideal_processor(&self, core: u8) {
        self.inner.lock().ideal_processor = core;
    }

    /// Parse the exheader's fixed array of 32-bit kernel-capability
    /// descriptors. Empty slots (all-ones) are skipped; everything else is
    /// kept verbatim for the kernel to interpret.
    pub fn parse_kernel_caps(&self, descriptors: &[u32]) -> Result<(), KernelError> {
        let mut inner = self.inner.lock();
        inner.kernel_caps.clear();
        for &desc in descriptors {
            if desc == CAP_DESCRIPTOR_EMPTY {
                continue;
            }
            inner.kernel_caps.push(desc);
        }
        debug!(
            "Process {}: {} kernel capability descriptors",
            self.process_id,
            inner.kernel_caps.len()
        );
        Ok(())
    }

    pub fn kernel_caps(&self) -> Vec<u32> {
        self.inner.lock().kernel_caps.clone()
    }

    /// Start the process with the header-declared priority and stack size
    pub fn run(&self, priority: i32, stack_size: u32) {
        let mut inner = self.inner.lock();
        inner.state = Some(RunState {
            priority,
            stack_size,
            state: ProcessState::Running,
        });
        info!(
            "Process {} ({}) started: priority={} stack=0x{:x} entry=0x{:08x}",
            self.process_id, self.codeset.name, priority, stack_size, self.codeset.entrypoint
        );
    }

    pub fn state(&self) -> ProcessState {
        self.inner
            .lock()
            .state
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(ProcessState::Created)
    }

    pub fn priority(&self) -> Option<i32> {
        self.inner.lock().state.as_ref().map(|s| s.priority)
    }

    pub fn stack_size(&self) -> Option<u32> {
        self.inner.lock().state.as_ref().map(|s| s.stack_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_process() -> Process {
        Process::new(1, CodeSet::new("test".to_string(), 0x0004000000031900))
    }

    #[test]
    fn test_kernel_caps_skip_empty() {
        let process = test_process();
        process
            .parse_kernel_caps(&[0x1FF00000, CAP_DESCRIPTOR_EMPTY, 0x0F000001])
            .unwrap();
        assert_eq!(process.kernel_caps(), vec![0x1FF00000, 0x0F000001]);
    }

    #[test]
    fn test_run_transitions_state() {
        let process = test_process();
        assert_eq!(process.state(), ProcessState::Created);

        process.run(0x30, 0x4000);
        assert_eq!(process.state(), ProcessState::Running);
        assert_eq!(process.priority(), Some(0x30));
        assert_eq!(process.stack_size(), Some(0x4000));
    }
}

//! Kernel process/codeset API for oxidized-artic
//!
//! The loader consumes this as an API: it builds a codeset from the
//! executable header, asks the kernel for a process, attaches a resource
//! limit and starts it.

pub mod codeset;
pub mod memory;
pub mod process;
pub mod resource_limit;
pub mod shared_page;

pub use codeset::{CodeSet, Segment};
pub use memory::{
    HwRevision, MemoryMode, New3dsHwCapabilities, New3dsMemoryMode, PAGE_SIZE,
};
pub use process::{Process, ProcessId, ProcessState};
pub use resource_limit::{
    application_memory_size, new3ds_application_memory_size, ResourceLimit,
    ResourceLimitCategory, ResourceLimitList, ResourceLimitType,
};
pub use shared_page::SharedPage;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// First PID handed out to loader-created processes
const FIRST_PROCESS_ID: u32 = 10;

/// Kernel facade: process creation, resource limits, shared page
pub struct Kernel {
    next_process_id: AtomicU32,
    resource_limits: ResourceLimitList,
    shared_page: Arc<SharedPage>,
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            next_process_id: AtomicU32::new(FIRST_PROCESS_ID),
            resource_limits: ResourceLimitList,
            shared_page: Arc::new(SharedPage::new()),
        }
    }

    pub fn create_codeset(&self, name: &str, program_id: u64) -> CodeSet {
        CodeSet::new(name.to_string(), program_id)
    }

    pub fn create_process(&self, codeset: CodeSet) -> Arc<Process> {
        let pid = self.next_process_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(Process::new(pid, codeset))
    }

    pub fn resource_limits(&self) -> &ResourceLimitList {
        &self.resource_limits
    }

    pub fn shared_page(&self) -> Arc<SharedPage> {
        self.shared_page.clone()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

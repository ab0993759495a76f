//! Per-category resource limits

use crate::memory::{HwRevision, MemoryMode};
use parking_lot::Mutex;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

/// Resource-limit category declared in the exheader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimitCategory {
    Application = 0,
    SysApplet = 1,
    LibApplet = 2,
    Other = 3,
}

impl ResourceLimitCategory {
    pub fn from_exheader(value: u8) -> Self {
        match value {
            1 => Self::SysApplet,
            2 => Self::LibApplet,
            3 => Self::Other,
            _ => Self::Application,
        }
    }
}

/// Limit types tracked per category (only Commit is consumed here)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimitType {
    Commit,
    Priority,
    Thread,
}

/// A resource limit attached to one or more processes
pub struct ResourceLimit {
    category: ResourceLimitCategory,
    inner: Mutex<Limits>,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    commit: u64,
    priority: u64,
    thread: u64,
}

impl ResourceLimit {
    fn new(category: ResourceLimitCategory, commit: u64) -> Self {
        Self {
            category,
            inner: Mutex::new(Limits {
                commit,
                priority: 0x18,
                thread: 0x20,
            }),
        }
    }

    pub fn category(&self) -> ResourceLimitCategory {
        self.category
    }

    pub fn limit_value(&self, ty: ResourceLimitType) -> u64 {
        let limits = self.inner.lock();
        match ty {
            ResourceLimitType::Commit => limits.commit,
            ResourceLimitType::Priority => limits.priority,
            ResourceLimitType::Thread => limits.thread,
        }
    }

    pub fn set_limit_value(&self, ty: ResourceLimitType, value: u64) {
        let mut limits = self.inner.lock();
        match ty {
            ResourceLimitType::Commit => limits.commit = value,
            ResourceLimitType::Priority => limits.priority = value,
            ResourceLimitType::Thread => limits.thread = value,
        }
    }
}

/// Application memory region size for a base (Old-3DS) memory mode.
///
/// These are the APPMEMALLOC values Old-3DS firmware reports per mode.
pub fn application_memory_size(mode: MemoryMode) -> u64 {
    match mode {
        MemoryMode::Prod => 64 * MIB,
        MemoryMode::Dev1 => 96 * MIB,
        MemoryMode::Dev2 => 80 * MIB,
        MemoryMode::Dev3 => 72 * MIB,
        MemoryMode::Dev4 => 32 * MIB,
    }
}

/// Application memory region size on New-3DS hardware
pub fn new3ds_application_memory_size(mode: MemoryMode) -> u64 {
    match mode {
        MemoryMode::Dev1 => 178 * MIB,
        _ => 124 * MIB,
    }
}

/// Factory handing out one limit object per category
pub struct ResourceLimitList;

impl ResourceLimitList {
    pub fn get_for_category(
        &self,
        category: ResourceLimitCategory,
        memory_mode: MemoryMode,
        hw_revision: HwRevision,
    ) -> Arc<ResourceLimit> {
        let commit = match category {
            ResourceLimitCategory::Application => match hw_revision {
                HwRevision::New3ds => new3ds_application_memory_size(memory_mode),
                HwRevision::Old3ds => application_memory_size(memory_mode),
            },
            ResourceLimitCategory::SysApplet => 32 * MIB,
            ResourceLimitCategory::LibApplet => 8 * MIB,
            ResourceLimitCategory::Other => 2 * MIB,
        };
        Arc::new(ResourceLimit::new(category, commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_defaults_track_memory_mode() {
        assert_eq!(application_memory_size(MemoryMode::Prod), 64 * MIB);
        assert_eq!(application_memory_size(MemoryMode::Dev1), 96 * MIB);
        assert_eq!(application_memory_size(MemoryMode::Dev2), 80 * MIB);
    }

    #[test]
    fn test_new3ds_application_default() {
        let list = ResourceLimitList;
        let limit = list.get_for_category(
            ResourceLimitCategory::Application,
            MemoryMode::Prod,
            HwRevision::New3ds,
        );
        assert_eq!(limit.limit_value(ResourceLimitType::Commit), 124 * MIB);
    }

    #[test]
    fn test_set_limit_value() {
        let list = ResourceLimitList;
        let limit = list.get_for_category(
            ResourceLimitCategory::Application,
            MemoryMode::Prod,
            HwRevision::Old3ds,
        );
        assert_eq!(limit.limit_value(ResourceLimitType::Commit), 64 * MIB);

        limit.set_limit_value(ResourceLimitType::Commit, 96 * MIB);
        assert_eq!(limit.limit_value(ResourceLimitType::Commit), 96 * MIB);
        assert_eq!(limit.category(), ResourceLimitCategory::Application);
    }
}

//! System-wide status sink for the Artic connection
//!
//! The transport layer can detect a communication failure asynchronously;
//! the resulting disconnection status is parked here and checked by the
//! next blocking caller. Traffic and event reports feed the telemetry
//! overlay.

use bitflags::bitflags;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Status codes surfaced to the boot orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    Running,
    ArticDisconnected,
}

bitflags! {
    /// Semantic categories reported by the Artic server alongside transfers
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArticEvents: u32 {
        const ACCESS_SAVE_DATA = 1 << 0;
        const ACCESS_EXT_DATA = 1 << 1;
        const ACCESS_ROMFS = 1 << 2;
        const ACCESS_SHARED_EXT_DATA = 1 << 3;
        const ACCESS_SYSTEM_SAVE_DATA = 1 << 4;
    }
}

/// Shared status/telemetry sink
pub struct StatusSink {
    status: Mutex<(SystemStatus, String)>,
    traffic_bytes: AtomicU64,
    events: AtomicU64,
}

impl StatusSink {
    pub fn new() -> Self {
        Self {
            status: Mutex::new((SystemStatus::Running, String::new())),
            traffic_bytes: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    /// Record a disconnection status with an optional human-readable message
    pub fn set_disconnected(&self, message: &str) {
        let mut status = self.status.lock();
        *status = (SystemStatus::ArticDisconnected, message.to_string());
        tracing::error!("Artic server disconnected: {}", message);
    }

    pub fn status(&self) -> SystemStatus {
        self.status.lock().0
    }

    pub fn status_message(&self) -> String {
        self.status.lock().1.clone()
    }

    /// Accumulate transferred bytes for the telemetry display
    pub fn report_traffic(&self, bytes: u32) {
        self.traffic_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn traffic_bytes(&self) -> u64 {
        self.traffic_bytes.load(Ordering::Relaxed)
    }

    /// Set or clear a semantic event bit
    pub fn report_event(&self, event: ArticEvents, set: bool) {
        if set {
            self.events.fetch_or(event.bits() as u64, Ordering::Relaxed);
        } else {
            self.events.fetch_and(!(event.bits() as u64), Ordering::Relaxed);
        }
    }

    pub fn active_events(&self) -> ArticEvents {
        ArticEvents::from_bits_truncate(self.events.load(Ordering::Relaxed) as u32)
    }
}

impl Default for StatusSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnection_status() {
        let sink = StatusSink::new();
        assert_eq!(sink.status(), SystemStatus::Running);

        sink.set_disconnected("socket closed");
        assert_eq!(sink.status(), SystemStatus::ArticDisconnected);
        assert_eq!(sink.status_message(), "socket closed");
    }

    #[test]
    fn test_traffic_accumulates() {
        let sink = StatusSink::new();
        sink.report_traffic(0x100);
        sink.report_traffic(0x40);
        assert_eq!(sink.traffic_bytes(), 0x140);
    }

    #[test]
    fn test_event_bits() {
        let sink = StatusSink::new();
        sink.report_event(ArticEvents::ACCESS_SAVE_DATA, true);
        sink.report_event(ArticEvents::ACCESS_ROMFS, true);
        assert!(sink.active_events().contains(ArticEvents::ACCESS_SAVE_DATA));

        sink.report_event(ArticEvents::ACCESS_SAVE_DATA, false);
        assert!(!sink.active_events().contains(ArticEvents::ACCESS_SAVE_DATA));
        assert!(sink.active_events().contains(ArticEvents::ACCESS_ROMFS));
    }
}

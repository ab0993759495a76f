//! Named service registry
//!
//! Subsystem services register under their port name; consumers look them
//! up by name and concrete type.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Name → service registry with typed lookup
pub struct ServiceManager {
    services: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
        }
    }

    pub fn register<T: Any + Send + Sync>(&self, name: &str, service: Arc<T>) {
        self.services.lock().insert(name.to_string(), service);
    }

    /// Look a service up by port name; `None` if absent or of another type
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.services
            .lock()
            .get(name)
            .cloned()
            .and_then(|svc| svc.downcast::<T>().ok())
    }
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(u32);

    #[test]
    fn test_register_and_get() {
        let manager = ServiceManager::new();
        manager.register("dummy:u", Arc::new(Dummy(7)));

        let svc = manager.get::<Dummy>("dummy:u").unwrap();
        assert_eq!(svc.0, 7);
        assert!(manager.get::<Dummy>("missing:u").is_none());
        assert!(manager.get::<String>("dummy:u").is_none());
    }
}

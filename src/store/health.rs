use std::sync::Mutex;

use crate::bus::event_types::{CATEGORY_HEALTH, HEALTH_REFRESHED};
use crate::core::ServiceHealth;

use super::StoreContext;

/// Latest service-health snapshot. Replaced wholesale, never patched.
pub struct HealthStore {
    ctx: StoreContext,
    services: Mutex<Vec<ServiceHealth>>,
}

impl HealthStore {
    pub(crate) fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            services: Mutex::new(Vec::new()),
        }
    }

    pub fn set_services(&self, services: Vec<ServiceHealth>) -> Vec<ServiceHealth> {
        {
            let mut current = self.services.lock().expect("health store mutex poisoned");
            *current = services.clone();
        }
        self.ctx.record(CATEGORY_HEALTH, HEALTH_REFRESHED, &services);
        services
    }

    pub fn list(&self) -> Vec<ServiceHealth> {
        self.services.lock().expect("health store mutex poisoned").clone()
    }

    pub fn get(&self, name: &str) -> Option<ServiceHealth> {
        let services = self.services.lock().expect("health store mutex poisoned");
        services
            .iter()
            .find(|service| service.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}

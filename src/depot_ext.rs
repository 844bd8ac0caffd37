//! Extension trait for Depot to easily access sessions

use salvo_core::Depot;

use crate::registry::SessionRegistry;
use crate::session::Session;

const REGISTRY_KEY: &str = "salvo.bucket.session.registry";

/// Extension trait for Salvo's Depot to provide easy session access
pub trait SessionDepotExt {
    /// Session resolved for cookie `name` during this request
    fn session(&self, name: &str) -> Option<Session>;

    /// All sessions resolved during this request
    fn sessions(&self) -> Vec<Session>;

    /// The request's session registry, created on first use
    fn session_registry_mut(&mut self) -> &mut SessionRegistry;
}

impl SessionDepotExt for Depot {
    fn session(&self, name: &str) -> Option<Session> {
        self.get::<SessionRegistry>(REGISTRY_KEY)
            .ok()
            .and_then(|registry| registry.get(name))
            .cloned()
    }

    fn sessions(&self) -> Vec<Session> {
        self.get::<SessionRegistry>(REGISTRY_KEY)
            .map(|registry| registry.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn session_registry_mut(&mut self) -> &mut SessionRegistry {
        if self.get::<SessionRegistry>(REGISTRY_KEY).is_err() {
            self.insert(REGISTRY_KEY, SessionRegistry::new());
        }
        self.get_mut::<SessionRegistry>(REGISTRY_KEY)
            .expect("session registry was just inserted")
    }
}

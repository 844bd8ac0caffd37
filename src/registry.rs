//! Per-request session registry

use std::collections::HashMap;

use crate::session::Session;

/// Sessions resolved during one request, keyed by cookie name.
///
/// The store consults the registry before loading, so each cookie name is
/// loaded at most once per request and every lookup returns the same session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session registered under `name`
    pub fn get(&self, name: &str) -> Option<&Session> {
        self.sessions.get(name)
    }

    /// Register a session under its cookie name, replacing any previous one
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.name().to_string(), session);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

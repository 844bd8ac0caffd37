//! Session handle and values

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CookieOptions;

/// Session values as persisted in the bucket
pub type Values = BTreeMap<String, Value>;

struct SessionState {
    id: String,
    values: Values,
    options: CookieOptions,
    is_new: bool,
    modified: bool,
    destroy: bool,
}

/// Session handle.
///
/// Clones share state, so the copy a handler gets from the depot and the copy
/// the store persists are the same session.
pub struct Session {
    name: String,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    /// Create a blank session for cookie `name` with its own copy of `options`
    pub fn new<S: Into<String>>(name: S, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(SessionState {
                id: String::new(),
                values: Values::new(),
                options,
                is_new: true,
                modified: false,
                destroy: false,
            })),
        }
    }

    /// Cookie name this session is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session ID; empty until the session is loaded or first saved
    pub fn id(&self) -> String {
        self.state.read().id.clone()
    }

    pub(crate) fn set_id(&self, id: String) {
        self.state.write().id = id;
    }

    /// Whether the session was created fresh rather than loaded from the bucket
    pub fn is_new(&self) -> bool {
        self.state.read().is_new
    }

    pub(crate) fn set_is_new(&self, is_new: bool) {
        self.state.write().is_new = is_new;
    }

    /// Whether values changed since the session was loaded or last saved
    pub fn is_modified(&self) -> bool {
        self.state.read().modified
    }

    /// Whether the session was marked for deletion with [`Session::destroy`]
    pub fn should_destroy(&self) -> bool {
        self.state.read().destroy
    }

    /// Get a value from the session
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.state
            .read()
            .values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the session
    pub fn set<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            let mut state = self.state.write();
            state.values.insert(key.to_string(), v);
            state.modified = true;
        }
    }

    /// Remove a value from the session
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.write();
        let result = state.values.remove(key);
        if result.is_some() {
            state.modified = true;
        }
        result
    }

    /// Check if a key exists in the session
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().values.contains_key(key)
    }

    /// Clear all session values
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.values.clear();
        state.modified = true;
    }

    /// Check if the session holds no values
    pub fn is_empty(&self) -> bool {
        self.state.read().values.is_empty()
    }

    /// Snapshot of the session values
    pub fn values(&self) -> Values {
        self.state.read().values.clone()
    }

    pub(crate) fn replace_values(&self, values: Values) {
        self.state.write().values = values;
    }

    /// Snapshot of this session's cookie options
    pub fn options(&self) -> CookieOptions {
        self.state.read().options.clone()
    }

    /// Change this session's cookie options, e.g. to shorten its max age.
    /// The store defaults and other sessions are unaffected.
    pub fn update_options<F: FnOnce(&mut CookieOptions)>(&self, f: F) {
        f(&mut self.state.write().options);
    }

    /// Mark the session for deletion when the request finishes
    pub fn destroy(&self) {
        self.state.write().destroy = true;
    }

    pub(crate) fn mark_saved(&self) {
        self.state.write().modified = false;
    }

    /// Drop all values after the bucket record was deleted
    pub(crate) fn mark_deleted(&self) {
        let mut state = self.state.write();
        state.values.clear();
        state.modified = false;
        state.destroy = false;
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("id", &state.id)
            .field("values", &state.values)
            .field("is_new", &state.is_new)
            .field("modified", &state.modified)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_and_modification() {
        let session = Session::new("sid", CookieOptions::default());
        assert!(session.is_new());
        assert!(!session.is_modified());
        assert!(session.id().is_empty());

        session.set("views", 3);
        assert_eq!(session.get::<i32>("views"), Some(3));
        assert!(session.contains("views"));
        assert!(session.is_modified());

        session.mark_saved();
        assert!(session.remove("missing").is_none());
        assert!(!session.is_modified());

        assert_eq!(session.remove("views"), Some(serde_json::json!(3)));
        assert!(session.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::new("sid", CookieOptions::default());
        let other = session.clone();

        other.set("user", "alice");
        session.set_id("ABC".to_string());

        assert_eq!(session.get::<String>("user"), Some("alice".to_string()));
        assert_eq!(other.id(), "ABC");
    }

    #[test]
    fn test_options_are_per_session() {
        let defaults = CookieOptions::default();
        let a = Session::new("sid", defaults.clone());
        let b = Session::new("sid", defaults.clone());

        a.update_options(|o| o.max_age = 60);

        assert_eq!(a.options().max_age, 60);
        assert_eq!(b.options(), defaults);
    }

    #[test]
    fn test_mark_deleted_clears_values() {
        let session = Session::new("sid", CookieOptions::default());
        session.set("user", "alice");
        session.destroy();
        assert!(session.should_destroy());

        session.mark_deleted();
        assert!(session.is_empty());
        assert!(!session.should_destroy());
        assert!(!session.is_modified());
    }
}

//! Conversation identity resolution
//!
//! Three states: unset, explicit (caller pinned) and resolved (adopted from
//! the server once, then sticky for reconnects on the same controller).

/// Tracks which conversation id the next handle is created with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationIdentity {
    explicit: Option<String>,
    resolved: Option<String>,
}

impl ConversationIdentity {
    pub fn new(explicit: Option<String>) -> Self {
        Self {
            explicit: non_empty(explicit),
            resolved: None,
        }
    }

    /// Pin (or un-pin) the caller's identity; takes effect on the next connect
    pub fn set_explicit(&mut self, id: Option<String>) {
        self.explicit = non_empty(id);
    }

    pub fn explicit(&self) -> Option<&str> {
        self.explicit.as_deref()
    }

    /// Identity in effect for the current (or most recent) connection
    pub fn resolved(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    /// Identity a new handle is configured with
    ///
    /// The explicit value wins; otherwise the previously resolved one is
    /// reused.
    pub fn resolve_for_connect(&mut self) -> Option<String> {
        let id = self.explicit.clone().or_else(|| self.resolved.clone());
        self.resolved = id.clone();
        id
    }

    /// Apply the id reported by the server when a session opens
    ///
    /// The server's value is adopted only while nothing is resolved yet.
    /// Returns the newly adopted id, if any.
    pub fn adopt_server_id(&mut self, server_id: Option<&str>) -> Option<String> {
        if self.resolved.is_some() {
            return None;
        }
        let id = non_empty(server_id.map(str::to_string))?;
        self.resolved = Some(id.clone());
        Some(id)
    }
}

fn non_empty(id: Option<String>) -> Option<String> {
    id.filter(|s| !s.trim().is_empty())
}

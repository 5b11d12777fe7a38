// Per-session state - Telemetry cache, recommendations and request history
use crate::application::telemetry_cache::TelemetryCache;
use crate::domain::hint::TelemetryHint;
use crate::domain::maintenance::{AiRecommendation, MaintenanceRequest};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_SESSION: &str = "default";

/// Recommendation shown to the user together with the hint it was based on.
#[derive(Debug, Clone)]
pub struct RecommendationRecord {
    pub recommendation: AiRecommendation,
    pub hint: TelemetryHint,
}

#[derive(Debug, Default)]
pub struct ShopfloorSession {
    pub telemetry: TelemetryCache,
    recommendations: HashMap<String, RecommendationRecord>,
    requests: Vec<MaintenanceRequest>,
}

impl ShopfloorSession {
    pub fn remember_recommendation(&mut self, machine_id: &str, record: RecommendationRecord) {
        self.recommendations.insert(machine_id.to_string(), record);
    }

    pub fn recommendation(&self, machine_id: &str) -> Option<&RecommendationRecord> {
        self.recommendations.get(machine_id)
    }

    /// Newest request first.
    pub fn record_request(&mut self, request: MaintenanceRequest) {
        self.requests.insert(0, request);
    }

    pub fn requests(&self) -> &[MaintenanceRequest] {
        &self.requests
    }
}

/// Sessions kept before the least recently used one is dropped.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Debug, Default)]
struct Entry {
    session: ShopfloorSession,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<String, Entry>,
    clock: u64,
}

impl Sessions {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            tracing::debug!("Evicting idle session {}", id);
            self.entries.remove(&id);
        }
    }
}

/// Sessions keyed by client-provided id, bounded to `max_sessions` with
/// least-recently-used eviction. The lock is only held for synchronous
/// work, never across an await.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<Sessions>,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Run `f` on the session, creating it first if needed.
    pub fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut ShopfloorSession) -> R) -> R {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let now = sessions.tick();

        if !sessions.entries.contains_key(session_id) && sessions.entries.len() >= self.max_sessions {
            sessions.evict_least_recent();
        }

        let entry = sessions.entries.entry(session_id.to_string()).or_default();
        entry.last_used = now;
        f(&mut entry.session)
    }

    /// Run `f` on an existing session. Unknown ids return `None` and
    /// leave the store untouched.
    pub fn read_session<R>(&self, session_id: &str, f: impl FnOnce(&ShopfloorSession) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let now = sessions.tick();
        let entry = sessions.entries.get_mut(session_id)?;
        entry.last_used = now;
        Some(f(&entry.session))
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hint::DisabledReport;
    use crate::domain::maintenance::{Decision, Risk};

    fn record() -> RecommendationRecord {
        RecommendationRecord {
            recommendation: AiRecommendation {
                decision: Decision::Continue,
                risk: Risk::Low,
                diagnosis: "fine".to_string(),
                rationale: "all channels ok".to_string(),
                actions: vec![],
                cost_impact: None,
                next_check: None,
            },
            hint: TelemetryHint::Disabled(DisabledReport {
                reason: "off".to_string(),
                economics: None,
            }),
        }
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        store.with_session("a", |s| s.remember_recommendation("CNC-MILL-1", record()));

        assert_eq!(store.read_session("a", |s| s.recommendation("CNC-MILL-1").is_some()), Some(true));
        assert!(store.with_session("b", |s| s.recommendation("CNC-MILL-1").is_none()));
        assert!(store.with_session(DEFAULT_SESSION, |s| s.telemetry.is_empty()));
    }

    #[test]
    fn test_reading_unknown_session_creates_nothing() {
        let store = SessionStore::new();
        for i in 0..100 {
            assert!(store.read_session(&format!("visitor-{i}"), |s| s.requests().len()).is_none());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_is_bounded() {
        let store = SessionStore::with_capacity(8);
        for i in 0..10_000 {
            store.with_session(&format!("client-{i}"), |s| s.remember_recommendation("CNC-MILL-1", record()));
        }
        assert_eq!(store.len(), 8);
        assert!(store.read_session("client-0", |_| ()).is_none());
        assert!(store.read_session("client-9999", |_| ()).is_some());
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let store = SessionStore::with_capacity(2);
        store.with_session("a", |s| s.remember_recommendation("CNC-MILL-1", record()));
        store.with_session("b", |_| ());
        // Touching "a" makes "b" the eviction candidate.
        store.read_session("a", |_| ());
        store.with_session("c", |_| ());

        assert_eq!(store.len(), 2);
        assert!(store.read_session("b", |_| ()).is_none());
        assert_eq!(store.read_session("a", |s| s.recommendation("CNC-MILL-1").is_some()), Some(true));
        assert!(store.read_session("c", |_| ()).is_some());
    }
}

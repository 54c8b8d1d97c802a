//! Per-session UI log capture: a bounded ring buffer attached to selected
//! log events, so a UI session can show its own recent activity without
//! grepping the process-wide log (SPEC_FULL §14.2).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct UiLogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub logger_name: String,
    pub message: String,
    pub correlation_id: String,
    pub is_phase_header: bool,
    pub is_request_boundary: bool,
}

pub struct UiLogBuffer {
    max_messages: usize,
    messages: Mutex<VecDeque<UiLogMessage>>,
}

impl UiLogBuffer {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            messages: Mutex::new(VecDeque::with_capacity(max_messages)),
        }
    }

    pub fn append(&self, message: UiLogMessage) {
        let mut buf = self.messages.lock();
        if buf.len() >= self.max_messages {
            buf.pop_front();
        }
        buf.push_back(message);
    }

    pub fn snapshot(&self) -> Vec<UiLogMessage> {
        self.messages.lock().iter().cloned().collect()
    }

    pub fn tail(&self, since: Option<DateTime<Utc>>) -> Vec<UiLogMessage> {
        let buf = self.messages.lock();
        match since {
            Some(since) => buf.iter().filter(|m| m.timestamp > since).cloned().collect(),
            None => buf.iter().cloned().collect(),
        }
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

struct SessionState {
    enabled: bool,
    buffer: UiLogBuffer,
}

/// Registry of per-UI-session ring buffers, keyed by an opaque session id
/// supplied by the caller (not derived from anything in this crate).
pub struct UiLogRegistry {
    max_messages: usize,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl UiLogRegistry {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn append(&self, session_id: &str, message: UiLogMessage) {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionState { enabled: true, buffer: UiLogBuffer::new(self.max_messages) });
        if entry.enabled {
            entry.buffer.append(message);
        }
    }

    pub fn set_enabled(&self, session_id: &str, enabled: bool) {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionState { enabled, buffer: UiLogBuffer::new(self.max_messages) });
        entry.enabled = enabled;
    }

    pub fn tail(&self, session_id: &str, since: Option<DateTime<Utc>>) -> Vec<UiLogMessage> {
        self.sessions.lock().get(session_id).map(|s| s.buffer.tail(since)).unwrap_or_default()
    }

    pub fn clear(&self, session_id: &str) {
        if let Some(state) = self.sessions.lock().get(session_id) {
            state.buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(message: &str) -> UiLogMessage {
        UiLogMessage {
            timestamp: Utc::now(),
            level: "INFO".to_string(),
            logger_name: "gateway".to_string(),
            message: message.to_string(),
            correlation_id: "abc".to_string(),
            is_phase_header: false,
            is_request_boundary: false,
        }
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let buffer = UiLogBuffer::new(2);
        buffer.append(sample("one"));
        buffer.append(sample("two"));
        buffer.append(sample("three"));
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].message, "two");
    }

    #[test]
    fn disabled_session_drops_messages() {
        let registry = UiLogRegistry::new(10);
        registry.set_enabled("sess-1", false);
        registry.append("sess-1", sample("hello"));
        assert!(registry.tail("sess-1", None).is_empty());
    }
}

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Bounded in-memory record of raw event lines, oldest dropped first.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(format!("Event [{line}]"));
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

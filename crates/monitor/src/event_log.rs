//! Bounded log of protection actions taken by the scheduler

use chrono::{DateTime, Utc};
use keyguard_core::SlotName;
use serde::Serialize;
use std::collections::VecDeque;

/// Entries kept before the oldest are dropped
pub const EVENT_LOG_CAPACITY: usize = 1000;

/// What the scheduler did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionAction {
    KeyDisabled,
    CriticalMultiResource,
}

/// One protection action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectionRecord {
    pub action: ProtectionAction,
    /// `group/name`, or a comma separated list for multi-resource records
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotName>,
    pub error_count: u64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// FIFO of protection records capped at a fixed capacity
#[derive(Debug)]
pub struct EventLog {
    records: VecDeque<ProtectionRecord>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, record: ProtectionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ProtectionRecord> {
        self.records.back()
    }

    /// Records at or after `since`, oldest first
    pub fn since(&self, since: DateTime<Utc>) -> impl Iterator<Item = &ProtectionRecord> {
        self.records.iter().filter(move |r| r.timestamp >= since)
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(EVENT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(i: i64) -> ProtectionRecord {
        ProtectionRecord {
            action: ProtectionAction::KeyDisabled,
            service: format!("rg/svc-{i}"),
            slot: Some(SlotName::new("key1")),
            error_count: 10,
            reason: "429_rate_limit_exceeded".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i),
        }
    }

    #[test]
    fn drops_oldest_beyond_capacity() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.push(record(i));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().map(|r| r.service.as_str()), Some("rg/svc-4"));
        let services: Vec<_> = log.since(record(0).timestamp).map(|r| r.service.clone()).collect();
        assert_eq!(services, ["rg/svc-2", "rg/svc-3", "rg/svc-4"]);
    }

    #[test]
    fn since_filters_by_time() {
        let mut log = EventLog::default();
        for i in 0..4 {
            log.push(record(i));
        }
        assert_eq!(log.since(record(2).timestamp).count(), 2);
    }
}

use serde::{Deserialize, Serialize};

/// Counter kinds tracked per topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Added,
    Getted,
    Done,
    Failed,
}

impl StatKind {
    /// Counter column name
    pub fn name(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Getted => "getted",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-topic monotonically increasing counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub topic: String,
    pub added: u64,
    pub getted: u64,
    pub failed: u64,
    pub done: u64,
}

impl TopicStats {
    /// Zeroed counters for a topic
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            added: 0,
            getted: 0,
            failed: 0,
            done: 0,
        }
    }

    pub fn increment(&mut self, kind: StatKind) {
        match kind {
            StatKind::Added => self.added += 1,
            StatKind::Getted => self.getted += 1,
            StatKind::Done => self.done += 1,
            StatKind::Failed => self.failed += 1,
        }
    }

    pub fn get(&self, kind: StatKind) -> u64 {
        match kind {
            StatKind::Added => self.added,
            StatKind::Getted => self.getted,
            StatKind::Done => self.done,
            StatKind::Failed => self.failed,
        }
    }
}

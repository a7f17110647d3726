use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Blocked,
    Completed,
    Deleted,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Open,
        Status::InProgress,
        Status::Blocked,
        Status::Completed,
        Status::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in-progress",
            Status::Blocked => "blocked",
            Status::Completed => "completed",
            Status::Deleted => "deleted",
        }
    }

    /// Tombstoned items stay in every replica; listing hides them by default.
    pub fn is_tombstone(self) -> bool {
        self == Status::Deleted
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        let status = match normalized.as_str() {
            "open" | "todo" => Status::Open,
            "in-progress" | "doing" | "active" => Status::InProgress,
            "blocked" => Status::Blocked,
            "completed" | "done" | "closed" => Status::Completed,
            "deleted" => Status::Deleted,
            _ => {
                return Err(ParseStatusError {
                    value: value.to_string(),
                });
            }
        };
        Ok(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status '{value}': expected one of {}", joined(Status::ALL.iter().map(|s| s.as_str())))]
pub struct ParseStatusError {
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Sort key, most urgent first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let priority = match value.trim().to_ascii_lowercase().as_str() {
            "critical" | "p0" => Priority::Critical,
            "high" | "p1" => Priority::High,
            "medium" | "p2" => Priority::Medium,
            "low" | "p3" => Priority::Low,
            _ => {
                return Err(ParsePriorityError {
                    value: value.to_string(),
                });
            }
        };
        Ok(priority)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid priority '{value}': expected one of {}", joined(Priority::ALL.iter().map(|p| p.as_str())))]
pub struct ParsePriorityError {
    value: String,
}

fn joined<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(", ")
}

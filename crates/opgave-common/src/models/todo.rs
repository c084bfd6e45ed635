use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Todo priority level, stored lowercase in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePriorityError(pub String);

impl fmt::Display for ParsePriorityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown priority: {}", self.0)
    }
}

impl std::error::Error for ParsePriorityError {}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(ParsePriorityError(other.to_string())),
        }
    }
}

/// Todo item as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub completed: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter predicate for todo listings. Every field is optional; the owner
/// filter is implicit and always applied server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Requested page window; missing fields fall back to server defaults
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// The page window actually applied, echoed back in responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageInfo {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub filters: TodoFilters,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Aggregation {
    pub count: i64,
}

/// List envelope: total match count, echoed parameters, one page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub aggregation: Aggregation,
    pub filters: TodoFilters,
    pub pagination: PageInfo,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trip() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
        }
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        let p: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn test_list_request_defaults() {
        let req: ListRequest = serde_json::from_str("{}").unwrap();
        assert!(req.filters.search.is_none());
        assert!(req.pagination.limit.is_none());

        let req: ListRequest =
            serde_json::from_str(r#"{"filters":{"completed":false}}"#).unwrap();
        assert_eq!(req.filters.completed, Some(false));
    }

    #[test]
    fn test_empty_filters_serialize_empty() {
        let filters = TodoFilters::default();
        assert_eq!(serde_json::to_string(&filters).unwrap(), "{}");
    }

    #[test]
    fn test_todo_wire_casing() {
        let todo = Todo {
            id: uuid::Uuid::new_v4(),
            title: "t".to_string(),
            description: String::new(),
            priority: Priority::Medium,
            completed: false,
            user_id: uuid::Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&todo).unwrap();
        assert!(value.get("userId").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("user_id").is_none());
    }
}

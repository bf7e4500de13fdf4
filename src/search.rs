// Keyword search over task titles and descriptions

use serde::{Deserialize, Serialize};

use crate::workflow::Task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl From<&Task> for SearchItem {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub match_type: String,
}

/// Case-insensitive substring match on title or description. A blank query
/// matches nothing.
pub fn keyword_search(query: &str, items: &[SearchItem]) -> Vec<SearchMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    items
        .iter()
        .filter(|item| {
            item.title.to_lowercase().contains(&query)
                || item.description.to_lowercase().contains(&query)
        })
        .map(|item| SearchMatch {
            task_id: item.id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            match_type: "title_description".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<SearchItem> {
        vec![
            SearchItem {
                id: "task_1".to_string(),
                title: "January Newsletter".to_string(),
                description: "Monthly update".to_string(),
            },
            SearchItem {
                id: "task_2".to_string(),
                title: "Q1 Campaign".to_string(),
                description: "Social media NEWSLETTER tie-in".to_string(),
            },
            SearchItem {
                id: "task_3".to_string(),
                title: "Budget".to_string(),
                description: "Annual plan".to_string(),
            },
        ]
    }

    #[test]
    fn test_matches_title_or_description() {
        let found = keyword_search("  newsletter ", &items());
        let ids: Vec<&str> = found.iter().map(|m| m.task_id.as_str()).collect();
        assert_eq!(ids, vec!["task_1", "task_2"]);
        assert!(found.iter().all(|m| m.match_type == "title_description"));
    }

    #[test]
    fn test_blank_query_or_no_items() {
        assert!(keyword_search("   ", &items()).is_empty());
        assert!(keyword_search("budget", &[]).is_empty());
    }
}

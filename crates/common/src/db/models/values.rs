//! JSON column value types shared by the entities

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Logins kept on an account
pub const LOGIN_HISTORY_LIMIT: usize = 10;

/// Searches kept on an account
pub const SEARCH_HISTORY_LIMIT: usize = 50;

/// Unordered set of short strings (tags, research areas)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

impl StringList {
    /// Trim, drop empties and de-duplicate, keeping first-seen order
    pub fn normalized<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for item in items {
            let item = item.as_ref().trim();
            if !item.is_empty() && !out.iter().any(|seen| seen == item) {
                out.push(item.to_string());
            }
        }
        StringList(out)
    }

    /// Parse a comma separated list
    pub fn from_csv(raw: &str) -> Self {
        Self::normalized(raw.split(','))
    }

    /// Accepts a JSON array of strings or a comma separated list
    pub fn from_json_or_csv(raw: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(items) => Self::normalized(items),
            Err(_) => Self::from_csv(raw),
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEntry {
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct LoginHistory(pub Vec<LoginEntry>);

impl LoginHistory {
    /// Append, keeping only the most recent [`LOGIN_HISTORY_LIMIT`] entries
    pub fn pushed(&self, entry: LoginEntry) -> Self {
        LoginHistory(keep_last(&self.0, entry, LOGIN_HISTORY_LIMIT))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct SearchHistory(pub Vec<SearchEntry>);

impl SearchHistory {
    pub fn pushed(&self, entry: SearchEntry) -> Self {
        SearchHistory(keep_last(&self.0, entry, SEARCH_HISTORY_LIMIT))
    }
}

fn keep_last<T: Clone>(existing: &[T], entry: T, limit: usize) -> Vec<T> {
    let skip = (existing.len() + 1).saturating_sub(limit);
    existing
        .iter()
        .skip(skip)
        .cloned()
        .chain(std::iter::once(entry))
        .collect()
}

/// Bibliographic details supplied at upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl DocumentMetadata {
    /// Four-digit year at the start of the publication date, if any
    pub fn publication_year(&self) -> Option<i32> {
        self.publication_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_trimmed_and_deduplicated() {
        let tags = StringList::from_csv(" ml, nlp ,, ml,  ,graphs");
        assert_eq!(tags.0, vec!["ml", "nlp", "graphs"]);
    }

    #[test]
    fn test_research_areas_accept_json_or_csv() {
        assert_eq!(
            StringList::from_json_or_csv(r#"["AI", " Robotics ", "AI"]"#).0,
            vec!["AI", "Robotics"]
        );
        assert_eq!(StringList::from_json_or_csv("AI, Robotics").0, vec!["AI", "Robotics"]);
    }

    #[test]
    fn test_login_history_keeps_last_ten() {
        let mut history = LoginHistory::default();
        for i in 0..12 {
            history = history.pushed(LoginEntry {
                timestamp: Utc::now(),
                ip_address: Some(format!("10.0.0.{}", i)),
                user_agent: None,
            });
        }
        assert_eq!(history.0.len(), LOGIN_HISTORY_LIMIT);
        assert_eq!(history.0[0].ip_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(history.0[9].ip_address.as_deref(), Some("10.0.0.11"));
    }

    #[test]
    fn test_publication_year() {
        let meta = DocumentMetadata {
            publication_date: Some("2021-06-01".into()),
            ..Default::default()
        };
        assert_eq!(meta.publication_year(), Some(2021));
        assert_eq!(DocumentMetadata::default().publication_year(), None);
    }
}

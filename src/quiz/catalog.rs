use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use async_trait::async_trait;

use super::matcher::{ContentCandidate, ContentCatalog, RuleFilter, RuleRow};
use super::{Approach, ContentId, Goal, PracticeType};
use crate::error::CatalogError;

/// A practice-matching rule as stored in the catalog file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CatalogRule {
    pub content_id: ContentId,
    pub practice_type: PracticeType,
    #[serde(default)]
    pub goal: Option<Goal>,
    #[serde(default)]
    pub approach: Option<Approach>,
    #[serde(default)]
    pub duration_min: Option<u32>,
    #[serde(default)]
    pub duration_max: Option<u32>,
    pub priority: i32,
}

impl CatalogRule {
    /// Column-by-column comparison, like the hosted backend's `eq` / `gte` / `lte`
    /// filters: a rule with an unset column never satisfies a filter on it.
    fn matches(&self, filter: &RuleFilter) -> bool {
        if self.practice_type != filter.practice_type {
            return false;
        }
        if filter.goal.is_some() && self.goal != filter.goal {
            return false;
        }
        if filter.approach.is_some() && self.approach != filter.approach {
            return false;
        }
        if let Some(range) = filter.duration {
            return match (self.duration_min, self.duration_max) {
                (Some(min), Some(max)) => range.overlaps(min, max),
                _ => false,
            };
        }
        true
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct CatalogFile {
    #[serde(default)]
    content: Vec<ContentCandidate>,
    #[serde(default)]
    rules: Vec<CatalogRule>,
}

/// Content catalog held in memory, loaded once at startup from a JSON file.
#[derive(Debug, Default)]
pub struct JsonCatalog {
    content: HashMap<ContentId, ContentCandidate>,
    rules: Vec<CatalogRule>,
}

impl JsonCatalog {
    pub fn new(content: Vec<ContentCandidate>, rules: Vec<CatalogRule>) -> Self {
        let content = content
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        Self { content, rules }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_reader(reader)?;
        Ok(Self::new(file.content, file.rules))
    }

    pub fn content_count(&self) -> usize {
        self.content.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[async_trait]
impl ContentCatalog for JsonCatalog {
    async fn query_rules(&self, filter: &RuleFilter, limit: usize) -> Result<Vec<RuleRow>, CatalogError> {
        let mut rows = self
            .rules
            .iter()
            .filter(|rule| rule.matches(filter))
            .map(|rule| RuleRow {
                priority: rule.priority,
                content_id: rule.content_id.clone(),
            })
            .collect::<Vec<_>>();
        // stable, so rows of equal priority keep file order
        rows.sort_by(|a, b| b.priority.cmp(&a.priority));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn get_content(&self, id: &str) -> Result<ContentCandidate, CatalogError> {
        self.content
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::MissingContent(id.to_string()))
    }
}

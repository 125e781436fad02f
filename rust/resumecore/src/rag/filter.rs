//! Metadata filtering for segment search
//!
//! Filters are hard constraints evaluated on [`SegmentMetadata`] before any
//! distance is computed. Filters that pin a set of entity ids let the index
//! jump straight to those entities' segments instead of scanning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::document::SegmentMetadata;

/// A filter condition on segment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetadataFilter {
    /// entity_id == value
    EntityId { value: String },

    /// entity_id is one of values
    EntityIn { values: Vec<String> },

    /// source_name == value
    Source { value: String },

    /// min <= page_number <= max
    PageRange { min: Option<u32>, max: Option<u32> },

    And { conditions: Vec<MetadataFilter> },

    Or { conditions: Vec<MetadataFilter> },

    Not { condition: Box<MetadataFilter> },
}

impl MetadataFilter {
    pub fn entity(id: impl Into<String>) -> Self {
        MetadataFilter::EntityId { value: id.into() }
    }

    pub fn entities<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetadataFilter::EntityIn {
            values: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, meta: &SegmentMetadata) -> bool {
        match self {
            MetadataFilter::EntityId { value } => meta.entity_id == *value,

            MetadataFilter::EntityIn { values } => values.iter().any(|v| *v == meta.entity_id),

            MetadataFilter::Source { value } => meta.source_name == *value,

            MetadataFilter::PageRange { min, max } => {
                let above_min = min.map(|m| meta.page_number >= m).unwrap_or(true);
                let below_max = max.map(|m| meta.page_number <= m).unwrap_or(true);
                above_min && below_max
            }

            MetadataFilter::And { conditions } => conditions.iter().all(|c| c.matches(meta)),

            MetadataFilter::Or { conditions } => conditions.iter().any(|c| c.matches(meta)),

            MetadataFilter::Not { condition } => !condition.matches(meta),
        }
    }

    /// Entity ids every matching segment must belong to, if the filter
    /// restricts entities at all. `None` means any entity may match.
    pub fn pinned_entities(&self) -> Option<BTreeSet<&str>> {
        match self {
            MetadataFilter::EntityId { value } => Some(BTreeSet::from([value.as_str()])),

            MetadataFilter::EntityIn { values } => Some(values.iter().map(String::as_str).collect()),

            MetadataFilter::Source { .. } | MetadataFilter::PageRange { .. } | MetadataFilter::Not { .. } => None,

            // intersection of every pinned child
            MetadataFilter::And { conditions } => conditions
                .iter()
                .filter_map(|c| c.pinned_entities())
                .reduce(|acc, set| acc.intersection(&set).copied().collect()),

            // only pinned if every branch is
            MetadataFilter::Or { conditions } => {
                let mut union = BTreeSet::new();
                for c in conditions {
                    union.extend(c.pinned_entities()?);
                }
                Some(union)
            }
        }
    }
}

/// Builder for conjunctive filters.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    conditions: Vec<MetadataFilter>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, id: &str) -> Self {
        self.conditions.push(MetadataFilter::entity(id));
        self
    }

    pub fn entities(mut self, ids: &[&str]) -> Self {
        self.conditions.push(MetadataFilter::entities(ids.iter().copied()));
        self
    }

    pub fn source(mut self, source_name: &str) -> Self {
        self.conditions.push(MetadataFilter::Source {
            value: source_name.to_string(),
        });
        self
    }

    pub fn pages(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.conditions.push(MetadataFilter::PageRange { min, max });
        self
    }

    pub fn build(mut self) -> Option<MetadataFilter> {
        match self.conditions.len() {
            0 => None,
            1 => self.conditions.pop(),
            _ => Some(MetadataFilter::And {
                conditions: self.conditions,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(entity: &str, source: &str, page: u32) -> SegmentMetadata {
        SegmentMetadata {
            entity_id: entity.to_string(),
            display_name: "Applicant 1".to_string(),
            source_name: source.to_string(),
            page_number: page,
            chunk_index: 0,
            start: 0,
            end: 10,
        }
    }

    #[test]
    fn test_entity_filters() {
        let m = meta("A", "a.pdf", 1);

        assert!(MetadataFilter::entity("A").matches(&m));
        assert!(!MetadataFilter::entity("B").matches(&m));
        assert!(MetadataFilter::entities(["B", "A"]).matches(&m));
        assert!(!MetadataFilter::entities(Vec::<String>::new()).matches(&m));
    }

    #[test]
    fn test_page_range() {
        let m = meta("A", "a.pdf", 3);

        assert!(MetadataFilter::PageRange { min: Some(2), max: Some(3) }.matches(&m));
        assert!(MetadataFilter::PageRange { min: None, max: Some(3) }.matches(&m));
        assert!(MetadataFilter::PageRange { min: None, max: None }.matches(&m));
        assert!(!MetadataFilter::PageRange { min: Some(4), max: None }.matches(&m));
    }

    #[test]
    fn test_boolean_combinators() {
        let m = meta("A", "a.pdf", 1);

        let and = MetadataFilter::And {
            conditions: vec![MetadataFilter::entity("A"), MetadataFilter::Source { value: "a.pdf".into() }],
        };
        assert!(and.matches(&m));

        let or = MetadataFilter::Or {
            conditions: vec![MetadataFilter::entity("B"), MetadataFilter::entity("A")],
        };
        assert!(or.matches(&m));

        let not = MetadataFilter::Not {
            condition: Box::new(MetadataFilter::entity("A")),
        };
        assert!(!not.matches(&m));
    }

    #[test]
    fn test_pinned_entities() {
        assert_eq!(
            MetadataFilter::entity("A").pinned_entities(),
            Some(BTreeSet::from(["A"]))
        );

        let and = FilterBuilder::new()
            .entities(&["A", "B", "C"])
            .entity("B")
            .pages(Some(1), None)
            .build()
            .unwrap();
        assert_eq!(and.pinned_entities(), Some(BTreeSet::from(["B"])));

        let or = MetadataFilter::Or {
            conditions: vec![MetadataFilter::entity("A"), MetadataFilter::entity("C")],
        };
        assert_eq!(or.pinned_entities(), Some(BTreeSet::from(["A", "C"])));

        let open_or = MetadataFilter::Or {
            conditions: vec![MetadataFilter::entity("A"), MetadataFilter::Source { value: "x".into() }],
        };
        assert_eq!(open_or.pinned_entities(), None);

        let not = MetadataFilter::Not {
            condition: Box::new(MetadataFilter::entity("A")),
        };
        assert_eq!(not.pinned_entities(), None);
    }

    #[test]
    fn test_builder() {
        assert!(FilterBuilder::new().build().is_none());
        assert_eq!(FilterBuilder::new().entity("A").build(), Some(MetadataFilter::entity("A")));

        let filter = FilterBuilder::new().entity("A").source("a.pdf").build().unwrap();
        assert!(filter.matches(&meta("A", "a.pdf", 1)));
        assert!(!filter.matches(&meta("A", "b.pdf", 1)));
    }

    #[test]
    fn test_serde_shape() {
        let filter: MetadataFilter =
            serde_json::from_str(r#"{"op":"entity_in","values":["A","B"]}"#).unwrap();
        assert_eq!(filter, MetadataFilter::entities(["A", "B"]));

        let json = serde_json::to_value(MetadataFilter::PageRange { min: Some(1), max: None }).unwrap();
        assert_eq!(json["op"], "page_range");
    }
}

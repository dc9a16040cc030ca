//! Field-level diffs of stored entries and restoring an entry's old values.

use std::collections::BTreeMap;

use chronicle_common::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::AuditResult;
use super::models::AuditEntry;
use super::subject::SubjectRepository;

/// One changed attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

pub type Diff = BTreeMap<String, FieldChange>;

/// Attributes whose old and new values differ.
///
/// A key missing on one side compares as `null`; JSON storage cannot tell
/// the two apart.
pub fn diff(entry: &AuditEntry) -> Diff {
    entry
        .old_values
        .keys()
        .chain(entry.new_values.keys())
        .filter_map(|key| {
            let old = entry.old_values.get(key).cloned().unwrap_or(Value::Null);
            let new = entry.new_values.get(key).cloned().unwrap_or(Value::Null);
            (old != new).then(|| (key.clone(), FieldChange { old, new }))
        })
        .collect()
}

/// Result of applying an entry's old values.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// The subject no longer exists
    NotFound,
    /// Nothing to roll back to; carries the subject as loaded
    Unchanged(Attributes),
    Restored {
        /// Subject after the write
        subject: Attributes,
        /// Subject before the write
        previous: Attributes,
        applied: Attributes,
        /// Old values whose columns no longer exist
        skipped: Vec<String>,
    },
}

/// Apply `entry.old_values` back onto the live subject.
///
/// Columns dropped since the entry was recorded are skipped; a partial
/// restore is not an error.
pub async fn restore(entry: &AuditEntry, repository: &dyn SubjectRepository) -> AuditResult<RestoreOutcome> {
    let Some(previous) = repository.find(&entry.subject_id).await? else {
        return Ok(RestoreOutcome::NotFound);
    };

    if entry.old_values.is_empty() {
        return Ok(RestoreOutcome::Unchanged(previous));
    }

    let mut applied = Attributes::new();
    let mut skipped = Vec::new();
    for (column, value) in &entry.old_values {
        if repository.has_column(column).await? {
            applied.insert(column.clone(), value.clone());
        } else {
            skipped.push(column.clone());
        }
    }

    if applied.is_empty() {
        debug!(audit_id = entry.id, ?skipped, "No restorable columns left");
        return Ok(RestoreOutcome::Unchanged(previous));
    }

    let Some(subject) = repository.force_fill(&entry.subject_id, &applied).await? else {
        return Ok(RestoreOutcome::NotFound);
    };

    debug!(
        audit_id = entry.id,
        subject_type = %entry.subject_type,
        subject_id = %entry.subject_id,
        applied = applied.len(),
        skipped = skipped.len(),
        "Restored subject from audit entry"
    );

    Ok(RestoreOutcome::Restored {
        subject,
        previous,
        applied,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::models::{AuditEvent, NewAuditEntry};
    use crate::audit::subject::InMemorySubjectRepository;
    use chrono::Utc;
    use proptest::prelude::*;
    use serde_json::json;

    fn entry(old: Attributes, new: Attributes) -> AuditEntry {
        NewAuditEntry::builder()
            .subject("articles", "1")
            .event(AuditEvent::Updated)
            .old_values(old)
            .new_values(new)
            .build()
            .unwrap()
            .into_entry(1, Utc::now())
    }

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_diff_reports_changed_fields() {
        let d = diff(&entry(attrs(&[("title", json!("A"))]), attrs(&[("title", json!("B"))])));
        assert_eq!(
            d,
            BTreeMap::from([(
                "title".to_string(),
                FieldChange {
                    old: json!("A"),
                    new: json!("B")
                }
            )])
        );
    }

    #[test]
    fn test_diff_of_identical_values_is_empty() {
        let same = attrs(&[("title", json!("A"))]);
        assert!(diff(&entry(same.clone(), same)).is_empty());
    }

    #[test]
    fn test_diff_treats_missing_as_null() {
        let d = diff(&entry(attrs(&[("a", Value::Null)]), attrs(&[("b", json!(1))])));
        assert_eq!(d.len(), 1);
        assert_eq!(d["b"].old, Value::Null);
    }

    #[tokio::test]
    async fn test_restore_skips_dropped_columns() {
        let repo = InMemorySubjectRepository::new(["id", "title", "body"]);
        repo.insert(
            "1",
            attrs(&[("id", json!(1)), ("title", json!("B")), ("body", json!("kept"))]),
        )
        .await;

        let e = entry(
            attrs(&[("title", json!("X")), ("ghost_col", json!("Y"))]),
            attrs(&[("title", json!("B")), ("ghost_col", json!("Z"))]),
        );

        let RestoreOutcome::Restored { subject, applied, skipped, .. } = restore(&e, &repo).await.unwrap()
        else {
            panic!("expected a restore");
        };

        assert_eq!(subject["title"], json!("X"));
        assert_eq!(subject["body"], json!("kept"));
        assert!(!subject.contains_key("ghost_col"));
        assert_eq!(applied.len(), 1);
        assert_eq!(skipped, vec!["ghost_col"]);
    }

    #[tokio::test]
    async fn test_restore_missing_subject_is_not_found() {
        let repo = InMemorySubjectRepository::new(["id", "title"]);
        let e = entry(attrs(&[("title", json!("X"))]), Attributes::new());
        assert_eq!(restore(&e, &repo).await.unwrap(), RestoreOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_restore_created_entry_is_noop() {
        let repo = InMemorySubjectRepository::new(["id", "title"]);
        repo.insert("1", attrs(&[("title", json!("A"))])).await;

        let e = entry(Attributes::new(), attrs(&[("title", json!("A"))]));
        assert_eq!(
            restore(&e, &repo).await.unwrap(),
            RestoreOutcome::Unchanged(attrs(&[("title", json!("A"))]))
        );
    }

    proptest! {
        #[test]
        fn prop_diff_keys_are_exactly_the_unequal_ones(
            old in proptest::collection::btree_map("[a-d]", 0i64..3, 0..4),
            new in proptest::collection::btree_map("[a-d]", 0i64..3, 0..4),
        ) {
            let to_attrs = |m: &BTreeMap<String, i64>| -> Attributes {
                m.iter().map(|(k, v)| (k.clone(), json!(v))).collect()
            };
            let d = diff(&entry(to_attrs(&old), to_attrs(&new)));

            for key in old.keys().chain(new.keys()) {
                prop_assert_eq!(d.contains_key(key), old.get(key) != new.get(key));
            }
        }
    }
}

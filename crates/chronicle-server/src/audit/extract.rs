//! Change extraction: turns a lifecycle transition into the `(old, new)`
//! attribute pair to persist.
//!
//! Nothing here redacts; callers project both maps afterwards.

use chronicle_common::Attributes;
use serde_json::Value;

/// Old/new attribute maps of a single entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub old_values: Attributes,
    pub new_values: Attributes,
}

/// Result of extracting an `updated` transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Record(ChangeSet),
    /// The save changed nothing worth recording
    Suppress,
}

pub fn created(new_state: &Attributes) -> ChangeSet {
    ChangeSet {
        old_values: Attributes::new(),
        new_values: new_state.clone(),
    }
}

/// Old values carry the full prior state; new values stay empty.
pub fn deleted(prior_state: &Attributes) -> ChangeSet {
    ChangeSet {
        old_values: prior_state.clone(),
        new_values: Attributes::new(),
    }
}

/// The reactivated state is recorded as new values.
pub fn restored(current_state: &Attributes) -> ChangeSet {
    ChangeSet {
        old_values: Attributes::new(),
        new_values: current_state.clone(),
    }
}

/// Restrict prior and current state to `changed_keys`.
///
/// Both maps end up with exactly the changed key set; a key missing on one
/// side is recorded as `null`. Suppressed when no key changed or when the
/// only changed key is the automatic `updated_at_column`.
pub fn updated<K: AsRef<str>>(
    prior_state: &Attributes,
    current_state: &Attributes,
    changed_keys: &[K],
    updated_at_column: Option<&str>,
) -> Extraction {
    let mut keys: Vec<&str> = changed_keys.iter().map(AsRef::as_ref).collect();
    keys.sort_unstable();
    keys.dedup();

    if keys.is_empty() {
        return Extraction::Suppress;
    }
    if let (Some(timestamp), [only]) = (updated_at_column, keys.as_slice()) {
        if *only == timestamp {
            return Extraction::Suppress;
        }
    }

    let pick = |state: &Attributes| -> Attributes {
        keys.iter()
            .map(|key| (key.to_string(), state.get(*key).cloned().unwrap_or(Value::Null)))
            .collect()
    };

    Extraction::Record(ChangeSet {
        old_values: pick(prior_state),
        new_values: pick(current_state),
    })
}

/// Keys whose values differ between two states, missing counted as `null`.
pub fn changed_keys(before: &Attributes, after: &Attributes) -> Vec<String> {
    before
        .keys()
        .chain(after.keys())
        .filter(|key| {
            before.get(*key).unwrap_or(&Value::Null) != after.get(*key).unwrap_or(&Value::Null)
        })
        .cloned()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect()
}

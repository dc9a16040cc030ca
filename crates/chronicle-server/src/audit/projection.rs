//! Field projection: strips redacted attributes before anything is persisted.

use std::collections::BTreeSet;

use chronicle_common::Attributes;

/// Effective redaction set of a subject type.
///
/// Always the union of the global list and the type's own list, so a type
/// can add hidden fields but never reveal a globally hidden one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionSet {
    keys: BTreeSet<String>,
}

impl RedactionSet {
    pub fn new<G, L>(global: G, local: L) -> Self
    where
        G: IntoIterator,
        G::Item: AsRef<str>,
        L: IntoIterator,
        L::Item: AsRef<str>,
    {
        let keys = global
            .into_iter()
            .map(|k| k.as_ref().to_string())
            .chain(local.into_iter().map(|k| k.as_ref().to_string()))
            .collect();
        Self { keys }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Visible subset of `attributes`.
pub fn project(attributes: &Attributes, redaction: &RedactionSet) -> Attributes {
    attributes
        .iter()
        .filter(|(key, _)| !redaction.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_project_removes_global_and_local_keys() {
        let redaction = RedactionSet::new(["password"], ["api_token"]);
        let visible = project(
            &attrs(&[
                ("name", json!("Ada")),
                ("password", json!("hunter2")),
                ("api_token", json!("t0k3n")),
            ]),
            &redaction,
        );

        assert_eq!(visible, attrs(&[("name", json!("Ada"))]));
    }

    #[test]
    fn test_local_list_cannot_unredact_global_key() {
        let redaction = RedactionSet::new(["secret"], Vec::<String>::new());
        assert!(redaction.contains("secret"));
        assert_eq!(RedactionSet::new(["secret"], ["secret"]).len(), 1);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let redaction = RedactionSet::new(["password"], ["x"]);
        assert!(project(&Attributes::new(), &redaction).is_empty());
    }

    proptest! {
        #[test]
        fn prop_projection_never_contains_redacted_keys(
            keys in proptest::collection::vec("[a-z]{1,6}", 0..12),
            hidden in proptest::collection::vec("[a-z]{1,6}", 0..6),
        ) {
            let input: Attributes = keys.iter().map(|k| (k.clone(), json!(k.len()))).collect();
            let redaction = RedactionSet::new(&hidden, Vec::<String>::new());
            let visible = project(&input, &redaction);

            for key in visible.keys() {
                prop_assert!(!redaction.contains(key));
                prop_assert!(input.contains_key(key));
            }
            for key in input.keys() {
                prop_assert_eq!(visible.contains_key(key), !redaction.contains(key));
            }
        }
    }
}

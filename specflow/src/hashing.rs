//! Content-addressable cache hashes for pipeline specs.
//!
//! A cache hash covers the normalized body, the provenance and the cache
//! hashes of every dependency, so a change anywhere upstream changes the
//! hash of every pipeline downstream of it.

use crate::core::{PipelineId, PipelineSpec, SourceDetails};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Bumped whenever the hashed layout changes, invalidating all prior hashes.
pub const HASH_FORMAT_VERSION: u32 = 1;

/// Result of one hash attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutcome {
    /// The hash is known.
    Resolved(String),
    /// A dependency has no memoized hash yet.
    Deferred {
        /// The first dependency found without a hash.
        missing: PipelineId,
    },
}

impl HashOutcome {
    /// Returns the hash, if resolved.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::Resolved(hash) => Some(hash),
            Self::Deferred { .. } => None,
        }
    }
}

#[derive(Serialize)]
struct HashInput<'a> {
    version: u32,
    body: &'a serde_json::Value,
    source_details: &'a SourceDetails,
    dependencies: &'a BTreeMap<&'a str, &'a str>,
}

/// Computes cache hashes and memoizes them per pipeline id.
///
/// One calculator belongs to one resolution run; it is never seeded from a
/// previous run.
#[derive(Debug, Default)]
pub struct HashCalculator {
    memo: HashMap<PipelineId, String>,
}

impl HashCalculator {
    /// Creates a calculator with an empty memo table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized hash of `pipeline_id`.
    #[must_use]
    pub fn get(&self, pipeline_id: &str) -> Option<&str> {
        self.memo.get(pipeline_id).map(String::as_str)
    }

    /// Returns the number of memoized hashes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    /// Returns true if nothing has been memoized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Computes the cache hash of `spec`.
    ///
    /// A memoized hash is returned unchanged. If any dependency has no
    /// memoized hash the attempt is deferred and nothing is recorded, so it
    /// can be retried from scratch later.
    pub fn calculate_hash(&mut self, spec: &PipelineSpec) -> HashOutcome {
        if let Some(hash) = self.memo.get(&spec.pipeline_id) {
            return HashOutcome::Resolved(hash.clone());
        }

        let mut dependencies = BTreeMap::new();
        for dep in &spec.dependencies {
            match self.memo.get(dep) {
                Some(hash) => {
                    dependencies.insert(dep.as_str(), hash.as_str());
                }
                None => {
                    return HashOutcome::Deferred {
                        missing: dep.clone(),
                    };
                }
            }
        }

        let hash = content_hash(
            spec.body.as_ref().unwrap_or(&serde_json::Value::Null),
            &spec.source_details,
            &dependencies,
        );
        self.memo.insert(spec.pipeline_id.clone(), hash.clone());
        HashOutcome::Resolved(hash)
    }
}

/// Hashes a body, its provenance and its dependency hashes.
///
/// Object keys serialize in sorted order, so equal inputs always produce
/// byte-identical hashes.
#[must_use]
pub fn content_hash(
    body: &serde_json::Value,
    source_details: &SourceDetails,
    dependencies: &BTreeMap<&str, &str>,
) -> String {
    let input = HashInput {
        version: HASH_FORMAT_VERSION,
        body,
        source_details,
        dependencies,
    };
    let json = serde_json::to_vec(&input).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(id: &str, body: serde_json::Value, deps: &[&str]) -> PipelineSpec {
        PipelineSpec::new(
            id,
            id,
            format!("/work/{id}"),
            SourceDetails::new("json", id),
            body,
        )
        .with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_hash_is_deterministic_across_calculators() {
        let a = spec("a", json!({"steps": [{"name": "x"}], "env": {"B": "2", "A": "1"}}), &[]);

        let first = HashCalculator::new().calculate_hash(&a);
        let second = HashCalculator::new().calculate_hash(&a);

        assert_eq!(first, second);
        assert_eq!(first.hash().map(str::len), Some(64));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = spec("a", json!({"steps": [], "env": {"A": "1", "B": "2"}}), &[]);
        let b = spec("a", serde_json::from_str(r#"{"env": {"B": "2", "A": "1"}, "steps": []}"#).unwrap(), &[]);

        assert_eq!(
            HashCalculator::new().calculate_hash(&a),
            HashCalculator::new().calculate_hash(&b)
        );
    }

    #[test]
    fn test_memoized_hash_returned_unchanged() {
        let mut calc = HashCalculator::new();
        let original = spec("a", json!({"steps": [1]}), &[]);
        let first = calc.calculate_hash(&original);

        let edited = spec("a", json!({"steps": [2]}), &[]);
        assert_eq!(calc.calculate_hash(&edited), first);
        assert_eq!(calc.len(), 1);
    }

    #[test]
    fn test_missing_dependency_defers_without_memoizing() {
        let mut calc = HashCalculator::new();
        let a = spec("a", json!({}), &["b"]);

        assert_eq!(
            calc.calculate_hash(&a),
            HashOutcome::Deferred {
                missing: "b".to_string()
            }
        );
        assert!(calc.is_empty());
        assert!(calc.get("a").is_none());
    }

    #[test]
    fn test_dependency_hash_feeds_dependent() {
        let a = spec("a", json!({"steps": []}), &["b"]);

        let mut calc1 = HashCalculator::new();
        calc1.calculate_hash(&spec("b", json!({"v": 1}), &[]));
        let h1 = calc1.calculate_hash(&a);

        let mut calc2 = HashCalculator::new();
        calc2.calculate_hash(&spec("b", json!({"v": 2}), &[]));
        let h2 = calc2.calculate_hash(&a);

        assert!(h1.hash().is_some());
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_self_dependency_defers() {
        let mut calc = HashCalculator::new();
        let a = spec("a", json!({}), &["a"]);
        assert!(matches!(calc.calculate_hash(&a), HashOutcome::Deferred { missing } if missing == "a"));
    }

    #[test]
    fn test_source_details_affect_hash() {
        let body = json!({"steps": []});
        let deps = BTreeMap::new();
        let h1 = content_hash(&body, &SourceDetails::new("json", "a.pipeline.json"), &deps);
        let h2 = content_hash(&body, &SourceDetails::new("json", "b.pipeline.json"), &deps);
        assert_ne!(h1, h2);
    }
}

//! Cache key construction
//!
//! By default the cache holds one slot per reference: a later request for the
//! same reference at other dimensions or in another format receives whichever
//! variant was resolved first. [`CacheKeyPolicy::ReferenceAndConstraints`]
//! gives every constraint combination its own slot instead.
//!
//! Constraint keys always end in the full `?w=..&h=..&q=..&fmt=..` suffix,
//! with `_` for an unset field. The suffix contains no `?`, so the last `?`
//! in a key always separates the reference from the constraints, even when
//! the reference has a query string of its own.

use crate::cache::types::CacheKey;
use crate::pipeline::RequestConstraints;
use serde::{Deserialize, Serialize};

/// How cache keys are derived from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheKeyPolicy {
    /// One slot per reference; constraints are ignored
    #[default]
    Reference,

    /// One slot per reference and constraint combination
    ReferenceAndConstraints,
}

impl CacheKeyPolicy {
    /// Build the cache key for a request
    pub fn key_for(&self, reference: &str, constraints: &RequestConstraints) -> CacheKey {
        match self {
            CacheKeyPolicy::Reference => reference.to_string(),
            CacheKeyPolicy::ReferenceAndConstraints => CacheKeyBuilder::new(reference)
                .param("w", field(constraints.width))
                .param("h", field(constraints.height))
                .param("q", field(constraints.quality))
                .param("fmt", field(constraints.format))
                .build(),
        }
    }
}

/// Marker for a constraint the request leaves open
const UNSET: &str = "_";

fn field<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| UNSET.to_string(), |v| v.to_string())
}

/// Builds keys of the form `reference?k1=v1&k2=v2`
pub struct CacheKeyBuilder {
    reference: String,
    params: Vec<(String, String)>,
}

impl CacheKeyBuilder {
    /// Start a key for `reference`
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to the key
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Build the cache key
    pub fn build(self) -> CacheKey {
        let mut key = self.reference;

        if !self.params.is_empty() {
            let params_str: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            key.push('?');
            key.push_str(&params_str.join("&"));
        }

        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ResolvedFormat;

    #[test]
    fn test_reference_policy_ignores_constraints() {
        let small = RequestConstraints::for_width(100);
        let large = RequestConstraints::for_width(1200).with_format(ResolvedFormat::Webp);

        let policy = CacheKeyPolicy::Reference;
        assert_eq!(policy.key_for("img/a.png", &small), "img/a.png");
        assert_eq!(
            policy.key_for("img/a.png", &small),
            policy.key_for("img/a.png", &large)
        );
    }

    #[test]
    fn test_constraint_policy_separates_variants() {
        let policy = CacheKeyPolicy::ReferenceAndConstraints;
        let constraints = RequestConstraints::for_width(640)
            .with_height(480)
            .with_quality(75)
            .with_format(ResolvedFormat::Avif);

        assert_eq!(
            policy.key_for("img/a.png", &constraints),
            "img/a.png?w=640&h=480&q=75&fmt=avif"
        );
        assert_ne!(
            policy.key_for("img/a.png", &RequestConstraints::for_width(640)),
            policy.key_for("img/a.png", &RequestConstraints::for_width(641))
        );
        assert_eq!(
            policy.key_for("img/a.png", &RequestConstraints::default()),
            "img/a.png?w=_&h=_&q=_&fmt=_"
        );
    }

    #[test]
    fn test_constraint_policy_with_query_in_reference() {
        let policy = CacheKeyPolicy::ReferenceAndConstraints;

        let sized = policy.key_for("img/a.png", &RequestConstraints::for_width(100));
        let queried = policy.key_for("img/a.png?w=100", &RequestConstraints::default());
        assert_ne!(sized, queried);

        let full = "img/a.png?w=100&h=_&q=_&fmt=_";
        assert_ne!(policy.key_for(full, &RequestConstraints::default()), sized);
    }

    #[test]
    fn test_cache_key_builder() {
        let key = CacheKeyBuilder::new("hero.jpg").build();
        assert_eq!(key, "hero.jpg");

        let key = CacheKeyBuilder::new("hero.jpg").param("w", "10").build();
        assert_eq!(key, "hero.jpg?w=10");
    }
}

//! Opaque identifiers. The engine never manufactures an id on its own
//! initiative during a create operation; callers pass one in, either by
//! hand or via an [`IdGenerator`]. See `spec.md` §1 Non-goals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

opaque_id!(TemplateId, "Identifies a template (atomic or container).");
opaque_id!(
    RelationshipId,
    "Distinguishes independent occurrences of the same child inside the same container."
);

/// Assigns fresh ids when a caller doesn't want to hand-roll its own
/// scheme. The engine does not own identity (`spec.md` §1) — this is a
/// convenience default, not a requirement.
pub trait IdGenerator {
    fn next_template_id(&mut self) -> TemplateId;
    fn next_relationship_id(&mut self) -> RelationshipId;
}

/// Monotonic counter-based generator. Deterministic, which is handy in
/// tests; a host program fronting multiple processes will likely want
/// something UUID-shaped instead, which is exactly the point of the
/// trait.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    templates: AtomicU64,
    relationships: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_template_id(&mut self) -> TemplateId {
        let n = self.templates.fetch_add(1, Ordering::Relaxed);
        TemplateId::new(format!("tpl-{n}"))
    }
    fn next_relationship_id(&mut self) -> RelationshipId {
        let n = self.relationships.fetch_add(1, Ordering::Relaxed);
        RelationshipId::new(format!("rel-{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_unique_and_ordered() {
        let mut gen = SequentialIdGenerator::new();
        let a = gen.next_template_id();
        let b = gen.next_template_id();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "tpl-0");
        assert_eq!(b.as_str(), "tpl-1");
    }

    #[test]
    fn display_matches_inner_string() {
        let id = TemplateId::from("widget");
        assert_eq!(format!("{id}"), "widget");
    }
}

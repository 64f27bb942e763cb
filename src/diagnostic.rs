//! The closed tagged union of everything that can go wrong. `spec.md`
//! §7. No expected failure is ever raised as a Rust panic or an
//! `anyhow`-style opaque error: every entry point returns `Diagnostic`
//! values, either as a single aborting `Err` or collected into the
//! `Vec<Diagnostic>` that validation operations always return
//! successfully.

use crate::ids::{RelationshipId, TemplateId};
use crate::model::{Duration, TemplateKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    #[error("template {id} not found")]
    NotFound { id: TemplateId },

    #[error("template {id} already exists")]
    DuplicateId { id: TemplateId },

    #[error("invalid duration {value} ({context}): must be > 0")]
    InvalidDuration { value: i64, context: String },

    #[error(
        "{child_id} ({child_intent}, {child_duration}ms) is too small to sit inside \
         {parent_id} ({parent_intent}, {parent_duration}ms): minimum is {required_minimum}ms"
    )]
    RatioTooSmall {
        parent_id: TemplateId,
        parent_intent: String,
        parent_duration: Duration,
        child_id: TemplateId,
        child_intent: String,
        child_duration: Duration,
        required_minimum: Duration,
    },

    #[error(
        "{child_id} ({child_intent}, {child_duration}ms) is too large to sit inside \
         {parent_id} ({parent_intent}, {parent_duration}ms): maximum is below {required_maximum}ms"
    )]
    RatioTooLarge {
        parent_id: TemplateId,
        parent_intent: String,
        parent_duration: Duration,
        child_id: TemplateId,
        child_intent: String,
        child_duration: Duration,
        required_maximum: Duration,
    },

    #[error(
        "variable \"{name}\" mentions the measurable substance \"{substance}\" \
         but carries no unit token ({missing_unit_hint})"
    )]
    BadVariableName {
        name: String,
        substance: String,
        missing_unit_hint: String,
    },

    #[error("container {container_id} references missing template {referenced_id}")]
    MissingTemplate {
        referenced_id: TemplateId,
        container_id: TemplateId,
    },

    #[error(
        "{a_id} ({a_intent}) and {b_id} ({b_intent}) overlap on [{overlap_start}, {overlap_end})"
    )]
    Overlap {
        a_id: TemplateId,
        a_intent: String,
        b_id: TemplateId,
        b_intent: String,
        overlap_start: Duration,
        overlap_end: Duration,
    },

    #[error(
        "{atomic_id} ({atomic_intent}) needs {required} of \"{variable}\" at offset \
         {absolute_offset}ms but only {available} is available"
    )]
    UnsatisfiedConsume {
        atomic_id: TemplateId,
        atomic_intent: String,
        variable: String,
        required: f64,
        available: f64,
        absolute_offset: Duration,
    },

    #[error(
        "{producer_id} ({producer_intent}) leaves {produced} of \"{variable}\" produced \
         against {consumed} consumed, and is not the container's last atomic"
    )]
    UnsatisfiedProduce {
        producer_id: TemplateId,
        producer_intent: String,
        variable: String,
        produced: f64,
        consumed: f64,
    },

    #[error("container {container_id} has no segments")]
    EmptyContainer { container_id: TemplateId },

    #[error(
        "link integrity violation between parent {parent_id} and child {child_id} \
         (relationship {relationship_id}): {observed}"
    )]
    LinkIntegrity {
        parent_id: TemplateId,
        child_id: TemplateId,
        relationship_id: RelationshipId,
        observed: String,
    },

    #[error("{id} is a {observed:?} template, expected a {expected:?} template")]
    WrongKind {
        id: TemplateId,
        observed: TemplateKind,
        expected: TemplateKind,
    },

    /// `spec.md` §3 invariant 5 (offset bound). The table in §7 doesn't
    /// name this one explicitly; it's implied by invariant 5 and is
    /// needed wherever a segment's placement is checked.
    #[error(
        "segment {relationship_id} on {container_id} places {child_id} at offset \
         {offset}ms + {child_duration}ms, which exceeds the container's {container_duration}ms"
    )]
    OffsetOutOfBounds {
        container_id: TemplateId,
        child_id: TemplateId,
        relationship_id: RelationshipId,
        offset: Duration,
        child_duration: Duration,
        container_duration: Duration,
    },

    /// `spec.md` §4.6 `apply-layout`: "Fails if the packed length
    /// exceeds `container.duration`."
    #[error(
        "layout for container {container_id} needs {required}ms but the container is only \
         {available}ms long"
    )]
    LayoutOverflow {
        container_id: TemplateId,
        required: Duration,
        available: Duration,
    },

    /// `spec.md` §4.7 Failure semantics: "arithmetic overflow on
    /// offsets is fatal and must be impossible under the defined
    /// bounds". Guarded defensively rather than assumed away.
    #[error("arithmetic overflow computing {context}")]
    Overflow { context: String },

    /// Raised by the Flattener's defensive cycle detection (`spec.md`
    /// §9 Design Notes: "one `link-integrity` diagnostic and skip the
    /// recursion").
    #[error("container {container_id} transitively references itself through {via}")]
    Cycle {
        container_id: TemplateId,
        via: TemplateId,
    },

    /// `SPEC_FULL.md` §6.1.1 `delete-template`: deletion is refused
    /// rather than cascaded (`spec.md` §9 leaves the policy to the
    /// host; this crate picks refusal, see `DESIGN.md`).
    #[error("cannot delete {id}: {reason}")]
    DeleteRefused { id: TemplateId, reason: String },

    /// `spec.md` §6.3: a library document crossing the stable wire
    /// form boundary that doesn't parse as JSON, or doesn't match the
    /// shape `LibraryDocument` expects.
    #[error("malformed library document: {reason}")]
    MalformedDocument { reason: String },
}

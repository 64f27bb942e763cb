//! The duration ratio rule between a container and its direct
//! children, and its transitive propagation on update. `spec.md` §3
//! invariant 4, §4.3.

use crate::diagnostic::Diagnostic;
use crate::ids::TemplateId;
use crate::model::{ContainerTemplate, Duration, Template};
use crate::store::StoreSnapshot;
use std::collections::HashSet;

/// `parent.duration/10 <= child.duration < parent.duration`. Both
/// bounds use the parent's duration as given — this function doesn't
/// care whether that's the parent's current duration or a hypothetical
/// one; callers supply whichever they're validating.
pub fn check_segment(
    parent_id: &TemplateId,
    parent_intent: &str,
    parent_duration: Duration,
    child_id: &TemplateId,
    child_intent: &str,
    child_duration: Duration,
) -> Result<(), Diagnostic> {
    let minimum = parent_duration / 10;
    if child_duration < minimum {
        return Err(Diagnostic::RatioTooSmall {
            parent_id: parent_id.clone(),
            parent_intent: parent_intent.to_string(),
            parent_duration,
            child_id: child_id.clone(),
            child_intent: child_intent.to_string(),
            child_duration,
            required_minimum: minimum,
        });
    }
    if child_duration >= parent_duration {
        return Err(Diagnostic::RatioTooLarge {
            parent_id: parent_id.clone(),
            parent_intent: parent_intent.to_string(),
            parent_duration,
            child_id: child_id.clone(),
            child_intent: child_intent.to_string(),
            child_duration,
            required_maximum: parent_duration,
        });
    }
    Ok(())
}

/// Re-checks every direct child of `container` against a hypothetical
/// new duration. A container with no segments is vacuously valid.
pub fn check_container_after_duration_change(
    container: &ContainerTemplate,
    new_duration: Duration,
    snapshot: &StoreSnapshot,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for segment in &container.segments {
        let Some(child) = snapshot.get(&segment.template_id) else {
            continue; // missing-template is the Flattener's concern, not the ratio check's
        };
        if let Err(d) = check_segment(
            &container.common.id,
            &container.common.intent,
            new_duration,
            child.id(),
            &child.common().intent,
            child.duration(),
        ) {
            diagnostics.push(d);
        }
    }
    diagnostics
}

/// Re-checks every parent of `child` against a hypothetical new
/// duration for `child`, then walks upward, re-validating that each
/// ancestor still satisfies the ratio rule against *its* parent under
/// *their* current (unchanged) durations. The size change doesn't
/// cascade upward — only the obligation to re-verify does (`spec.md`
/// §4.3).
pub fn check_child_after_duration_change(
    child: &Template,
    new_duration: Duration,
    snapshot: &StoreSnapshot,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut visited = HashSet::new();
    for parent_ref in child.references() {
        let Some(parent) = snapshot.get(&parent_ref.parent_id) else {
            continue;
        };
        if let Err(d) = check_segment(
            parent.id(),
            &parent.common().intent,
            parent.duration(),
            child.id(),
            &child.common().intent,
            new_duration,
        ) {
            diagnostics.push(d);
        }
        validate_ancestors(&parent, snapshot, &mut visited, &mut diagnostics);
    }
    diagnostics
}

fn validate_ancestors(
    template: &Template,
    snapshot: &StoreSnapshot,
    visited: &mut HashSet<TemplateId>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if !visited.insert(template.id().clone()) {
        return;
    }
    for parent_ref in template.references() {
        let Some(parent) = snapshot.get(&parent_ref.parent_id) else {
            continue;
        };
        if let Err(d) = check_segment(
            parent.id(),
            &parent.common().intent,
            parent.duration(),
            template.id(),
            &template.common().intent,
            template.duration(),
        ) {
            diagnostics.push(d);
        }
        validate_ancestors(&parent, snapshot, visited, diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_minimum_is_accepted() {
        assert!(check_segment(
            &TemplateId::from("P"),
            "p",
            1000,
            &TemplateId::from("C"),
            "c",
            100
        )
        .is_ok());
    }

    #[test]
    fn just_below_minimum_is_rejected() {
        let err = check_segment(
            &TemplateId::from("P"),
            "p",
            1000,
            &TemplateId::from("C"),
            "c",
            99,
        );
        assert!(matches!(err, Err(Diagnostic::RatioTooSmall { .. })));
    }

    #[test]
    fn just_below_parent_duration_is_accepted() {
        assert!(check_segment(
            &TemplateId::from("P"),
            "p",
            1000,
            &TemplateId::from("C"),
            "c",
            999
        )
        .is_ok());
    }

    #[test]
    fn equal_to_parent_duration_is_rejected() {
        let err = check_segment(
            &TemplateId::from("P"),
            "p",
            1000,
            &TemplateId::from("C"),
            "c",
            1000,
        );
        assert!(matches!(err, Err(Diagnostic::RatioTooLarge { .. })));
    }
}

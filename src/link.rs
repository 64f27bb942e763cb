//! Keeps a container's `segments` in lockstep with its children's
//! `references`. `spec.md` §4.2.

use crate::diagnostic::Diagnostic;
use crate::ids::RelationshipId;
use crate::model::{ContainerTemplate, Duration, ParentRef, Segment, Template};

/// Appends a segment to `parent` and the matching back-reference to
/// `child`. A repeated call naming the same relationship id for the
/// same child is a no-op (idempotent, `spec.md` §4.2); a relationship
/// id that collides with a *different* child on the same parent is
/// rejected.
pub fn add_segment(
    parent: &mut ContainerTemplate,
    child: &mut Template,
    relationship_id: RelationshipId,
    offset: Duration,
) -> Result<(), Diagnostic> {
    let child_id = child.id().clone();
    if let Some(existing) = parent
        .segments
        .iter()
        .find(|s| s.relationship_id == relationship_id)
    {
        return if existing.template_id == child_id {
            Ok(())
        } else {
            Err(Diagnostic::LinkIntegrity {
                parent_id: parent.common.id.clone(),
                child_id,
                relationship_id,
                observed: "relationship id already in use on this parent by another child"
                    .to_string(),
            })
        };
    }

    let parent_id = parent.common.id.clone();

    parent.segments.push(Segment {
        template_id: child_id.clone(),
        relationship_id: relationship_id.clone(),
        offset,
    });

    let already_linked = child.references().iter().any(|r| {
        r.parent_id == parent_id && r.relationship_id == relationship_id
    });
    if !already_linked {
        child.references_mut().push(ParentRef {
            parent_id,
            relationship_id,
        });
    }
    Ok(())
}

/// Removes both the segment identified by `relationship_id` and the
/// corresponding back-reference on `child`. A missing back-reference
/// is reported rather than silently ignored.
pub fn remove_segment(
    parent: &mut ContainerTemplate,
    child: &mut Template,
    relationship_id: RelationshipId,
) -> Result<(), Diagnostic> {
    let parent_id = parent.common.id.clone();
    let before = parent.segments.len();
    parent
        .segments
        .retain(|s| s.relationship_id != relationship_id);
    if parent.segments.len() == before {
        return Err(Diagnostic::LinkIntegrity {
            parent_id,
            child_id: child.id().clone(),
            relationship_id,
            observed: "no such segment on parent".to_string(),
        });
    }

    let refs = child.references_mut();
    let before = refs.len();
    refs.retain(|r| !(r.parent_id == parent_id && r.relationship_id == relationship_id));
    if refs.len() == before {
        return Err(Diagnostic::LinkIntegrity {
            parent_id,
            child_id: child.id().clone(),
            relationship_id,
            observed: "back-reference missing on child".to_string(),
        });
    }
    Ok(())
}

/// Verifies that every segment on `parent` has a matching back-reference
/// on its resolved child, and vice versa. Used by `validate-container`
/// as a structural sanity pass independent of the ledger/ratio checks.
pub fn check_bidirectional(parent: &ContainerTemplate, child: &Template) -> Vec<Diagnostic> {
    let parent_id = &parent.common.id;
    let mut diagnostics = Vec::new();
    for segment in parent
        .segments
        .iter()
        .filter(|s| &s.template_id == child.id())
    {
        let matched = child.references().iter().any(|r| {
            &r.parent_id == parent_id && r.relationship_id == segment.relationship_id
        });
        if !matched {
            diagnostics.push(Diagnostic::LinkIntegrity {
                parent_id: parent_id.clone(),
                child_id: child.id().clone(),
                relationship_id: segment.relationship_id.clone(),
                observed: "child missing back-reference for this segment".to_string(),
            });
        }
    }
    diagnostics
}

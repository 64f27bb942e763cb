//! Walks a container tree into a chronologically sorted list of atomic
//! items at absolute offsets. `spec.md` §4.4.
//!
//! Uses an explicit work-queue of `(templateId, parentOffset)` pairs
//! with a per-branch visited set rather than a recursive closure, so a
//! malformed store with an accidental cycle still terminates (`spec.md`
//! §9 Design Notes).

use crate::diagnostic::Diagnostic;
use crate::ids::TemplateId;
use crate::model::{AtomicTemplate, Duration, Template};
use crate::store::StoreSnapshot;

#[derive(Debug, Clone)]
pub struct FlattenedAtomic {
    pub atomic: AtomicTemplate,
    pub absolute_offset: Duration,
}

#[derive(Debug, Default)]
pub struct FlattenOutcome {
    pub items: Vec<FlattenedAtomic>,
    pub first_atomic: Option<TemplateId>,
    pub last_atomic: Option<TemplateId>,
    pub diagnostics: Vec<Diagnostic>,
}

struct Frame {
    id: TemplateId,
    offset: Duration,
    referencing_container: TemplateId,
    path: Vec<TemplateId>,
}

pub fn flatten(container_id: &TemplateId, snapshot: &StoreSnapshot) -> FlattenOutcome {
    let mut outcome = FlattenOutcome::default();

    let Some(root) = snapshot.get(container_id) else {
        outcome.diagnostics.push(Diagnostic::NotFound {
            id: container_id.clone(),
        });
        return outcome;
    };
    let Template::Container(root_container) = root else {
        outcome.diagnostics.push(Diagnostic::WrongKind {
            id: container_id.clone(),
            observed: root.kind(),
            expected: crate::model::TemplateKind::Container,
        });
        return outcome;
    };

    let mut stack: Vec<Frame> = root_container
        .segments
        .iter()
        .rev()
        .map(|segment| Frame {
            id: segment.template_id.clone(),
            offset: segment.offset,
            referencing_container: container_id.clone(),
            path: vec![container_id.clone()],
        })
        .collect();

    let mut discovery = 0usize;
    let mut tagged: Vec<(usize, FlattenedAtomic)> = Vec::new();

    while let Some(frame) = stack.pop() {
        if frame.path.contains(&frame.id) {
            outcome.diagnostics.push(Diagnostic::Cycle {
                container_id: container_id.clone(),
                via: frame.id.clone(),
            });
            continue;
        }

        let Some(template) = snapshot.get(&frame.id) else {
            outcome.diagnostics.push(Diagnostic::MissingTemplate {
                referenced_id: frame.id.clone(),
                container_id: frame.referencing_container.clone(),
            });
            continue;
        };

        match template {
            Template::Atomic(atomic) => {
                tagged.push((
                    discovery,
                    FlattenedAtomic {
                        atomic: atomic.clone(),
                        absolute_offset: frame.offset,
                    },
                ));
                discovery += 1;
            }
            Template::Container(container) => {
                let mut path = frame.path.clone();
                path.push(frame.id.clone());
                for segment in container.segments.iter().rev() {
                    stack.push(Frame {
                        id: segment.template_id.clone(),
                        offset: frame.offset + segment.offset,
                        referencing_container: frame.id.clone(),
                        path: path.clone(),
                    });
                }
            }
        }
    }

    tagged.sort_by(|(ia, a), (ib, b)| a.absolute_offset.cmp(&b.absolute_offset).then(ia.cmp(ib)));
    outcome.items = tagged.into_iter().map(|(_, item)| item).collect();

    if let Some(first) = outcome.items.first() {
        outcome.first_atomic = Some(first.atomic.common.id.clone());
    }
    let mut best_end: Option<Duration> = None;
    for item in &outcome.items {
        let end = item.absolute_offset + item.atomic.common.estimated_duration;
        if best_end.map(|b| end > b).unwrap_or(true) {
            best_end = Some(end);
            outcome.last_atomic = Some(item.atomic.common.id.clone());
        }
    }

    log::debug!(
        "flattened {} into {} atomics ({} diagnostics)",
        container_id,
        outcome.items.len(),
        outcome.diagnostics.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RelationshipId;
    use crate::model::{ContainerTemplate, Segment, TemplateCommon};
    use crate::store::Store;

    fn atomic(id: &str, duration: Duration) -> Template {
        Template::Atomic(AtomicTemplate {
            common: TemplateCommon {
                id: TemplateId::from(id),
                intent: id.to_string(),
                author_id: None,
                version: 1,
                estimated_duration: duration,
                references: Vec::new(),
            },
            will_consume: Default::default(),
            will_produce: Default::default(),
        })
    }

    fn container(id: &str, duration: Duration, segments: Vec<Segment>) -> Template {
        Template::Container(ContainerTemplate {
            common: TemplateCommon {
                id: TemplateId::from(id),
                intent: id.to_string(),
                author_id: None,
                version: 1,
                estimated_duration: duration,
                references: Vec::new(),
            },
            segments,
        })
    }

    fn segment(id: &str, rel: &str, offset: Duration) -> Segment {
        Segment {
            template_id: TemplateId::from(id),
            relationship_id: RelationshipId::from(rel),
            offset,
        }
    }

    #[test]
    fn two_atom_container_sorts_by_offset() {
        let store = Store::new();
        store.insert(atomic("A", 400)).unwrap();
        store.insert(atomic("B", 400)).unwrap();
        store
            .insert(container(
                "C",
                1000,
                vec![segment("B", "r2", 400), segment("A", "r1", 0)],
            ))
            .unwrap();
        let snap = store.snapshot();
        let out = flatten(&TemplateId::from("C"), &snap);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.items.len(), 2);
        assert_eq!(out.items[0].atomic.common.id, TemplateId::from("A"));
        assert_eq!(out.items[1].atomic.common.id, TemplateId::from("B"));
        assert_eq!(out.first_atomic, Some(TemplateId::from("A")));
        assert_eq!(out.last_atomic, Some(TemplateId::from("B")));
    }

    #[test]
    fn missing_segment_target_is_reported_and_walk_continues() {
        let store = Store::new();
        store.insert(atomic("A", 400)).unwrap();
        store
            .insert(container(
                "C",
                1000,
                vec![segment("A", "r1", 0), segment("ghost", "r2", 400)],
            ))
            .unwrap();
        let snap = store.snapshot();
        let out = flatten(&TemplateId::from("C"), &snap);
        assert_eq!(out.items.len(), 1);
        assert!(matches!(
            out.diagnostics[0],
            Diagnostic::MissingTemplate { .. }
        ));
    }

    #[test]
    fn self_referencing_container_is_detected_and_skipped() {
        let store = Store::new();
        store
            .insert(container("C", 1000, vec![segment("C", "r1", 0)]))
            .unwrap();
        let snap = store.snapshot();
        let out = flatten(&TemplateId::from("C"), &snap);
        assert!(out.items.is_empty());
        assert!(matches!(out.diagnostics[0], Diagnostic::Cycle { .. }));
    }

    #[test]
    fn nested_containers_accumulate_offset() {
        let store = Store::new();
        store.insert(atomic("A", 100)).unwrap();
        store
            .insert(container("Inner", 200, vec![segment("A", "r1", 50)]))
            .unwrap();
        store
            .insert(container("Outer", 1000, vec![segment("Inner", "r2", 300)]))
            .unwrap();
        let snap = store.snapshot();
        let out = flatten(&TemplateId::from("Outer"), &snap);
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].absolute_offset, 350);
    }
}

//! The closed set of container-mutating operations. `spec.md` §4.6.
//! Every operation here works on a `ContainerTemplate` already cloned
//! into a working copy; none of them touch the `Store` directly — the
//! Facade is responsible for resolving child durations, calling these
//! functions, re-checking `RatioInvariant`/`LinkIntegrity`, and only
//! then committing.
//!
//! All operations preserve segment identities (`relationshipId` and
//! `templateId`) and, except where noted, the ordering of the segment
//! list — only offsets (and, for `fit_to_last`, the container
//! duration) change.

use crate::diagnostic::Diagnostic;
use crate::ids::RelationshipId;
use crate::model::{ContainerTemplate, Duration, Segment, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

/// Looks up each segment's child duration, in segment order. Small
/// enough at this library's scale to just build a parallel `Vec`
/// rather than thread a lookup closure through every operation.
pub fn child_durations(
    container: &ContainerTemplate,
    resolve: impl Fn(&crate::ids::TemplateId) -> Option<Duration>,
) -> Result<Vec<Duration>, Diagnostic> {
    container
        .segments
        .iter()
        .map(|segment| {
            resolve(&segment.template_id).ok_or_else(|| Diagnostic::MissingTemplate {
                referenced_id: segment.template_id.clone(),
                container_id: container.common.id.clone(),
            })
        })
        .collect()
}

pub fn apply_layout(
    container: &mut ContainerTemplate,
    distribution: Distribution,
    gap: Duration,
    durations: &[Duration],
) -> Result<(), Diagnostic> {
    let n = container.segments.len();
    if n == 0 {
        return Ok(()); // vacuously laid out
    }
    let container_duration = container.common.estimated_duration;

    match distribution {
        Distribution::Start | Distribution::End | Distribution::Center => {
            let span: Duration = durations.iter().sum::<Duration>() + gap * (n as Duration - 1);
            if span > container_duration {
                return Err(Diagnostic::LayoutOverflow {
                    container_id: container.common.id.clone(),
                    required: span,
                    available: container_duration,
                });
            }
            let start = match distribution {
                Distribution::Start => 0,
                Distribution::End => container_duration - span,
                Distribution::Center => (container_duration - span) / 2,
                _ => unreachable!(),
            };
            let mut cursor = start;
            for (segment, duration) in container.segments.iter_mut().zip(durations) {
                segment.offset = cursor;
                cursor += duration + gap;
            }
        }
        Distribution::SpaceBetween => {
            let total_children: Duration = durations.iter().sum();
            if total_children > container_duration {
                return Err(Diagnostic::LayoutOverflow {
                    container_id: container.common.id.clone(),
                    required: total_children,
                    available: container_duration,
                });
            }
            if n == 1 {
                container.segments[0].offset = 0;
            } else {
                let total_gap = container_duration - total_children;
                let slots = (n - 1) as Duration;
                let base_gap = total_gap / slots;
                let remainder = total_gap % slots;
                let mut cursor = 0;
                for (i, (segment, duration)) in
                    container.segments.iter_mut().zip(durations).enumerate()
                {
                    segment.offset = cursor;
                    cursor += duration;
                    if (i as Duration) < slots {
                        // distribute the integer-division remainder across the
                        // first gaps so the last segment still ends exactly at
                        // container_duration
                        let this_gap = base_gap + if (i as Duration) < remainder { 1 } else { 0 };
                        cursor += this_gap;
                    }
                }
            }
        }
        Distribution::SpaceAround => {
            let total_children: Duration = durations.iter().sum();
            if total_children > container_duration {
                return Err(Diagnostic::LayoutOverflow {
                    container_id: container.common.id.clone(),
                    required: total_children,
                    available: container_duration,
                });
            }
            let total_gap = container_duration - total_children;
            let interior_gap = total_gap / n as Duration;
            let edge_gap = interior_gap / 2;
            let mut cursor = edge_gap;
            for (i, (segment, duration)) in
                container.segments.iter_mut().zip(durations).enumerate()
            {
                segment.offset = cursor;
                cursor += duration;
                if i + 1 < n {
                    cursor += interior_gap;
                }
            }
        }
        Distribution::SpaceEvenly => {
            let total_children: Duration = durations.iter().sum();
            if total_children > container_duration {
                return Err(Diagnostic::LayoutOverflow {
                    container_id: container.common.id.clone(),
                    required: total_children,
                    available: container_duration,
                });
            }
            let total_gap = container_duration - total_children;
            let slots = n as Duration + 1;
            let gap_each = total_gap / slots;
            let mut cursor = gap_each;
            for (segment, duration) in container.segments.iter_mut().zip(durations) {
                segment.offset = cursor;
                cursor += duration + gap_each;
            }
        }
    }
    Ok(())
}

pub fn pack(container: &mut ContainerTemplate, durations: &[Duration]) -> Result<(), Diagnostic> {
    apply_layout(container, Distribution::Start, 0, durations)
}

pub fn equally_distribute(
    container: &mut ContainerTemplate,
    durations: &[Duration],
) -> Result<(), Diagnostic> {
    apply_layout(container, Distribution::SpaceBetween, 0, durations)
}

/// `0, d1+interval, d1+interval+d2+interval, ...` — does not resize
/// the container.
pub fn distribute_by_interval(
    container: &mut ContainerTemplate,
    interval: Duration,
    durations: &[Duration],
) -> Result<(), Diagnostic> {
    let mut cursor = 0;
    for (segment, duration) in container.segments.iter_mut().zip(durations) {
        segment.offset = cursor;
        cursor += duration + interval;
    }
    Ok(())
}

/// Sets `container.duration := offset(last) + duration(last)`, where
/// "last" is the segment with the greatest ending time (ties broken by
/// segment-list order). Caller must re-check `RatioInvariant` on every
/// direct child and every parent of `container` (`spec.md` §4.6).
pub fn fit_to_last(container: &mut ContainerTemplate, durations: &[Duration]) -> Duration {
    let mut best_end = 0;
    for (segment, duration) in container.segments.iter().zip(durations) {
        let end = segment.offset + duration;
        if end > best_end {
            best_end = end;
        }
    }
    container.common.estimated_duration = best_end;
    best_end
}

/// Shifts the segment at `before_index` and every later segment (in
/// segment-list order) by `+gap_duration`. Does not resize.
pub fn insert_gap(
    container: &mut ContainerTemplate,
    before_index: usize,
    gap_duration: Duration,
) -> Result<(), Diagnostic> {
    if before_index > container.segments.len() {
        return Err(Diagnostic::Overflow {
            context: format!(
                "insert_gap index {before_index} out of range for {} segments",
                container.segments.len()
            ),
        });
    }
    for segment in container.segments.iter_mut().skip(before_index) {
        segment.offset += gap_duration;
    }
    Ok(())
}

/// Appends a segment at `max(offset + duration)` over `existing_durations`
/// (0 if the container is empty), adding the back-reference via
/// `crate::link::add_segment`. `existing_durations` must be the
/// resolved duration of each of `container.segments`, in order — the
/// Facade already has these from `child_durations`. Ratio-checking the
/// inserted child against `container` is the Facade's job.
pub fn add_to_end(
    container: &mut ContainerTemplate,
    existing_durations: &[Duration],
    child: &mut Template,
    relationship_id: RelationshipId,
) -> Result<(), Diagnostic> {
    let offset = container
        .segments
        .iter()
        .zip(existing_durations)
        .map(|(segment, duration)| segment.offset + duration)
        .max()
        .unwrap_or(0);
    crate::link::add_segment(container, child, relationship_id, offset)?;
    Ok(())
}

/// Inserts at offset 0 and shifts every existing segment by
/// `+child.duration`.
pub fn push_to_start(
    container: &mut ContainerTemplate,
    child: &mut Template,
    relationship_id: RelationshipId,
    child_duration: Duration,
) -> Result<(), Diagnostic> {
    for segment in container.segments.iter_mut() {
        segment.offset += child_duration;
    }
    let child_id = child.id().clone();
    crate::link::add_segment(container, child, relationship_id, 0)?;
    // add_segment appends to the back of the list; push-to-start means
    // this child starts the schedule, so it belongs at the front of the
    // segment list too.
    if let Some(pos) = container
        .segments
        .iter()
        .position(|s| s.template_id == child_id && s.offset == 0)
    {
        let segment = container.segments.remove(pos);
        container.segments.insert(0, segment);
    }
    Ok(())
}

/// Inserts at `offset`; every segment that currently starts at or
/// after `offset` shifts by `+child.duration`, regardless of where it
/// sits in the segment list — `spec.md` §4.6 keys the shift on each
/// segment's own offset, not on list position, and the segment list
/// need not be offset-sorted (see `flatten.rs`'s own fixtures). The new
/// segment is placed in list order ahead of the first segment it
/// shifted.
pub fn insert_at(
    container: &mut ContainerTemplate,
    child: &mut Template,
    relationship_id: RelationshipId,
    offset: Duration,
    child_duration: Duration,
) -> Result<(), Diagnostic> {
    for segment in container.segments.iter_mut() {
        if segment.offset >= offset {
            segment.offset += child_duration;
        }
    }
    // Every segment that was shifted now sits at or beyond
    // `offset + child_duration`, strictly past `offset`; every segment
    // left alone is still strictly before it (child_duration > 0 for
    // any valid atomic or container). So the first shifted segment's
    // current list position is exactly where the new segment belongs.
    let insert_index = container
        .segments
        .iter()
        .position(|s| s.offset > offset)
        .unwrap_or(container.segments.len());
    let child_id = child.id().clone();
    crate::link::add_segment(container, child, relationship_id, offset)?;
    if let Some(pos) = container
        .segments
        .iter()
        .position(|s| s.template_id == child_id && s.offset == offset)
    {
        let segment = container.segments.remove(pos);
        container.segments.insert(insert_index.min(container.segments.len()), segment);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TemplateId;
    use crate::model::{Segment, TemplateCommon};

    fn container(duration: Duration, segments: Vec<Segment>) -> ContainerTemplate {
        ContainerTemplate {
            common: TemplateCommon {
                id: TemplateId::from("C"),
                intent: "c".into(),
                author_id: None,
                version: 1,
                estimated_duration: duration,
                references: Vec::new(),
            },
            segments,
        }
    }

    fn segment(id: &str, offset: Duration) -> Segment {
        Segment {
            template_id: TemplateId::from(id),
            relationship_id: RelationshipId::from(format!("r-{id}")),
            offset,
        }
    }

    #[test]
    fn pack_is_idempotent() {
        let mut c = container(1000, vec![segment("A", 500), segment("B", 0)]);
        let durations = vec![100, 100];
        pack(&mut c, &durations).unwrap();
        let after_first = c.segments.clone();
        pack(&mut c, &durations).unwrap();
        assert_eq!(c.segments, after_first);
    }

    #[test]
    fn pack_equals_apply_layout_start_zero() {
        let mut a = container(1000, vec![segment("A", 500), segment("B", 0)]);
        let mut b = a.clone();
        let durations = vec![100, 100];
        pack(&mut a, &durations).unwrap();
        apply_layout(&mut b, Distribution::Start, 0, &durations).unwrap();
        assert_eq!(a.segments, b.segments);
    }

    #[test]
    fn space_between_starts_at_zero_and_ends_at_duration() {
        let mut c = container(1000, vec![segment("A", 0), segment("B", 0), segment("C", 0)]);
        let durations = vec![100, 100, 100];
        apply_layout(&mut c, Distribution::SpaceBetween, 0, &durations).unwrap();
        assert_eq!(c.segments[0].offset, 0);
        let last = c.segments.last().unwrap();
        assert_eq!(last.offset + 100, 1000);
    }

    #[test]
    fn apply_layout_rejects_overflow() {
        let mut c = container(100, vec![segment("A", 0), segment("B", 0)]);
        let durations = vec![80, 80];
        let err = apply_layout(&mut c, Distribution::Start, 0, &durations);
        assert!(matches!(err, Err(Diagnostic::LayoutOverflow { .. })));
    }

    #[test]
    fn fit_to_last_is_idempotent() {
        let mut c = container(1000, vec![segment("A", 0), segment("B", 400)]);
        let durations = vec![400, 400];
        let first = fit_to_last(&mut c, &durations);
        let second = fit_to_last(&mut c, &durations);
        assert_eq!(first, second);
        assert_eq!(c.common.estimated_duration, 800);
    }

    #[test]
    fn insert_gap_shifts_only_later_segments() {
        let mut c = container(1000, vec![segment("A", 0), segment("B", 200)]);
        insert_gap(&mut c, 1, 50).unwrap();
        assert_eq!(c.segments[0].offset, 0);
        assert_eq!(c.segments[1].offset, 250);
    }

    #[test]
    fn distribute_by_interval_places_cumulative_offsets() {
        let mut c = container(1000, vec![segment("A", 0), segment("B", 0), segment("C", 0)]);
        let durations = vec![100, 100, 100];
        distribute_by_interval(&mut c, 50, &durations).unwrap();
        assert_eq!(c.segments[0].offset, 0);
        assert_eq!(c.segments[1].offset, 150);
        assert_eq!(c.segments[2].offset, 300);
    }

    #[test]
    fn insert_at_shifts_by_offset_not_by_list_position() {
        // "B" sits before "A" in the segment list even though it starts
        // later — the shift must key off each segment's own offset.
        let mut c = container(1000, vec![segment("B", 600), segment("A", 0)]);
        let mut x = Template::Atomic(crate::model::AtomicTemplate {
            common: TemplateCommon {
                id: TemplateId::from("X"),
                intent: "x".into(),
                author_id: None,
                version: 1,
                estimated_duration: 200,
                references: Vec::new(),
            },
            will_consume: Default::default(),
            will_produce: Default::default(),
        });
        insert_at(&mut c, &mut x, RelationshipId::from("rx"), 300, 200).unwrap();

        let a = c.segments.iter().find(|s| s.template_id == TemplateId::from("A")).unwrap();
        let b = c.segments.iter().find(|s| s.template_id == TemplateId::from("B")).unwrap();
        let x_seg = c.segments.iter().find(|s| s.template_id == TemplateId::from("X")).unwrap();

        // A starts before the insertion point and must stay put.
        assert_eq!(a.offset, 0);
        // B starts at or after the insertion point and must shift.
        assert_eq!(b.offset, 800);
        // The new segment lands exactly at the requested offset.
        assert_eq!(x_seg.offset, 300);
    }

    #[test]
    fn insert_at_places_new_segment_ahead_of_first_shifted_segment_in_list_order() {
        let mut c = container(1000, vec![segment("B", 600), segment("A", 0)]);
        let mut x = Template::Atomic(crate::model::AtomicTemplate {
            common: TemplateCommon {
                id: TemplateId::from("X"),
                intent: "x".into(),
                author_id: None,
                version: 1,
                estimated_duration: 200,
                references: Vec::new(),
            },
            will_consume: Default::default(),
            will_produce: Default::default(),
        });
        insert_at(&mut c, &mut x, RelationshipId::from("rx"), 300, 200).unwrap();

        // List order: B (shifted, was first) still precedes A; X is
        // spliced in ahead of B, the first segment it shifted.
        let ids: Vec<_> = c.segments.iter().map(|s| s.template_id.clone()).collect();
        assert_eq!(
            ids,
            vec![TemplateId::from("X"), TemplateId::from("B"), TemplateId::from("A")]
        );
    }
}

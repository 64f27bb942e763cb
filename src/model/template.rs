//! The template tagged variant, segments, and parent references.
//! `spec.md` §3.

use super::ledger::Ledger;
use crate::ids::{RelationshipId, TemplateId};
use serde::{Deserialize, Serialize};

/// Milliseconds, non-negative. Zero is reserved as invalid for atomic
/// templates (`spec.md` §3).
pub type Duration = u64;

/// A single placement of a child template inside a container. Wire
/// form per `spec.md` §6.3: `{templateId, relationshipId, offset}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub template_id: TemplateId,
    pub relationship_id: RelationshipId,
    pub offset: Duration,
}

/// Stored on each child: the back-reference to a parent that names it
/// in one of the parent's segments. Wire form: `{parentId,
/// relationshipId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    pub parent_id: TemplateId,
    pub relationship_id: RelationshipId,
}

/// Fields common to every template, regardless of variant. Flattened
/// into the enclosing template's JSON object so the wire form reads as
/// one flat map with a `templateType` discriminator, not a nested
/// `common` object (`spec.md` §6.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCommon {
    pub id: TemplateId,
    pub intent: String,
    pub author_id: Option<String>,
    pub version: u32,
    pub estimated_duration: Duration,
    pub references: Vec<ParentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicTemplate {
    #[serde(flatten)]
    pub common: TemplateCommon,
    pub will_consume: Ledger,
    pub will_produce: Ledger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerTemplate {
    #[serde(flatten)]
    pub common: TemplateCommon,
    pub segments: Vec<Segment>,
}

/// Two variants only, pattern-matched everywhere — no trait objects.
/// Adding a third variant is meant to be a compile-time obligation
/// (`spec.md` §9 Design Notes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "templateType", rename_all = "lowercase")]
pub enum Template {
    Atomic(AtomicTemplate),
    Container(ContainerTemplate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Atomic,
    Container,
}

impl Template {
    pub fn kind(&self) -> TemplateKind {
        match self {
            Template::Atomic(_) => TemplateKind::Atomic,
            Template::Container(_) => TemplateKind::Container,
        }
    }

    pub fn common(&self) -> &TemplateCommon {
        match self {
            Template::Atomic(a) => &a.common,
            Template::Container(c) => &c.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut TemplateCommon {
        match self {
            Template::Atomic(a) => &mut a.common,
            Template::Container(c) => &mut c.common,
        }
    }

    pub fn id(&self) -> &TemplateId {
        &self.common().id
    }

    pub fn duration(&self) -> Duration {
        self.common().estimated_duration
    }

    pub fn references(&self) -> &[ParentRef] {
        &self.common().references
    }

    pub fn references_mut(&mut self) -> &mut Vec<ParentRef> {
        &mut self.common_mut().references
    }

    pub fn as_atomic(&self) -> Option<&AtomicTemplate> {
        match self {
            Template::Atomic(a) => Some(a),
            Template::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&ContainerTemplate> {
        match self {
            Template::Container(c) => Some(c),
            Template::Atomic(_) => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut ContainerTemplate> {
        match self {
            Template::Container(c) => Some(c),
            Template::Atomic(_) => None,
        }
    }
}

/// A de-normalized summary of a template, for `list-templates` and
/// `search-intent` (`spec.md` §6.1) — callers asking for a catalogue
/// view shouldn't have to pull every container's full segment list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    pub id: TemplateId,
    pub kind: TemplateKind,
    pub intent: String,
    pub author_id: Option<String>,
    pub version: u32,
    pub estimated_duration: Duration,
}

impl From<&Template> for TemplateMetadata {
    fn from(template: &Template) -> Self {
        let common = template.common();
        TemplateMetadata {
            id: common.id.clone(),
            kind: template.kind(),
            intent: common.intent.clone(),
            author_id: common.author_id.clone(),
            version: common.version,
            estimated_duration: common.estimated_duration,
        }
    }
}

//! Facet, index and media-attachment builder
//!
//! [`FacetIndexBuilder::build`] consumes a list of catalog records once and
//! produces:
//! - an id-keyed content map (last write wins on duplicate ids),
//! - deduplicated facet value lists in first-observation order,
//! - optionally a parent/child relationship graph from co-occurring facet values,
//! - resolved media URLs attached to the output records.
//!
//! The builder takes ownership of the input records and returns new ones, so
//! callers never see their data mutated behind their back.
//!
//! # Algorithm
//! 1. One pass over the records: collect facets, record graph edges, pass
//!    plain media URLs through, queue internal references in an attach plan,
//!    and index the record under its identifier.
//! 2. One resolution phase: deduplicated references go through
//!    [`resolve_all`] with the configured concurrency.
//! 3. The attach plan writes every successfully resolved URL to its record.
//!    Failed references leave the destination field unset.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use shelf_common::record::{record_key, DEFAULT_ID_KEY};
use shelf_common::{Error, Record, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};

use super::media_resolver::{classify, resolve_all, MediaResolver, MediaValue, DEFAULT_CONCURRENCY};

/// Default name of the parent → children map in the facet view
pub const DEFAULT_REVERSE_NAME: &str = "parentsMap";

/// A scalar facet value, compared by exact equality
///
/// `"1"` and `1` are different values; strings are case-sensitive and not trimmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FacetValue {
    Text(String),
    Number(Number),
    Bool(bool),
}

// Numbers parsed from JSON are never NaN
impl Eq for FacetValue {}

impl Hash for FacetValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            FacetValue::Text(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            FacetValue::Number(n) => {
                1u8.hash(state);
                // Agrees with `Number`'s equality: 0.0 and -0.0 hash alike
                n.hash(state);
            }
            FacetValue::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
        }
    }
}

impl fmt::Display for FacetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetValue::Text(s) => f.write_str(s),
            FacetValue::Number(n) => write!(f, "{}", n),
            FacetValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FacetValue {
    fn from(s: &str) -> Self {
        FacetValue::Text(s.to_string())
    }
}

impl FacetValue {
    /// Facet value of a single JSON element; null, empty strings and
    /// non-scalars have none
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(FacetValue::Text(s.clone())),
            Value::Number(n) => Some(FacetValue::Number(n.clone())),
            Value::Bool(b) => Some(FacetValue::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FacetValue::Text(s) => Value::String(s.clone()),
            FacetValue::Number(n) => Value::Number(n.clone()),
            FacetValue::Bool(b) => Value::Bool(*b),
        }
    }
}

/// Normalize a facet field to a list of values
///
/// Scalars become a singleton, null/absent an empty list; unusable elements are
/// dropped.
pub fn normalize_facet(raw: Option<&Value>) -> Vec<FacetValue> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.iter().filter_map(FacetValue::from_json).collect(),
        Some(value) => FacetValue::from_json(value).into_iter().collect(),
    }
}

/// Parent/child facet pair for relationship-graph construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipConfig {
    /// Source field of parent values (e.g. `genre`)
    pub parent: String,
    /// Source field of child values (e.g. `subGenre`)
    pub child: String,
    /// Facet view key of the parent → children map
    pub reverse_name: String,
}

/// What to index, collect and resolve
#[derive(Debug, Clone)]
pub struct FacetConfig {
    /// Identifier field
    pub id_key: String,
    /// Media source field → destination field
    pub media: Vec<(String, String)>,
    /// Facet source field → facet output name
    pub facet_fields: Vec<(String, String)>,
    /// Maximum media resolutions in flight
    pub concurrency: usize,
    /// Per-resolution timeout
    pub media_timeout: Option<Duration>,
    pub relationship: Option<RelationshipConfig>,
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            id_key: DEFAULT_ID_KEY.to_string(),
            media: Vec::new(),
            facet_fields: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            media_timeout: None,
            relationship: None,
        }
    }
}

impl FacetConfig {
    pub fn with_id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    pub fn with_media(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.media.push((source.into(), destination.into()));
        self
    }

    pub fn with_facet(mut self, source: impl Into<String>, output: impl Into<String>) -> Self {
        self.facet_fields.push((source.into(), output.into()));
        self
    }

    pub fn with_relationship(
        mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
        reverse_name: impl Into<String>,
    ) -> Self {
        self.relationship = Some(RelationshipConfig {
            parent: parent.into(),
            child: child.into(),
            reverse_name: reverse_name.into(),
        });
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_media_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.media_timeout = timeout;
        self
    }

    /// Audiobook catalog: cover/sample/video media, genre hierarchy and tag facets
    pub fn audiobooks() -> Self {
        Self::default()
            .with_media("productImages", "productImagesUrl")
            .with_media("sampleAudio", "sampleAudioUrl")
            .with_media("video", "videoUrl")
            .with_facet("genre", "parents")
            .with_facet("subGenre", "children")
            .with_facet("discretion", "discretions")
            .with_facet("glimmers", "glimmers")
            .with_relationship("genre", "subGenre", DEFAULT_REVERSE_NAME)
    }

    /// Audiobook chapters: audio file only
    pub fn chapters() -> Self {
        Self::default().with_media("audioFile", "audioFileUrl")
    }

    /// Achievements: badge image only
    pub fn achievements() -> Self {
        Self::default().with_media("achievementImage", "achievementImageUrl")
    }

    fn facet_output(&self, source: &str) -> Option<&str> {
        self.facet_fields
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, out)| out.as_str())
    }

    /// Check the relationship pair refers to configured facet fields
    pub fn validate(&self) -> Result<()> {
        if self.id_key.is_empty() {
            return Err(Error::InvalidInput("id_key must not be empty".to_string()));
        }
        if let Some(rel) = &self.relationship {
            for field in [&rel.parent, &rel.child] {
                if self.facet_output(field).is_none() {
                    return Err(Error::InvalidInput(format!(
                        "relationship field '{}' is not a configured facet field",
                        field
                    )));
                }
            }
            if rel.reverse_name.is_empty() {
                return Err(Error::InvalidInput(
                    "relationship reverse_name must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Bidirectional co-occurrence graph between two facets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipGraph {
    parents_by_child: IndexMap<FacetValue, IndexSet<FacetValue>>,
    children_by_parent: IndexMap<FacetValue, IndexSet<FacetValue>>,
}

impl RelationshipGraph {
    /// Record every (parent, child) pair from one record
    ///
    /// Each child gets an entry even when the record has no parents.
    pub fn add_record(&mut self, parents: &[FacetValue], children: &[FacetValue]) {
        for child in children {
            let parent_set = self.parents_by_child.entry(child.clone()).or_default();
            for parent in parents {
                parent_set.insert(parent.clone());
                self.children_by_parent
                    .entry(parent.clone())
                    .or_default()
                    .insert(child.clone());
            }
        }
    }

    pub fn parents_of(&self, child: &FacetValue) -> Option<&IndexSet<FacetValue>> {
        self.parents_by_child.get(child)
    }

    pub fn children_of(&self, parent: &FacetValue) -> Option<&IndexSet<FacetValue>> {
        self.children_by_parent.get(parent)
    }

    pub fn parents_by_child(&self) -> &IndexMap<FacetValue, IndexSet<FacetValue>> {
        &self.parents_by_child
    }

    pub fn children_by_parent(&self) -> &IndexMap<FacetValue, IndexSet<FacetValue>> {
        &self.children_by_parent
    }
}

/// Render an adjacency map as a JSON object of value → list of related values
///
/// Values that render to the same key (`"1"` and `1`) share one list.
fn adjacency_json(adjacency: &IndexMap<FacetValue, IndexSet<FacetValue>>) -> Map<String, Value> {
    let mut merged: IndexMap<String, IndexSet<FacetValue>> = IndexMap::new();
    for (key, related) in adjacency {
        merged
            .entry(key.to_string())
            .or_default()
            .extend(related.iter().cloned());
    }

    merged
        .into_iter()
        .map(|(key, related)| {
            let list = related.iter().map(FacetValue::to_json).collect();
            (key, Value::Array(list))
        })
        .collect()
}

/// Relationship graph plus where it goes in the facet view
#[derive(Debug, Clone, PartialEq)]
pub struct Relationships {
    /// Facet output name replaced by the child → parents map
    pub child_facet: String,
    /// Facet view key of the parent → children map
    pub reverse_name: String,
    pub graph: RelationshipGraph,
}

/// Result of one build
#[derive(Debug, Clone, PartialEq)]
pub struct FacetIndex {
    /// Records keyed by identifier, with media fields attached
    pub contents: IndexMap<String, Record>,
    /// Facet output name → distinct values in first-observation order
    pub facets: IndexMap<String, Vec<FacetValue>>,
    pub relationships: Option<Relationships>,
}

impl FacetIndex {
    /// JSON view of the facets for clients
    ///
    /// Each facet output name maps to its value list. With a relationship, the
    /// child facet's entry becomes the child → parents map and the reverse name
    /// holds the parent → children map.
    pub fn facet_view(&self) -> Map<String, Value> {
        let mut view: Map<String, Value> = self
            .facets
            .iter()
            .map(|(name, values)| {
                let list = values.iter().map(FacetValue::to_json).collect();
                (name.clone(), Value::Array(list))
            })
            .collect();

        if let Some(rel) = &self.relationships {
            view.insert(
                rel.child_facet.clone(),
                Value::Object(adjacency_json(rel.graph.parents_by_child())),
            );
            view.insert(
                rel.reverse_name.clone(),
                Value::Object(adjacency_json(rel.graph.children_by_parent())),
            );
        }

        view
    }
}

/// Pending media attachment: staged record slot, destination field, reference
#[derive(Debug)]
struct AttachPlanEntry {
    slot: usize,
    field: String,
    reference: String,
}

/// Builds [`FacetIndex`]es for one configuration
#[derive(Debug, Clone)]
pub struct FacetIndexBuilder {
    config: FacetConfig,
}

impl FacetIndexBuilder {
    pub fn new(config: FacetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FacetConfig {
        &self.config
    }

    /// Index, facet and resolve media for `items`
    pub async fn build<I>(&self, items: I, resolver: &dyn MediaResolver) -> FacetIndex
    where
        I: IntoIterator<Item = Record>,
    {
        let config = &self.config;

        let mut staged: Vec<Record> = Vec::new();
        let mut slots: IndexMap<String, usize> = IndexMap::new();
        let mut plan: Vec<AttachPlanEntry> = Vec::new();
        let mut pending: IndexSet<String> = IndexSet::new();
        let mut sets: IndexMap<String, IndexSet<FacetValue>> = config
            .facet_fields
            .iter()
            .map(|(_, out)| (out.clone(), IndexSet::new()))
            .collect();
        let mut graph = config.relationship.as_ref().map(|_| RelationshipGraph::default());
        let mut unindexed = 0usize;

        for mut item in items {
            let slot = staged.len();

            for (source, output) in &config.facet_fields {
                let values = normalize_facet(item.get(source));
                if let Some(set) = sets.get_mut(output) {
                    set.extend(values);
                }
            }

            if let (Some(rel), Some(graph)) = (&config.relationship, graph.as_mut()) {
                let parents = normalize_facet(item.get(&rel.parent));
                let children = normalize_facet(item.get(&rel.child));
                graph.add_record(&parents, &children);
            }

            for (source, destination) in &config.media {
                let media = item.get(source).map(classify).unwrap_or(MediaValue::UnknownShape);
                match media {
                    MediaValue::PlainUrl(url) => {
                        item.insert(destination.clone(), Value::String(url));
                    }
                    MediaValue::InternalRef(reference) => {
                        pending.insert(reference.clone());
                        plan.push(AttachPlanEntry {
                            slot,
                            field: destination.clone(),
                            reference,
                        });
                    }
                    MediaValue::UnknownShape => {}
                }
            }

            match record_key(&item, &config.id_key) {
                Some(id) => {
                    slots.insert(id, slot);
                }
                None => unindexed += 1,
            }

            staged.push(item);
        }

        if unindexed > 0 {
            warn!(
                id_key = %config.id_key,
                unindexed,
                "Records without a usable identifier were not indexed"
            );
        }

        let resolved = if pending.is_empty() {
            IndexMap::new()
        } else {
            resolve_all(resolver, pending, config.concurrency, config.media_timeout).await
        };

        let mut attached = 0usize;
        for entry in plan {
            if let Some(Some(url)) = resolved.get(&entry.reference) {
                staged[entry.slot].insert(entry.field, Value::String(url.clone()));
                attached += 1;
            }
        }

        let mut staged: Vec<Option<Record>> = staged.into_iter().map(Some).collect();
        let records = staged.len();
        let contents: IndexMap<String, Record> = slots
            .into_iter()
            .filter_map(|(id, slot)| staged[slot].take().map(|record| (id, record)))
            .collect();

        let facets = sets
            .into_iter()
            .map(|(name, set)| (name, set.into_iter().collect()))
            .collect();

        let relationships = match (&config.relationship, graph) {
            (Some(rel), Some(graph)) => Some(Relationships {
                child_facet: config.facet_output(&rel.child).unwrap_or(&rel.child).to_string(),
                reverse_name: rel.reverse_name.clone(),
                graph,
            }),
            _ => None,
        };

        debug!(
            records,
            indexed = contents.len(),
            references = resolved.len(),
            attached,
            "Built facet index"
        );

        FacetIndex {
            contents,
            facets,
            relationships,
        }
    }
}

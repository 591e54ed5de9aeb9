//! Per-document reference bookkeeping, dereferencing and batch ordering.
//!
//! Every document in a fetch batch is wrapped in a [`SchemaNode`]. Nodes
//! record where their `$ref`s live, which other documents they depend on,
//! and can be dereferenced into a `$ref`-free tree. Ordering a batch goes
//! through [`sort_batch`], which consults a [`DependencyRegistry`] owned by
//! that one batch.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::FetchError;
use crate::loader::navigate_fragment;
use crate::source::SchemaSource;
use crate::types::{json_type_name, Document, Reference, REF_KEY};

/// JSON Pointer of each object holding a `$ref` -> raw reference string.
pub type ReferenceMap = BTreeMap<String, String>;

/// Document `$id` -> cross-document references, for one batch.
///
/// Entries start as each node's own dependency set and may grow while the
/// batch is ordered: when one document outranks another on richness, the
/// winner's dependencies are copied onto the loser.
///
/// A reference targets a document by the final segment of its document
/// part, so two documents sharing a file name (`r1/one.json`, `r2/one.json`)
/// are both treated as its target. Their own entries stay separate.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    entries: HashMap<String, BTreeSet<String>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, id: &str, dependencies: &BTreeSet<String>) {
        self.entries
            .entry(id.to_string())
            .or_default()
            .extend(dependencies.iter().cloned());
    }

    /// Dependencies currently recorded for the document `id`.
    pub fn dependencies(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(id)
    }

    /// True if document `id` has a recorded reference into a document named `target`.
    pub fn depends_on(&self, id: &str, target: &str) -> bool {
        self.entries
            .get(id)
            .is_some_and(|refs| refs.iter().any(|raw| Reference::parse(raw).targets(target)))
    }

    /// Copy `winner`'s dependencies onto `loser`. Returns true if `loser` grew.
    fn propagate(&mut self, winner: &SchemaNode, loser: &SchemaNode) -> bool {
        let Some(inherited) = self.entries.get(winner.id()).cloned() else {
            return false;
        };
        let entry = self.entries.entry(loser.id().to_string()).or_default();
        let before = entry.len();
        entry.extend(
            inherited
                .into_iter()
                .filter(|raw| !Reference::parse(raw).targets(loser.name())),
        );
        entry.len() != before
    }
}

/// One document plus its reference bookkeeping.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    document: Document,
    references: ReferenceMap,
    dependencies: BTreeSet<String>,
}

impl SchemaNode {
    /// Wrap a document, recording its references in `registry`.
    pub fn new(document: Document, registry: &mut DependencyRegistry) -> Self {
        let mut references = ReferenceMap::new();
        collect_references(document.value(), "", &mut references);

        let dependencies: BTreeSet<String> = references
            .values()
            .filter(|raw| {
                let reference = Reference::parse(raw);
                reference.document.is_some() && !reference.targets(document.name())
            })
            .cloned()
            .collect();

        registry.register(document.id(), &dependencies);
        debug!(
            document = document.id(),
            references = references.len(),
            dependencies = dependencies.len(),
            "wrapped schema document"
        );

        Self {
            document,
            references,
            dependencies,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn id(&self) -> &str {
        self.document.id()
    }

    pub fn name(&self) -> &str {
        self.document.name()
    }

    pub fn references(&self) -> &ReferenceMap {
        &self.references
    }

    /// References into other documents, as recorded at construction.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Replace every `$ref` in the document with the value it points to.
    ///
    /// Intra-document references resolve against this document; references
    /// into other documents go through `source`. Substituted values are
    /// themselves dereferenced before the walk returns, so the result holds
    /// no `$ref` keys. Running it again is a no-op.
    ///
    /// # Errors
    ///
    /// `FetchError::Malformed` if a pointer doesn't resolve, a `$ref` isn't a
    /// string, or references form a cycle. Source errors propagate unchanged.
    pub fn dereference(&mut self, source: &dyn SchemaSource) -> Result<(), FetchError> {
        if !contains_ref_key(self.document.value()) {
            return Ok(());
        }

        let mut walker = Dereferencer {
            source,
            in_progress: Vec::new(),
        };
        let scope = Scope::of(&self.document);
        let expanded = walker.expand(self.document.value(), &scope)?;

        self.document.value = expanded;
        Ok(())
    }

    /// Order two nodes of the same batch.
    ///
    /// A dependency sorts before its dependent. Without a dependency either
    /// way, the document with more `definitions.form.properties` sorts first
    /// and hands its dependencies to the other. Otherwise they're equal.
    fn compare(&self, other: &SchemaNode, registry: &mut DependencyRegistry) -> Ordering {
        let needs_other = registry.depends_on(self.id(), other.name());
        let needed_by_other = registry.depends_on(other.id(), self.name());
        match (needs_other, needed_by_other) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }

        let mine = self.document.form_property_count();
        let theirs = other.document.form_property_count();
        match mine.cmp(&theirs) {
            Ordering::Greater => {
                registry.propagate(self, other);
                Ordering::Less
            }
            Ordering::Less => {
                registry.propagate(other, self);
                Ordering::Greater
            }
            Ordering::Equal => Ordering::Equal,
        }
    }
}

/// Sort one batch of nodes into merge order.
///
/// The comparator mutates `registry`, so this is not a total order and must
/// not be handed to `slice::sort_by`. Richness propagation is first run to a
/// fixed point over every pair so the result does not hinge on which pair
/// is looked at first. Nodes are then placed one at a time: among the nodes
/// whose dependencies are all placed, the one that compares lowest goes
/// next, earlier input position winning ties.
pub fn sort_batch(nodes: &mut Vec<SchemaNode>, registry: &mut DependencyRegistry) {
    settle_richness(nodes, registry);

    let mut placed = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    while order.len() < nodes.len() {
        let pending: Vec<usize> = (0..nodes.len()).filter(|&i| !placed[i]).collect();
        let ready: Vec<usize> = pending
            .iter()
            .copied()
            .filter(|&i| {
                pending
                    .iter()
                    .all(|&j| j == i || !registry.depends_on(nodes[i].id(), nodes[j].name()))
            })
            .collect();

        // A dependency cycle leaves nothing ready; richness alone decides then
        let candidates = if ready.is_empty() {
            debug!(pending = pending.len(), "dependency cycle in schema batch");
            pending
        } else {
            ready
        };

        let mut best = candidates[0];
        for &candidate in &candidates[1..] {
            if nodes[candidate].compare(&nodes[best], registry) == Ordering::Less {
                best = candidate;
            }
        }
        placed[best] = true;
        order.push(best);
    }

    let mut slots: Vec<Option<SchemaNode>> = nodes.drain(..).map(Some).collect();
    nodes.extend(order.iter().filter_map(|&i| slots[i].take()));

    debug!(
        order = ?nodes.iter().map(SchemaNode::name).collect::<Vec<_>>(),
        "sorted schema batch"
    );
}

/// Hand each richer document's dependencies to every poorer, unrelated one
/// until nothing changes.
fn settle_richness(nodes: &[SchemaNode], registry: &mut DependencyRegistry) {
    loop {
        let mut changed = false;
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                if registry.depends_on(a.id(), b.name()) || registry.depends_on(b.id(), a.name()) {
                    continue;
                }
                let (ca, cb) = (
                    a.document.form_property_count(),
                    b.document.form_property_count(),
                );
                changed |= match ca.cmp(&cb) {
                    Ordering::Greater => registry.propagate(a, b),
                    Ordering::Less => registry.propagate(b, a),
                    Ordering::Equal => false,
                };
            }
        }
        if !changed {
            break;
        }
    }
}

/// Resolution context: the document a value was read from.
struct Scope<'a> {
    id: &'a str,
    name: &'a str,
    directory: &'a str,
    root: &'a Value,
}

impl<'a> Scope<'a> {
    fn of(document: &'a Document) -> Self {
        Scope {
            id: document.id(),
            name: document.name(),
            directory: document.directory(),
            root: document.value(),
        }
    }
}

struct Dereferencer<'s> {
    source: &'s dyn SchemaSource,
    /// "<document id>#<pointer>" of every reference currently being expanded.
    in_progress: Vec<String>,
}

impl Dereferencer<'_> {
    /// Build a `$ref`-free copy of `value`.
    fn expand(&mut self, value: &Value, scope: &Scope<'_>) -> Result<Value, FetchError> {
        match value {
            Value::Object(map) => {
                if let Some(raw) = map.get(REF_KEY) {
                    let raw = raw.as_str().ok_or_else(|| {
                        FetchError::malformed(
                            scope.id,
                            format!("$ref must be a string, got {}", json_type_name(raw)),
                        )
                    })?;
                    return self.follow(raw, scope);
                }

                let mut expanded = Map::with_capacity(map.len());
                for (key, child) in map {
                    expanded.insert(key.clone(), self.expand(child, scope)?);
                }
                Ok(Value::Object(expanded))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(item, scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn follow(&mut self, raw: &str, scope: &Scope<'_>) -> Result<Value, FetchError> {
        let reference = Reference::parse(raw);
        trace!(document = scope.id, reference = raw, "following $ref");

        match reference.document {
            Some(relative) if !reference.targets(scope.name) => {
                let target = self.source.resolve_relative(scope.directory, relative)?;
                let target_scope = Scope::of(&target);
                self.enter(&target_scope, reference.pointer, scope.id, raw)?;
                let result = navigate_fragment(target.value(), reference.pointer, target.id())
                    .and_then(|found| self.expand(found, &target_scope));
                self.in_progress.pop();
                result
            }
            _ => {
                self.enter(scope, reference.pointer, scope.id, raw)?;
                let result = navigate_fragment(scope.root, reference.pointer, scope.id)
                    .and_then(|found| self.expand(found, scope));
                self.in_progress.pop();
                result
            }
        }
    }

    fn enter(
        &mut self,
        target: &Scope<'_>,
        pointer: &str,
        referrer: &str,
        raw: &str,
    ) -> Result<(), FetchError> {
        let key = format!("{}#{}", target.id, pointer);
        if self.in_progress.contains(&key) {
            return Err(FetchError::malformed(
                referrer,
                format!("circular reference detected: {}", raw),
            ));
        }
        self.in_progress.push(key);
        Ok(())
    }
}

/// Record every `$ref` string under `value`, keyed by the JSON Pointer of
/// the object holding it. Objects holding a `$ref` are not descended into.
fn collect_references(value: &Value, path: &str, out: &mut ReferenceMap) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(raw)) = map.get(REF_KEY) {
                out.insert(path.to_string(), raw.clone());
                return;
            }
            for (key, child) in map {
                let child_path = format!("{}/{}", path, escape_pointer_token(key));
                collect_references(child, &child_path, out);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                collect_references(item, &format!("{}/{}", path, idx), out);
            }
        }
        _ => {}
    }
}

fn contains_ref_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key(REF_KEY) || map.values().any(contains_ref_key),
        Value::Array(items) => items.iter().any(contains_ref_key),
        _ => false,
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

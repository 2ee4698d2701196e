//! Schema-aware patch engine
//!
//! Reconciles an [`OverrideSpec`] against a base [`ManifestDocument`] and
//! returns the [`Patch`] to embed in the generated policy. The patch holds
//! only what the override touched:
//!
//! - scalars, and anything absent from the base, are taken from the override;
//! - mappings are merged key by key, base-only keys are left out;
//! - sequences with a merge key in the [`SchemaIndex`] are merged element by
//!   element (base order first, new override elements appended), and the
//!   full resulting sequence is emitted since downstream tooling replaces
//!   lists wholesale;
//! - any other sequence is replaced by the override sequence.
//!
//! The functions here never mutate their inputs and keep no state between
//! calls: the same (base, override, schema) always yields the same patch.

use pgt2acm_core::{FieldPath, ManifestDocument, Mapping, OverrideSpec, SchemaIndex, Shape, Value};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::{PatchError, PatchErrorReason, ShapeMismatch, Side, ValidationError};

/// Knobs for [`apply_patches_with`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchOptions {
    /// Fail instead of falling back to replace when a keyed-array element
    /// lacks its merge key
    pub strict_merge_keys: bool,
}

/// A keyed sequence that had to be replaced wholesale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceFallback {
    /// Schema path of the sequence elements, e.g. `spec.profile[]`
    pub path: FieldPath,
    pub keys: Vec<String>,
    /// Input holding the first element without a key
    pub side: Side,
    pub position: usize,
}

/// Override content resolved against its base manifest.
///
/// Top-level sections always come out as `metadata`, `spec`, `status`;
/// keys below them follow the override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    content: Mapping,
    fallbacks: Vec<SequenceFallback>,
}

impl Patch {
    /// Patch payload: `metadata`, `spec` and `status` only
    pub fn content(&self) -> &Mapping {
        &self.content
    }

    pub fn into_content(self) -> Mapping {
        self.content
    }

    pub fn to_value(&self) -> Value {
        Value::Mapping(self.content.clone())
    }

    /// Keyed sequences that degraded to replace semantics
    pub fn fallbacks(&self) -> &[SequenceFallback] {
        &self.fallbacks
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Apply this patch on top of `base`, the way downstream tooling does:
    /// mappings merge, `null` removes a key, everything else is replaced.
    pub fn apply_to(&self, base: &ManifestDocument) -> Value {
        let mut root = base.root().clone();
        for (key, value) in &self.content {
            overlay(root.entry(key.clone()).or_insert(Value::Null), value);
        }
        Value::Mapping(root)
    }
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.content.serialize(serializer)
    }
}

fn overlay(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Mapping(target_map), Value::Mapping(patch_map)) => {
            for (key, value) in patch_map {
                if value.is_null() {
                    target_map.shift_remove(key);
                } else {
                    overlay(target_map.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (target, patch) => {
            *target = patch.clone();
        }
    }
}

/// Check that every override path is either new or has the base's shape.
///
/// `null` on the base side counts as absent and `null` in the override fits
/// anywhere. Sequences are compared as a whole; their elements are checked
/// while merging, once the merge key tells which elements correspond.
pub fn validate(base: &ManifestDocument, overrides: &OverrideSpec) -> Result<(), ValidationError> {
    for (section, content) in overrides.sections() {
        let path = FieldPath::root().child(section);
        check_mapping(base.root().get(section), content, &path)?;
    }
    Ok(())
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn check_mapping(
    base: Option<&Value>,
    over: &Mapping,
    path: &FieldPath,
) -> Result<(), ValidationError> {
    let base_map = match present(base) {
        None => return Ok(()),
        Some(Value::Mapping(map)) => map,
        Some(other) => {
            return Err(ValidationError {
                path: path.clone(),
                reason: ShapeMismatch {
                    base: other.shape(),
                    found: Shape::Mapping,
                },
            });
        }
    };
    for (key, value) in over {
        check_value(base_map.get(key), value, &path.child(key))?;
    }
    Ok(())
}

fn check_value(base: Option<&Value>, over: &Value, path: &FieldPath) -> Result<(), ValidationError> {
    match (present(base), over) {
        (None, _) | (_, Value::Null) => Ok(()),
        (Some(_), Value::Mapping(over_map)) => check_mapping(base, over_map, path),
        (Some(base), over) if base.shape() == over.shape() => Ok(()),
        (Some(base), over) => Err(ValidationError {
            path: path.clone(),
            reason: ShapeMismatch {
                base: base.shape(),
                found: over.shape(),
            },
        }),
    }
}

/// Resolve `overrides` against `base` with default options
pub fn apply_patches(
    base: &ManifestDocument,
    overrides: &OverrideSpec,
    schema: &SchemaIndex,
) -> Result<Patch, PatchError> {
    apply_patches_with(base, overrides, schema, PatchOptions::default())
}

/// Resolve `overrides` against `base`
pub fn apply_patches_with(
    base: &ManifestDocument,
    overrides: &OverrideSpec,
    schema: &SchemaIndex,
    options: PatchOptions,
) -> Result<Patch, PatchError> {
    let mut merger = Merger {
        kind: base.kind(),
        manifest_path: base.location(),
        schema,
        options,
        fallbacks: Vec::new(),
    };

    let mut content = Mapping::new();
    for (section, over) in overrides.sections() {
        let path = FieldPath::root().child(section);
        let merged = merger.merge_mapping(base.root().get(section), over, &path, Mode::Delta)?;
        content.insert(section.to_string(), Value::Mapping(merged));
    }

    debug!(
        manifest = %merger.manifest_path,
        sections = content.len(),
        fallbacks = merger.fallbacks.len(),
        "resolved override"
    );

    Ok(Patch {
        content,
        fallbacks: merger.fallbacks,
    })
}

/// Pick the document of a multi-document source an override applies to.
///
/// A single document is always the target. Otherwise the override must name
/// one document through `metadata.name` (and optionally `metadata.namespace`).
pub fn select_target<'a>(
    documents: &'a [ManifestDocument],
    overrides: &OverrideSpec,
    manifest_path: &str,
) -> Result<&'a ManifestDocument, PatchError> {
    let fail = |reason| PatchError::new(manifest_path, FieldPath::root(), reason);

    match documents {
        [] => Err(fail(PatchErrorReason::EmptySource)),
        [single] => Ok(single),
        _ => {
            let Some(name) = overrides.metadata_str("name") else {
                return Err(fail(PatchErrorReason::AmbiguousTarget {
                    candidates: documents.len(),
                }));
            };
            let namespace = overrides.metadata_str("namespace");
            let matching: Vec<_> = documents
                .iter()
                .filter(|doc| doc.name() == Some(name))
                .filter(|doc| namespace.is_none() || doc.namespace() == namespace)
                .collect();
            match matching.as_slice() {
                [] => Err(fail(PatchErrorReason::TargetNotFound {
                    name: name.to_string(),
                })),
                [target] => Ok(*target),
                many => Err(fail(PatchErrorReason::AmbiguousTarget {
                    candidates: many.len(),
                })),
            }
        }
    }
}

/// Whether base-only keys of a mapping are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Only override-derived content
    Delta,
    /// Whole merged value, used inside keyed sequence elements
    Full,
}

/// State of a single `apply_patches` call
struct Merger<'a> {
    kind: &'a str,
    manifest_path: String,
    schema: &'a SchemaIndex,
    options: PatchOptions,
    fallbacks: Vec<SequenceFallback>,
}

impl Merger<'_> {
    fn error(&self, path: &FieldPath, reason: PatchErrorReason) -> PatchError {
        PatchError::new(self.manifest_path.clone(), path.clone(), reason)
    }

    fn mismatch(&self, path: &FieldPath, base: Shape, found: Shape) -> PatchError {
        self.error(
            path,
            PatchErrorReason::TypeMismatch(ShapeMismatch { base, found }),
        )
    }

    fn merge(
        &mut self,
        base: Option<&Value>,
        over: &Value,
        path: &FieldPath,
        mode: Mode,
    ) -> Result<Value, PatchError> {
        match (present(base), over) {
            (_, Value::Null) => Ok(Value::Null),
            (None, over) => Ok(over.clone()),
            (Some(_), Value::Mapping(over_map)) => {
                Ok(Value::Mapping(self.merge_mapping(base, over_map, path, mode)?))
            }
            (Some(Value::Sequence(base_seq)), Value::Sequence(over_seq)) => {
                self.merge_sequence(base_seq, over_seq, path)
            }
            (Some(base), over) if base.shape() == over.shape() => Ok(over.clone()),
            (Some(base), over) => Err(self.mismatch(path, base.shape(), over.shape())),
        }
    }

    fn merge_mapping(
        &mut self,
        base: Option<&Value>,
        over: &Mapping,
        path: &FieldPath,
        mode: Mode,
    ) -> Result<Mapping, PatchError> {
        let base_map = match present(base) {
            None => None,
            Some(Value::Mapping(map)) => Some(map),
            Some(other) => return Err(self.mismatch(path, other.shape(), Shape::Mapping)),
        };

        let mut out = match (mode, base_map) {
            (Mode::Full, Some(map)) => map.clone(),
            _ => Mapping::with_capacity(over.len()),
        };

        for (key, value) in over {
            let child = path.child(key);
            let merged = self.merge(base_map.and_then(|m| m.get(key)), value, &child, mode)?;
            if mode == Mode::Full && merged.is_null() {
                // null clears the field of a whole element
                out.shift_remove(key);
            } else {
                out.insert(key.clone(), merged);
            }
        }
        Ok(out)
    }

    fn merge_sequence(
        &mut self,
        base: &[Value],
        over: &[Value],
        path: &FieldPath,
    ) -> Result<Value, PatchError> {
        let element_path = path.element();
        let Some(keys) = self.schema.merge_keys(self.kind, &element_path) else {
            return Ok(Value::Sequence(over.to_vec()));
        };

        let identities = identities(base, keys)
            .map_err(|position| (Side::Base, position))
            .and_then(|base_ids| {
                identities(over, keys)
                    .map(|over_ids| (base_ids, over_ids))
                    .map_err(|position| (Side::Override, position))
            });

        let (mut known, over_ids) = match identities {
            Ok(ids) => ids,
            Err((side, position)) => {
                if self.options.strict_merge_keys {
                    return Err(self.error(
                        &path.index(position),
                        PatchErrorReason::MissingMergeKey {
                            side,
                            position,
                            keys: keys.to_vec(),
                        },
                    ));
                }
                warn!(
                    manifest = %self.manifest_path,
                    path = %element_path,
                    keys = ?keys,
                    %side,
                    position,
                    "element without merge key, replacing the whole sequence"
                );
                self.fallbacks.push(SequenceFallback {
                    path: element_path,
                    keys: keys.to_vec(),
                    side,
                    position,
                });
                return Ok(Value::Sequence(over.to_vec()));
            }
        };

        let mut merged: Vec<Value> = base.to_vec();
        for (element, id) in over.iter().zip(over_ids) {
            match known.iter().position(|existing| *existing == id) {
                Some(position) => {
                    let at = path.keyed(describe_identity(keys, &id));
                    let updated = self.merge(Some(&merged[position]), element, &at, Mode::Full)?;
                    merged[position] = updated;
                }
                None => {
                    merged.push(element.clone());
                    known.push(id);
                }
            }
        }
        Ok(Value::Sequence(merged))
    }
}

/// Merge-key values of every element, or the position of the first element
/// that lacks one of them
fn identities<'v>(items: &'v [Value], keys: &[String]) -> Result<Vec<Vec<&'v Value>>, usize> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            keys.iter()
                .map(|key| present(item.get(key)))
                .collect::<Option<Vec<_>>>()
                .ok_or(position)
        })
        .collect()
}

fn describe_identity(keys: &[String], id: &[&Value]) -> String {
    keys.iter()
        .zip(id)
        .map(|(key, value)| format!("{key}={}", scalar_text(value)))
        .collect::<Vec<_>>()
        .join(",")
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        Value::Sequence(_) | Value::Mapping(_) => "<composite>".to_string(),
    }
}

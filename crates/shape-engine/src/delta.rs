use std::collections::BTreeMap;

use tracing::debug;

use shapesink_core::ShapeDefinition;

use crate::known_shape::KnownShape;

/// The minimal description of what must change in the destination (and then
/// in the cache) to accommodate a new data point.
///
/// A shape that is a subset of what is already known produces a delta where
/// `has_changes()` is false; such a delta must never render DDL.
#[derive(Debug)]
pub struct ShapeDelta {
    pub name: String,
    pub is_new: bool,
    pub has_key_changes: bool,
    pub has_new_properties: bool,

    /// The definition held before this data point, when one existed.
    pub previous: Option<ShapeDefinition>,

    /// The transient shape built from the data point. Owned by value so the
    /// pre-apply state and the cache stay disentangled.
    pub new_shape: KnownShape,

    /// Keys the previous definition did not have, in stated order.
    pub new_keys: Vec<String>,

    /// The previous definition's keys, carried so the DDL renderer can emit
    /// the combined primary key without consulting the cache.
    pub existing_keys: Vec<String>,

    /// Properties the previous definition did not have, keyed by name.
    pub new_properties: BTreeMap<String, String>,
}

impl ShapeDelta {
    pub fn has_changes(&self) -> bool {
        self.is_new || self.has_key_changes || self.has_new_properties
    }
}

/// Diff a new observation of an entity against what is already known.
///
/// Operates on the definition layer only. A fragment with fewer keys or
/// properties than the previous shape is not a change; a different type for
/// a known property name is not a change either.
pub fn generate_delta(
    prev: Option<&KnownShape>,
    next: KnownShape,
) -> ShapeDelta {
    let mut delta = ShapeDelta {
        name: next.name().to_string(),
        is_new: prev.is_none(),
        has_key_changes: false,
        has_new_properties: false,
        previous: prev.map(|p| p.definition().clone()),
        new_keys: Vec::new(),
        existing_keys: prev
            .map(|p| p.keys().to_vec())
            .unwrap_or_default(),
        new_properties: BTreeMap::new(),
        new_shape: next,
    };

    // Few keys in practice, so a linear scan beats building a set.
    for key in delta.new_shape.keys() {
        let known = delta
            .previous
            .as_ref()
            .is_some_and(|p| p.has_key(key));
        if !known {
            delta.new_keys.push(key.clone());
            delta.has_key_changes = true;
        }
    }

    if let Some(prev) = &delta.previous {
        let dropped: Vec<&str> = prev
            .keys
            .iter()
            .filter(|k| !delta.new_shape.definition().has_key(k))
            .map(String::as_str)
            .collect();
        if !dropped.is_empty() {
            // Key removal is never surfaced; the old primary key stands.
            debug!(
                shape = %delta.name,
                dropped = ?dropped,
                "data point dropped keys; keeping existing primary key"
            );
        }
    }

    let all_known = delta.new_shape.properties().iter().all(|p| {
        delta
            .previous
            .as_ref()
            .is_some_and(|prev| prev.has_property(&p.name))
    });
    if all_known {
        return delta;
    }

    delta.has_new_properties = true;
    for prop in delta.new_shape.properties() {
        let known = delta
            .previous
            .as_ref()
            .is_some_and(|prev| prev.has_property(&prop.name));
        if !known {
            delta
                .new_properties
                .insert(prop.name.clone(), prop.ty.clone());
        }
    }

    delta
}

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use shapesink_core::{
    DataPoint, PropertyDefinition, ShapeDefinition, ShapeFragment,
};

use crate::fingerprint::{
    ensure_hashes, key_names_fingerprint, property_fingerprint,
};

/// The canonical, growing record of everything the engine has learned about
/// one logical entity.
///
/// A `KnownShape` never shrinks: merging another shape in can only add keys,
/// properties, and observed fingerprints. The scratch cache holds per-shape
/// derived values (rendered SQL, parameter order) and is wiped whenever the
/// definition changes through a merge.
#[derive(Clone)]
pub struct KnownShape {
    definition: ShapeDefinition,

    /// Every KeyNamesHash observed to be compatible with this shape.
    key_fingerprints: HashSet<u32>,

    /// Every PropertyHash observed to be compatible with this shape.
    property_fingerprints: HashSet<u32>,

    /// Union of all key names ever observed.
    observed_keys: HashSet<String>,

    /// Union of all `name:type` strings ever observed, used to recognize
    /// property subsets without re-parsing.
    observed_property_strings: HashSet<String>,

    scratch: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl KnownShape {
    /// Build a shape from the first data point seen for its canonical name.
    pub fn from_data_point(dp: &DataPoint) -> Self {
        let mut fragment = dp.shape.clone();
        ensure_hashes(&mut fragment);

        let mut properties = Vec::with_capacity(fragment.properties.len());
        let mut observed_property_strings =
            HashSet::with_capacity(fragment.properties.len());

        for prop in &fragment.properties {
            // Split on the first colon; a missing colon means an untyped
            // property, carried with an empty type.
            let (name, ty) = match prop.split_once(':') {
                Some((name, ty)) => (name, ty),
                None => (prop.as_str(), ""),
            };
            observed_property_strings.insert(prop.clone());
            properties.push(PropertyDefinition::new(name, ty));
        }
        properties.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            definition: ShapeDefinition {
                name: dp.canonical_name(),
                keys: fragment.key_names.clone(),
                properties,
            },
            key_fingerprints: HashSet::from([fragment.key_names_hash]),
            property_fingerprints: HashSet::from([fragment.property_hash]),
            observed_keys: fragment.key_names.iter().cloned().collect(),
            observed_property_strings,
            scratch: HashMap::new(),
        }
    }

    /// Build a shape from an introspected destination definition.
    ///
    /// Seeds the observed sets and the full-list fingerprints from the
    /// definition, so a data point matching the destination exactly is
    /// recognized on first contact.
    pub fn from_definition(mut definition: ShapeDefinition) -> Self {
        definition.sort_properties();

        let property_strings: Vec<String> = definition
            .properties
            .iter()
            .map(PropertyDefinition::property_string)
            .collect();

        Self {
            key_fingerprints: HashSet::from([key_names_fingerprint(
                &definition.keys,
            )]),
            property_fingerprints: HashSet::from([property_fingerprint(
                &property_strings,
            )]),
            observed_keys: definition.keys.iter().cloned().collect(),
            observed_property_strings: property_strings.into_iter().collect(),
            definition,
            scratch: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ShapeDefinition {
        &self.definition
    }

    pub fn keys(&self) -> &[String] {
        &self.definition.keys
    }

    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.definition.properties
    }

    pub fn key_fingerprints(&self) -> &HashSet<u32> {
        &self.key_fingerprints
    }

    pub fn property_fingerprints(&self) -> &HashSet<u32> {
        &self.property_fingerprints
    }

    pub fn observed_keys(&self) -> &HashSet<String> {
        &self.observed_keys
    }

    pub fn observed_property_strings(&self) -> &HashSet<String> {
        &self.observed_property_strings
    }

    /// Cache a derived value under `key`. Wiped on the next merge.
    pub fn set<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) {
        self.scratch.insert(key.into(), Arc::new(value));
    }

    /// Fetch a derived value cached under `key`, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.scratch
            .get(key)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Whether `fragment` is structurally subsumed by this shape.
    ///
    /// Fast path: both fragment fingerprints are already known. Slow path:
    /// verify that every key and every `name:type` string of the fragment
    /// has been observed before; on success the fragment's fingerprints are
    /// learned so the next lookup takes the fast path.
    pub fn matches_shape(&mut self, fragment: &ShapeFragment) -> bool {
        let mut fragment = fragment.clone();
        ensure_hashes(&mut fragment);

        if self.key_fingerprints.contains(&fragment.key_names_hash)
            && self.property_fingerprints.contains(&fragment.property_hash)
        {
            return true;
        }

        for key in &fragment.key_names {
            if !self.observed_keys.contains(key) {
                return false;
            }
        }

        for prop in &fragment.properties {
            if !self.observed_property_strings.contains(prop) {
                return false;
            }
        }

        debug!(
            shape = %self.definition.name,
            key_hash = fragment.key_names_hash,
            property_hash = fragment.property_hash,
            "subset fragment recognized; learning fingerprints"
        );
        self.key_fingerprints.insert(fragment.key_names_hash);
        self.property_fingerprints.insert(fragment.property_hash);

        true
    }

    /// Merge another observation of this entity into the canonical record.
    ///
    /// Keys and properties from `other` come first, preserving their stated
    /// order; duplicates (by identity for keys, by name for properties) are
    /// dropped, so the first-seen type of a property wins. The scratch cache
    /// is invalidated because the definition may have changed.
    pub fn merge(&mut self, other: KnownShape) {
        self.key_fingerprints.extend(other.key_fingerprints);
        self.property_fingerprints.extend(other.property_fingerprints);
        self.observed_keys.extend(other.observed_keys);
        self.observed_property_strings
            .extend(other.observed_property_strings);

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for key in other
            .definition
            .keys
            .into_iter()
            .chain(std::mem::take(&mut self.definition.keys))
        {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        self.definition.keys = keys;

        let self_props = std::mem::take(&mut self.definition.properties);
        let mut seen = HashSet::new();
        let mut properties = Vec::new();
        for prop in other
            .definition
            .properties
            .into_iter()
            .chain(self_props.iter().cloned())
        {
            // An incoming type for a name we already hold is ignored;
            // widening is additive in columns, not in per-column type.
            let prop = match self_props.iter().find(|p| p.name == prop.name) {
                Some(existing) => existing.clone(),
                None => prop,
            };
            if seen.insert(prop.name.clone()) {
                properties.push(prop);
            }
        }
        self.definition.properties = properties;

        self.scratch.clear();
    }
}

impl std::fmt::Debug for KnownShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownShape")
            .field("definition", &self.definition)
            .field("key_fingerprints", &self.key_fingerprints)
            .field("property_fingerprints", &self.property_fingerprints)
            .field("observed_keys", &self.observed_keys)
            .field(
                "observed_property_strings",
                &self.observed_property_strings,
            )
            .finish_non_exhaustive()
    }
}

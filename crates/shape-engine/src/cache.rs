use std::collections::HashMap;
use std::collections::hash_map::Entry;

use metrics::counter;

use shapesink_core::{DataPoint, ShapeDefinition};

use crate::delta::{ShapeDelta, generate_delta};
use crate::known_shape::KnownShape;

/// Mapping from canonical name to the engine's view of that entity.
///
/// Owned by one subscriber for its lifetime. The cache mirrors the
/// destination: a delta is applied here only after the physical schema
/// change has succeeded, so the cache never runs ahead of storage.
#[derive(Debug, Default)]
pub struct ShapeCache {
    shapes: HashMap<String, KnownShape>,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache with shapes rebuilt from destination introspection.
    pub fn with_shapes(initial: impl IntoIterator<Item = KnownShape>) -> Self {
        Self {
            shapes: initial
                .into_iter()
                .map(|s| (s.name().to_string(), s))
                .collect(),
        }
    }

    /// Look up the data point's shape and check structural compatibility.
    ///
    /// Returns the known shape when the fragment is subsumed by it; subset
    /// recognition learns the fragment's fingerprints as a side effect so
    /// the next lookup is O(1). A miss means the caller must analyze.
    pub fn recognize(&mut self, dp: &DataPoint) -> Option<&KnownShape> {
        let name = dp.canonical_name();
        let Some(shape) = self.shapes.get_mut(&name) else {
            counter!("shapesink_shape_cache_misses_total", "shape" => name)
                .increment(1);
            return None;
        };

        if shape.matches_shape(&dp.shape) {
            counter!("shapesink_shape_cache_hits_total", "shape" => name)
                .increment(1);
            Some(shape)
        } else {
            counter!("shapesink_shape_cache_misses_total", "shape" => name)
                .increment(1);
            None
        }
    }

    /// Compute the changes the destination must absorb for this data point.
    ///
    /// Does not mutate the cache; pass the delta back through
    /// [`apply_delta`](Self::apply_delta) once the destination has been
    /// updated.
    pub fn analyze(&self, dp: &DataPoint) -> ShapeDelta {
        let next = KnownShape::from_data_point(dp);
        generate_delta(self.shapes.get(next.name()), next)
    }

    /// Fold an applied delta into the cache and return the canonical shape.
    pub fn apply_delta(&mut self, delta: ShapeDelta) -> &KnownShape {
        let name = delta.new_shape.name().to_string();
        match self.shapes.entry(name.clone()) {
            Entry::Occupied(entry) => {
                counter!("shapesink_shape_evolutions_total", "shape" => name)
                    .increment(1);
                let shape = entry.into_mut();
                shape.merge(delta.new_shape);
                shape
            }
            Entry::Vacant(entry) => entry.insert(delta.new_shape),
        }
    }

    pub fn get(&self, name: &str) -> Option<&KnownShape> {
        self.shapes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut KnownShape> {
        self.shapes.get_mut(name)
    }

    /// Snapshot of all canonical definitions.
    pub fn all_definitions(&self) -> Vec<ShapeDefinition> {
        self.shapes.values().map(|s| s.definition().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

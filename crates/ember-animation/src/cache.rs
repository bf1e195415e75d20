//! Memoized baked-animation storage shared by all animators

use crate::bake::{compile, BakedAnimation};
use crate::clip::Animation;
use ember_core::{Result, ShapeId};
use ember_shape::Shape;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Memoization table for compiled animations, keyed by shape identity and
/// animation code.
///
/// Baking is expensive and its output is immutable, so the first entity to
/// need a (shape, animation) pair compiles it exactly once under the lock;
/// every later request gets the shared `Arc`. Owned by the host's resource
/// manager with a lifetime tied to the shapes it serves.
#[derive(Default)]
pub struct BakedAnimationCache {
    entries: Mutex<HashMap<(ShapeId, String), Arc<BakedAnimation>>>,
}

impl BakedAnimationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the compiled form of `animation` for `shape`, compiling on
    /// first use.
    pub fn get_or_compile(&self, shape: &Shape, animation: &Animation) -> Result<Arc<BakedAnimation>> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (shape.id(), animation.code.clone());
        if let Some(baked) = entries.get(&key) {
            return Ok(Arc::clone(baked));
        }
        let baked = Arc::new(compile(animation, shape)?);
        entries.insert(key, Arc::clone(&baked));
        Ok(baked)
    }

    /// Already-compiled entry, if any.
    pub fn get(&self, shape_id: ShapeId, code: &str) -> Option<Arc<BakedAnimation>> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(&(shape_id, code.to_string())).map(Arc::clone)
    }

    /// Drop every entry compiled against the given shape, e.g. when the
    /// shape itself is unloaded.
    pub fn evict_shape(&self, shape_id: ShapeId) {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.retain(|(id, _), _| *id != shape_id);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{OnActivityStopped, OnAnimationEnd};
    use crate::keyframe::{Keyframe, KeyframeElement};
    use ember_shape::Element;

    fn shape() -> Shape {
        let mut root = Element::new("body");
        root.joint_id = 1;
        Shape::new("rig", vec![root]).unwrap()
    }

    fn clip(code: &str) -> Animation {
        let mut elements = HashMap::new();
        elements.insert("body".to_string(), KeyframeElement::default());
        Animation {
            code: code.into(),
            version: 0,
            quantity_frames: 4,
            keyframes: vec![Keyframe { frame: 0, elements }],
            on_end: OnAnimationEnd::Repeat,
            on_activity_stopped: OnActivityStopped::EaseOut,
            ease_animation_speed: false,
        }
    }

    #[test]
    fn compiles_once_and_shares_the_result() {
        let cache = BakedAnimationCache::new();
        let shape = shape();
        let clip = clip("walk");

        let first = cache.get_or_compile(&shape, &clip).unwrap();
        let second = cache.get_or_compile(&shape, &clip).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_shapes_get_distinct_entries() {
        let cache = BakedAnimationCache::new();
        let shape_a = shape();
        let shape_b = shape();
        let clip = clip("walk");

        let a = cache.get_or_compile(&shape_a, &clip).unwrap();
        let b = cache.get_or_compile(&shape_b, &clip).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn compile_errors_are_not_cached() {
        let cache = BakedAnimationCache::new();
        let shape = shape();
        let broken = Animation {
            keyframes: vec![],
            ..clip("broken")
        };
        assert!(cache.get_or_compile(&shape, &broken).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn evict_shape_drops_only_that_shape() {
        let cache = BakedAnimationCache::new();
        let shape_a = shape();
        let shape_b = shape();
        cache.get_or_compile(&shape_a, &clip("walk")).unwrap();
        cache.get_or_compile(&shape_b, &clip("walk")).unwrap();

        cache.evict_shape(shape_a.id());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(shape_a.id(), "walk").is_none());
        assert!(cache.get(shape_b.id(), "walk").is_some());
    }
}

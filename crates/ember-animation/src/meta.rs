//! Activation request metadata — caller-supplied playback parameters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How one animation's contribution combines with others at an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BlendMode {
    /// Layered in unconditionally at the easing factor, outside the
    /// weight-normalized group
    Add,
    /// Weight-normalized against the other Average/AddAverage contributors
    #[default]
    Average,
    /// Added like `Add`, but counted in the weight-normalization group
    AddAverage,
}

fn default_weight() -> f32 {
    1.0
}

fn default_ease_speed() -> f32 {
    10.0
}

/// Parameters for a play request: weight, speed, easing and per-element
/// overrides. Supplied by game logic each tick alongside the animation code;
/// read by the running animation at activation time, never owned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationMetadata {
    /// Target animation code
    pub code: String,
    /// Default element weight where no per-element override exists
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Per-element weight overrides, keyed by element name
    #[serde(default)]
    pub element_weights: HashMap<String, f32>,
    /// Per-element blend mode overrides, keyed by element name
    #[serde(default)]
    pub element_blend_modes: HashMap<String, BlendMode>,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Playback speed multiplier
    #[serde(default = "default_weight")]
    pub animation_speed: f32,
    /// Additionally scale playback speed by the entity's walk speed
    #[serde(default)]
    pub mul_with_walk_speed: bool,
    /// Exponential ease-in rate, 1/s
    #[serde(default = "default_ease_speed")]
    pub ease_in_speed: f32,
    /// Exponential ease-out rate, 1/s
    #[serde(default = "default_ease_speed")]
    pub ease_out_speed: f32,
    /// Start offset in ticks, consumed on activation
    #[serde(default)]
    pub start_frame_once: Option<f32>,
}

impl AnimationMetadata {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            weight: 1.0,
            element_weights: HashMap::new(),
            element_blend_modes: HashMap::new(),
            blend_mode: BlendMode::default(),
            animation_speed: 1.0,
            mul_with_walk_speed: false,
            ease_in_speed: default_ease_speed(),
            ease_out_speed: default_ease_speed(),
            start_frame_once: None,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_element_weight(mut self, element: impl Into<String>, weight: f32) -> Self {
        self.element_weights.insert(element.into(), weight);
        self
    }

    pub fn with_element_blend_mode(mut self, element: impl Into<String>, mode: BlendMode) -> Self {
        self.element_blend_modes.insert(element.into(), mode);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.animation_speed = speed;
        self
    }

    pub fn with_ease_speeds(mut self, ease_in: f32, ease_out: f32) -> Self {
        self.ease_in_speed = ease_in;
        self.ease_out_speed = ease_out;
        self
    }

    pub fn with_start_frame(mut self, frame: f32) -> Self {
        self.start_frame_once = Some(frame);
        self
    }
}

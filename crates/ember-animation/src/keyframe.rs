//! Sparse authored keyframes — per-element pose overrides at a tick index

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The three independently interpolated transform channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Translation,
    Rotation,
    Scale,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Translation, Channel::Rotation, Channel::Scale];
}

/// A sparse pose override for one element at one keyframe.
///
/// Channels left unset are not interpolated; the compiler falls through to
/// the nearest keyframe that does set them, on either side, wrapping across
/// the clip boundary. Translation and rotation (degrees) are deltas relative
/// to the bind pose; scale is an absolute multiplier (1.0 = unchanged).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KeyframeElement {
    #[serde(default)]
    pub translation: Option<[f32; 3]>,
    #[serde(default)]
    pub rotation: Option<[f32; 3]>,
    #[serde(default)]
    pub scale: Option<[f32; 3]>,
}

impl KeyframeElement {
    /// Raw authored value for a channel, if set.
    pub fn channel(&self, channel: Channel) -> Option<[f32; 3]> {
        match channel {
            Channel::Translation => self.translation,
            Channel::Rotation => self.rotation,
            Channel::Scale => self.scale,
        }
    }
}

/// One authored keyframe: element pose overrides at a tick index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Keyframe {
    /// Tick index within the clip, must be below the clip's frame count
    pub frame: u32,
    /// Overrides keyed by element name
    #[serde(default)]
    pub elements: HashMap<String, KeyframeElement>,
}

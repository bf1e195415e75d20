//! Animation clips — named, versioned motion data with end-of-clip policies

use crate::keyframe::Keyframe;
use serde::{Deserialize, Serialize};

/// What happens when the playback cursor crosses the end of the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OnAnimationEnd {
    /// Wrap to the start, stepping the iteration counter
    #[default]
    Repeat,
    /// Freeze at the last tick
    Hold,
    /// Freeze at the last tick and drop the animation from the active set
    Stop,
    /// Freeze at the last tick and fade out via the easing factor
    EaseOut,
}

/// What happens when game logic stops requesting the animation while it is
/// still playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OnActivityStopped {
    /// Keep playing forward until the current iteration completes
    PlayTillEnd,
    /// Play backwards until the easing factor decays or tick 0 is reached
    Rewind,
    /// Stop immediately
    Stop,
    /// Fade out via the easing factor
    #[default]
    EaseOut,
}

/// One named motion clip as authored: a frame count and a sparse, ordered
/// keyframe list. Immutable after load; compiled once per shape into a
/// [`crate::bake::BakedAnimation`] and shared read-only from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animation {
    /// Stable identifier used in activation requests
    pub code: String,
    /// Authoring-format version of the clip
    #[serde(default)]
    pub version: u32,
    /// Total baked tick count Q; cursor positions live in [0, Q)
    pub quantity_frames: u32,
    pub keyframes: Vec<Keyframe>,
    #[serde(default)]
    pub on_end: OnAnimationEnd,
    #[serde(default)]
    pub on_activity_stopped: OnActivityStopped,
    /// Scale playback speed by the easing factor while fading in/out
    #[serde(default)]
    pub ease_animation_speed: bool,
}

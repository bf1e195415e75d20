//! Skeletal animation for the Ember engine
//!
//! Three layers, each feeding the next:
//! - **Baking**: [`bake::compile`] turns an authored [`clip::Animation`]'s
//!   sparse keyframes into dense per-tick frames with finalized joint
//!   matrices, shared read-only via [`cache::BakedAnimationCache`].
//! - **Playback**: one [`running::RunningAnimation`] state machine per
//!   (entity, animation) tracks the fractional cursor, easing factor and
//!   stop-policy transitions.
//! - **Blending**: the per-entity [`animator::Animator`] combines every
//!   active animation each tick, weighted per element over the skeleton
//!   tree, into the joint matrix array the skinning stage consumes.

pub mod animator;
pub mod bake;
pub mod cache;
pub mod clip;
pub mod compose;
pub mod events;
pub mod head;
pub mod keyframe;
pub mod meta;
pub mod persist;
pub mod running;

pub use animator::Animator;
pub use bake::{compile, BakedAnimation, BakedFrame};
pub use cache::BakedAnimationCache;
pub use clip::{Animation, OnActivityStopped, OnAnimationEnd};
pub use compose::{ComposeStrategy, FastCompose, PreciseCompose};
pub use events::{AnimationEvent, ObserverHandle};
pub use head::HeadController;
pub use keyframe::{Channel, Keyframe, KeyframeElement};
pub use meta::{AnimationMetadata, BlendMode};
pub use persist::{AnimatorSnapshot, RunningAnimationSnapshot};
pub use running::{Progress, RunningAnimation};

/// Baked tick rate: authored keyframe indices count ticks at this rate.
pub const FRAMES_PER_SECOND: f32 = 30.0;

/// An easing factor below this is treated as fully faded out.
pub const EASING_EPSILON: f32 = 0.002;

/// Upper bound on animations blended in one tick; excess animations keep
/// progressing but are excluded from the blend set.
pub const MAX_CONCURRENT_ANIMATIONS: usize = 16;

/// Floor of the weight-normalization divisor in Average/AddAverage blending.
pub const WEIGHT_CAP_FACTOR: f32 = 1.0;

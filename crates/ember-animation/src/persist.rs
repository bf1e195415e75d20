//! Save/load hooks for running animation state
//!
//! The host owns the container format; these types only fix which fields
//! survive a round trip: code, fractional frame, iteration count and the
//! metadata needed to resume playback.

use crate::animator::Animator;
use crate::meta::AnimationMetadata;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persisted state of one active running animation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningAnimationSnapshot {
    pub code: String,
    pub current_frame: f32,
    pub iterations: i32,
    pub meta: AnimationMetadata,
}

/// Persisted state of an animator: one entry per active animation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimatorSnapshot {
    pub animations: Vec<RunningAnimationSnapshot>,
}

impl Animator {
    /// Snapshot every active animation for serialization by the host.
    pub fn capture(&self) -> AnimatorSnapshot {
        let animations = self
            .running_animations()
            .iter()
            .filter(|run| run.active)
            .map(|run| RunningAnimationSnapshot {
                code: run.code().to_string(),
                current_frame: run.current_frame,
                iterations: run.iterations,
                meta: run.meta.clone(),
            })
            .collect();
        AnimatorSnapshot { animations }
    }

    /// Resume playback from a snapshot. Codes the skeleton does not define
    /// are logged and skipped.
    pub fn restore(&mut self, snapshot: &AnimatorSnapshot) {
        let shape = Arc::clone(self.shape());
        for entry in &snapshot.animations {
            let Some(run) = self.running_animation_mut(&entry.code) else {
                log::warn!("restore: unknown animation code '{}'", entry.code);
                continue;
            };
            let q = run.animation.quantity_frames as f32;
            run.activate(&shape, entry.meta.clone());
            run.current_frame = entry.current_frame.rem_euclid(q);
            run.iterations = entry.iterations;
            // The animation was mid-play when captured; resuming must not
            // re-fade it in.
            run.easing_factor = 1.0;
        }
    }
}

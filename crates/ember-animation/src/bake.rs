//! Animation compiler — bakes sparse keyframes into dense per-tick frames
//!
//! Baking runs once per (shape, animation) pair. Each of the three transform
//! channels is resolved independently per element: the bracketing keyframes
//! are searched with wraparound across the clip boundary, so a channel keyed
//! only at ticks 8 and 2 of a 10-tick clip interpolates straight through the
//! seam.

use crate::clip::{Animation, OnActivityStopped, OnAnimationEnd};
use crate::keyframe::Channel;
use ember_core::{EmberError, Result};
use ember_shape::{Element, ElementPose, Shape};
use glam::Mat4;

/// One fully-resolved tick of a compiled animation.
#[derive(Debug, Clone)]
pub struct BakedFrame {
    /// Resolved local pose per element index
    pub poses: Vec<ElementPose>,
    /// Finalized skinning matrix per joint id; orphaned slots are identity
    pub joints: Vec<Mat4>,
}

/// A compiled animation: dense per-tick frames plus the playback policies
/// copied from the authored clip. Immutable; shared read-only between all
/// animators via `Arc`.
#[derive(Debug, Clone)]
pub struct BakedAnimation {
    pub code: String,
    pub version: u32,
    pub quantity_frames: u32,
    pub on_end: OnAnimationEnd,
    pub on_activity_stopped: OnActivityStopped,
    pub ease_animation_speed: bool,
    pub frames: Vec<BakedFrame>,
}

impl BakedAnimation {
    pub fn frame(&self, tick: usize) -> Option<&BakedFrame> {
        self.frames.get(tick)
    }
}

/// Per-element, per-channel keyframe track assembled from the sparse
/// authored data: (tick, raw value) sorted by tick.
type ChannelTrack = Vec<(u32, [f32; 3])>;

/// Compile an authored animation against a shape.
///
/// Fails on malformed authored data: an empty keyframe list, or any
/// keyframe at or beyond the declared frame count. Baking invalid data
/// would silently corrupt state shared by every entity using the shape.
pub fn compile(animation: &Animation, shape: &Shape) -> Result<BakedAnimation> {
    if animation.keyframes.is_empty() {
        return Err(EmberError::EmptyKeyframes {
            animation: animation.code.clone(),
        });
    }
    if animation.quantity_frames == 0 {
        return Err(EmberError::AnimationError(format!(
            "Animation '{}' declares zero frames",
            animation.code
        )));
    }
    for keyframe in &animation.keyframes {
        if keyframe.frame >= animation.quantity_frames {
            return Err(EmberError::KeyframeOutOfRange {
                animation: animation.code.clone(),
                frame: keyframe.frame,
                quantity_frames: animation.quantity_frames,
            });
        }
    }

    let element_count = shape.element_count();
    let mut tracks: Vec<[ChannelTrack; 3]> = vec![Default::default(); element_count];

    let mut ordered: Vec<_> = animation.keyframes.iter().collect();
    ordered.sort_by_key(|keyframe| keyframe.frame);
    for keyframe in ordered {
        for (name, kfe) in &keyframe.elements {
            let Some(index) = shape.element_index(name) else {
                log::debug!(
                    "animation '{}' keys unknown element '{}', skipping",
                    animation.code,
                    name
                );
                continue;
            };
            for (slot, channel) in Channel::ALL.into_iter().enumerate() {
                if let Some(value) = kfe.channel(channel) {
                    tracks[index][slot].push((keyframe.frame, value));
                }
            }
        }
    }

    let q = animation.quantity_frames;
    let mut frames = Vec::with_capacity(q as usize);
    for tick in 0..q {
        let mut poses = Vec::with_capacity(element_count);
        for element_tracks in &tracks {
            let mut pose = ElementPose::default();
            if let Some(v) = sample_channel(&element_tracks[0], tick, q) {
                pose.translation = v;
            }
            if let Some(v) = sample_channel(&element_tracks[1], tick, q) {
                pose.rotation = v;
            }
            if let Some(v) = sample_channel(&element_tracks[2], tick, q) {
                // Authored scale is an absolute multiplier; the baked pose
                // keeps the delta from 1.0 so blending composes correctly.
                pose.scale_delta = [v[0] - 1.0, v[1] - 1.0, v[2] - 1.0];
            }
            poses.push(pose);
        }

        let mut joints = vec![Mat4::IDENTITY; shape.joint_array_len()];
        let mut written = vec![false; shape.joint_array_len()];
        compose_joints(
            shape.roots(),
            shape,
            &poses,
            Mat4::IDENTITY,
            &mut joints,
            &mut written,
        );
        frames.push(BakedFrame { poses, joints });
    }

    Ok(BakedAnimation {
        code: animation.code.clone(),
        version: animation.version,
        quantity_frames: q,
        on_end: animation.on_end,
        on_activity_stopped: animation.on_activity_stopped,
        ease_animation_speed: animation.ease_animation_speed,
        frames,
    })
}

/// Resolve one channel at `tick` from its sorted keyframe track.
///
/// The "next" keyframe is the first at or after the tick, wrapping to the
/// track's first entry past the clip end; "previous" is its cyclic
/// predecessor. The interpolation fraction accounts for the wrapped span.
fn sample_channel(track: &ChannelTrack, tick: u32, q: u32) -> Option<[f32; 3]> {
    let (first, rest) = track.split_first()?;
    if rest.is_empty() {
        return Some(first.1);
    }

    let next_index = track
        .iter()
        .position(|(t, _)| *t >= tick)
        .unwrap_or(0);
    let prev_index = (next_index + track.len() - 1) % track.len();
    let (next_tick, next_value) = track[next_index];
    let (prev_tick, prev_value) = track[prev_index];

    let span = (next_tick + q - prev_tick) % q;
    if span == 0 {
        return Some(prev_value);
    }
    let offset = (tick + q - prev_tick) % q;
    let t = offset as f32 / span as f32;
    Some([
        prev_value[0] + (next_value[0] - prev_value[0]) * t,
        prev_value[1] + (next_value[1] - prev_value[1]) * t,
        prev_value[2] + (next_value[2] - prev_value[2]) * t,
    ])
}

/// Recursive matrix pass: compose each element's local transform into the
/// parent's model matrix; the first element owning a joint id stores
/// `model * inverse_bind` into that joint's slot.
fn compose_joints(
    elements: &[Element],
    shape: &Shape,
    poses: &[ElementPose],
    parent: Mat4,
    joints: &mut [Mat4],
    written: &mut [bool],
) {
    for element in elements {
        let index = element.index();
        let pose = poses.get(index).copied().unwrap_or_default();
        let model = parent * element.local_transform(&pose);

        let joint = element.joint_id as usize;
        if joint > 0 && joint < joints.len() && !written[joint] {
            joints[joint] = model * shape.inverse_bind(index);
            written[joint] = true;
        }

        compose_joints(&element.children, shape, poses, model, joints, written);
    }
}

//! Per-entity animator — advances every running animation and blends them
//! over the element tree into the final joint matrix array

use crate::bake::BakedAnimation;
use crate::compose::ComposeStrategy;
use crate::events::{AnimationEvent, ObserverHandle, Observers};
use crate::meta::{AnimationMetadata, BlendMode};
use crate::running::{Progress, RunningAnimation};
use crate::{MAX_CONCURRENT_ANIMATIONS, WEIGHT_CAP_FACTOR};
use ember_shape::{Element, ElementPose, Shape};
use glam::Mat4;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Owns one [`RunningAnimation`] per animation the skeleton supports and,
/// each tick, blends every active one into the final joint matrix array.
///
/// One animator per skeletal entity; all state is touched by exactly one
/// thread per tick. Baked animation data is shared read-only via `Arc`.
pub struct Animator {
    shape: Arc<Shape>,
    anims: Vec<RunningAnimation>,
    codes: HashMap<String, usize>,
    walk_speed: f32,
    strategy: Box<dyn ComposeStrategy>,
    /// Finalized skinning matrices, densely indexed by joint id
    joint_matrices: Vec<Mat4>,
    joint_written: Vec<bool>,
    /// Animated model matrix per element index, refreshed each tick
    model_matrices: Vec<Mat4>,
    /// Last blended local pose per element index
    blended_poses: Vec<ElementPose>,
    /// Reused each tick; indices into `anims`
    blend_set: Vec<usize>,
    /// (code, element index, point-local transform) for every attachment
    /// point the shape declares
    attachment_points: Vec<(String, usize, Mat4)>,
    attachment_poses: HashMap<String, Mat4>,
    observers: Observers,
    warned_codes: HashSet<String>,
    label: String,
}

impl Animator {
    pub fn new(
        shape: Arc<Shape>,
        animations: impl IntoIterator<Item = Arc<BakedAnimation>>,
        strategy: Box<dyn ComposeStrategy>,
    ) -> Self {
        let mut anims = Vec::new();
        let mut codes = HashMap::new();
        for animation in animations {
            if codes.contains_key(&animation.code) {
                log::debug!("shape '{}': duplicate animation code '{}'", shape.name(), animation.code);
                continue;
            }
            codes.insert(animation.code.clone(), anims.len());
            anims.push(RunningAnimation::new(animation));
        }

        let mut attachment_points = Vec::new();
        collect_attachment_points(shape.roots(), &mut attachment_points);
        let attachment_poses = attachment_points
            .iter()
            .map(|(code, _, _)| (code.clone(), Mat4::IDENTITY))
            .collect();

        let label = shape.name().to_string();
        Self {
            joint_matrices: vec![Mat4::IDENTITY; shape.joint_array_len()],
            joint_written: vec![false; shape.joint_array_len()],
            model_matrices: vec![Mat4::IDENTITY; shape.element_count()],
            blended_poses: vec![ElementPose::default(); shape.element_count()],
            blend_set: Vec::with_capacity(MAX_CONCURRENT_ANIMATIONS),
            attachment_points,
            attachment_poses,
            anims,
            codes,
            walk_speed: 1.0,
            strategy,
            observers: Observers::new(),
            warned_codes: HashSet::new(),
            label,
            shape,
        }
    }

    /// Label used in log lines, e.g. the entity type. Defaults to the shape
    /// name.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    /// Entity walk speed applied to animations opting into
    /// `mul_with_walk_speed`.
    pub fn set_walk_speed(&mut self, walk_speed: f32) {
        self.walk_speed = walk_speed;
    }

    pub fn register_observer(
        &mut self,
        handler: Box<dyn FnMut(&AnimationEvent)>,
    ) -> ObserverHandle {
        self.observers.register(handler)
    }

    pub fn unregister_observer(&mut self, handle: ObserverHandle) -> bool {
        self.observers.unregister(handle)
    }

    /// Run one tick: reconcile the caller's active-animation map against the
    /// running set, advance every cursor, and rebuild the joint matrices.
    ///
    /// The map is mutated in two cases: unknown codes are dropped (warned
    /// once per code), and animations whose end-of-clip policy is `Stop`
    /// remove their own code when they finish.
    pub fn on_frame(&mut self, active: &mut HashMap<String, AnimationMetadata>, dt: f32) {
        // Newly requested codes become active
        let mut unknown: Vec<String> = Vec::new();
        for (code, meta) in active.iter() {
            match self.codes.get(code).copied() {
                Some(slot) => {
                    if !self.anims[slot].active {
                        self.anims[slot].activate(&self.shape, meta.clone());
                        self.observers
                            .emit(&AnimationEvent::Started { code: code.clone() });
                    }
                }
                None => unknown.push(code.clone()),
            }
        }
        for code in unknown {
            if self.warned_codes.insert(code.clone()) {
                log::warn!(
                    "animator '{}': request for unknown animation code '{code}'",
                    self.label
                );
            }
            active.remove(&code);
        }

        // Codes no longer requested transition per their stop policy
        for slot in 0..self.anims.len() {
            if self.anims[slot].active && !active.contains_key(self.anims[slot].code()) {
                let stopped_immediately = self.anims[slot].deactivate();
                if stopped_immediately {
                    let code = self.anims[slot].code().to_string();
                    self.observers.emit(&AnimationEvent::Stopped { code });
                }
            }
        }

        // Advance cursors, gathering this tick's blend set
        self.blend_set.clear();
        for slot in 0..self.anims.len() {
            if !self.anims[slot].running {
                continue;
            }
            match self.anims[slot].progress(dt, self.walk_speed) {
                Progress::Playing => {
                    if self.blend_set.len() < MAX_CONCURRENT_ANIMATIONS {
                        self.blend_set.push(slot);
                    } else {
                        log::debug!(
                            "animator '{}': concurrent cap reached, '{}' skipped this tick",
                            self.label,
                            self.anims[slot].code()
                        );
                    }
                }
                Progress::Stopped => {
                    let code = self.anims[slot].code().to_string();
                    // A fully stopped animation also leaves the code set,
                    // or a finished end-of-clip ease-out would reactivate
                    active.remove(&code);
                    self.observers.emit(&AnimationEvent::Stopped { code });
                }
                Progress::StoppedRemove => {
                    let code = self.anims[slot].code().to_string();
                    active.remove(&code);
                    self.observers.emit(&AnimationEvent::Stopped { code });
                }
            }
        }

        // The blend pass proper
        self.joint_written.fill(false);
        let shape = Arc::clone(&self.shape);
        let mut pass = BlendPass {
            shape: &shape,
            anims: &self.anims,
            blend_set: &self.blend_set,
            strategy: self.strategy.as_ref(),
            joints: &mut self.joint_matrices,
            joint_written: &mut self.joint_written,
            models: &mut self.model_matrices,
            poses: &mut self.blended_poses,
        };
        for root in shape.roots() {
            blend_element(&mut pass, root, Mat4::IDENTITY);
        }

        // Orphaned joint slots must never carry stale data
        for (slot, written) in self.joint_written.iter().enumerate() {
            if !*written {
                self.joint_matrices[slot] = Mat4::IDENTITY;
            }
        }

        self.refresh_attachment_poses();
    }

    /// Finalized joint matrices for the skinning stage, indexed by joint id.
    pub fn joint_matrices(&self) -> &[Mat4] {
        &self.joint_matrices
    }

    /// Animated model matrix of an element, as of the last tick.
    pub fn model_matrix(&self, element_index: usize) -> Option<Mat4> {
        self.model_matrices.get(element_index).copied()
    }

    /// Blended local pose of an element, as of the last tick.
    pub fn blended_pose(&self, element_index: usize) -> Option<ElementPose> {
        self.blended_poses.get(element_index).copied()
    }

    /// Current animated pose of a named attachment point.
    pub fn attachment_point_pose(&self, code: &str) -> Option<Mat4> {
        self.attachment_poses.get(code).copied()
    }

    pub fn running_animation(&self, code: &str) -> Option<&RunningAnimation> {
        self.codes.get(code).map(|&slot| &self.anims[slot])
    }

    pub(crate) fn running_animation_mut(&mut self, code: &str) -> Option<&mut RunningAnimation> {
        let slot = *self.codes.get(code)?;
        self.anims.get_mut(slot)
    }

    pub(crate) fn running_animations(&self) -> &[RunningAnimation] {
        &self.anims
    }

    pub fn is_active(&self, code: &str) -> bool {
        self.running_animation(code).is_some_and(|anim| anim.active)
    }

    /// Override one element's blended pose and rebuild its subtree's model
    /// and joint matrices with the same parent-carry technique as the main
    /// blend. Used by controllers that re-orient single joints after
    /// blending, e.g. head look.
    pub fn repose_element(&mut self, element_index: usize, pose: ElementPose) {
        if element_index >= self.blended_poses.len() {
            return;
        }
        self.blended_poses[element_index] = pose;

        let shape = Arc::clone(&self.shape);
        let Some(element) = shape.element_by_index(element_index) else {
            return;
        };
        let parent = shape
            .parent(element_index)
            .and_then(|p| self.model_matrices.get(p).copied())
            .unwrap_or(Mat4::IDENTITY);

        recompose_element(
            &shape,
            self.strategy.as_ref(),
            &self.blended_poses,
            &mut self.model_matrices,
            &mut self.joint_matrices,
            element,
            parent,
        );
        self.refresh_attachment_poses();
    }

    fn refresh_attachment_poses(&mut self) {
        for (code, element_index, local) in &self.attachment_points {
            if let Some(pose) = self.attachment_poses.get_mut(code) {
                if let Some(model) = self.model_matrices.get(*element_index) {
                    *pose = *model * *local;
                }
            }
        }
    }
}

fn collect_attachment_points(elements: &[Element], out: &mut Vec<(String, usize, Mat4)>) {
    for element in elements {
        for point in &element.attachment_points {
            out.push((point.code.clone(), element.index(), point.local_transform()));
        }
        collect_attachment_points(&element.children, out);
    }
}

struct BlendPass<'a> {
    shape: &'a Shape,
    anims: &'a [RunningAnimation],
    blend_set: &'a [usize],
    strategy: &'a dyn ComposeStrategy,
    joints: &'a mut [Mat4],
    joint_written: &'a mut [bool],
    models: &'a mut [Mat4],
    poses: &'a mut [ElementPose],
}

/// Blended contribution weight for one animation at one element.
///
/// Average/AddAverage normalize against `weight_sum / element_weight`, not
/// `weight_sum`; the divisor is intentional, see DESIGN.md before changing
/// it. A zero weight sum or zero element weight falls back to the raw
/// easing factor instead of dividing.
fn blend_weight(easing: f32, element_weight: f32, mode: BlendMode, weight_sum: f32) -> f32 {
    match mode {
        BlendMode::Add => easing,
        BlendMode::Average | BlendMode::AddAverage => {
            if weight_sum <= 0.0 || element_weight <= 0.0 {
                easing.clamp(0.0, 1.0)
            } else {
                (easing / (weight_sum / element_weight).max(WEIGHT_CAP_FACTOR)).clamp(0.0, 1.0)
            }
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn blend_element(pass: &mut BlendPass<'_>, element: &Element, parent: Mat4) {
    let index = element.index();

    let mut weight_sum = 0.0;
    for &slot in pass.blend_set {
        let (weight, mode) = pass.anims[slot].element_blend(index);
        if mode != BlendMode::Add && weight > 0.0 {
            weight_sum += weight;
        }
    }

    let mut accumulated = ElementPose::default();
    let mut contributed = false;
    let mut missing = false;
    for &slot in pass.blend_set {
        let anim = &pass.anims[slot];
        let (weight, mode) = anim.element_blend(index);
        let blended = blend_weight(anim.easing_factor, weight, mode, weight_sum);
        if blended <= 0.0 {
            continue;
        }

        let (prev_tick, next_tick, frac) = anim.bracketing_frames();
        let (Some(prev), Some(next)) = (anim.animation.frame(prev_tick), anim.animation.frame(next_tick))
        else {
            missing = true;
            continue;
        };
        let (Some(p0), Some(p1)) = (prev.poses.get(index), next.poses.get(index)) else {
            missing = true;
            continue;
        };

        for axis in 0..3 {
            accumulated.translation[axis] +=
                lerp(p0.translation[axis], p1.translation[axis], frac) * blended;
            accumulated.rotation[axis] += lerp(p0.rotation[axis], p1.rotation[axis], frac) * blended;
            accumulated.scale_delta[axis] +=
                lerp(p0.scale_delta[axis], p1.scale_delta[axis], frac) * blended;
        }
        contributed = true;
    }
    if !contributed && missing {
        // Pose data unavailable this tick; hold the previous blend
        accumulated = pass.poses[index];
    }

    pass.poses[index] = accumulated;
    let model = pass.strategy.compose(element, &accumulated, &parent);
    pass.models[index] = model;

    let joint = element.joint_id as usize;
    if joint > 0 && joint < pass.joints.len() && !pass.joint_written[joint] {
        pass.joints[joint] = model * pass.shape.inverse_bind(index);
        pass.joint_written[joint] = true;
    }

    for child in &element.children {
        blend_element(pass, child, model);
    }
}

fn recompose_element(
    shape: &Shape,
    strategy: &dyn ComposeStrategy,
    poses: &[ElementPose],
    models: &mut [Mat4],
    joints: &mut [Mat4],
    element: &Element,
    parent: Mat4,
) {
    let index = element.index();
    let pose = poses.get(index).copied().unwrap_or_default();
    let model = strategy.compose(element, &pose, &parent);
    if let Some(slot) = models.get_mut(index) {
        *slot = model;
    }

    let joint = element.joint_id as usize;
    if joint > 0 && joint < joints.len() {
        joints[joint] = model * shape.inverse_bind(index);
    }

    for child in &element.children {
        recompose_element(shape, strategy, poses, models, joints, child, model);
    }
}

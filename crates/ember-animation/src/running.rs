//! Per-instance playback state machine for one compiled animation

use crate::bake::BakedAnimation;
use crate::clip::{OnActivityStopped, OnAnimationEnd};
use crate::meta::{AnimationMetadata, BlendMode};
use crate::{EASING_EPSILON, FRAMES_PER_SECOND};
use ember_shape::{Element, Shape};
use std::sync::Arc;

/// Outcome of one `progress` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Still running; contributes to this tick's blend
    Playing,
    /// Transitioned to idle this tick
    Stopped,
    /// Transitioned to idle and the caller must drop the code from its
    /// active-animation map (end-of-clip policy `Stop`)
    StoppedRemove,
}

/// One mutable playback instance binding a compiled animation to a skeleton
/// instance: fractional cursor, signed iteration counter, easing factor and
/// the active/running flag pair.
///
/// `active` tracks whether game logic still requests the animation;
/// `running` tracks whether the cursor still needs progression, which can
/// outlive `active` during ease-out, rewind, or play-till-end.
pub struct RunningAnimation {
    pub animation: Arc<BakedAnimation>,
    pub meta: AnimationMetadata,
    /// Fractional tick position, always in [0, Q)
    pub current_frame: f32,
    /// Completed iterations; the sign records play direction history
    pub iterations: i32,
    /// Fades contribution in toward 1 and out toward 0
    pub easing_factor: f32,
    pub active: bool,
    pub running: bool,
    rewinding: bool,
    /// Set when an `OnAnimationEnd::EaseOut` clip reached its boundary
    fading_at_end: bool,
    /// (weight, blend mode) per element index, resolved from metadata on
    /// activation
    element_table: Option<Vec<(f32, BlendMode)>>,
}

impl RunningAnimation {
    pub fn new(animation: Arc<BakedAnimation>) -> Self {
        let meta = AnimationMetadata::new(animation.code.clone());
        Self {
            animation,
            meta,
            current_frame: 0.0,
            iterations: 0,
            easing_factor: 0.0,
            active: false,
            running: false,
            rewinding: false,
            fading_at_end: false,
            element_table: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.animation.code
    }

    /// Begin playback from a fresh activation request.
    pub fn activate(&mut self, shape: &Shape, mut meta: AnimationMetadata) {
        let q = self.animation.quantity_frames as f32;
        let start = meta.start_frame_once.take().unwrap_or(0.0);

        self.current_frame = start.rem_euclid(q);
        self.iterations = 0;
        self.easing_factor = 0.0;
        self.active = true;
        self.running = true;
        self.rewinding = false;
        self.fading_at_end = false;
        self.element_table = Some(resolve_element_table(shape, &meta));
        self.meta = meta;
    }

    /// Game logic no longer requests this animation; branch by stop policy.
    /// Returns true if the animation stopped immediately.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        match self.animation.on_activity_stopped {
            OnActivityStopped::Stop => {
                self.halt();
                true
            }
            OnActivityStopped::Rewind => {
                self.rewinding = true;
                false
            }
            OnActivityStopped::PlayTillEnd | OnActivityStopped::EaseOut => false,
        }
    }

    /// Force the state machine back to idle, keeping the cursor position.
    pub fn halt(&mut self) {
        self.active = false;
        self.running = false;
        self.easing_factor = 0.0;
        self.rewinding = false;
        self.fading_at_end = false;
    }

    /// Advance the cursor by one tick delta.
    ///
    /// `walk_speed` only applies when the metadata opts in via
    /// `mul_with_walk_speed`.
    pub fn progress(&mut self, dt: f32, walk_speed: f32) -> Progress {
        if !self.running {
            return Progress::Stopped;
        }

        let q = self.animation.quantity_frames as f32;
        let mut dt_eff = dt * self.meta.animation_speed;
        if self.meta.mul_with_walk_speed {
            dt_eff *= walk_speed;
        }

        let fading_out = self.fading_at_end
            || (!self.active
                && matches!(
                    self.animation.on_activity_stopped,
                    OnActivityStopped::EaseOut | OnActivityStopped::Rewind
                ));
        if fading_out {
            self.easing_factor -= self.easing_factor * (dt_eff * self.meta.ease_out_speed).min(1.0);
            if self.easing_factor < EASING_EPSILON {
                self.halt();
                return Progress::Stopped;
            }
        } else {
            self.easing_factor += (1.0 - self.easing_factor) * (dt_eff * self.meta.ease_in_speed).min(1.0);
            self.easing_factor = self.easing_factor.min(1.0);
        }

        let direction = if self.rewinding { -1.0 } else { 1.0 };
        let speed_easing = if self.animation.ease_animation_speed {
            self.easing_factor
        } else {
            1.0
        };
        let mut next = self.current_frame + FRAMES_PER_SECOND * direction * dt_eff * speed_easing;

        if next >= q {
            let finishing = !self.active
                && self.animation.on_activity_stopped == OnActivityStopped::PlayTillEnd;
            match self.animation.on_end {
                OnAnimationEnd::Repeat => {
                    if finishing {
                        self.current_frame = q - 1.0;
                        self.halt();
                        return Progress::Stopped;
                    }
                    self.iterations += (next / q).floor() as i32;
                    next = next.rem_euclid(q);
                }
                OnAnimationEnd::Hold => {
                    next = q - 1.0;
                    if self.iterations == 0 {
                        self.iterations = 1;
                    }
                    if finishing {
                        self.current_frame = next;
                        self.halt();
                        return Progress::Stopped;
                    }
                }
                OnAnimationEnd::Stop => {
                    self.current_frame = q - 1.0;
                    if self.iterations == 0 {
                        self.iterations = 1;
                    }
                    self.halt();
                    return Progress::StoppedRemove;
                }
                OnAnimationEnd::EaseOut => {
                    next = q - 1.0;
                    if self.iterations == 0 {
                        self.iterations = 1;
                    }
                    self.fading_at_end = true;
                    if finishing {
                        self.current_frame = next;
                        self.halt();
                        return Progress::Stopped;
                    }
                }
            }
        } else if next <= 0.0 {
            if self.rewinding {
                // Rewind reached the start of the clip
                self.current_frame = 0.0;
                self.halt();
                return Progress::Stopped;
            }
            if next < 0.0 {
                match self.animation.on_end {
                    OnAnimationEnd::Repeat => {
                        self.iterations -= (-next / q).floor() as i32 + 1;
                        next = next.rem_euclid(q);
                    }
                    _ => next = 0.0,
                }
            }
        }

        self.current_frame = next;
        Progress::Playing
    }

    /// Baked tick indices bracketing the fractional cursor, plus the
    /// fraction between them. The "next" tick wraps to 0 past the clip end.
    pub fn bracketing_frames(&self) -> (usize, usize, f32) {
        let q = self.animation.quantity_frames as usize;
        let prev = (self.current_frame.floor() as usize).min(q.saturating_sub(1));
        let next = (prev + 1) % q.max(1);
        let frac = self.current_frame - self.current_frame.floor();
        (prev, next, frac)
    }

    /// Resolved (weight, blend mode) for an element index.
    pub fn element_blend(&self, index: usize) -> (f32, BlendMode) {
        self.element_table
            .as_ref()
            .and_then(|table| table.get(index).copied())
            .unwrap_or((self.meta.weight, self.meta.blend_mode))
    }
}

fn resolve_element_table(shape: &Shape, meta: &AnimationMetadata) -> Vec<(f32, BlendMode)> {
    let mut table = Vec::with_capacity(shape.element_count());
    fill_table(shape.roots(), meta, &mut table);
    table
}

// Preorder matches element index order, so pushing during the walk lines up.
fn fill_table(elements: &[Element], meta: &AnimationMetadata, table: &mut Vec<(f32, BlendMode)>) {
    for element in elements {
        let weight = meta
            .element_weights
            .get(&element.name)
            .copied()
            .unwrap_or(meta.weight);
        let mode = meta
            .element_blend_modes
            .get(&element.name)
            .copied()
            .unwrap_or(meta.blend_mode);
        table.push((weight, mode));
        fill_table(&element.children, meta, table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::compile;
    use crate::clip::Animation;
    use crate::keyframe::{Keyframe, KeyframeElement};
    use std::collections::HashMap;

    const DT: f32 = 1.0 / 30.0;

    fn shape() -> Shape {
        let mut root = Element::new("body");
        root.joint_id = 1;
        Shape::new("rig", vec![root]).unwrap()
    }

    fn baked(q: u32, on_end: OnAnimationEnd, on_stopped: OnActivityStopped) -> Arc<BakedAnimation> {
        let mut elements = HashMap::new();
        elements.insert("body".to_string(), KeyframeElement::default());
        let clip = Animation {
            code: "test".into(),
            version: 0,
            quantity_frames: q,
            keyframes: vec![Keyframe { frame: 0, elements }],
            on_end,
            on_activity_stopped: on_stopped,
            ease_animation_speed: false,
        };
        Arc::new(compile(&clip, &shape()).unwrap())
    }

    fn started(
        q: u32,
        on_end: OnAnimationEnd,
        on_stopped: OnActivityStopped,
    ) -> RunningAnimation {
        let s = shape();
        let mut run = RunningAnimation::new(baked(q, on_end, on_stopped));
        run.activate(&s, AnimationMetadata::new("test"));
        run
    }

    #[test]
    fn one_tick_advances_one_frame_at_unit_speed() {
        let mut run = started(30, OnAnimationEnd::Repeat, OnActivityStopped::EaseOut);
        assert_eq!(run.progress(DT, 1.0), Progress::Playing);
        assert!((run.current_frame - 1.0).abs() < 1e-4);
    }

    #[test]
    fn repeat_wraps_and_counts_iterations() {
        let mut run = started(5, OnAnimationEnd::Repeat, OnActivityStopped::EaseOut);
        for _ in 0..12 {
            run.progress(DT, 1.0);
        }
        assert_eq!(run.iterations, 2);
        assert!((run.current_frame - 2.0).abs() < 1e-3);
        assert!(run.active && run.running);
    }

    #[test]
    fn hold_freezes_at_last_tick_with_single_iteration() {
        let mut run = started(5, OnAnimationEnd::Hold, OnActivityStopped::EaseOut);
        for _ in 0..12 {
            assert_eq!(run.progress(DT, 1.0), Progress::Playing);
        }
        assert_eq!(run.current_frame, 4.0);
        assert_eq!(run.iterations, 1);
        assert!(run.active && run.running);
    }

    #[test]
    fn stop_at_end_requests_removal() {
        let mut run = started(5, OnAnimationEnd::Stop, OnActivityStopped::EaseOut);
        let mut outcome = Progress::Playing;
        for _ in 0..12 {
            outcome = run.progress(DT, 1.0);
            if outcome != Progress::Playing {
                break;
            }
        }
        assert_eq!(outcome, Progress::StoppedRemove);
        assert!(!run.active && !run.running);
        assert_eq!(run.current_frame, 4.0);
    }

    #[test]
    fn ease_out_at_end_fades_then_stops() {
        let mut run = started(5, OnAnimationEnd::EaseOut, OnActivityStopped::EaseOut);
        let mut stopped = false;
        for _ in 0..600 {
            if run.progress(DT, 1.0) == Progress::Stopped {
                stopped = true;
                break;
            }
        }
        assert!(stopped, "easing factor never decayed below epsilon");
        assert!(!run.running);
        assert!(run.easing_factor < EASING_EPSILON);
    }

    #[test]
    fn deactivate_with_stop_halts_immediately() {
        let mut run = started(30, OnAnimationEnd::Repeat, OnActivityStopped::Stop);
        run.progress(DT, 1.0);
        assert!(run.deactivate());
        assert!(!run.active && !run.running);
        assert_eq!(run.easing_factor, 0.0);
    }

    #[test]
    fn deactivate_with_ease_out_fades_before_stopping() {
        let mut run = started(30, OnAnimationEnd::Repeat, OnActivityStopped::EaseOut);
        for _ in 0..5 {
            run.progress(DT, 1.0);
        }
        assert!(!run.deactivate());
        assert!(run.running);
        let mut stopped = false;
        for _ in 0..600 {
            if run.progress(DT, 1.0) == Progress::Stopped {
                stopped = true;
                break;
            }
        }
        assert!(stopped);
        assert!(!run.running && !run.active);
    }

    #[test]
    fn deactivate_with_rewind_plays_backwards() {
        let mut run = started(30, OnAnimationEnd::Repeat, OnActivityStopped::Rewind);
        // ease_out_speed of 0 keeps the easing factor from decaying, so the
        // rewind must terminate at the clip start instead
        run.meta.ease_out_speed = 0.0;
        for _ in 0..5 {
            run.progress(DT, 1.0);
        }
        let before = run.current_frame;
        run.deactivate();
        run.progress(DT, 1.0);
        assert!(run.current_frame < before);
        for _ in 0..20 {
            run.progress(DT, 1.0);
        }
        assert!(!run.running);
        assert_eq!(run.current_frame, 0.0);
    }

    #[test]
    fn deactivate_with_play_till_end_finishes_iteration() {
        let mut run = started(5, OnAnimationEnd::Repeat, OnActivityStopped::PlayTillEnd);
        run.progress(DT, 1.0);
        run.deactivate();
        assert!(run.running);
        let mut outcome = Progress::Playing;
        for _ in 0..12 {
            outcome = run.progress(DT, 1.0);
            if outcome != Progress::Playing {
                break;
            }
        }
        assert_eq!(outcome, Progress::Stopped);
        assert!(!run.running);
        assert_eq!(run.current_frame, 4.0);
    }

    #[test]
    fn easing_factor_ramps_toward_one_while_active() {
        let mut run = started(30, OnAnimationEnd::Repeat, OnActivityStopped::EaseOut);
        let mut last = run.easing_factor;
        for _ in 0..20 {
            run.progress(DT, 1.0);
            assert!(run.easing_factor >= last);
            last = run.easing_factor;
        }
        assert!(run.easing_factor > 0.9);
        assert!(run.easing_factor <= 1.0);
    }

    #[test]
    fn speed_following_easing_slows_early_playback() {
        let s = shape();
        let mut elements = HashMap::new();
        elements.insert("body".to_string(), KeyframeElement::default());
        let clip = Animation {
            code: "eased".into(),
            version: 0,
            quantity_frames: 30,
            keyframes: vec![Keyframe { frame: 0, elements }],
            on_end: OnAnimationEnd::Repeat,
            on_activity_stopped: OnActivityStopped::EaseOut,
            ease_animation_speed: true,
        };
        let mut run = RunningAnimation::new(Arc::new(compile(&clip, &s).unwrap()));
        run.activate(&s, AnimationMetadata::new("eased"));
        run.progress(DT, 1.0);
        // With the easing factor still well below 1, less than a full frame
        // has elapsed.
        assert!(run.current_frame < 1.0);
        assert!(run.current_frame > 0.0);
    }

    #[test]
    fn walk_speed_scales_progress_only_when_opted_in() {
        let mut run = started(30, OnAnimationEnd::Repeat, OnActivityStopped::EaseOut);
        run.progress(DT, 2.0);
        assert!((run.current_frame - 1.0).abs() < 1e-4);

        let s = shape();
        let mut opted = started(30, OnAnimationEnd::Repeat, OnActivityStopped::EaseOut);
        let mut meta = AnimationMetadata::new("test");
        meta.mul_with_walk_speed = true;
        opted.activate(&s, meta);
        opted.progress(DT, 2.0);
        assert!((opted.current_frame - 2.0).abs() < 1e-4);
    }

    #[test]
    fn start_frame_is_consumed_once() {
        let s = shape();
        let mut run = RunningAnimation::new(baked(
            30,
            OnAnimationEnd::Repeat,
            OnActivityStopped::EaseOut,
        ));
        run.activate(&s, AnimationMetadata::new("test").with_start_frame(12.0));
        assert_eq!(run.current_frame, 12.0);
        assert!(run.meta.start_frame_once.is_none());
    }

    #[test]
    fn element_table_resolves_overrides_by_name() {
        let mut root = Element::new("body");
        let arm = Element::new("arm");
        root.children.push(arm);
        let s = Shape::new("rig", vec![root]).unwrap();

        let mut elements = HashMap::new();
        elements.insert("body".to_string(), KeyframeElement::default());
        let clip = Animation {
            code: "test".into(),
            version: 0,
            quantity_frames: 4,
            keyframes: vec![Keyframe { frame: 0, elements }],
            on_end: OnAnimationEnd::Repeat,
            on_activity_stopped: OnActivityStopped::EaseOut,
            ease_animation_speed: false,
        };
        let mut run = RunningAnimation::new(Arc::new(compile(&clip, &s).unwrap()));
        run.activate(
            &s,
            AnimationMetadata::new("test")
                .with_weight(2.0)
                .with_element_weight("arm", 0.25)
                .with_element_blend_mode("arm", BlendMode::Add),
        );

        assert_eq!(run.element_blend(0), (2.0, BlendMode::Average));
        assert_eq!(run.element_blend(1), (0.25, BlendMode::Add));
    }
}

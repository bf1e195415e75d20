//! Head-look controller — re-orients head joints after the main blend

use crate::animator::Animator;
use ember_shape::Shape;

/// Applies a look direction to a head element (and optionally a fraction to
/// a neck element) on top of whatever the blend produced this tick.
///
/// Runs after `Animator::on_frame`; it only rebuilds the affected
/// sub-chains, carrying the parent model matrix the same way the main blend
/// does. Because the blend recomputes every pose from scratch each tick,
/// the look rotation never accumulates across frames.
pub struct HeadController {
    /// Look yaw in degrees, about the Y axis
    pub yaw: f32,
    /// Look pitch in degrees, about the X axis
    pub pitch: f32,
    head_index: usize,
    neck: Option<(usize, f32)>,
}

impl HeadController {
    /// Returns `None` if the shape has no element with the given name.
    pub fn new(shape: &Shape, head_element: &str) -> Option<Self> {
        Some(Self {
            yaw: 0.0,
            pitch: 0.0,
            head_index: shape.element_index(head_element)?,
            neck: None,
        })
    }

    /// Route `follow` (0..1) of the look rotation through a neck element;
    /// the head receives the remainder.
    pub fn with_neck(mut self, shape: &Shape, neck_element: &str, follow: f32) -> Self {
        if let Some(index) = shape.element_index(neck_element) {
            self.neck = Some((index, follow.clamp(0.0, 1.0)));
        }
        self
    }

    /// Re-derive the controlled joints from this tick's blended poses plus
    /// the current look angles.
    pub fn apply(&self, animator: &mut Animator) {
        let neck_follow = self.neck.map(|(_, follow)| follow).unwrap_or(0.0);

        if let Some((neck_index, follow)) = self.neck {
            if let Some(mut pose) = animator.blended_pose(neck_index) {
                pose.rotation[0] += self.pitch * follow;
                pose.rotation[1] += self.yaw * follow;
                animator.repose_element(neck_index, pose);
            }
        }

        let head_share = 1.0 - neck_follow;
        if let Some(mut pose) = animator.blended_pose(self.head_index) {
            pose.rotation[0] += self.pitch * head_share;
            pose.rotation[1] += self.yaw * head_share;
            animator.repose_element(self.head_index, pose);
        }
    }
}

//! Skeleton elements — bind-pose transforms, joint ids, attachment points

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// A named point on an element that other objects can attach to
/// (held items, particle emitters, riders).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPoint {
    /// Stable identifier, e.g. "RightHand"
    pub code: String,
    /// Offset from the element origin
    #[serde(default)]
    pub offset: [f32; 3],
    /// Local rotation in Euler degrees
    #[serde(default)]
    pub rotation: [f32; 3],
}

impl AttachmentPoint {
    /// Local transform of this point relative to its owning element.
    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_translation(Vec3::from(self.offset))
            * Mat4::from_rotation_x(self.rotation[0].to_radians())
            * Mat4::from_rotation_y(self.rotation[1].to_radians())
            * Mat4::from_rotation_z(self.rotation[2].to_radians())
    }
}

/// An animated pose delta for one element at one instant.
///
/// Values are relative to the element's bind pose: translation and rotation
/// (degrees) are added, scale is a delta from 1.0 so that "no scaling"
/// contributes zero when poses from several animations are summed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementPose {
    pub translation: [f32; 3],
    /// Euler degrees, applied X then Y then Z
    pub rotation: [f32; 3],
    /// Delta from 1.0 per axis
    pub scale_delta: [f32; 3],
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// A node in the static skeleton tree (a bone).
///
/// Immutable after shape load. The bind pose is offset + rotation + scale
/// about `rotation_origin`; `joint_id` > 0 marks the element as receiving a
/// finalized skinning matrix each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    /// Translation from the parent element
    #[serde(default)]
    pub offset: [f32; 3],
    /// Bind rotation in Euler degrees, applied X then Y then Z
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    /// Point the element rotates and scales about
    #[serde(default)]
    pub rotation_origin: [f32; 3],
    /// 0 = no joint; positive ids are unique across the shape
    #[serde(default)]
    pub joint_id: u16,
    #[serde(default)]
    pub children: Vec<Element>,
    #[serde(default)]
    pub attachment_points: Vec<AttachmentPoint>,
    /// Dense preorder index, assigned by `Shape::new`
    #[serde(skip)]
    pub(crate) index: usize,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offset: [0.0; 3],
            rotation: [0.0; 3],
            scale: default_scale(),
            rotation_origin: [0.0; 3],
            joint_id: 0,
            children: Vec::new(),
            attachment_points: Vec::new(),
            index: 0,
        }
    }

    /// Dense preorder index within the owning shape.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Local transform for this element with an animated pose applied on
    /// top of the bind pose: translate, then rotate X/Y/Z and scale about
    /// the rotation origin.
    pub fn local_transform(&self, pose: &ElementPose) -> Mat4 {
        let origin = Vec3::from(self.rotation_origin);
        let offset = Vec3::from(self.offset) + Vec3::from(pose.translation);
        let scale = Vec3::from(self.scale) * (Vec3::ONE + Vec3::from(pose.scale_delta));

        Mat4::from_translation(offset + origin)
            * Mat4::from_rotation_x((self.rotation[0] + pose.rotation[0]).to_radians())
            * Mat4::from_rotation_y((self.rotation[1] + pose.rotation[1]).to_radians())
            * Mat4::from_rotation_z((self.rotation[2] + pose.rotation[2]).to_radians())
            * Mat4::from_scale(scale)
            * Mat4::from_translation(-origin)
    }

    /// Local transform at the bind pose.
    pub fn bind_transform(&self) -> Mat4 {
        self.local_transform(&ElementPose::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_transform_of_default_element_is_identity() {
        let e = Element::new("root");
        let m = e.bind_transform();
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn offset_lands_in_translation_column() {
        let mut e = Element::new("arm");
        e.offset = [1.0, 2.0, 3.0];
        let m = e.bind_transform();
        let t = m.w_axis;
        assert!((t.x - 1.0).abs() < 1e-6);
        assert!((t.y - 2.0).abs() < 1e-6);
        assert!((t.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn pose_translation_adds_to_bind_offset() {
        let mut e = Element::new("arm");
        e.offset = [1.0, 0.0, 0.0];
        let pose = ElementPose {
            translation: [0.5, 0.0, 0.0],
            ..Default::default()
        };
        let m = e.local_transform(&pose);
        assert!((m.w_axis.x - 1.5).abs() < 1e-6);
    }

    #[test]
    fn rotation_happens_about_rotation_origin() {
        // 180 degrees around Y about origin (1,0,0) maps (0,0,0) to (2,0,0)
        let mut e = Element::new("door");
        e.rotation = [0.0, 180.0, 0.0];
        e.rotation_origin = [1.0, 0.0, 0.0];
        let m = e.bind_transform();
        let p = m.transform_point3(Vec3::ZERO);
        assert!((p.x - 2.0).abs() < 1e-5, "got {p:?}");
        assert!(p.y.abs() < 1e-5);
        assert!(p.z.abs() < 1e-5);
    }

    #[test]
    fn scale_delta_composes_with_bind_scale() {
        let mut e = Element::new("big");
        e.scale = [2.0, 2.0, 2.0];
        let pose = ElementPose {
            scale_delta: [0.5, 0.5, 0.5],
            ..Default::default()
        };
        let m = e.local_transform(&pose);
        let p = m.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        // 2.0 * (1.0 + 0.5) = 3.0
        assert!((p.x - 3.0).abs() < 1e-5);
    }
}

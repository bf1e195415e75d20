//! Shape — a finalized, immutable element tree with derived lookup data

use crate::element::Element;
use ember_core::{EmberError, Result, ShapeId};
use glam::Mat4;
use std::collections::HashMap;

/// Fixed maximum joint id a shape may declare. Joint matrices are uploaded
/// as a fixed-size array, so ids must stay within this bound.
pub const MAX_JOINTS: usize = 128;

/// A compiled shape: the element hierarchy plus everything derived from it
/// at load time (dense preorder indices, cached inverse bind transforms,
/// name and attachment lookups).
///
/// Immutable after `Shape::new`. Shared between all entities using the same
/// skeleton, so all derived data is computed exactly once here.
#[derive(Debug)]
pub struct Shape {
    id: ShapeId,
    name: String,
    roots: Vec<Element>,
    element_count: usize,
    /// Inverse of the composed bind-pose model transform, per element index.
    /// Converts a model-space animated transform into joint/skinning space.
    inverse_binds: Vec<Mat4>,
    parents: Vec<Option<usize>>,
    names: HashMap<String, usize>,
    /// Child-slot chain from a root to each element, per element index
    paths: Vec<Vec<usize>>,
    /// Length of the joint matrix array (max owned joint id + 1)
    joint_array_len: usize,
    /// True for joint ids owned by some element
    owned_joints: Vec<bool>,
    /// Attachment point code -> owning element index
    attachments: HashMap<String, usize>,
}

#[derive(Default)]
struct FinalizeState {
    inverse_binds: Vec<Mat4>,
    parents: Vec<Option<usize>>,
    names: HashMap<String, usize>,
    paths: Vec<Vec<usize>>,
    joint_elements: Vec<(u16, usize)>,
    attachments: HashMap<String, usize>,
}

impl Shape {
    /// Build a shape from an authored element tree.
    ///
    /// Assigns preorder indices, validates joint ids (positive, unique,
    /// at most [`MAX_JOINTS`]) and caches each element's inverse bind
    /// transform by composing bind locals root-to-element and inverting.
    pub fn new(name: impl Into<String>, mut roots: Vec<Element>) -> Result<Self> {
        let name = name.into();
        let mut state = FinalizeState::default();
        let mut path = Vec::new();
        finalize(&name, &mut roots, None, Mat4::IDENTITY, &mut path, &mut state)?;

        let mut owned_joints = Vec::new();
        for &(joint_id, _) in &state.joint_elements {
            let jid = joint_id as usize;
            if jid >= owned_joints.len() {
                owned_joints.resize(jid + 1, false);
            }
            if owned_joints[jid] {
                return Err(EmberError::DuplicateJointId {
                    shape: name,
                    joint_id,
                });
            }
            owned_joints[jid] = true;
        }

        Ok(Self {
            id: ShapeId::new(),
            name,
            element_count: state.parents.len(),
            inverse_binds: state.inverse_binds,
            parents: state.parents,
            names: state.names,
            paths: state.paths,
            joint_array_len: owned_joints.len(),
            owned_joints,
            attachments: state.attachments,
            roots,
        })
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root elements of the hierarchy, in authored order.
    pub fn roots(&self) -> &[Element] {
        &self.roots
    }

    /// Total number of elements in the tree.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Length of the joint matrix array (max owned joint id + 1).
    /// Slot 0 is never owned; orphaned slots stay identity.
    pub fn joint_array_len(&self) -> usize {
        self.joint_array_len
    }

    /// Whether any element owns the given joint id.
    pub fn owns_joint(&self, joint_id: u16) -> bool {
        self.owned_joints
            .get(joint_id as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Cached inverse bind transform for an element index.
    pub fn inverse_bind(&self, index: usize) -> Mat4 {
        self.inverse_binds[index]
    }

    /// Parent element index, `None` for roots.
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    pub fn element_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn element_by_index(&self, index: usize) -> Option<&Element> {
        let path = self.paths.get(index)?;
        let mut iter = path.iter();
        let mut current = self.roots.get(*iter.next()?)?;
        for &slot in iter {
            current = current.children.get(slot)?;
        }
        Some(current)
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.element_by_index(self.element_index(name)?)
    }

    /// Element indices from a root down to (and including) the element.
    /// Used to rebuild a sub-chain with the parent-carry technique.
    pub fn parent_chain(&self, index: usize) -> Vec<usize> {
        let mut chain = vec![index];
        let mut current = index;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Element index owning the named attachment point.
    pub fn attachment_element(&self, code: &str) -> Option<usize> {
        self.attachments.get(code).copied()
    }

    /// All attachment point codes declared by the shape.
    pub fn attachment_codes(&self) -> impl Iterator<Item = &str> {
        self.attachments.keys().map(|code| code.as_str())
    }
}

fn finalize(
    shape_name: &str,
    elements: &mut [Element],
    parent: Option<usize>,
    parent_bind: Mat4,
    path: &mut Vec<usize>,
    state: &mut FinalizeState,
) -> Result<()> {
    for (slot, element) in elements.iter_mut().enumerate() {
        path.push(slot);
        let index = state.parents.len();
        element.index = index;
        state.parents.push(parent);
        state.paths.push(path.clone());
        state.names.insert(element.name.clone(), index);

        if element.joint_id > 0 {
            if element.joint_id as usize > MAX_JOINTS {
                return Err(EmberError::TooManyJoints {
                    shape: shape_name.to_string(),
                    joint_id: element.joint_id,
                    max: MAX_JOINTS,
                });
            }
            state.joint_elements.push((element.joint_id, index));
        }

        for point in &element.attachment_points {
            state.attachments.insert(point.code.clone(), index);
        }

        let bind = parent_bind * element.bind_transform();
        state.inverse_binds.push(bind.inverse());

        finalize(shape_name, &mut element.children, Some(index), bind, path, state)?;
        path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::AttachmentPoint;
    use glam::Vec3;

    fn two_bone_shape() -> Shape {
        let mut root = Element::new("body");
        root.offset = [0.0, 1.0, 0.0];
        root.joint_id = 1;

        let mut head = Element::new("head");
        head.offset = [0.0, 0.5, 0.0];
        head.joint_id = 2;
        head.attachment_points.push(AttachmentPoint {
            code: "Hat".into(),
            offset: [0.0, 0.25, 0.0],
            rotation: [0.0; 3],
        });

        root.children.push(head);
        Shape::new("biped", vec![root]).unwrap()
    }

    #[test]
    fn preorder_indices_and_lookups() {
        let shape = two_bone_shape();
        assert_eq!(shape.element_count(), 2);
        assert_eq!(shape.element_index("body"), Some(0));
        assert_eq!(shape.element_index("head"), Some(1));
        assert_eq!(shape.element_by_name("head").unwrap().name, "head");
        assert_eq!(shape.parent(1), Some(0));
        assert_eq!(shape.parent(0), None);
    }

    #[test]
    fn inverse_bind_inverts_composed_bind_transform() {
        let shape = two_bone_shape();
        let head = shape.element_by_name("head").unwrap();
        let body = shape.element_by_name("body").unwrap();
        let model = body.bind_transform() * head.bind_transform();
        let product = model * shape.inverse_bind(1);
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn inverse_bind_maps_bind_head_position_to_origin() {
        let shape = two_bone_shape();
        // Head sits at (0, 1.5, 0) in bind model space
        let p = shape.inverse_bind(1).transform_point3(Vec3::new(0.0, 1.5, 0.0));
        assert!(p.length() < 1e-5, "got {p:?}");
    }

    #[test]
    fn joint_array_covers_max_id() {
        let shape = two_bone_shape();
        assert_eq!(shape.joint_array_len(), 3);
        assert!(!shape.owns_joint(0));
        assert!(shape.owns_joint(1));
        assert!(shape.owns_joint(2));
    }

    #[test]
    fn parent_chain_runs_root_to_element() {
        let shape = two_bone_shape();
        assert_eq!(shape.parent_chain(1), vec![0, 1]);
        assert_eq!(shape.parent_chain(0), vec![0]);
    }

    #[test]
    fn attachment_lookup_finds_owning_element() {
        let shape = two_bone_shape();
        assert_eq!(shape.attachment_element("Hat"), Some(1));
        assert_eq!(shape.attachment_element("Missing"), None);
    }

    #[test]
    fn duplicate_joint_id_is_rejected() {
        let mut a = Element::new("a");
        a.joint_id = 1;
        let mut b = Element::new("b");
        b.joint_id = 1;
        let err = Shape::new("bad", vec![a, b]).unwrap_err();
        assert!(matches!(err, EmberError::DuplicateJointId { joint_id: 1, .. }));
    }

    #[test]
    fn joint_id_above_maximum_is_rejected() {
        let mut a = Element::new("a");
        a.joint_id = (MAX_JOINTS + 1) as u16;
        let err = Shape::new("bad", vec![a]).unwrap_err();
        assert!(matches!(err, EmberError::TooManyJoints { .. }));
    }
}

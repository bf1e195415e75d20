//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
#[derive(Debug, Error)]
pub enum EmberError {
    #[error("Animation '{animation}' has an empty keyframe list")]
    EmptyKeyframes { animation: String },

    #[error(
        "Animation '{animation}' has a keyframe at frame {frame}, but the clip is only {quantity_frames} frames long"
    )]
    KeyframeOutOfRange {
        animation: String,
        frame: u32,
        quantity_frames: u32,
    },

    #[error("Shape '{shape}' declares joint id {joint_id}, maximum is {max}")]
    TooManyJoints {
        shape: String,
        joint_id: u16,
        max: usize,
    },

    #[error("Shape '{shape}' assigns joint id {joint_id} to more than one element")]
    DuplicateJointId { shape: String, joint_id: u16 },

    #[error("Shape error: {0}")]
    ShapeError(String),

    #[error("Animation error: {0}")]
    AnimationError(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

// src/ops.rs
//
// Pixel operations planned by the native engine from an Options record.
// Each one is self-contained; the pipeline runs them in order on the decoded
// image.

use crate::options::{Angle, Color, Extend, Gravity, Interpolator};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Undo the EXIF orientation (2-8)
    AutoOrient { orientation: u16 },

    /// Cut an area at an explicit offset
    Extract {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Resample to exactly `width x height`
    Resize {
        width: u32,
        height: u32,
        interpolator: Interpolator,
    },

    /// Cut `width x height` from the current image at the gravity anchor
    CropGravity {
        width: u32,
        height: u32,
        gravity: Gravity,
    },

    /// Centre the image on a `width x height` canvas
    Embed {
        width: u32,
        height: u32,
        extend: Extend,
        background: Color,
    },

    Rotate { angle: Angle },

    /// Mirror vertically
    FlipV,

    /// Mirror horizontally
    FlipH,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AutoOrient { .. } => "auto_orient",
            Operation::Extract { .. } => "extract",
            Operation::Resize { .. } => "resize",
            Operation::CropGravity { .. } => "crop",
            Operation::Embed { .. } => "embed",
            Operation::Rotate { .. } => "rotate",
            Operation::FlipV => "flip",
            Operation::FlipH => "flop",
        }
    }
}

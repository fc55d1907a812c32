use serde::{Deserialize, Serialize};

use crate::request::{Quaternion, Vector};

/// Collision shape as understood by the solver.
///
/// Dimensions follow the host geometry they were derived from: boxes, planes,
/// cylinders and cones carry the maximum corner of the geometry's bounding box.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeDescriptor {
    Box { width: f32, height: f32, depth: f32 },
    Sphere { radius: f32 },
    Cylinder { radius: f32, height: f32 },
    Cone { radius: f32, height: f32 },
    Plane { width: f32, height: f32 },
    /// Flat `[x1, y1, z1, x2, ...]` vertex list.
    Convex { vertices: Vec<f32> },
    /// Flat vertex list plus three vertex indices per face.
    Triangle { vertices: Vec<f32>, faces: Vec<u32> },
    Compound { shapes: Vec<CompoundChild> },
}

/// A child of a compound shape, posed relative to the compound root.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CompoundChild {
    pub position: Vector,
    pub orientation: Quaternion,
    pub shape: ShapeDescriptor,
}

impl ShapeDescriptor {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeDescriptor::Box { .. } => "BOX",
            ShapeDescriptor::Sphere { .. } => "SPHERE",
            ShapeDescriptor::Cylinder { .. } => "CYLINDER",
            ShapeDescriptor::Cone { .. } => "CONE",
            ShapeDescriptor::Plane { .. } => "PLANE",
            ShapeDescriptor::Convex { .. } => "CONVEX",
            ShapeDescriptor::Triangle { .. } => "TRIANGLE",
            ShapeDescriptor::Compound { .. } => "COMPOUND",
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, ShapeDescriptor::Compound { .. })
    }

    /// Children of a compound shape; empty for every other kind.
    pub fn children(&self) -> &[CompoundChild] {
        match self {
            ShapeDescriptor::Compound { shapes } => shapes,
            _ => &[],
        }
    }
}

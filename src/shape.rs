//! Derives solver shape descriptors from scene geometry.

use bevy_math::Mat4;
use shared::{shape::CompoundChild, ShapeDescriptor};

use crate::{
    error::{Error, Result},
    scene::{Geometry, NodeId, Scene},
};

/// How a leaf descriptor is computed from a node's geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    /// Bounding box maximum as `(width, height, depth)`.
    Box,
    /// Bounding sphere radius.
    Sphere,
    /// Bounding box maximum x as radius and y as height.
    Cylinder,
    Cone,
    /// Bounding box maximum x and y.
    Plane,
    /// Every vertex, flattened.
    Convex,
    /// Flattened vertices and face indices.
    Triangle,
}

impl ShapeKind {
    pub fn describe(self, geometry: &Geometry) -> ShapeDescriptor {
        let (_, max) = geometry.bounding_box();

        match self {
            ShapeKind::Box => ShapeDescriptor::Box { width: max.x, height: max.y, depth: max.z },
            ShapeKind::Sphere => ShapeDescriptor::Sphere { radius: geometry.bounding_sphere().1 },
            ShapeKind::Cylinder => ShapeDescriptor::Cylinder { radius: max.x, height: max.y },
            ShapeKind::Cone => ShapeDescriptor::Cone { radius: max.x, height: max.y },
            ShapeKind::Plane => ShapeDescriptor::Plane { width: max.x, height: max.y },
            ShapeKind::Convex => ShapeDescriptor::Convex { vertices: geometry.flat_vertices() },
            ShapeKind::Triangle => ShapeDescriptor::Triangle {
                vertices: geometry.flat_vertices(),
                faces: geometry.flat_faces(),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeStrategy {
    Primitive(ShapeKind),
    /// Collects the bodies of the node's subtree.
    Compound,
}

/// Strategies applied in the order they were attached, each one seeing the
/// descriptor produced so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapeResolver {
    strategies: Vec<ShapeStrategy>,
}

impl ShapeResolver {
    pub fn primitive(kind: ShapeKind) -> Self {
        ShapeResolver { strategies: vec![ShapeStrategy::Primitive(kind)] }
    }

    pub fn compound() -> Self {
        ShapeResolver { strategies: vec![ShapeStrategy::Compound] }
    }

    pub fn push(&mut self, strategy: ShapeStrategy) {
        self.strategies.push(strategy);
    }

    pub fn strategies(&self) -> &[ShapeStrategy] {
        &self.strategies
    }

    /// The most recent primitive strategy, if any.
    pub fn primitive_kind(&self) -> Option<ShapeKind> {
        self.strategies.iter().rev().find_map(|strategy| match strategy {
            ShapeStrategy::Primitive(kind) => Some(*kind),
            ShapeStrategy::Compound => None,
        })
    }

    /// Runs every strategy for `node`. World matrices of the node's subtree
    /// are recomputed before any pose is read.
    pub fn resolve(&self, scene: &mut Scene, node: NodeId) -> Result<ShapeDescriptor> {
        scene.update_world_matrices(node, true)?;

        let mut current: Option<ShapeDescriptor> = None;
        for strategy in &self.strategies {
            let next = match strategy {
                ShapeStrategy::Primitive(kind) => leaf(scene, node, *kind)?,
                ShapeStrategy::Compound => compound(scene, node, current.take())?,
            };
            current = Some(next);
        }

        current.ok_or(Error::NoShape(node))
    }
}

/// Resolves the shape of the body attached to `node`.
pub fn resolve(scene: &mut Scene, node: NodeId) -> Result<ShapeDescriptor> {
    let resolver = scene.get(node)?.body().ok_or(Error::NoBody(node))?.resolver().clone();
    resolver.resolve(scene, node)
}

fn leaf(scene: &Scene, node: NodeId, kind: ShapeKind) -> Result<ShapeDescriptor> {
    let geometry = scene.get(node)?.geometry.as_ref().ok_or(Error::MissingGeometry(node, kind))?;
    Ok(kind.describe(geometry))
}

/// Builds a compound from the bodies below `root`, posed relative to it. A
/// descriptor already produced for the root itself leads the list at the
/// identity pose.
fn compound(scene: &Scene, root: NodeId, previous: Option<ShapeDescriptor>) -> Result<ShapeDescriptor> {
    let root_inverse = scene.get(root)?.world_matrix().inverse();

    let mut shapes: Vec<CompoundChild> = previous
        .into_iter()
        .map(|shape| CompoundChild { position: Default::default(), orientation: Default::default(), shape })
        .collect();

    for child in scene.descendants(root)? {
        let node = scene.get(child)?;
        let Some(kind) = node.body().and_then(|body| body.resolver().primitive_kind()) else {
            continue;
        };

        let shape = leaf(scene, child, kind)?;
        let relative: Mat4 = root_inverse * node.world_matrix();
        let (_, orientation, position) = relative.to_scale_rotation_translation();

        log::trace!("compound {root:?} gets a {} from {child:?} at {position}", shape.name());
        shapes.push(CompoundChild { position: position.into(), orientation: orientation.into(), shape });
    }

    Ok(ShapeDescriptor::Compound { shapes })
}

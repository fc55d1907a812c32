//! A minimal scene graph: an arena of nodes with local transforms, cached
//! local/world matrices and an optional physics role.

use bevy_math::{Mat4, Vec3};
use bevy_transform::prelude::Transform;

use crate::{
    body::RigidBodyHandle,
    error::{Error, Result},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Renderable geometry: a vertex list and triangle faces indexing into it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl Geometry {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Geometry { vertices, faces }
    }

    /// Axis aligned box centered on the origin.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let half = Vec3::new(width, height, depth) / 2.0;
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -half.x } else { half.x },
                    if i & 2 == 0 { -half.y } else { half.y },
                    if i & 4 == 0 { -half.z } else { half.z },
                )
            })
            .collect();

        let faces = vec![
            [0, 2, 1], [1, 2, 3], // -z
            [4, 5, 6], [5, 7, 6], // +z
            [0, 1, 4], [1, 5, 4], // -y
            [2, 6, 3], [3, 6, 7], // +y
            [0, 4, 2], [2, 4, 6], // -x
            [1, 3, 5], [3, 7, 5], // +x
        ];

        Geometry { vertices, faces }
    }

    /// `(min, max)` corners; both zero for empty geometry.
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        let mut vertices = self.vertices.iter();
        let Some(&first) = vertices.next() else {
            return (Vec3::ZERO, Vec3::ZERO);
        };

        vertices.fold((first, first), |(min, max), &v| (min.min(v), max.max(v)))
    }

    /// Sphere centered on the bounding box, just enclosing every vertex.
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        let (min, max) = self.bounding_box();
        let center = (min + max) / 2.0;
        let radius = self
            .vertices
            .iter()
            .map(|v| v.distance_squared(center))
            .fold(0.0f32, f32::max)
            .sqrt();

        (center, radius)
    }

    pub fn flat_vertices(&self) -> Vec<f32> {
        self.vertices.iter().flat_map(|v| v.to_array()).collect()
    }

    pub fn flat_faces(&self) -> Vec<u32> {
        self.faces.iter().flatten().copied().collect()
    }
}

/// What a node means to physics. A node carries at most one body.
#[derive(Debug, Default)]
pub enum PhysicsRole {
    #[default]
    None,
    Body(RigidBodyHandle),
}

#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub geometry: Option<Geometry>,
    physics: PhysicsRole,
    matrix: Mat4,
    world_matrix: Mat4,
    matrix_auto_update: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        SceneNode {
            name: name.into(),
            transform: Transform::IDENTITY,
            geometry: None,
            physics: PhysicsRole::None,
            matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            matrix_auto_update: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self.update_matrix();
        self
    }

    pub fn with_translation(self, translation: Vec3) -> Self {
        let transform = self.transform.with_translation(translation);
        self.with_transform(transform)
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Local matrix, as last computed or reported.
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
    }

    /// Recomputes the local matrix from `transform`.
    pub fn update_matrix(&mut self) {
        self.matrix = self.transform.compute_matrix();
    }

    /// Whether world matrix updates recompute the local matrix from
    /// `transform` first. Physics bodies turn this off: their matrix comes
    /// from the solver.
    pub fn matrix_auto_update(&self) -> bool {
        self.matrix_auto_update
    }

    pub fn set_matrix_auto_update(&mut self, auto_update: bool) {
        self.matrix_auto_update = auto_update;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn physics(&self) -> &PhysicsRole {
        &self.physics
    }

    pub fn body(&self) -> Option<&RigidBodyHandle> {
        match &self.physics {
            PhysicsRole::Body(body) => Some(body),
            PhysicsRole::None => None,
        }
    }

    pub fn body_mut(&mut self) -> Option<&mut RigidBodyHandle> {
        match &mut self.physics {
            PhysicsRole::Body(body) => Some(body),
            PhysicsRole::None => None,
        }
    }

    pub(crate) fn set_physics(&mut self, physics: PhysicsRole) {
        self.physics = physics;
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a detached node.
    pub fn spawn(&mut self, mut node: SceneNode) -> NodeId {
        node.parent = None;
        node.children.clear();

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn get(&self, id: NodeId) -> Result<&SceneNode> {
        self.node(id).ok_or(Error::UnknownNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.node_mut(id).ok_or(Error::UnknownNode(id))
    }

    /// Nodes added directly to the scene.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Makes `child` a child of `parent`, detaching it from wherever it was.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.get(child)?;

        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(Error::Cycle { parent, child });
            }
            ancestor = self.get(id)?.parent;
        }

        self.detach(child)?;
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Removes `child` from its parent or from the scene roots.
    pub fn detach(&mut self, child: NodeId) -> Result<()> {
        match self.get(child)?.parent {
            Some(parent) => self.nodes[parent.0].children.retain(|&c| c != child),
            None => self.roots.retain(|&r| r != child),
        }
        self.nodes[child.0].parent = None;
        Ok(())
    }

    pub(crate) fn add_root(&mut self, id: NodeId) -> Result<()> {
        self.detach(id)?;
        self.roots.push(id);
        Ok(())
    }

    /// Every node below `id`, depth first, parents before children. `id`
    /// itself is not included.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut stack: Vec<NodeId> = self.get(id)?.children.iter().rev().copied().collect();
        let mut visited = Vec::new();

        while let Some(next) = stack.pop() {
            visited.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev());
        }

        Ok(visited)
    }

    /// Recomputes the world matrices of `id` and its subtree from the parent's
    /// current world matrix. With `force_local` every local matrix is rebuilt
    /// from its transform first, otherwise only nodes with auto update are.
    pub fn update_world_matrices(&mut self, id: NodeId, force_local: bool) -> Result<()> {
        let parent_world = match self.get(id)?.parent {
            Some(parent) => self.nodes[parent.0].world_matrix,
            None => Mat4::IDENTITY,
        };

        let mut stack = vec![(id, parent_world)];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            if force_local || node.matrix_auto_update {
                node.update_matrix();
            }
            node.world_matrix = parent_world * node.matrix;

            let world = node.world_matrix;
            stack.extend(node.children.iter().map(|&child| (child, world)));
        }

        Ok(())
    }
}

use bevy_math::{Quat, Vec3};
use shared::{request::RigidBodyDefinition, BodyId, Request, ShapeDescriptor};

use crate::shape::ShapeResolver;

pub const DEFAULT_MASS: f32 = f32::INFINITY;
pub const DEFAULT_RESTITUTION: f32 = 0.1;
pub const DEFAULT_FRICTION: f32 = 0.5;

/// Optional overrides used when a body is attached to a node. Anything left
/// unset takes the body defaults: infinite mass (static), restitution 0.1,
/// friction 0.5, no damping and empty collision bitmasks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhysicsDescriptor {
    pub mass: Option<f32>,
    pub restitution: Option<f32>,
    pub friction: Option<f32>,
    pub linear_damping: Option<f32>,
    pub angular_damping: Option<f32>,
    pub collision_groups: Option<u32>,
    pub collision_mask: Option<u32>,
}

impl PhysicsDescriptor {
    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn restitution(mut self, restitution: f32) -> Self {
        self.restitution = Some(restitution);
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = Some(friction);
        self
    }

    pub fn linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = Some(damping);
        self
    }

    pub fn angular_damping(mut self, damping: f32) -> Self {
        self.angular_damping = Some(damping);
        self
    }

    pub fn collision_groups(mut self, groups: u32) -> Self {
        self.collision_groups = Some(groups);
        self
    }

    pub fn collision_mask(mut self, mask: u32) -> Self {
        self.collision_mask = Some(mask);
        self
    }
}

/// The state the solver is believed to hold for a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
}

impl Default for Shadow {
    fn default() -> Self {
        Shadow {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
        }
    }
}

/// Physics state attached to a scene node.
///
/// Velocities and factors are plain fields: change them freely and the next
/// step sends whatever differs from the shadow. Scalar properties go through
/// setters, which hand back the request to transmit once the body is live.
#[derive(Debug)]
pub struct RigidBodyHandle {
    id: BodyId,
    mass: f32,
    restitution: f32,
    friction: f32,
    linear_damping: f32,
    angular_damping: f32,
    collision_groups: u32,
    collision_mask: u32,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
    shadow: Shadow,
    resolver: ShapeResolver,
    registered: bool,
}

impl RigidBodyHandle {
    pub fn new(id: BodyId, descriptor: PhysicsDescriptor, resolver: ShapeResolver) -> Self {
        RigidBodyHandle {
            id,
            mass: descriptor.mass.unwrap_or(DEFAULT_MASS),
            restitution: descriptor.restitution.unwrap_or(DEFAULT_RESTITUTION),
            friction: descriptor.friction.unwrap_or(DEFAULT_FRICTION),
            linear_damping: descriptor.linear_damping.unwrap_or(0.0),
            angular_damping: descriptor.angular_damping.unwrap_or(0.0),
            collision_groups: descriptor.collision_groups.unwrap_or(0),
            collision_mask: descriptor.collision_mask.unwrap_or(0),
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            shadow: Shadow::default(),
            resolver,
            registered: false,
        }
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn collision_groups(&self) -> u32 {
        self.collision_groups
    }

    pub fn collision_mask(&self) -> u32 {
        self.collision_mask
    }

    pub fn shadow(&self) -> &Shadow {
        &self.shadow
    }

    pub fn resolver(&self) -> &ShapeResolver {
        &self.resolver
    }

    /// Whether the body has been added to a world.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// A static body never moves: zero or infinite mass.
    pub fn is_static(&self) -> bool {
        self.mass == 0.0 || self.mass.is_infinite()
    }

    #[must_use = "the request must be sent to the solver"]
    pub fn set_mass(&mut self, mass: f32) -> Option<Request> {
        self.mass = mass;
        self.live(Request::SetRigidbodyMass { body_id: self.id, value: mass })
    }

    #[must_use = "the request must be sent to the solver"]
    pub fn set_restitution(&mut self, restitution: f32) -> Option<Request> {
        self.restitution = restitution;
        self.live(Request::SetRigidbodyRestitution { body_id: self.id, value: restitution })
    }

    #[must_use = "the request must be sent to the solver"]
    pub fn set_friction(&mut self, friction: f32) -> Option<Request> {
        self.friction = friction;
        self.live(Request::SetRigidbodyFriction { body_id: self.id, value: friction })
    }

    #[must_use = "the request must be sent to the solver"]
    pub fn set_linear_damping(&mut self, damping: f32) -> Option<Request> {
        self.linear_damping = damping;
        self.live(Request::SetRigidbodyLinearDamping { body_id: self.id, value: damping })
    }

    #[must_use = "the request must be sent to the solver"]
    pub fn set_angular_damping(&mut self, damping: f32) -> Option<Request> {
        self.angular_damping = damping;
        self.live(Request::SetRigidbodyAngularDamping { body_id: self.id, value: damping })
    }

    #[must_use = "the request must be sent to the solver"]
    pub fn set_collision_groups(&mut self, groups: u32) -> Option<Request> {
        self.collision_groups = groups;
        self.live(Request::SetRigidbodyCollisionGroups { body_id: self.id, value: groups })
    }

    #[must_use = "the request must be sent to the solver"]
    pub fn set_collision_mask(&mut self, mask: u32) -> Option<Request> {
        self.collision_mask = mask;
        self.live(Request::SetRigidbodyCollisionMask { body_id: self.id, value: mask })
    }

    fn live(&self, request: Request) -> Option<Request> {
        self.registered.then_some(request)
    }

    /// The full property set for `ADD_RIGIDBODY`.
    pub fn definition(&self, shape: ShapeDescriptor) -> RigidBodyDefinition {
        RigidBodyDefinition {
            body_id: self.id,
            shape,
            mass: self.mass,
            restitution: self.restitution,
            friction: self.friction,
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
            collision_groups: self.collision_groups,
            collision_mask: self.collision_mask,
        }
    }

    pub(crate) fn shadow_mut(&mut self) -> &mut Shadow {
        &mut self.shadow
    }

    pub(crate) fn resolver_mut(&mut self) -> &mut ShapeResolver {
        &mut self.resolver
    }

    pub(crate) fn mark_registered(&mut self) {
        self.registered = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeKind;

    fn handle() -> RigidBodyHandle {
        RigidBodyHandle::new(3, PhysicsDescriptor::default().mass(2.0), ShapeResolver::primitive(ShapeKind::Sphere))
    }

    #[test]
    fn descriptor_overrides_defaults() {
        let body = handle();
        assert_eq!(body.mass(), 2.0);
        assert_eq!(body.restitution(), DEFAULT_RESTITUTION);
        assert_eq!(body.friction(), DEFAULT_FRICTION);
        assert_eq!(body.collision_mask(), 0);
        assert_eq!(body.linear_factor, Vec3::ONE);
        assert!(!body.is_static());

        let ground = RigidBodyHandle::new(4, PhysicsDescriptor::default(), ShapeResolver::primitive(ShapeKind::Box));
        assert!(ground.is_static());
    }

    #[test]
    fn setters_only_emit_once_registered() {
        let mut body = handle();
        assert_eq!(body.set_friction(0.8), None);
        assert_eq!(body.friction(), 0.8);

        body.mark_registered();
        assert_eq!(
            body.set_collision_groups(0b10),
            Some(Request::SetRigidbodyCollisionGroups { body_id: 3, value: 0b10 })
        );
        assert_eq!(body.set_mass(5.0), Some(Request::SetRigidbodyMass { body_id: 3, value: 5.0 }));
        assert_eq!(body.definition(ShapeDescriptor::Sphere { radius: 1.0 }).mass, 5.0);
    }
}

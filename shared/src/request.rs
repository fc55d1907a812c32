use bevy_math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::{response::ReportBuffer, shape::ShapeDescriptor};

/// Identifier of a rigid body, shared by host and solver.
///
/// Ids travel inside `f32` report slots, so only values up to 2^24 are exact.
pub type BodyId = u32;

/// Largest id a report slot carries exactly: `f32` has a 24 bit mantissa.
pub const MAX_BODY_ID: BodyId = (1 << 24) - 1;

/// Reads a body id out of a report slot. Anything but a whole number in
/// `0..=MAX_BODY_ID` is not an id.
pub fn decode_body_id(value: f32) -> Option<BodyId> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= MAX_BODY_ID as f32 {
        Some(value as BodyId)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vector {
    fn from(v: Vec3) -> Self {
        Vector { x: v.x, y: v.y, z: v.z }
    }
}

impl From<Vector> for Vec3 {
    fn from(v: Vector) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

impl From<Quat> for Quaternion {
    fn from(q: Quat) -> Self {
        Quaternion { x: q.x, y: q.y, z: q.z, w: q.w }
    }
}

impl From<Quaternion> for Quat {
    fn from(q: Quaternion) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Broadphase {
    #[default]
    Sap,
    Naive,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Initialize {
    pub broadphase: Option<Broadphase>,
    pub gravity: Option<Vector>,
}

/// Everything the solver needs to create a body. A mass of zero or infinity
/// creates a static body.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RigidBodyDefinition {
    pub body_id: BodyId,
    pub shape: ShapeDescriptor,
    pub mass: f32,
    pub restitution: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub collision_groups: u32,
    pub collision_mask: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct StepSimulation {
    pub delta_time: f32,
    pub max_step: f32,
}

/// Host to solver messages. The solver processes them strictly in send order.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Initialize(Initialize),
    AddRigidbody(RigidBodyDefinition),
    SetRigidbodyMass { body_id: BodyId, value: f32 },
    SetRigidbodyRestitution { body_id: BodyId, value: f32 },
    SetRigidbodyFriction { body_id: BodyId, value: f32 },
    SetRigidbodyLinearDamping { body_id: BodyId, value: f32 },
    SetRigidbodyAngularDamping { body_id: BodyId, value: f32 },
    SetRigidbodyCollisionGroups { body_id: BodyId, value: u32 },
    SetRigidbodyCollisionMask { body_id: BodyId, value: u32 },
    SetRigidbodyTransform {
        body_id: BodyId,
        position: Vector,
        orientation: Quaternion,
    },
    SetRigidbodyLinearVelocity { body_id: BodyId, vector: Vector },
    SetRigidbodyAngularVelocity { body_id: BodyId, vector: Vector },
    SetRigidbodyLinearFactor { body_id: BodyId, vector: Vector },
    SetRigidbodyAngularFactor { body_id: BodyId, vector: Vector },
    StepSimulation(StepSimulation),
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum RequestKind {
    Initialize,
    AddRigidbody,
    SetRigidbodyMass,
    SetRigidbodyRestitution,
    SetRigidbodyFriction,
    SetRigidbodyLinearDamping,
    SetRigidbodyAngularDamping,
    SetRigidbodyCollisionGroups,
    SetRigidbodyCollisionMask,
    SetRigidbodyTransform,
    SetRigidbodyLinearVelocity,
    SetRigidbodyAngularVelocity,
    SetRigidbodyLinearFactor,
    SetRigidbodyAngularFactor,
    StepSimulation,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Initialize => "INITIALIZE",
            RequestKind::AddRigidbody => "ADD_RIGIDBODY",
            RequestKind::SetRigidbodyMass => "SET_RIGIDBODY_MASS",
            RequestKind::SetRigidbodyRestitution => "SET_RIGIDBODY_RESTITUTION",
            RequestKind::SetRigidbodyFriction => "SET_RIGIDBODY_FRICTION",
            RequestKind::SetRigidbodyLinearDamping => "SET_RIGIDBODY_LINEAR_DAMPING",
            RequestKind::SetRigidbodyAngularDamping => "SET_RIGIDBODY_ANGULAR_DAMPING",
            RequestKind::SetRigidbodyCollisionGroups => "SET_RIGIDBODY_COLLISION_GROUPS",
            RequestKind::SetRigidbodyCollisionMask => "SET_RIGIDBODY_COLLISION_MASK",
            RequestKind::SetRigidbodyTransform => "SET_RIGIDBODY_TRANSFORM",
            RequestKind::SetRigidbodyLinearVelocity => "SET_RIGIDBODY_LINEAR_VELOCITY",
            RequestKind::SetRigidbodyAngularVelocity => "SET_RIGIDBODY_ANGULAR_VELOCITY",
            RequestKind::SetRigidbodyLinearFactor => "SET_RIGIDBODY_LINEAR_FACTOR",
            RequestKind::SetRigidbodyAngularFactor => "SET_RIGIDBODY_ANGULAR_FACTOR",
            RequestKind::StepSimulation => "STEP_SIMULATION",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Initialize(_) => RequestKind::Initialize,
            Request::AddRigidbody(_) => RequestKind::AddRigidbody,
            Request::SetRigidbodyMass { .. } => RequestKind::SetRigidbodyMass,
            Request::SetRigidbodyRestitution { .. } => RequestKind::SetRigidbodyRestitution,
            Request::SetRigidbodyFriction { .. } => RequestKind::SetRigidbodyFriction,
            Request::SetRigidbodyLinearDamping { .. } => RequestKind::SetRigidbodyLinearDamping,
            Request::SetRigidbodyAngularDamping { .. } => RequestKind::SetRigidbodyAngularDamping,
            Request::SetRigidbodyCollisionGroups { .. } => RequestKind::SetRigidbodyCollisionGroups,
            Request::SetRigidbodyCollisionMask { .. } => RequestKind::SetRigidbodyCollisionMask,
            Request::SetRigidbodyTransform { .. } => RequestKind::SetRigidbodyTransform,
            Request::SetRigidbodyLinearVelocity { .. } => RequestKind::SetRigidbodyLinearVelocity,
            Request::SetRigidbodyAngularVelocity { .. } => RequestKind::SetRigidbodyAngularVelocity,
            Request::SetRigidbodyLinearFactor { .. } => RequestKind::SetRigidbodyLinearFactor,
            Request::SetRigidbodyAngularFactor { .. } => RequestKind::SetRigidbodyAngularFactor,
            Request::StepSimulation(_) => RequestKind::StepSimulation,
        }
    }

    /// The body this request targets, if any.
    pub fn body_id(&self) -> Option<BodyId> {
        match self {
            Request::Initialize(_) | Request::StepSimulation(_) => None,
            Request::AddRigidbody(definition) => Some(definition.body_id),
            Request::SetRigidbodyMass { body_id, .. }
            | Request::SetRigidbodyRestitution { body_id, .. }
            | Request::SetRigidbodyFriction { body_id, .. }
            | Request::SetRigidbodyLinearDamping { body_id, .. }
            | Request::SetRigidbodyAngularDamping { body_id, .. }
            | Request::SetRigidbodyCollisionGroups { body_id, .. }
            | Request::SetRigidbodyCollisionMask { body_id, .. }
            | Request::SetRigidbodyTransform { body_id, .. }
            | Request::SetRigidbodyLinearVelocity { body_id, .. }
            | Request::SetRigidbodyAngularVelocity { body_id, .. }
            | Request::SetRigidbodyLinearFactor { body_id, .. }
            | Request::SetRigidbodyAngularFactor { body_id, .. } => Some(*body_id),
        }
    }
}

/// Everything that travels host to solver: requests, and report buffers
/// handed back for reuse.
#[derive(Debug, Deserialize, Serialize)]
pub enum Packet {
    Request(Request),
    Recycle(ReportBuffer),
}

impl From<Request> for Packet {
    fn from(request: Request) -> Self {
        Packet::Request(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packets_survive_the_wire() {
        let request = Request::SetRigidbodyTransform {
            body_id: 7,
            position: Vec3::new(1.0, 2.0, 3.0).into(),
            orientation: Quat::from_rotation_y(0.5).into(),
        };

        let bytes = bincode::serde::encode_to_vec(Packet::from(request.clone()), crate::CONFIG).unwrap();
        let (decoded, _): (Packet, usize) = bincode::serde::decode_from_slice(&bytes, crate::CONFIG).unwrap();

        match decoded {
            Packet::Request(decoded) => assert_eq!(decoded, request),
            Packet::Recycle(_) => panic!("expected a request"),
        }
    }

    #[test]
    fn kinds_use_protocol_names() {
        let step = Request::StepSimulation(StepSimulation { delta_time: 1.0 / 60.0, max_step: 1.0 / 60.0 });
        assert_eq!(step.kind().as_str(), "STEP_SIMULATION");
        assert_eq!(step.body_id(), None);

        let mass = Request::SetRigidbodyMass { body_id: 3, value: 2.0 };
        assert_eq!(mass.kind().to_string(), "SET_RIGIDBODY_MASS");
        assert_eq!(mass.body_id(), Some(3));
    }
}

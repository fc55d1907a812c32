use std::collections::BTreeMap;

use bevy_math::{Mat4, Quat, Vec3};
use shared::{
    request::{RigidBodyDefinition, StepSimulation},
    response::BodyState,
    BodyId, Request,
};

use crate::{Outbox, Solver};

/// A stand-in solver that performs no dynamics.
///
/// Every step reports each body exactly where, and as fast as, the host last
/// said it was. Contacts are never reported. Useful for exercising the bridge
/// protocol end to end.
#[derive(Debug, Default)]
pub struct EchoSolver {
    bodies: BTreeMap<BodyId, EchoBody>,
    ticks: u32,
}

#[derive(Debug)]
struct EchoBody {
    definition: RigidBodyDefinition,
    position: Vec3,
    orientation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
}

impl EchoSolver {
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn definition(&self, id: BodyId) -> Option<&RigidBodyDefinition> {
        self.bodies.get(&id).map(|body| &body.definition)
    }

    /// Total ticks simulated so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut EchoBody> {
        let body = self.bodies.get_mut(&id);
        if body.is_none() {
            log::warn!("request for unknown body {id}");
        }
        body
    }

    fn step(&mut self, step: StepSimulation, outbox: &mut Outbox) {
        let ticks = if step.max_step > 0.0 {
            (step.delta_time / step.max_step).ceil().max(1.0) as u32
        } else {
            1
        };
        self.ticks += ticks;

        let states: Vec<BodyState> = self
            .bodies
            .iter()
            .map(|(&id, body)| BodyState {
                id,
                matrix: Mat4::from_rotation_translation(body.orientation, body.position),
                position: body.position,
                orientation: body.orientation,
                linear_velocity: body.linear_velocity,
                angular_velocity: body.angular_velocity,
            })
            .collect();

        let mut report = outbox.take();
        report.write_world(ticks, &states);
        outbox.post(report);
    }
}

impl Solver for EchoSolver {
    fn handle(&mut self, request: Request, outbox: &mut Outbox) {
        log::debug!("{} {:?}", request.kind(), request.body_id());

        match request {
            Request::Initialize(initialize) => {
                log::info!(
                    "initialized, broadphase {:?}, gravity {:?}",
                    initialize.broadphase.unwrap_or_default(),
                    initialize.gravity,
                );
            }
            Request::AddRigidbody(definition) => {
                log::debug!("adding body {} with a {} shape", definition.body_id, definition.shape.name());
                self.bodies.insert(
                    definition.body_id,
                    EchoBody {
                        definition,
                        position: Vec3::ZERO,
                        orientation: Quat::IDENTITY,
                        linear_velocity: Vec3::ZERO,
                        angular_velocity: Vec3::ZERO,
                    },
                );
            }
            Request::SetRigidbodyTransform { body_id, position, orientation } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.position = position.into();
                    body.orientation = orientation.into();
                }
            }
            Request::SetRigidbodyLinearVelocity { body_id, vector } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.linear_velocity = vector.into();
                }
            }
            Request::SetRigidbodyAngularVelocity { body_id, vector } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.angular_velocity = vector.into();
                }
            }
            Request::SetRigidbodyMass { body_id, value } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.definition.mass = value;
                }
            }
            Request::SetRigidbodyRestitution { body_id, value } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.definition.restitution = value;
                }
            }
            Request::SetRigidbodyFriction { body_id, value } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.definition.friction = value;
                }
            }
            Request::SetRigidbodyLinearDamping { body_id, value } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.definition.linear_damping = value;
                }
            }
            Request::SetRigidbodyAngularDamping { body_id, value } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.definition.angular_damping = value;
                }
            }
            Request::SetRigidbodyCollisionGroups { body_id, value } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.definition.collision_groups = value;
                }
            }
            Request::SetRigidbodyCollisionMask { body_id, value } => {
                if let Some(body) = self.body_mut(body_id) {
                    body.definition.collision_mask = value;
                }
            }
            // factors only scale forces, and there are none here
            Request::SetRigidbodyLinearFactor { .. } | Request::SetRigidbodyAngularFactor { .. } => {}
            Request::StepSimulation(step) => self.step(step, outbox),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ShapeDescriptor, ReportKind};

    fn definition(body_id: BodyId) -> RigidBodyDefinition {
        RigidBodyDefinition {
            body_id,
            shape: ShapeDescriptor::Sphere { radius: 1.0 },
            mass: 1.0,
            restitution: 0.1,
            friction: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            collision_groups: 0,
            collision_mask: 0,
        }
    }

    #[test]
    fn steps_report_the_last_known_state() {
        let mut solver = EchoSolver::default();
        let mut outbox = Outbox::default();

        solver.handle(Request::AddRigidbody(definition(5)), &mut outbox);
        solver.handle(
            Request::SetRigidbodyTransform {
                body_id: 5,
                position: Vec3::new(0.0, 3.0, 0.0).into(),
                orientation: Quat::IDENTITY.into(),
            },
            &mut outbox,
        );
        solver.handle(
            Request::SetRigidbodyLinearVelocity { body_id: 5, vector: Vec3::X.into() },
            &mut outbox,
        );
        assert_eq!(outbox.drain().count(), 0);

        solver.handle(
            Request::StepSimulation(StepSimulation { delta_time: 0.5, max_step: 0.25 }),
            &mut outbox,
        );

        let reports: Vec<_> = outbox.drain().collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind(), Ok(ReportKind::World));

        let world = reports[0].world().unwrap();
        assert_eq!(world.ticks(), 2);

        let state = world.bodies().next().unwrap();
        assert_eq!(state.id, 5);
        assert_eq!(state.position, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(state.linear_velocity, Vec3::X);
    }

    #[test]
    fn property_updates_are_recorded() {
        let mut solver = EchoSolver::default();
        let mut outbox = Outbox::default();

        solver.handle(Request::AddRigidbody(definition(1)), &mut outbox);
        solver.handle(Request::SetRigidbodyFriction { body_id: 1, value: 0.9 }, &mut outbox);
        solver.handle(Request::SetRigidbodyCollisionMask { body_id: 1, value: 0b101 }, &mut outbox);
        solver.handle(Request::SetRigidbodyMass { body_id: 99, value: 3.0 }, &mut outbox);

        let definition = solver.definition(1).unwrap();
        assert_eq!(definition.friction, 0.9);
        assert_eq!(definition.collision_mask, 0b101);
        assert_eq!(solver.body_count(), 1);
    }
}

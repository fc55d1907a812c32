use approx::assert_relative_eq;
use bevy_math::{Quat, Vec3};
use bevy_transform::prelude::Transform;
use physics::echo::EchoSolver;
use physics_bridge::{
    shared::{
        request::{Initialize, RigidBodyDefinition, StepSimulation},
        Packet, Request, ShapeDescriptor,
    },
    transport::{Transport, WorkerTransport},
    Geometry, PhysicsDescriptor, SceneNode, ShapeKind, World,
};
use std::{cell::Cell, rc::Rc};

#[test]
fn bodies_round_trip_through_a_worker() {
    let transport = WorkerTransport::spawn(EchoSolver::default()).unwrap();
    let mut world = World::new(transport, Initialize::default()).unwrap();

    let rotation = Quat::from_rotation_x(0.4);
    let node = world.spawn(
        SceneNode::new("crate")
            .with_transform(Transform::from_xyz(1.0, 2.0, 3.0).with_rotation(rotation))
            .with_geometry(Geometry::cuboid(1.0, 1.0, 1.0)),
    );
    world.attach_body(node, ShapeKind::Box, PhysicsDescriptor::default().mass(1.0)).unwrap();
    world.add(node).unwrap();
    world.body_mut(node).unwrap().angular_velocity = Vec3::new(0.0, 0.5, 0.0);

    let ticks = Rc::new(Cell::new(0));
    let seen = Rc::clone(&ticks);
    world.step(0.5, Some(0.125), move |t| seen.set(t)).unwrap();
    assert!(world.is_stepping());
    world.wait().unwrap();

    assert_eq!(ticks.get(), 4);

    let scene_node = world.scene().get(node).unwrap();
    assert_relative_eq!(scene_node.transform.translation.y, 2.0);
    assert!(scene_node.transform.rotation.abs_diff_eq(rotation, 1e-6));
    assert!(scene_node
        .world_matrix()
        .abs_diff_eq(bevy_math::Mat4::from_rotation_translation(rotation, Vec3::new(1.0, 2.0, 3.0)), 1e-5));

    let body = world.body(node).unwrap();
    assert_eq!(body.shadow().angular_velocity, Vec3::new(0.0, 0.5, 0.0));
    assert_eq!(body.shadow().position, Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn recycled_buffers_are_reused() {
    let mut transport = WorkerTransport::spawn(EchoSolver::default()).unwrap();
    let step = || Packet::from(Request::StepSimulation(StepSimulation { delta_time: 0.1, max_step: 0.1 }));

    transport
        .send(Packet::from(Request::AddRigidbody(RigidBodyDefinition {
            body_id: 0,
            shape: ShapeDescriptor::Sphere { radius: 0.5 },
            mass: 1.0,
            restitution: 0.1,
            friction: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            collision_groups: 0,
            collision_mask: 0,
        })))
        .unwrap();

    transport.send(step()).unwrap();
    let first = transport.recv().unwrap();
    let storage = first.storage_ptr();
    transport.send(Packet::Recycle(first)).unwrap();

    for _ in 0..3 {
        transport.send(step()).unwrap();
        let report = transport.recv().unwrap();
        assert_eq!(report.storage_ptr(), storage);
        assert_eq!(report.world().unwrap().len(), 1);
        transport.send(Packet::Recycle(report)).unwrap();
    }
}

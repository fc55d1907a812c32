use std::net::TcpListener;

use approx::assert_relative_eq;
use bevy_math::Vec3;
use physics::{echo::EchoSolver, server};
use physics_bridge::{
    shared::request::Initialize, transport::RemoteTransport, Geometry, PhysicsDescriptor, SceneNode, ShapeKind, World,
};

fn start_server(compress: Option<u32>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    std::thread::spawn(move || server::serve(listener, compress, EchoSolver::default));

    address
}

fn round_trip(compress: Option<u32>) {
    let address = start_server(compress);
    let transport = RemoteTransport::connect(address.as_str(), compress).unwrap();
    let mut world = World::new(transport, Initialize::default()).unwrap();

    let mut nodes = Vec::new();
    for i in 0..4 {
        let node = world.spawn(
            SceneNode::new(format!("ball {i}"))
                .with_translation(Vec3::new(i as f32, 10.0, 0.0))
                .with_geometry(Geometry::cuboid(1.0, 1.0, 1.0)),
        );
        world.attach_body(node, ShapeKind::Sphere, PhysicsDescriptor::default().mass(1.0)).unwrap();
        world.add(node).unwrap();
        nodes.push(node);
    }

    for frame in 0..5 {
        world.body_mut(nodes[0]).unwrap().linear_velocity = Vec3::new(frame as f32, 0.0, 0.0);
        world.step(1.0 / 60.0, None, |ticks| assert_eq!(ticks, 1)).unwrap();
        world.wait().unwrap();
    }

    for (i, &node) in nodes.iter().enumerate() {
        let translation = world.scene().get(node).unwrap().transform.translation;
        assert_relative_eq!(translation.x, i as f32);
        assert_relative_eq!(translation.y, 10.0);
    }
    assert_eq!(world.body(nodes[0]).unwrap().shadow().linear_velocity, Vec3::new(4.0, 0.0, 0.0));
}

#[test]
fn plain_connection_round_trips() {
    round_trip(None);
}

#[test]
fn compressed_connection_round_trips() {
    round_trip(Some(6));
}

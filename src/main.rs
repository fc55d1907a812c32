use bevy_math::{Quat, Vec3};
use bevy_transform::prelude::Transform;
use physics::echo::EchoSolver;
use physics_bridge::{
    shared::settings::Settings, transport, Geometry, PhysicsDescriptor, SceneNode, ShapeKind, World,
};

const TIME_STEP: f32 = 1.0 / 60.0;

fn run(settings: Settings) -> physics_bridge::Result<()> {
    let transport = transport::connect(&settings.backend, EchoSolver::default())?;
    let mut world = World::with_settings(transport, &settings)?;

    let ground = world.spawn(SceneNode::new("ground").with_geometry(Geometry::cuboid(40.0, 1.0, 40.0)));
    world.attach_body(ground, ShapeKind::Box, PhysicsDescriptor::default().friction(0.8))?;
    world.add(ground)?;

    let mut crates = Vec::new();
    for i in 0..3 {
        let node = world.spawn(
            SceneNode::new(format!("crate {i}"))
                .with_transform(
                    Transform::from_xyz(i as f32 * 1.5, 4.0 + i as f32, 0.0)
                        .with_rotation(Quat::from_rotation_y(0.3 * i as f32)),
                )
                .with_geometry(Geometry::cuboid(1.0, 1.0, 1.0)),
        );
        world.attach_body(node, ShapeKind::Box, PhysicsDescriptor::default().mass(1.0).restitution(0.4))?;
        world.add(node)?;
        world.on_contact(node, move |contact| log::info!("crate {i} touched body {}", contact.other_body))?;
        crates.push(node);
    }

    // a dumbbell: two spheres joined under one compound body
    let dumbbell = world.spawn(SceneNode::new("dumbbell").with_translation(Vec3::new(-3.0, 6.0, 0.0)));
    for (name, offset) in [("left", -1.0), ("right", 1.0)] {
        let weight = world.spawn(
            SceneNode::new(name)
                .with_translation(Vec3::new(offset, 0.0, 0.0))
                .with_geometry(Geometry::cuboid(0.8, 0.8, 0.8)),
        );
        world.attach(dumbbell, weight)?;
        world.attach_body(weight, ShapeKind::Sphere, PhysicsDescriptor::default())?;
    }
    world.attach_compound(dumbbell, PhysicsDescriptor::default().mass(4.0))?;
    world.add(dumbbell)?;

    for frame in 0..120 {
        if frame == 30 {
            let mut body = world.body_mut(crates[0])?;
            body.linear_velocity = Vec3::new(0.0, 5.0, 0.0);
            body.set_friction(0.1)?;
        }

        world.step(TIME_STEP, Some(TIME_STEP / 2.0), move |ticks| log::trace!("frame {frame} took {ticks} ticks"))?;
        world.wait()?;
    }

    for &node in &crates {
        let node = world.scene().get(node)?;
        log::info!("{} rests at {}", node.name, node.transform.translation);
    }

    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "physics_bridge=info");
    }

    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => match Settings::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("could not load {path}, {e}");
                std::process::exit(2);
            }
        },
        None => Settings::default(),
    };

    if let Err(e) = run(settings) {
        log::error!("physics bridge stopped, {e}");
        std::process::exit(1);
    }
}

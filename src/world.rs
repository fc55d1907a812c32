use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
};

use shared::{
    request::{Initialize, StepSimulation},
    settings::Settings,
    BodyId, Packet, ReportBuffer, Request,
};
use tracing::info_span;

use crate::{
    body::{PhysicsDescriptor, RigidBodyHandle},
    error::{Error, Result},
    ids::IdAllocator,
    report::{self, Contact, ContactListeners, Decoded},
    scene::{NodeId, PhysicsRole, Scene, SceneNode},
    shape::{self, ShapeKind, ShapeResolver, ShapeStrategy},
    sync,
    transport::Transport,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepState {
    #[default]
    Idle,
    /// A step was sent and its world report has not been decoded yet.
    Stepping,
}

type StepCallback = Box<dyn FnOnce(u32)>;

/// The host end of the bridge: a scene whose bodies are mirrored by a solver
/// behind `transport`.
pub struct World<T: Transport> {
    scene: Scene,
    ids: IdAllocator,
    registry: BTreeMap<BodyId, NodeId>,
    transport: T,
    state: StepState,
    on_step: Option<StepCallback>,
    listeners: ContactListeners,
}

impl<T: Transport> World<T> {
    /// Starts a world, sending `initialize` as the first request.
    pub fn new(mut transport: T, initialize: Initialize) -> Result<Self> {
        log::debug!("initializing physics world, {initialize:?}");
        transport.send(Request::Initialize(initialize).into())?;

        Ok(World {
            scene: Scene::new(),
            ids: IdAllocator::new(),
            registry: BTreeMap::new(),
            transport,
            state: StepState::Idle,
            on_step: None,
            listeners: ContactListeners::new(),
        })
    }

    pub fn with_settings(transport: T, settings: &Settings) -> Result<Self> {
        Self::new(transport, settings.initialize())
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn is_stepping(&self) -> bool {
        self.state == StepState::Stepping
    }

    pub fn spawn(&mut self, node: SceneNode) -> NodeId {
        self.scene.spawn(node)
    }

    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.scene.attach(parent, child)
    }

    /// Gives `node` a body whose shape is derived from its geometry.
    pub fn attach_body(&mut self, node: NodeId, kind: ShapeKind, descriptor: PhysicsDescriptor) -> Result<BodyId> {
        self.attach_resolver(node, ShapeResolver::primitive(kind), descriptor)
    }

    /// Makes `node` a compound body built from the bodies of its subtree. If
    /// the node already has a body its current shape is kept as the first
    /// compound entry, and `descriptor` is ignored.
    pub fn attach_compound(&mut self, node: NodeId, descriptor: PhysicsDescriptor) -> Result<BodyId> {
        if let Some(body) = self.scene.get_mut(node)?.body_mut() {
            body.resolver_mut().push(ShapeStrategy::Compound);
            return Ok(body.id());
        }

        self.attach_resolver(node, ShapeResolver::compound(), descriptor)
    }

    fn attach_resolver(&mut self, node: NodeId, resolver: ShapeResolver, descriptor: PhysicsDescriptor) -> Result<BodyId> {
        if self.scene.get(node)?.body().is_some() {
            return Err(Error::AlreadyHasBody(node));
        }

        let id = self.ids.allocate()?;
        let scene_node = self.scene.get_mut(node)?;
        scene_node.set_physics(PhysicsRole::Body(RigidBodyHandle::new(id, descriptor, resolver)));
        // the solver owns the matrix from now on
        scene_node.set_matrix_auto_update(false);

        log::trace!("attached body {id} to {node:?}");
        Ok(id)
    }

    /// Adds `node` to the scene. A node with a body is resolved into a shape
    /// and announced to the solver. On error the node stays where it was.
    pub fn add(&mut self, node: NodeId) -> Result<()> {
        let Some(body) = self.scene.get(node)?.body() else {
            return self.scene.add_root(node);
        };
        let id = body.id();
        if body.is_registered() {
            return Err(Error::AlreadyRegistered(id));
        }

        let shape = shape::resolve(&mut self.scene, node)?;
        self.scene.add_root(node)?;
        let definition = {
            let body = self.scene.get_mut(node)?.body_mut().ok_or(Error::NoBody(node))?;
            body.mark_registered();
            body.definition(shape)
        };

        log::debug!("adding body {id} with a {} shape", definition.shape.name());
        self.registry.insert(id, node);
        self.transport.send(Request::AddRigidbody(definition).into())?;

        self.scene.update_world_matrices(node, true)
    }

    /// Sends every pending change followed by a step of `delta` seconds,
    /// subdivided into steps of at most `max_step` (`delta` when `None`).
    /// Returns at once; `on_complete` receives the tick count once the
    /// resulting world report has been applied.
    pub fn step(&mut self, delta: f32, max_step: Option<f32>, on_complete: impl FnOnce(u32) + 'static) -> Result<()> {
        if self.is_stepping() {
            return Err(Error::AlreadyStepping);
        }

        let _span = info_span!("step", delta).entered();

        let requests = sync::synchronize(&self.scene, &self.registry);
        log::debug!("stepping {delta}s with {} dirty requests", requests.len());
        for request in requests {
            self.transport.send(request.clone().into())?;
            sync::record_sent(&mut self.scene, &self.registry, &request);
        }

        let step = StepSimulation { delta_time: delta, max_step: max_step.unwrap_or(delta) };
        self.transport.send(Request::StepSimulation(step).into())?;

        self.state = StepState::Stepping;
        self.on_step = Some(Box::new(on_complete));
        Ok(())
    }

    /// Applies every report that has already arrived. Returns how many there
    /// were.
    pub fn poll(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(report) = self.transport.try_recv()? {
            self.handle_report(report)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Blocks until the current step, if any, has completed.
    pub fn wait(&mut self) -> Result<()> {
        while self.is_stepping() {
            let report = self.transport.recv()?;
            self.handle_report(report)?;
        }
        Ok(())
    }

    /// Applies one report and hands its buffer back to the solver.
    pub fn handle_report(&mut self, buffer: ReportBuffer) -> Result<Decoded> {
        let decoded = {
            let _span = info_span!("decode_report", len = buffer.len()).entered();
            report::decode(&buffer, &mut self.scene, &self.registry, &mut self.listeners)
        };
        self.transport.send(Packet::Recycle(buffer))?;

        let decoded = decoded?;
        if let Decoded::World { ticks, bodies } = decoded {
            log::debug!("step finished after {ticks} ticks, {bodies} bodies reported");
            self.state = StepState::Idle;
            if let Some(on_step) = self.on_step.take() {
                on_step(ticks);
            }
        }

        Ok(decoded)
    }

    /// Calls `listener` for every contact `node`'s body takes part in.
    pub fn on_contact(&mut self, node: NodeId, listener: impl FnMut(&Contact) + 'static) -> Result<()> {
        self.scene.get(node)?;
        self.listeners.entry(node).or_default().push(Box::new(listener));
        Ok(())
    }

    pub fn node_of(&self, id: BodyId) -> Option<NodeId> {
        self.registry.get(&id).copied()
    }

    /// Registered bodies and their nodes, in id order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, NodeId)> + '_ {
        self.registry.iter().map(|(&id, &node)| (id, node))
    }

    pub fn body(&self, node: NodeId) -> Result<&RigidBodyHandle> {
        self.scene.get(node)?.body().ok_or(Error::NoBody(node))
    }

    pub fn body_mut(&mut self, node: NodeId) -> Result<BodyMut<'_, T>> {
        let body = self.scene.get_mut(node)?.body_mut().ok_or(Error::NoBody(node))?;
        Ok(BodyMut { body, transport: &mut self.transport })
    }
}

/// Mutable access to a body. Property setters reach the solver immediately
/// once the body has been added.
pub struct BodyMut<'a, T: Transport> {
    body: &'a mut RigidBodyHandle,
    transport: &'a mut T,
}

impl<'a, T: Transport> BodyMut<'a, T> {
    fn send(&mut self, request: Option<Request>) -> Result<()> {
        match request {
            Some(request) => self.transport.send(request.into()),
            None => Ok(()),
        }
    }

    pub fn set_mass(&mut self, mass: f32) -> Result<()> {
        let request = self.body.set_mass(mass);
        self.send(request)
    }

    pub fn set_restitution(&mut self, restitution: f32) -> Result<()> {
        let request = self.body.set_restitution(restitution);
        self.send(request)
    }

    pub fn set_friction(&mut self, friction: f32) -> Result<()> {
        let request = self.body.set_friction(friction);
        self.send(request)
    }

    pub fn set_linear_damping(&mut self, damping: f32) -> Result<()> {
        let request = self.body.set_linear_damping(damping);
        self.send(request)
    }

    pub fn set_angular_damping(&mut self, damping: f32) -> Result<()> {
        let request = self.body.set_angular_damping(damping);
        self.send(request)
    }

    pub fn set_collision_groups(&mut self, groups: u32) -> Result<()> {
        let request = self.body.set_collision_groups(groups);
        self.send(request)
    }

    pub fn set_collision_mask(&mut self, mask: u32) -> Result<()> {
        let request = self.body.set_collision_mask(mask);
        self.send(request)
    }
}

impl<'a, T: Transport> Deref for BodyMut<'a, T> {
    type Target = RigidBodyHandle;

    fn deref(&self) -> &Self::Target {
        &*self.body
    }
}

impl<'a, T: Transport> DerefMut for BodyMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scene::Geometry, transport::MemoryTransport};
    use bevy_math::{Mat4, Quat, Vec3};
    use shared::{response::BodyState, RequestKind};
    use std::{cell::Cell, rc::Rc};

    fn world() -> World<MemoryTransport> {
        let mut world = World::new(MemoryTransport::new(), Initialize::default()).unwrap();
        world.transport_mut().take_sent();
        world
    }

    fn kinds(world: &mut World<MemoryTransport>) -> Vec<RequestKind> {
        world
            .transport_mut()
            .take_sent()
            .iter()
            .filter_map(|packet| match packet {
                Packet::Request(request) => Some(request.kind()),
                Packet::Recycle(_) => None,
            })
            .collect()
    }

    fn add_box(world: &mut World<MemoryTransport>, at: Vec3) -> NodeId {
        let node = world.spawn(
            SceneNode::new("box").with_translation(at).with_geometry(Geometry::cuboid(1.0, 1.0, 1.0)),
        );
        world.attach_body(node, ShapeKind::Box, PhysicsDescriptor::default().mass(1.0)).unwrap();
        world.add(node).unwrap();
        node
    }

    /// The report a solver would send for `node` at its current state.
    fn echo(world: &World<MemoryTransport>, ticks: u32) -> ReportBuffer {
        let states: Vec<BodyState> = world
            .bodies()
            .map(|(id, node)| {
                let scene_node = world.scene().get(node).unwrap();
                let body = scene_node.body().unwrap();
                BodyState {
                    id,
                    matrix: scene_node.transform.compute_matrix(),
                    position: scene_node.transform.translation,
                    orientation: scene_node.transform.rotation,
                    linear_velocity: body.linear_velocity,
                    angular_velocity: body.angular_velocity,
                }
            })
            .collect();

        let mut buffer = ReportBuffer::default();
        buffer.write_world(ticks, &states);
        buffer
    }

    #[test]
    fn new_sends_initialize() {
        let world = World::new(MemoryTransport::new(), Initialize::default()).unwrap();
        let kinds: Vec<_> = world.transport().requests().map(Request::kind).collect();
        assert_eq!(kinds, vec![RequestKind::Initialize]);
    }

    #[test]
    fn add_announces_the_full_definition() {
        let mut world = world();
        let node = world.spawn(SceneNode::new("ball").with_geometry(Geometry::cuboid(2.0, 2.0, 2.0)));
        let id = world
            .attach_body(node, ShapeKind::Sphere, PhysicsDescriptor::default().mass(3.0).friction(0.2))
            .unwrap();
        world.add(node).unwrap();

        let sent = world.transport_mut().take_sent();
        let [Packet::Request(Request::AddRigidbody(definition))] = sent.as_slice() else {
            panic!("expected a single ADD_RIGIDBODY, got {sent:?}");
        };
        assert_eq!(definition.body_id, id);
        assert_eq!(definition.mass, 3.0);
        assert_eq!(definition.friction, 0.2);
        assert_eq!(definition.restitution, 0.1);
        assert_eq!(world.node_of(id), Some(node));
        assert!(world.body(node).unwrap().is_registered());

        assert!(matches!(world.add(node), Err(Error::AlreadyRegistered(_))));
    }

    #[test]
    fn step_sends_dirty_state_then_the_step() {
        let mut world = world();
        let node = add_box(&mut world, Vec3::ZERO);
        kinds(&mut world);

        world.step(1.0 / 60.0, None, |_| {}).unwrap();
        assert_eq!(kinds(&mut world), vec![RequestKind::StepSimulation]);

        let report = echo(&world, 1);
        world.handle_report(report).unwrap();
        kinds(&mut world);

        let mut body = world.body_mut(node).unwrap();
        body.linear_velocity = Vec3::new(1.0, 0.0, 0.0);
        world.step(1.0 / 60.0, Some(1.0 / 120.0), |_| {}).unwrap();

        let sent = world.transport_mut().take_sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Packet::Request(Request::SetRigidbodyLinearVelocity { .. })));
        assert!(matches!(
            &sent[1],
            Packet::Request(Request::StepSimulation(StepSimulation { max_step, .. })) if *max_step == 1.0 / 120.0
        ));
    }

    #[test]
    fn stepping_twice_fails_without_sending() {
        let mut world = world();
        add_box(&mut world, Vec3::Y);
        world.step(0.1, None, |_| {}).unwrap();
        kinds(&mut world);

        assert!(matches!(world.step(0.1, None, |_| {}), Err(Error::AlreadyStepping)));
        assert!(world.transport().sent().is_empty());
        assert!(world.is_stepping());
    }

    #[test]
    fn world_report_completes_the_step_once() {
        let mut world = world();
        let node = add_box(&mut world, Vec3::ZERO);

        let calls = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&calls);
        world.step(0.1, None, move |ticks| seen.set(seen.get() + ticks)).unwrap();

        // collisions do not end a step
        let mut collisions = ReportBuffer::default();
        collisions.write_collisions(std::iter::empty());
        world.transport_mut().push_report(collisions);
        assert_eq!(world.poll().unwrap(), 1);
        assert!(world.is_stepping());

        let position = Vec3::new(0.0, -0.5, 0.0);
        let mut buffer = ReportBuffer::default();
        buffer.write_world(
            3,
            &[BodyState {
                id: world.body(node).unwrap().id(),
                matrix: Mat4::from_translation(position),
                position,
                orientation: Quat::IDENTITY,
                linear_velocity: Vec3::new(0.0, -1.0, 0.0),
                angular_velocity: Vec3::ZERO,
            }],
        );
        world.transport_mut().push_report(buffer);
        world.wait().unwrap();

        assert_eq!(world.state(), StepState::Idle);
        assert_eq!(calls.get(), 3);
        assert_eq!(world.scene().get(node).unwrap().transform.translation, position);
        assert_eq!(world.transport().recycled().count(), 2);

        // decoded state is clean
        world.transport_mut().take_sent();
        world.step(0.1, None, |_| {}).unwrap();
        assert_eq!(kinds(&mut world), vec![RequestKind::StepSimulation]);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn malformed_reports_are_still_recycled() {
        let mut world = world();
        world.transport_mut().push_report(ReportBuffer::from_vec(vec![8.0]));

        assert!(matches!(world.poll(), Err(Error::Report(_))));
        assert_eq!(world.transport().recycled().count(), 1);
    }

    #[test]
    fn property_setters_transmit_once_added() {
        let mut world = world();
        let node = world.spawn(SceneNode::new("box").with_geometry(Geometry::cuboid(1.0, 1.0, 1.0)));
        world.attach_body(node, ShapeKind::Box, PhysicsDescriptor::default()).unwrap();

        world.body_mut(node).unwrap().set_restitution(0.9).unwrap();
        assert!(world.transport().sent().is_empty());

        world.add(node).unwrap();
        kinds(&mut world);

        world.body_mut(node).unwrap().set_collision_mask(0b11).unwrap();
        assert_eq!(kinds(&mut world), vec![RequestKind::SetRigidbodyCollisionMask]);
        assert_eq!(world.body(node).unwrap().restitution(), 0.9);
    }

    #[test]
    fn failed_add_leaves_the_node_in_place() {
        let mut world = world();
        let root = world.spawn(SceneNode::new("root"));
        let arm = world.spawn(SceneNode::new("arm").with_translation(Vec3::X));
        world.attach(root, arm).unwrap();
        world.attach_body(arm, ShapeKind::Box, PhysicsDescriptor::default()).unwrap();

        assert!(matches!(world.add(arm), Err(Error::MissingGeometry(node, ShapeKind::Box)) if node == arm));
        assert_eq!(world.scene().get(arm).unwrap().parent(), Some(root));
        assert_eq!(world.scene().get(root).unwrap().children(), &[arm]);
        assert!(world.scene().roots().is_empty());
        assert!(!world.body(arm).unwrap().is_registered());
        assert!(world.transport().sent().is_empty());
        assert_eq!(world.bodies().count(), 0);
    }

    #[test]
    fn factors_stay_dirty_when_their_send_fails() {
        let mut world = world();
        let node = add_box(&mut world, Vec3::ZERO);
        {
            let mut body = world.body_mut(node).unwrap();
            body.linear_factor = Vec3::new(1.0, 0.0, 1.0);
        }
        world.transport_mut().take_sent();

        world.transport_mut().disconnect_after(0);
        assert!(matches!(world.step(0.1, None, |_| {}), Err(Error::Disconnected)));
        assert!(!world.is_stepping());
        assert_eq!(world.body(node).unwrap().shadow().linear_factor, Vec3::ONE);

        world.transport_mut().reconnect();
        world.step(0.1, None, |_| {}).unwrap();
        assert_eq!(
            kinds(&mut world),
            vec![RequestKind::SetRigidbodyLinearFactor, RequestKind::StepSimulation]
        );
        assert_eq!(world.body(node).unwrap().shadow().linear_factor, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn compound_bodies_register_once() {
        let mut world = world();
        let root = world.spawn(SceneNode::new("root").with_translation(Vec3::new(0.0, 5.0, 0.0)));
        let arm = world.spawn(
            SceneNode::new("arm").with_translation(Vec3::X).with_geometry(Geometry::cuboid(1.0, 0.2, 0.2)),
        );
        world.attach(root, arm).unwrap();
        world.attach_body(arm, ShapeKind::Box, PhysicsDescriptor::default()).unwrap();
        world.attach_compound(root, PhysicsDescriptor::default().mass(2.0)).unwrap();
        world.add(root).unwrap();

        let sent = world.transport_mut().take_sent();
        let [Packet::Request(Request::AddRigidbody(definition))] = sent.as_slice() else {
            panic!("expected a single ADD_RIGIDBODY, got {sent:?}");
        };
        assert_eq!(definition.shape.children().len(), 1);
        assert_eq!(world.bodies().count(), 1);
    }
}

//! Applies solver reports to the scene.

use std::collections::BTreeMap;

use bevy_math::Vec3;
use shared::{
    response::{CollisionReport, WorldReport},
    BodyId, ReportBuffer, ReportError, ReportKind,
};

use crate::scene::{NodeId, Scene};

/// A contact as seen from one of its two bodies.
///
/// Both participants receive the same point, normal and relative velocities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub other: NodeId,
    pub other_body: BodyId,
    pub point: Vec3,
    pub normal: Vec3,
    pub relative_linear_velocity: Vec3,
    pub relative_angular_velocity: Vec3,
    pub penetration_depth: f32,
}

pub type ContactListener = Box<dyn FnMut(&Contact)>;

/// Contact listeners by the node they listen on.
pub type ContactListeners = BTreeMap<NodeId, Vec<ContactListener>>;

/// What a decoded report contained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    World { ticks: u32, bodies: usize },
    Collisions { contacts: usize },
}

/// Applies `buffer` to the scene. The buffer is only read; handing it back
/// to the solver is up to the caller.
pub fn decode(
    buffer: &ReportBuffer,
    scene: &mut Scene,
    registry: &BTreeMap<BodyId, NodeId>,
    listeners: &mut ContactListeners,
) -> Result<Decoded, ReportError> {
    match buffer.kind()? {
        ReportKind::World => {
            let report = buffer.world()?;
            apply_world(&report, scene, registry);
            Ok(Decoded::World { ticks: report.ticks(), bodies: report.len() })
        }
        ReportKind::Collisions => {
            let report = buffer.collisions()?;
            dispatch_collisions(&report, registry, listeners);
            Ok(Decoded::Collisions { contacts: report.len() })
        }
    }
}

/// Moves every reported body to where the solver put it. The reported state
/// becomes both the shadow and the live value, so an untouched body is clean
/// on the next step.
pub fn apply_world(report: &WorldReport<'_>, scene: &mut Scene, registry: &BTreeMap<BodyId, NodeId>) {
    for state in report.bodies() {
        let Some(&id) = registry.get(&state.id) else {
            log::warn!("world report names unknown body {}", state.id);
            continue;
        };
        let Some(node) = scene.node_mut(id) else {
            log::warn!("body {} belongs to a node that no longer exists", state.id);
            continue;
        };

        node.set_matrix(state.matrix);
        node.transform.translation = state.position;
        node.transform.rotation = state.orientation;

        if let Some(body) = node.body_mut() {
            let shadow = body.shadow_mut();
            shadow.position = state.position;
            shadow.orientation = state.orientation;
            shadow.linear_velocity = state.linear_velocity;
            shadow.angular_velocity = state.angular_velocity;

            body.linear_velocity = state.linear_velocity;
            body.angular_velocity = state.angular_velocity;
        }

        log::trace!("body {} at {}", state.id, state.position);

        if let Err(e) = scene.update_world_matrices(id, false) {
            log::warn!("could not update world matrices below {id:?}, {e}");
        }
    }
}

/// Notifies the listeners of both bodies in every contact.
pub fn dispatch_collisions(
    report: &CollisionReport<'_>,
    registry: &BTreeMap<BodyId, NodeId>,
    listeners: &mut ContactListeners,
) {
    for record in report.contacts() {
        let (Some(&node_a), Some(&node_b)) = (registry.get(&record.body_a), registry.get(&record.body_b)) else {
            log::warn!("contact between unknown bodies {} and {}", record.body_a, record.body_b);
            continue;
        };

        let contact = |other, other_body| Contact {
            other,
            other_body,
            point: record.point,
            normal: record.normal,
            relative_linear_velocity: record.relative_linear_velocity,
            relative_angular_velocity: record.relative_angular_velocity,
            penetration_depth: record.penetration_depth,
        };

        notify(listeners, node_a, &contact(node_b, record.body_b));
        notify(listeners, node_b, &contact(node_a, record.body_a));
    }
}

fn notify(listeners: &mut ContactListeners, node: NodeId, contact: &Contact) {
    if let Some(listeners) = listeners.get_mut(&node) {
        for listener in listeners {
            listener(contact);
        }
    }
}

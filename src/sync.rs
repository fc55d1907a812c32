//! Finds body state the application changed since the solver last reported it.

use std::collections::BTreeMap;

use bevy_transform::prelude::Transform;
use shared::{BodyId, Request};

use crate::{
    body::RigidBodyHandle,
    scene::{NodeId, Scene},
};

/// Appends the requests needed to bring the solver up to date with `body`,
/// always in the order transform, linear velocity, angular velocity, linear
/// factor, angular factor.
///
/// Nothing is recorded here. Factor shadows move once [`record_sent`] sees
/// their request delivered; transform and velocity shadows wait for the next
/// world report.
pub fn dirty_requests(transform: &Transform, body: &RigidBodyHandle, out: &mut Vec<Request>) {
    let body_id = body.id();
    let shadow = *body.shadow();

    if transform.translation != shadow.position || transform.rotation != shadow.orientation {
        out.push(Request::SetRigidbodyTransform {
            body_id,
            position: transform.translation.into(),
            orientation: transform.rotation.into(),
        });
    }

    if body.linear_velocity != shadow.linear_velocity {
        out.push(Request::SetRigidbodyLinearVelocity { body_id, vector: body.linear_velocity.into() });
    }

    if body.angular_velocity != shadow.angular_velocity {
        out.push(Request::SetRigidbodyAngularVelocity { body_id, vector: body.angular_velocity.into() });
    }

    if body.linear_factor != shadow.linear_factor {
        out.push(Request::SetRigidbodyLinearFactor { body_id, vector: body.linear_factor.into() });
    }

    if body.angular_factor != shadow.angular_factor {
        out.push(Request::SetRigidbodyAngularFactor { body_id, vector: body.angular_factor.into() });
    }
}

/// Collects the dirty state of every registered body, in id order.
pub fn synchronize(scene: &Scene, registry: &BTreeMap<BodyId, NodeId>) -> Vec<Request> {
    let mut requests = Vec::new();

    for (&id, &node) in registry {
        let Some(node) = scene.node(node) else {
            log::warn!("body {id} belongs to a node that no longer exists");
            continue;
        };

        if let Some(body) = node.body() {
            dirty_requests(&node.transform, body, &mut requests);
        }
    }

    log::trace!("{} dirty requests for {} bodies", requests.len(), registry.len());
    requests
}

/// Remembers a factor the solver has been sent. Other requests are left to
/// the next world report.
pub fn commit_factor(body: &mut RigidBodyHandle, request: &Request) {
    match request {
        Request::SetRigidbodyLinearFactor { vector, .. } => body.shadow_mut().linear_factor = (*vector).into(),
        Request::SetRigidbodyAngularFactor { vector, .. } => body.shadow_mut().angular_factor = (*vector).into(),
        _ => {}
    }
}

/// [`commit_factor`] for a request that was just delivered, looking its body
/// up by id.
pub fn record_sent(scene: &mut Scene, registry: &BTreeMap<BodyId, NodeId>, request: &Request) {
    let body_id = match request {
        Request::SetRigidbodyLinearFactor { body_id, .. } | Request::SetRigidbodyAngularFactor { body_id, .. } => *body_id,
        _ => return,
    };

    if let Some(body) = registry.get(&body_id).and_then(|&node| scene.node_mut(node)).and_then(|node| node.body_mut()) {
        commit_factor(body, request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::PhysicsDescriptor,
        shape::{ShapeKind, ShapeResolver},
    };
    use bevy_math::{Quat, Vec3};
    use shared::RequestKind;

    fn body() -> RigidBodyHandle {
        RigidBodyHandle::new(7, PhysicsDescriptor::default(), ShapeResolver::primitive(ShapeKind::Box))
    }

    fn kinds(requests: &[Request]) -> Vec<RequestKind> {
        requests.iter().map(Request::kind).collect()
    }

    #[test]
    fn clean_body_emits_nothing() {
        let body = body();
        let mut out = Vec::new();

        dirty_requests(&Transform::IDENTITY, &body, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn only_changed_fields_are_sent() {
        let mut body = body();
        let mut out = Vec::new();

        body.linear_velocity = Vec3::new(0.0, 2.0, 0.0);
        dirty_requests(&Transform::IDENTITY, &body, &mut out);

        assert_eq!(
            out,
            vec![Request::SetRigidbodyLinearVelocity { body_id: 7, vector: Vec3::new(0.0, 2.0, 0.0).into() }]
        );
    }

    #[test]
    fn everything_dirty_keeps_the_fixed_order() {
        let mut body = body();
        let mut out = Vec::new();

        body.angular_factor = Vec3::ZERO;
        body.linear_factor = Vec3::new(1.0, 0.0, 1.0);
        body.angular_velocity = Vec3::X;
        body.linear_velocity = Vec3::Y;
        let transform = Transform::from_xyz(0.0, 1.0, 0.0).with_rotation(Quat::from_rotation_x(0.3));

        dirty_requests(&transform, &body, &mut out);
        assert_eq!(
            kinds(&out),
            vec![
                RequestKind::SetRigidbodyTransform,
                RequestKind::SetRigidbodyLinearVelocity,
                RequestKind::SetRigidbodyAngularVelocity,
                RequestKind::SetRigidbodyLinearFactor,
                RequestKind::SetRigidbodyAngularFactor,
            ]
        );

        // unsent requests leave everything dirty
        let sent = std::mem::take(&mut out);
        dirty_requests(&transform, &body, &mut out);
        assert_eq!(out, sent);

        // delivered factors are remembered, transform and velocities wait for a report
        for request in &sent {
            commit_factor(&mut body, request);
        }
        out.clear();
        dirty_requests(&transform, &body, &mut out);
        assert_eq!(
            kinds(&out),
            vec![
                RequestKind::SetRigidbodyTransform,
                RequestKind::SetRigidbodyLinearVelocity,
                RequestKind::SetRigidbodyAngularVelocity,
            ]
        );
    }
}

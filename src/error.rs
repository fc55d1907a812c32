use shared::{codec::CodecError, settings::SettingsError, BodyId, ReportError};
use thiserror::Error;

use crate::{scene::NodeId, shape::ShapeKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("world is already stepping, cannot call step() until it has finished")]
    AlreadyStepping,
    #[error("scene node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("scene node {0:?} has no rigid body")]
    NoBody(NodeId),
    #[error("scene node {0:?} already has a rigid body")]
    AlreadyHasBody(NodeId),
    #[error("body {0} is already registered with the world")]
    AlreadyRegistered(BodyId),
    #[error("scene node {0:?} has no geometry to derive a {1:?} shape from")]
    MissingGeometry(NodeId, ShapeKind),
    #[error("scene node {0:?} resolves to no shape")]
    NoShape(NodeId),
    #[error("every body id has been handed out")]
    IdsExhausted,
    #[error("malformed report, {0}")]
    Report(#[from] ReportError),
    #[error("solver channel disconnected")]
    Disconnected,
    #[error("io error, {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

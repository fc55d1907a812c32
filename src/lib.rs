//! Host side of a physics bridge: a scene graph whose rigid bodies are
//! simulated by a solver on another thread or another machine.

pub mod body;
pub mod error;
pub mod ids;
pub mod report;
pub mod scene;
pub mod shape;
pub mod sync;
pub mod transport;
pub mod world;

pub use body::{PhysicsDescriptor, RigidBodyHandle, Shadow};
pub use error::{Error, Result};
pub use report::{Contact, Decoded};
pub use scene::{Geometry, NodeId, PhysicsRole, Scene, SceneNode};
pub use shape::{ShapeKind, ShapeResolver, ShapeStrategy};
pub use transport::Transport;
pub use world::{BodyMut, StepState, World};

pub use physics;
pub use shared;

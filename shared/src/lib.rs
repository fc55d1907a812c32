pub mod codec;
pub mod deflate;
pub mod request;
pub mod response;
pub mod settings;
pub mod shape;

pub use request::{BodyId, Packet, Request, RequestKind};
pub use response::{ReportBuffer, ReportError, ReportKind};
pub use shape::ShapeDescriptor;

/// Wire configuration used by every bincode encode/decode on the solver channel.
pub const CONFIG: bincode::config::Configuration = bincode::config::standard();

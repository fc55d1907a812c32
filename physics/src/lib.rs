//! Solver-side plumbing: runs a [`Solver`] behind a worker thread or a TCP
//! socket and manages the report buffers it sends back to the host.

use shared::Request;

pub mod echo;
pub mod outbox;
pub mod server;
pub mod worker;

pub use outbox::Outbox;

/// A physics solver as seen by the bridge: requests in, report buffers out.
pub trait Solver: Send {
    /// Handles one request. Reports are posted to `outbox`, which also hands
    /// out recycled buffers.
    fn handle(&mut self, request: Request, outbox: &mut Outbox);
}

impl<S: Solver + ?Sized> Solver for Box<S> {
    fn handle(&mut self, request: Request, outbox: &mut Outbox) {
        (**self).handle(request, outbox)
    }
}

//! Channels between the host and a solver.

use physics::Solver;
use shared::{settings::SolverBackend, Packet, ReportBuffer};

use crate::error::Result;

pub mod memory;
pub mod remote;
pub mod worker;

pub use memory::MemoryTransport;
pub use remote::RemoteTransport;
pub use worker::WorkerTransport;

/// Ordered, asynchronous delivery of packets to a solver and of report
/// buffers back. Packets reach the solver in the order they were sent.
pub trait Transport {
    fn send(&mut self, packet: Packet) -> Result<()>;

    /// Returns a report if one has already arrived.
    fn try_recv(&mut self) -> Result<Option<ReportBuffer>>;

    /// Blocks until a report arrives.
    fn recv(&mut self) -> Result<ReportBuffer>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, packet: Packet) -> Result<()> {
        (**self).send(packet)
    }

    fn try_recv(&mut self) -> Result<Option<ReportBuffer>> {
        (**self).try_recv()
    }

    fn recv(&mut self) -> Result<ReportBuffer> {
        (**self).recv()
    }
}

/// Opens the transport `backend` asks for. `solver` only runs when the
/// backend is an in-process worker.
pub fn connect<S: Solver + 'static>(backend: &SolverBackend, solver: S) -> Result<Box<dyn Transport>> {
    match backend {
        SolverBackend::Worker => Ok(Box::new(WorkerTransport::spawn(solver)?)),
        SolverBackend::Server { compress, address } => Ok(Box::new(RemoteTransport::connect(address, *compress)?)),
    }
}

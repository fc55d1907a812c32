use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use shared::{Packet, ReportBuffer};
use tracing::info_span;

use crate::{Outbox, Solver};

/// Channels connecting the host to a solver thread.
pub struct WorkerChannels {
    pub packets: Sender<Packet>,
    pub reports: Receiver<ReportBuffer>,
    pub thread: JoinHandle<()>,
}

/// Starts `solver` on its own thread.
pub fn spawn<S: Solver + 'static>(solver: S) -> std::io::Result<WorkerChannels> {
    let (packet_tx, packet_rx) = unbounded();
    let (report_tx, report_rx) = unbounded();

    let thread = std::thread::Builder::new()
        .name("physics-solver".to_string())
        .spawn(move || run(solver, packet_rx, report_tx))?;

    Ok(WorkerChannels { packets: packet_tx, reports: report_rx, thread })
}

/// Serves packets until the host hangs up.
pub fn run<S: Solver>(mut solver: S, packets: Receiver<Packet>, reports: Sender<ReportBuffer>) {
    log::debug!("starting physics solver");

    let mut outbox = Outbox::default();

    while let Ok(packet) = packets.recv() {
        match packet {
            Packet::Recycle(buffer) => outbox.recycle(buffer),
            Packet::Request(request) => {
                let _span = info_span!("handle_request", kind = request.kind().as_str()).entered();
                solver.handle(request, &mut outbox);
            }
        }

        for report in outbox.drain() {
            if reports.send(report).is_err() {
                log::debug!("host dropped the report channel, stopping solver");
                return;
            }
        }
    }

    log::debug!("host closed the packet channel, {} report buffers were allocated", outbox.allocated());
}

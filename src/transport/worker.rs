use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender, TryRecvError};
use physics::Solver;
use shared::{Packet, ReportBuffer};
use tracing::info_span;

use super::Transport;
use crate::error::{Error, Result};

/// A solver running on a thread of this process.
pub struct WorkerTransport {
    packets: Option<Sender<Packet>>,
    reports: Receiver<ReportBuffer>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerTransport {
    pub fn spawn<S: Solver + 'static>(solver: S) -> Result<Self> {
        let channels = physics::worker::spawn(solver)?;

        Ok(WorkerTransport {
            packets: Some(channels.packets),
            reports: channels.reports,
            thread: Some(channels.thread),
        })
    }
}

impl Transport for WorkerTransport {
    fn send(&mut self, packet: Packet) -> Result<()> {
        let _span = info_span!("packet_sent_over_channel").entered();
        let packets = self.packets.as_ref().ok_or(Error::Disconnected)?;
        packets.send(packet).map_err(|_| Error::Disconnected)
    }

    fn try_recv(&mut self) -> Result<Option<ReportBuffer>> {
        match self.reports.try_recv() {
            Ok(report) => Ok(Some(report)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::Disconnected),
        }
    }

    fn recv(&mut self) -> Result<ReportBuffer> {
        let _span = info_span!("report_received_over_channel").entered();
        self.reports.recv().map_err(|_| Error::Disconnected)
    }
}

impl Drop for WorkerTransport {
    fn drop(&mut self) {
        // closing the packet channel stops the solver loop
        self.packets.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("physics solver thread panicked");
            }
        }
    }
}

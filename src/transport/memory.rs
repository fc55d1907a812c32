use std::collections::VecDeque;

use shared::{Packet, ReportBuffer, Request};

use super::Transport;
use crate::error::{Error, Result};

/// Records every packet and plays back queued reports. There is no solver
/// behind it: whatever a test queues is what the host receives.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Vec<Packet>,
    inbound: VecDeque<ReportBuffer>,
    /// Sends accepted before the transport acts disconnected.
    remaining: Option<usize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a report for the host.
    pub fn push_report(&mut self, report: ReportBuffer) {
        self.inbound.push_back(report);
    }

    pub fn sent(&self) -> &[Packet] {
        &self.sent
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.sent.iter().filter_map(|packet| match packet {
            Packet::Request(request) => Some(request),
            Packet::Recycle(_) => None,
        })
    }

    pub fn recycled(&self) -> impl Iterator<Item = &ReportBuffer> {
        self.sent.iter().filter_map(|packet| match packet {
            Packet::Recycle(buffer) => Some(buffer),
            Packet::Request(_) => None,
        })
    }

    /// Accepts `sends` more packets, then fails every send with
    /// `Error::Disconnected`.
    pub fn disconnect_after(&mut self, sends: usize) {
        self.remaining = Some(sends);
    }

    pub fn reconnect(&mut self) {
        self.remaining = None;
    }

    /// Forgets everything sent so far.
    pub fn take_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, packet: Packet) -> Result<()> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return Err(Error::Disconnected);
            }
            *remaining -= 1;
        }
        self.sent.push(packet);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<ReportBuffer>> {
        Ok(self.inbound.pop_front())
    }

    /// Nothing can ever arrive once the queue is empty, so an empty queue is
    /// reported as a disconnect rather than blocking.
    fn recv(&mut self) -> Result<ReportBuffer> {
        self.inbound.pop_front().ok_or(Error::Disconnected)
    }
}

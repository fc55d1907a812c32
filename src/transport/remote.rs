use std::{
    io::{BufReader, BufWriter},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    thread::JoinHandle,
};

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};
use shared::{
    codec::{self, CodecError},
    Packet, ReportBuffer,
};
use tracing::info_span;

use super::Transport;
use crate::error::{Error, Result};

/// A solver served by the `physics` binary over TCP.
///
/// Packets are written by one thread and reports read by another, so sending
/// never waits on the socket.
pub struct RemoteTransport {
    packets: Option<Sender<Packet>>,
    reports: Receiver<ReportBuffer>,
    stream: TcpStream,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl RemoteTransport {
    pub fn connect(address: impl ToSocketAddrs, compress: Option<u32>) -> Result<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        log::debug!("connected to physics server at {:?}, compression {compress:?}", stream.peer_addr());

        let (packet_tx, packet_rx) = unbounded();
        let (report_tx, report_rx) = unbounded();

        let writer = stream.try_clone()?;
        let reader = stream.try_clone()?;

        let writer = std::thread::Builder::new()
            .name("physics-writer".to_string())
            .spawn(move || write_packets(writer, compress, packet_rx))?;
        let reader = std::thread::Builder::new()
            .name("physics-reader".to_string())
            .spawn(move || read_reports(reader, compress, report_tx))?;

        Ok(RemoteTransport {
            packets: Some(packet_tx),
            reports: report_rx,
            stream,
            writer: Some(writer),
            reader: Some(reader),
        })
    }
}

fn write_packets(stream: TcpStream, compress: Option<u32>, packets: Receiver<Packet>) {
    let mut writer = BufWriter::new(stream);

    while let Ok(packet) = packets.recv() {
        let _span = info_span!("packet_sent").entered();
        if let Err(e) = codec::write_packet(&mut writer, &packet, compress) {
            if !e.is_disconnect() {
                log::error!("could not send packet to physics server, {e}");
            }
            return;
        }
    }
}

fn read_reports(stream: TcpStream, compress: Option<u32>, reports: Sender<ReportBuffer>) {
    let mut reader = BufReader::new(stream);

    loop {
        let report = {
            let _span = info_span!("report_received").entered();
            codec::read_packet::<ReportBuffer, _>(&mut reader, compress)
        };

        match report {
            Ok(report) => {
                if reports.send(report).is_err() {
                    return;
                }
            }
            Err(e) => {
                log_read_error(&e);
                return;
            }
        }
    }
}

fn log_read_error(e: &CodecError) {
    if e.is_disconnect() {
        log::debug!("physics server closed the connection");
    } else {
        log::error!("could not read report from physics server, {e}");
    }
}

impl Transport for RemoteTransport {
    fn send(&mut self, packet: Packet) -> Result<()> {
        // the solver refills recycled buffers, their contents need not travel
        let packet = match packet {
            Packet::Recycle(mut buffer) => {
                buffer.clear();
                Packet::Recycle(buffer)
            }
            packet => packet,
        };

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
        self.reports.recv().map_err(|_| Error::Disconnected)
    }
}

impl Drop for RemoteTransport {
    fn drop(&mut self) {
        // let the writer drain what was queued, then unblock the reader
        self.packets.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                log::error!("physics writer thread panicked");
            }
        }

        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("could not shut down physics connection, {e}");
        }

        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log::error!("physics reader thread panicked");
            }
        }
    }
}

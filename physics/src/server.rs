use std::{
    io::{BufReader, BufWriter},
    net::{TcpListener, TcpStream},
};

use crossbeam::channel::{unbounded, Receiver, Sender};
use shared::{
    codec::{self, CodecError},
    Packet, ReportBuffer,
};
use tracing::info_span;

use crate::{worker, Solver};

/// Accepts connections forever, running a fresh solver for each.
pub fn serve<S, F>(listener: TcpListener, compress: Option<u32>, mut make_solver: F) -> std::io::Result<()>
where
    S: Solver + 'static,
    F: FnMut() -> S,
{
    log::info!("physics server listening on {}", listener.local_addr()?);

    for stream in listener.incoming() {
        let stream = stream?;
        let solver = make_solver();

        std::thread::spawn(move || {
            if let Err(e) = handle_connection(stream, compress, solver) {
                log::error!("solver connection failed, {e}");
            }
        });
    }

    Ok(())
}

/// Runs `solver` for a single host connection until the host disconnects.
pub fn handle_connection<S: Solver>(stream: TcpStream, compress: Option<u32>, solver: S) -> Result<(), CodecError> {
    log::debug!("host connected from {:?}", stream.peer_addr());
    stream.set_nodelay(true)?;

    let (packet_tx, packet_rx) = unbounded();
    let (report_tx, report_rx) = unbounded();

    let reader = stream.try_clone()?;
    std::thread::spawn(move || read_packets(reader, compress, packet_tx));

    let writer = std::thread::spawn(move || write_reports(stream, compress, report_rx));

    worker::run(solver, packet_rx, report_tx);

    match writer.join() {
        Ok(result) => result,
        Err(_) => {
            log::error!("report writer panicked");
            Ok(())
        }
    }
}

fn read_packets(stream: TcpStream, compress: Option<u32>, packets: Sender<Packet>) {
    let mut reader = BufReader::new(stream);

    loop {
        let packet = {
            let _span = info_span!("packet_received").entered();
            codec::read_packet::<Packet, _>(&mut reader, compress)
        };

        match packet {
            Ok(packet) => {
                if packets.send(packet).is_err() {
                    return;
                }
            }
            Err(e) if e.is_disconnect() => {
                log::debug!("host disconnected");
                return;
            }
            Err(e) => {
                log::error!("could not read packet from host, {e}");
                return;
            }
        }
    }
}

fn write_reports(stream: TcpStream, compress: Option<u32>, reports: Receiver<ReportBuffer>) -> Result<(), CodecError> {
    let mut writer = BufWriter::new(stream);

    while let Ok(report) = reports.recv() {
        let _span = info_span!("report_sent").entered();
        match codec::write_packet(&mut writer, &report, compress) {
            Err(e) if e.is_disconnect() => return Ok(()),
            result => {
                result?;
            }
        }
    }

    Ok(())
}

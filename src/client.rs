use std::io::Write;
use std::net::Shutdown;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::endpoint::{Endpoint, Stream};
use crate::util::traffic::Traffic;

/// One measurement run: how many packets of what size, and where to.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub num_packets: u64,
    pub packet_size: usize,
}

/// Connect, push the configured packets, close. Each phase is timed and
/// reported on stdout; any failure aborts the whole run.
pub fn run(config: &ClientConfig) -> Result<()> {
    info!("Connecting to [{}]...", config.endpoint);

    let connect_start = Instant::now();
    let mut stream = Stream::connect(&config.endpoint)
        .with_context(|| format!("fail to connect to [{}]", config.endpoint))?;
    println!(
        "Connection established in {:.6} seconds",
        connect_start.elapsed().as_secs_f64()
    );
    info!("local [{}] connected to [{}]", stream.local_desc(), config.endpoint);

    let (traffic, elapsed) = send_packets(&mut stream, config.num_packets, config.packet_size)?;
    let rate = traffic.rate(elapsed);
    println!("Total time: {:.6} seconds", elapsed.as_secs_f64());
    println!("Throughput: {:.6} packets per second", rate.pps);
    println!("Throughput: {:.6} MB per second", rate.mbps);

    let close_start = Instant::now();
    stream
        .shutdown(Shutdown::Both)
        .context("fail to shut down the connection")?;
    drop(stream);
    println!(
        "Socket closure time: {:.6} seconds",
        close_start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn send_packets(
    stream: &mut Stream,
    num_packets: u64,
    packet_size: usize,
) -> Result<(Traffic, Duration)> {
    // only the size matters for the measurement
    let packet = vec![0u8; packet_size];
    let mut traffic = Traffic::default();

    let start = Instant::now();
    for _ in 0..num_packets {
        stream.write_all(&packet).context("fail to send packet")?;
        traffic.inc_traffic(packet_size as u64);
    }
    Ok((traffic, start.elapsed()))
}

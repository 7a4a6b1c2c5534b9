use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use sock_bench::client::ClientConfig;
use sock_bench::endpoint::Endpoint;

#[derive(Parser, Debug, Clone)]
#[clap(name = "sb-client", author, about = "socket throughput client", long_about = None)]
pub struct Args {
    /// address family to connect over
    #[arg(value_enum)]
    pub family: Family,

    /// server ip address (inet) or socket path (unix)
    pub addr: String,

    /// inet: <port> <num_packets> <packet_size>; unix: <num_packets> <packet_size>
    #[arg(required = true, value_name = "ARG")]
    pub rest: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Family {
    Inet,
    Unix,
}

impl Args {
    /// The last two positionals are always the packet count and size; inet
    /// takes the port in front of them.
    pub fn normalize(&self) -> Result<ClientConfig> {
        let endpoint = match self.family {
            Family::Inet => {
                if self.rest.len() != 3 {
                    bail!("inet takes <ip> <port> <num_packets> <packet_size>");
                }
                let ip: Ipv4Addr = self
                    .addr
                    .parse()
                    .with_context(|| format!("invalid ip [{}]", self.addr))?;
                let port: u16 = self.rest[0]
                    .parse()
                    .with_context(|| format!("invalid port [{}]", self.rest[0]))?;
                Endpoint::Inet(SocketAddr::V4(SocketAddrV4::new(ip, port)))
            }
            Family::Unix => {
                if self.rest.len() != 2 {
                    bail!("unix takes <path> <num_packets> <packet_size>");
                }
                Endpoint::Local(PathBuf::from(&self.addr))
            }
        };

        let num_arg = &self.rest[self.rest.len() - 2];
        let size_arg = &self.rest[self.rest.len() - 1];
        let num_packets: u64 = num_arg
            .parse()
            .with_context(|| format!("invalid num_packets [{}]", num_arg))?;
        let packet_size: usize = size_arg
            .parse()
            .with_context(|| format!("invalid packet_size [{}]", size_arg))?;
        if packet_size == 0 {
            bail!("packet_size must be greater than zero");
        }

        Ok(ClientConfig {
            endpoint,
            num_packets,
            packet_size,
        })
    }
}

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sock_bench::endpoint::Endpoint;
use sock_bench::server::ServerConfig;

#[derive(Parser, Debug, Clone)]
#[clap(name = "sb-server", author, about = "socket throughput server", long_about = None)]
pub struct Args {
    /// address family to listen on
    #[arg(value_enum)]
    pub family: Family,

    /// port to listen on (inet) or socket path (unix)
    pub addr: String,

    /// put the listening socket in non-blocking mode
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    pub non_blocking: u8,

    /// wait for connections with a 1-second poll instead of a blocking accept
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    pub poll: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Family {
    Inet,
    Unix,
}

impl Args {
    pub fn normalize(&self) -> Result<ServerConfig> {
        let endpoint = match self.family {
            Family::Inet => {
                let port: u16 = self
                    .addr
                    .parse()
                    .with_context(|| format!("invalid port [{}]", self.addr))?;
                Endpoint::Inet(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
            }
            Family::Unix => Endpoint::Local(PathBuf::from(&self.addr)),
        };

        Ok(ServerConfig {
            endpoint,
            non_blocking: self.non_blocking != 0,
            poll_accept: self.poll != 0,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(argv: &[&str]) -> Result<ServerConfig> {
        Ok(Args::try_parse_from(argv)?.normalize()?)
    }

    #[test]
    fn test_inet_argv() {
        let config = parse(&["sb-server", "inet", "9000", "0", "0"]).unwrap();
        assert_eq!(config.endpoint, Endpoint::Inet("0.0.0.0:9000".parse().unwrap()));
        assert!(!config.non_blocking);
        assert!(!config.poll_accept);
    }

    #[test]
    fn test_unix_argv() {
        let config = parse(&["sb-server", "unix", "/tmp/some.sock", "1", "1"]).unwrap();
        assert_eq!(config.endpoint, Endpoint::Local("/tmp/some.sock".into()));
        assert!(config.non_blocking);
        assert!(config.poll_accept);
    }

    #[test]
    fn test_rejected_argv() {
        // missing flags
        assert!(parse(&["sb-server", "inet", "9000"]).is_err());
        // flags are 0 or 1
        assert!(parse(&["sb-server", "inet", "9000", "2", "0"]).is_err());
        // inet wants a numeric port
        assert!(parse(&["sb-server", "inet", "/tmp/some.sock", "0", "0"]).is_err());
    }
}

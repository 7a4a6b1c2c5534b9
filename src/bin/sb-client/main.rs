use anyhow::Result;
use args::Args;
use clap::Parser;
use sock_bench::{client, util::log};
use tracing::error;

mod args;

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    log::init();

    if let Err(e) = run_me(&args) {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run_me(args: &Args) -> Result<()> {
    let config = args.normalize()?;
    client::run(&config)
}

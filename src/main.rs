use anyhow::Result;
use clap::Parser;
use imteach::cli::SubCommandExtend;
use imteach::config::{Opts, SubCommand};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Teach(config) => config.run(&opts).await,
        SubCommand::Classify(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
        SubCommand::Admin(config) => config.run(&opts).await,
    }
}

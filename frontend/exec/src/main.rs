mod config;
mod drive;
mod frame_dump;
mod logger;
mod shutdown;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use remote_api::RemoteApi;
use crate::config::{Cli, Config};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply(&cli);

    let stop = shutdown::on_ctrl_c()?;

    let connection = &config.connection;
    let mut sim = RemoteApi::connect(&connection.host, connection.port, config.timeout())
        .context("Failed connecting to remote API server")?;

    drive::run(&mut sim, &config, &stop)?;

    info!("Program ended after {} remote calls", sim.calls());

    Ok(())
}

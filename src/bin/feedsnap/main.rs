use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_run;
mod cmd_ingest;
mod cmd_status;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт - info.
    // Пример: RUST_LOG=debug feedsnap run
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Run { dirs, entities, compare, json } =>
            cmd_run::exec(dirs, entities, compare, json),

        cli::Cmd::Ingest { dirs, entity, xlsx, compare, json } =>
            cmd_ingest::exec(dirs, entity, xlsx, compare, json),

        cli::Cmd::Status { dirs, json } =>
            cmd_status::exec(dirs, json),
    }
}

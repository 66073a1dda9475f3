mod args;

use crate::args::Args;
use clap::Parser;
use env_logger::Env;
use reproducible_common::config;
use reproducible_common::errors::*;

fn main() -> Result<()> {
    let args = Args::parse();

    let logging = match args.verbose {
        0 => "info",
        1 => "reproducible_scheduler=debug,reproducible_common=debug,info",
        2 => "debug",
        3 => "reproducible_scheduler=trace,reproducible_common=trace,debug",
        _ => "trace",
    };

    env_logger::init_from_env(Env::default().default_filter_or(logging));

    dotenvy::dotenv().ok();
    let config = config::load(args.config.as_deref())?;
    if args.check_config {
        println!("{:#?}", config);
    } else {
        reproducible_scheduler::run(
            &config,
            &reproducible_scheduler::RunOptions {
                sync: !args.skip_sync,
                schedule: !args.skip_schedule,
            },
        )?;
    }
    Ok(())
}

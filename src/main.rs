use chrono::Local;
use log::{error, info};
use std::process;

use hmas_tools::{logging, output, Args};

fn main() {
    // Start a clock to measure how long the tool takes
    let start_time = Local::now();

    let args = Args::new().unwrap_or_else(|err| {
        eprintln!("Argument error: {:#}", err);
        process::exit(1);
    });
    if let Err(err) = logging::init_logger(args.log_level, args.log_file.as_deref()) {
        eprintln!("{:#}", err);
        process::exit(1);
    }

    if let Err(err) = hmas_tools::run(&args.command) {
        error!("{} failed: {:#}", args.command_name(), err);
        process::exit(1);
    }
    info!(
        "{} finished.  Total time: {}",
        args.command_name(),
        output::elapsed_since(start_time)
    );
}

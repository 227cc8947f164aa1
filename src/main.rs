mod args;
mod sim;

use clap::Parser;
use log::info;

fn main() {
    let args = args::Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }
    info!("args: {:?}", args);

    match sim::run_command(&args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            sim::report_error(&e);
            std::process::exit(1);
        }
    }
}

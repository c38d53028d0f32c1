use clap::Parser;

use tacl::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = cli::run(cli) {
        log::error!("{err}");
        std::process::exit(err.exit_code());
    }
}

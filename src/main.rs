use pipesh::{config::Config, helper::DynError, logging, shell::Shell};
use std::process::exit;

fn main() -> Result<(), DynError> {
    let config = Config::from_env();
    logging::init(&config);
    tracing::debug!(?config, "starting");

    let shell = Shell::new(config);
    let code = shell.run()?;
    exit(code);
}

pub mod ext;
pub mod pipe;
pub mod command;

mod err;
pub use err::{Error, Result};

use std::path::Path;
use fern::Dispatch;

/// Console receives messages starting with `info`.
/// In the verbose mode, `log_file` is opened in append mode and receives all messages starting with `debug`.
/// Otherwise, the file is not touched.
fn build_logger(verbose: bool, log_file: &Path) -> Result<Dispatch> {
    use fern::colors::{Color, ColoredLevelConfig};
    let colors = ColoredLevelConfig::default()
        .info(Color::Green)
        .debug(Color::Cyan);
    let console = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {:>5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    let mut dispatch = Dispatch::new()
        .level(log::LevelFilter::Debug)
        .chain(console);
    if verbose {
        let file = fern::log_file(log_file).map_err(err::add_path!(log_file))?;
        dispatch = dispatch.chain(Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} {:>5} {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    message
                ))
            })
            .level(log::LevelFilter::Debug)
            .chain(file));
    }
    Ok(dispatch)
}

/// Builds the logger and sets it as the global one.
fn init_logger(verbose: bool, log_file: &Path) -> Result<()> {
    build_logger(verbose, log_file)?
        .apply().map_err(|e| err::error!(RuntimeError, "Cannot initialize logger: {}", e))
}

fn main() {
    let argv: Vec<_> = std::env::args().collect();
    match command::run(&argv) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            // Logger is not initialized yet if arguments could not be parsed.
            if log::max_level() == log::LevelFilter::Off {
                eprintln!("{}", e.display());
            } else {
                log::error!("{}", e.display());
            }
            std::process::exit(1);
        }
    }
}

use std::io::Write;

/// Default filter; `RUST_LOG` replaces it entirely.
pub const DEFAULT_FILTER: &str = "xlsx_enrich=debug,rust_core=info,warn";
const VERBOSE_FILTER: &str = "xlsx_enrich=debug,rust_core=debug,warn";

/// Sends `LEVEL: message` lines to stdout. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .try_init();
}

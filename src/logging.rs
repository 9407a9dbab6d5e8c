//! Diagnostics go to stderr through the `log` facade; stdout is reserved for
//! the rendered report.

use log::LevelFilter;

/// Install the global logger. Safe to call more than once; later calls only
/// adjust the level.
pub fn init(level: LevelFilter) {
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(LevelFilter::Trace)
        .level_for("ureq", LevelFilter::Warn)
        .level_for("rustls", LevelFilter::Warn)
        .chain(std::io::stderr());

    // Fails only when a logger is already installed.
    let _ = dispatch.apply();
    set_level(level);
}

/// Change the maximum level after initialization, e.g. once the config file
/// has been read.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}

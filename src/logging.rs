use flexi_logger::{
    colored_default_format, opt_format, Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger,
    LoggerHandle, Naming,
};
use std::path::Path;

/// Start the global logger. Level comes from `RUST_LOG`, falling back to `info`.
///
/// With a directory, logs also go to size-rotated files there and info and
/// above are duplicated to stderr.
pub fn setup_logging(log_dir: Option<&Path>) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str("info")?.format(colored_default_format);

    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .format_for_files(opt_format)
            .duplicate_to_stderr(Duplicate::Info)
            .format_for_stderr(colored_default_format)
            .rotate(
                Criterion::Size(10 * 1024 * 1024),
                Naming::Numbers,
                Cleanup::KeepLogFiles(7),
            ),
        None => logger,
    };

    logger.start()
}

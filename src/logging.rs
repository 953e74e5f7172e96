use log::LevelFilter;
use std::io::Write;

/// Install the process-wide logger. Later calls only adjust the level.
pub fn init_logger(level: LevelFilter) {
  let mut builder = env_logger::Builder::new();
  builder
    .format(move |buf, record| {
      writeln!(
        buf,
        "{} {}: {} - {}",
        buf.timestamp_seconds(),
        record.level(),
        record.target(),
        record.args()
      )
    })
    .target(env_logger::Target::Stderr)
    .filter_level(level);

  let _ = builder.try_init();

  log::set_max_level(level);
}

pub fn parse_level(level: &str) -> Option<LevelFilter> {
  let level = match level.trim().to_lowercase().as_str() {
    "off" => LevelFilter::Off,
    "error" => LevelFilter::Error,
    "warn" | "warning" => LevelFilter::Warn,
    "info" => LevelFilter::Info,
    "debug" => LevelFilter::Debug,
    "trace" => LevelFilter::Trace,
    _ => return None,
  };
  Some(level)
}

/// Returns false for an unknown level name
pub fn set_log_level(level: &str) -> bool {
  match parse_level(level) {
    Some(level) => {
      init_logger(level);
      true
    }
    None => false,
  }
}

//! Optional `fern`-based logger setup for binaries and examples embedding
//! this crate. The crate itself only ever calls `log::{debug,info,warn}!` --
//! nothing here is required for `database`/`doc`/`storage` to function.

use std::str::FromStr;

use log::LevelFilter;

use crate::error::{CResult, Error};

/// Installs a stderr logger at `level` (e.g. `"info"`, `"debug"`). Returns an
/// error if a global logger was already installed.
pub fn init_logging(level: &str) -> CResult<()> {
    let level = LevelFilter::from_str(level).map_err(|e| Error::BadRequest(e.to_string()))?;
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] [{}] {}", record.level(), record.target(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| Error::Internal(e.to_string()))
}

// PCES-SWEEP: Parameter Sweeps over External Network Simulations with Box-Plot Summaries
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Helpers shared by the binaries.

use std::{
    env,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

/// Logging configuration looked up in the working directory.
pub const LOG_CONFIG: &str = "log4rs.yml";

/// How often the stop file is polled.
const STOP_POLL: Duration = Duration::from_millis(500);

/// Initialize logging from [`LOG_CONFIG`]. If the file cannot be loaded, log to the terminal
/// instead (filtered by `RUST_LOG`, `info` by default), writing around the progress bars of
/// `multi`.
pub fn init_logging(multi: &MultiProgress) {
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        let mut builder = pretty_env_logger::formatted_builder();
        builder.parse_filters(&env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
        let logger = builder.build();
        let level = logger.filter();
        if LogWrapper::new(multi.clone(), logger).try_init().is_ok() {
            log::set_max_level(level);
            log::debug!("Not using {LOG_CONFIG}: {e}");
        }
    }
}

/// Set `cancel` as soon as a file appears at `path`. The file is removed again, such that the
/// next sweep is not cancelled right away.
pub fn watch_stop_file(path: PathBuf, cancel: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !cancel.load(Ordering::SeqCst) {
            if path.exists() {
                log::warn!("Found stop file {path:?}, no further variant is started");
                cancel.store(true, Ordering::SeqCst);
                if let Err(e) = std::fs::remove_file(&path) {
                    log::warn!("Cannot remove stop file {path:?}: {e}");
                }
                break;
            }
            thread::sleep(STOP_POLL);
        }
    })
}

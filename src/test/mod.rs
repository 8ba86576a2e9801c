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
//! Test fixtures that run the sweep against small shell scripts standing in for the builder and
//! the simulator.
//!
//! Use the following commands to see the logs of a sweep:
//!
//! ```shell
//! RUST_LOG=debug cargo test sweep -- --nocapture --test-threads 1
//! ```

#![cfg(unix)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tempfile::TempDir;

use crate::experiments::{RunnerConfig, Tool, TranslatedParameters};

mod sweep;

/// Copies its input to the simulator, and fails for 13 end-user devices.
pub(crate) const BUILDER_OK: &str = r#"#!/bin/sh
[ "$1" = "-is" ] || exit 3
if grep -q -- '^-euds 13$' "$2"; then
    echo "cannot build a model with 13 devices" >&2
    exit 1
fi
cp "$2" ../sim-dir/args-sim
"#;

/// Prints a summary line, and fails for 666 end-user devices.
pub(crate) const SIMULATOR_SPREAD: &str = r#"#!/bin/sh
[ "$1" = "-is" ] || exit 3
if grep -q -- '^-euds 666$' "$2"; then
    echo "simulation diverged" >&2
    exit 2
fi
echo "Starting simulation"
echo "Comp Pattern class has spread 0.000658, 0.000658, 0.000700, 0.000700, 0.000740, 0.000788"
echo "Done"
"#;

/// Processes spawned while another test still writes an executable may inherit its file handle,
/// which makes executing it fail with `ETXTBSY`. All tests running scripts hold this lock.
static SCRIPTS: Mutex<()> = Mutex::new(());

pub(crate) struct Layout {
    pub dir: TempDir,
    pub config: RunnerConfig,
    _guard: MutexGuard<'static, ()>,
}

/// Create `bld-dir` and `sim-dir` in a fresh temporary directory, with the given scripts as
/// (already compiled) builder and simulator.
pub(crate) fn layout(builder: &str, simulator: &str) -> Layout {
    let guard = SCRIPTS.lock().unwrap_or_else(PoisonError::into_inner);
    let dir = tempfile::tempdir().unwrap();
    let config = RunnerConfig {
        builder: Tool::new(dir.path().join("bld-dir"), "bld", "args-bld", "true"),
        simulator: Tool::new(dir.path().join("sim-dir"), "sim", "args-sim", "true"),
        ..Default::default()
    };
    fs::create_dir(&config.builder.dir).unwrap();
    fs::create_dir(&config.simulator.dir).unwrap();
    write_script(&config.builder.program(), builder);
    write_script(&config.simulator.program(), simulator);
    fs::write(
        config.builder.dir.join(&config.base_args),
        "-outputLib ../sim-dir",
    )
    .unwrap();
    Layout {
        dir,
        config,
        _guard: guard,
    }
}

pub(crate) fn write_script(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Builder flags consisting only of the number of end-user devices.
pub(crate) fn params(euds: u32) -> TranslatedParameters {
    let mut params = TranslatedParameters::default();
    params.set("euds", euds.to_string());
    params
}

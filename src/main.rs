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
use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use pces_sweep::{
    experiments::{
        ExperimentDescriptor, ExternalRunner, FileSink, PlotData, RunnerConfig, Sweep, Tool,
        VariantGenerator,
    },
    util,
};
use pces_utils::other::get_timestamp;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Experiment descriptor (YAML or JSON).
    descriptor: PathBuf,
    /// Working directory of the model builder.
    #[arg(long, default_value = "./bld-dir")]
    bld_dir: PathBuf,
    /// Executable of the model builder, relative to its working directory.
    #[arg(long, default_value = "bld")]
    bld_exe: String,
    /// Input file written for the model builder.
    #[arg(long, default_value = "args-bld")]
    bld_input: String,
    /// Default arguments of the model builder, prepended to every input.
    #[arg(long, default_value = "args-bld-base")]
    base_args: String,
    /// Command that compiles the model builder if its executable is missing.
    #[arg(long, default_value = "go build bld.go")]
    bld_compile: String,
    /// Working directory of the simulator.
    #[arg(long, default_value = "./sim-dir")]
    sim_dir: PathBuf,
    /// Executable of the simulator, relative to its working directory.
    #[arg(long, default_value = "sim")]
    sim_exe: String,
    /// Input file of the simulator, written by the model builder.
    #[arg(long, default_value = "args-sim")]
    sim_input: String,
    /// Command that compiles the simulator if its executable is missing.
    #[arg(long, default_value = "go build sim.go")]
    sim_compile: String,
    /// File that a successful build must produce, relative to the builder directory. Can be
    /// applied multiple times.
    #[arg(short, long = "artifact")]
    artifacts: Vec<PathBuf>,
    /// Overwrite the progress file of the descriptor.
    #[arg(long)]
    exp_counter: Option<PathBuf>,
    /// Do not start any further variant once this file exists.
    #[arg(long)]
    stop_file: Option<PathBuf>,
    /// Only use the summary line containing this label.
    #[arg(short, long)]
    category: Option<String>,
    /// Run the variants on this many workers (0 for one per core), each with a private copy of
    /// the builder and simulator directories. Without this flag, variants run one at a time.
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Where the parallel workers keep their copies, in a subdirectory named after the start time.
    #[arg(long, default_value = "./scratch")]
    scratch: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let multi = MultiProgress::new();
    util::init_logging(&multi);

    let descriptor = ExperimentDescriptor::from_file(&args.descriptor)?;
    descriptor.validate()?;
    let generator = VariantGenerator::new(&descriptor);

    let config = RunnerConfig {
        builder: Tool::new(&args.bld_dir, &args.bld_exe, &args.bld_input, &args.bld_compile),
        simulator: Tool::new(&args.sim_dir, &args.sim_exe, &args.sim_input, &args.sim_compile),
        base_args: args.base_args.clone(),
        passthru: descriptor.passthru.clone(),
        artifacts: args.artifacts.clone(),
    };
    let mut runner = ExternalRunner::new(config);

    let sink = args
        .exp_counter
        .clone()
        .or_else(|| descriptor.exp_counter.clone())
        .map(FileSink::new);

    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = args
        .stop_file
        .clone()
        .map(|path| util::watch_stop_file(path, cancel.clone()));

    let bar = multi.add(
        ProgressBar::new(generator.len() as u64).with_style(
            ProgressStyle::with_template(
                "[{bar:60}] variant: {pos:>3}/{len:3}, elapsed: {elapsed}, eta: {eta} {msg}",
            )?
            .progress_chars("##-"),
        ),
    );

    let mut sweep = Sweep::new(&generator, sink)
        .category(args.category.clone())
        .cancel_flag(cancel.clone())
        .progress_bar(bar);
    let report = match args.jobs {
        Some(jobs) => {
            let scratch = args.scratch.join(get_timestamp());
            let report = sweep.run_parallel(&runner, jobs, &scratch);
            let _ = fs::remove_dir(&scratch);
            report
        }
        None => sweep.run(&mut runner),
    };

    // stop the watcher
    cancel.store(true, Ordering::SeqCst);
    if let Some(watcher) = watcher {
        let _ = watcher.join();
    }

    let data = PlotData::new(
        &generator,
        &descriptor.inv_key_conv,
        report.table.clone(),
        report.failures(),
    );
    let json = data.write_json(&descriptor.plot_file)?;
    let csv = report.write_csv(&descriptor.plot_file)?;
    println!(
        "{} of {} variants succeeded, results in {json:?} and {csv:?}",
        report.succeeded(),
        report.total
    );
    Ok(())
}

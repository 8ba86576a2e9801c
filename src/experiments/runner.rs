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
//! Module that runs every variant of a sweep and collects the reconstructed samples.

use std::{
    collections::BTreeMap,
    fmt::Display,
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use indicatif::ProgressBar;
use itertools::Itertools;
use log::{error, info, warn};
use thiserror::Error;

use pces_utils::other::with_extension;

use super::{
    progress_message, translate, AggregationTable, ExperimentVariant, ExternalRunner,
    FailureRecord, Invoke, ProgressSink, RunError, Stage, TranslateError, VariantGenerator, DONE,
};
use crate::summary::{reconstruct_output, ReconstructedSample, SummaryError};

/// Why a single variant produced no sample.
#[derive(Debug, Error)]
pub enum VariantError {
    #[error("{0}")]
    Translate(#[from] TranslateError),
    #[error("{0}")]
    Run(#[from] RunError),
    #[error("{0}")]
    Summary(#[from] SummaryError),
}

impl VariantError {
    pub fn kind(&self) -> &'static str {
        match self {
            VariantError::Translate(_) => "translate",
            VariantError::Run(e) if e.stage() == Stage::Simulation => "simulation",
            VariantError::Run(_) => "build",
            VariantError::Summary(_) => "summary",
        }
    }
}

/// Translate, run and reconstruct a single variant.
pub fn run_variant<I: Invoke + ?Sized>(
    runner: &mut I,
    variant: ExperimentVariant,
    category: Option<&str>,
) -> VariantOutcome {
    let start = Instant::now();
    let result = translate(&variant.settings)
        .map_err(VariantError::from)
        .and_then(|params| Ok(runner.invoke(&params)?))
        .and_then(|stdout| Ok(reconstruct_output(&stdout, category)?));
    VariantOutcome {
        variant,
        result,
        duration: start.elapsed(),
    }
}

#[derive(Debug)]
pub struct VariantOutcome {
    pub variant: ExperimentVariant,
    pub result: Result<ReconstructedSample, VariantError>,
    pub duration: Duration,
}

const RECORD_SIZE: usize = 14;

impl VariantOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn record_title() -> [&'static str; RECORD_SIZE] {
        [
            "index",
            "base",
            "attribute",
            "success",
            "error_kind",
            "error",
            "duration",
            "v0",
            "v1",
            "v2",
            "v3",
            "v4",
            "v5",
            "fidelity",
        ]
    }

    pub fn record(&self) -> [String; RECORD_SIZE] {
        let r = &self.result;
        let value = |i: usize| r_str(r, |s| s.values[i]);
        [
            self.variant.index.to_string(),             // index
            self.variant.base_code.clone(),             // base
            self.variant.attrb_code.clone(),            // attribute
            r.is_ok().to_string(),                      // success
            e_str(r, |e| e.kind()),                     // error_kind
            e_str(r, |e| e.to_string()),                // error
            self.duration.as_secs_f64().to_string(),    // duration
            value(0),                                   // v0
            value(1),                                   // v1
            value(2),                                   // v2
            value(3),                                   // v3
            value(4),                                   // v4
            value(5),                                   // v5
            r_str(r, |s| s.fidelity.to_string()),       // fidelity
        ]
    }

    pub fn failure(&self) -> Option<FailureRecord> {
        self.result.as_ref().err().map(|e| FailureRecord {
            index: self.variant.index,
            base_value: self.variant.base_value.clone(),
            attrb_value: self.variant.attrb_value.clone(),
            kind: e.kind().to_string(),
            error: e.to_string(),
        })
    }
}

fn r_str<T, F>(r: &Result<ReconstructedSample, VariantError>, f: F) -> String
where
    T: Display,
    F: FnOnce(&ReconstructedSample) -> T,
{
    r.as_ref().map(f).map(|x| x.to_string()).unwrap_or_default()
}

fn e_str<T, F>(r: &Result<ReconstructedSample, VariantError>, f: F) -> String
where
    T: Display,
    F: FnOnce(&VariantError) -> T,
{
    r.as_ref().err().map(f).map(|x| x.to_string()).unwrap_or_default()
}

impl std::fmt::Display for VariantOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.result.as_ref() {
            Ok(s) => write!(
                f,
                "{} done in {:.2?}: [{}] ms ({})",
                self.variant,
                self.duration,
                s.values.iter().map(|x| format!("{x:.3}")).join(", "),
                s.fidelity,
            ),
            Err(e) => write!(
                f,
                "{} failed after {:.2?} ({}): {}",
                self.variant,
                self.duration,
                e.kind(),
                e
            ),
        }
    }
}

/// The result of a whole sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub table: AggregationTable,
    /// All attempted variants, in sweep order.
    pub outcomes: Vec<VariantOutcome>,
    /// Number of variants in the sweep.
    pub total: usize,
    /// Number of variants never attempted because the sweep was cancelled.
    pub skipped: usize,
}

impl SweepReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.outcomes
            .iter()
            .filter_map(VariantOutcome::failure)
            .collect()
    }

    pub fn write_records<W: io::Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.write_record(VariantOutcome::record_title())?;
        for outcome in &self.outcomes {
            writer.write_record(outcome.record())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write one record per attempted variant to `<plot file stem>.csv`.
    pub fn write_csv(&self, plot_file: impl AsRef<Path>) -> csv::Result<PathBuf> {
        let path = with_extension(plot_file, "csv");
        let mut writer = csv::Writer::from_path(&path)?;
        self.write_records(&mut writer)?;
        info!("Wrote {} records to {path:?}", self.outcomes.len());
        Ok(path)
    }
}

#[derive(Debug, Error)]
enum SetupError {
    #[error("Cannot start the worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("{0}")]
    Run(#[from] RunError),
}

/// Drives the variants of one sweep, reporting progress after each of them.
pub struct Sweep<'a, S> {
    generator: &'a VariantGenerator,
    sink: S,
    category: Option<String>,
    cancel: Arc<AtomicBool>,
    bar: ProgressBar,
}

impl<'a, S: ProgressSink> Sweep<'a, S> {
    pub fn new(generator: &'a VariantGenerator, sink: S) -> Self {
        Self {
            generator,
            sink,
            category: None,
            cancel: Arc::new(AtomicBool::new(false)),
            bar: ProgressBar::hidden(),
        }
    }

    /// Only use the summary line containing this label.
    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Once the flag is set, no further variant is started.
    pub fn cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress_bar(mut self, bar: ProgressBar) -> Self {
        bar.set_length(self.generator.len() as u64);
        self.bar = bar;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run all variants one after the other against the same runner.
    pub fn run<I: Invoke + ?Sized>(&mut self, runner: &mut I) -> SweepReport {
        let mut report = self.start();
        for variant in self.generator.iter() {
            if self.is_cancelled() {
                break;
            }
            let outcome = run_variant(runner, variant, self.category.as_deref());
            self.record(&mut report, outcome);
        }
        self.finish(report)
    }

    /// Run the variants on `jobs` workers (`0` picks one per core), each with a private copy of
    /// the builder and simulator directories below `scratch`. Results are still recorded and
    /// reported in sweep order. Falls back to [`Sweep::run`] if the workers cannot be set up.
    pub fn run_parallel(
        &mut self,
        runner: &ExternalRunner,
        jobs: usize,
        scratch: &Path,
    ) -> SweepReport {
        let mut runner = runner.clone();
        let (pool, workers) = match self.setup_workers(&mut runner, jobs, scratch) {
            Ok(x) => x,
            Err(e) => {
                warn!("Cannot set up parallel workers, running sequentially: {e}");
                return self.run(&mut runner);
            }
        };

        let mut report = self.start();
        let (tx, rx) = mpsc::channel::<(usize, Option<VariantOutcome>)>();
        let category = self.category.clone();
        let cancel = self.cancel.clone();

        pool.in_place_scope(|scope| {
            for variant in self.generator.iter() {
                let tx = tx.clone();
                let workers = &workers;
                let category = category.as_deref();
                let cancel = &cancel;
                scope.spawn(move |_| {
                    let index = variant.index;
                    if cancel.load(Ordering::SeqCst) {
                        let _ = tx.send((index, None));
                        return;
                    }
                    let slot = rayon::current_thread_index().unwrap_or(0) % workers.len();
                    let mut worker = workers[slot]
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    let outcome = run_variant(&mut *worker, variant, category);
                    let _ = tx.send((index, Some(outcome)));
                });
            }
            drop(tx);

            // record in sweep order, regardless of the order in which the variants finish
            let mut pending = BTreeMap::new();
            let mut next = 0;
            for (index, outcome) in rx {
                pending.insert(index, outcome);
                while let Some(outcome) = pending.remove(&next) {
                    if let Some(outcome) = outcome {
                        self.record(&mut report, outcome);
                    }
                    next += 1;
                }
            }
        });

        for i in 0..workers.len() {
            let root = worker_root(scratch, i);
            if let Err(e) = fs::remove_dir_all(&root) {
                warn!("Cannot remove the worker directory {root:?}: {e}");
            }
        }

        self.finish(report)
    }

    fn setup_workers(
        &self,
        runner: &mut ExternalRunner,
        jobs: usize,
        scratch: &Path,
    ) -> Result<(rayon::ThreadPool, Vec<Mutex<ExternalRunner>>), SetupError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        // compile in the shared directories, such that every copy contains the executables
        runner.ensure_compiled()?;
        // all copies are made before any variant is spawned
        let workers = (0..pool.current_num_threads().min(self.generator.len().max(1)))
            .map(|i| runner.isolated(&worker_root(scratch, i)).map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Running {} variants on {} workers in {scratch:?}",
            self.generator.len(),
            workers.len()
        );
        Ok((pool, workers))
    }

    fn start(&mut self) -> SweepReport {
        info!("Starting a sweep of {} variants", self.generator.len());
        SweepReport {
            total: self.generator.len(),
            ..Default::default()
        }
    }

    fn record(&mut self, report: &mut SweepReport, outcome: VariantOutcome) {
        match &outcome.result {
            Ok(sample) => {
                if !sample.fidelity.is_exact() {
                    self.bar.suspend(|| {
                        warn!(
                            "{}: reconstructed sample is not faithful ({})",
                            outcome.variant, sample.fidelity
                        )
                    });
                }
                report.table.insert(
                    &outcome.variant.base_value,
                    &outcome.variant.attrb_value,
                    sample.clone(),
                );
                self.bar.suspend(|| info!("{outcome}"));
            }
            Err(_) => self.bar.suspend(|| error!("{outcome}")),
        }
        report.outcomes.push(outcome);

        self.bar.inc(1);
        let k = report.outcomes.len();
        self.notify(&progress_message(k, report.total));
    }

    fn finish(&mut self, mut report: SweepReport) -> SweepReport {
        report.skipped = report.total - report.outcomes.len();
        if report.skipped > 0 {
            warn!("Sweep cancelled, {} variants were skipped", report.skipped);
        }
        if report.table.is_empty() {
            warn!("No successful runs");
        }
        info!(
            "Sweep finished: {} of {} variants succeeded",
            report.succeeded(),
            report.total
        );
        self.notify(DONE);
        self.bar.finish_and_clear();
        report
    }

    fn notify(&mut self, message: &str) {
        self.bar.set_message(message.to_string());
        if let Err(e) = self.sink.report(message) {
            warn!("Cannot report progress {message:?}: {e}");
        }
    }
}

fn worker_root(scratch: &Path, i: usize) -> PathBuf {
    scratch.join(format!("worker-{i}"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        experiments::{test::YAML, ExperimentDescriptor, MemorySink, TranslatedParameters},
        summary::SAMPLE_LEN,
    };

    /// Fails the simulation for every variant whose flags contain `fail_on`.
    struct Fake {
        fail_on: &'static str,
        calls: Vec<String>,
    }

    impl Invoke for Fake {
        fn invoke(&mut self, params: &TranslatedParameters) -> Result<String, RunError> {
            let args = params.to_args();
            self.calls.push(args.clone());
            if args.contains(self.fail_on) {
                return Err(RunError::Simulation {
                    status: "exit status: 1".to_string(),
                    stderr: String::new(),
                });
            }
            Ok("Comp Pattern class has spread 0.1, 0.2, 0.3, 0.3, 0.4, 0.5\nDone\n".to_string())
        }
    }

    fn generator() -> VariantGenerator {
        let descriptor: ExperimentDescriptor = serde_yaml::from_str(YAML).unwrap();
        VariantGenerator::new(&descriptor)
    }

    #[test]
    fn partial_failure() {
        let generator = generator();
        let mut sweep = Sweep::new(&generator, MemorySink::default());
        let mut fake = Fake {
            fail_on: "-euds 10\n",
            calls: vec![],
        };
        let report = sweep.run(&mut fake);
        assert_eq!(fake.calls.len(), 4);
        assert_eq!(report.table.len(), 2);
        assert_eq!(report.succeeded(), 2);
        assert!(report.table.contains("1", "100"));
        assert!(!report.table.contains("10", "1000"));

        let failures = report.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].kind, "simulation");
        assert_eq!(failures[0].base_value, "10");
        assert_eq!(failures[0].attrb_value, "100");

        let sink = sweep.into_sink();
        assert_eq!(
            sink.messages,
            vec![
                "running experiment 1 of 4 ...",
                "running experiment 2 of 4 ...",
                "running experiment 3 of 4 ...",
                "running experiment 4 of 4 ...",
                "Done",
            ]
        );
    }

    #[test]
    fn everything_fails() {
        let generator = generator();
        let mut sweep = Sweep::new(&generator, MemorySink::default());
        let mut fake = Fake {
            fail_on: "-euds",
            calls: vec![],
        };
        let report = sweep.run(&mut fake);
        assert!(report.table.is_empty());
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(sweep.sink().last(), Some(DONE));
    }

    #[test]
    fn translate_failure_is_isolated() {
        let mut descriptor: ExperimentDescriptor = serde_yaml::from_str(YAML).unwrap();
        descriptor.attrb_param = "rtr".to_string();
        descriptor.attrb_param_list = vec!["juniper".to_string(), "cisco".to_string()];
        descriptor.settings.remove("srcCPU");
        let generator = VariantGenerator::new(&descriptor);
        let mut sweep = Sweep::new(&generator, MemorySink::default());
        let mut fake = Fake {
            fail_on: "never",
            calls: vec![],
        };
        let report = sweep.run(&mut fake);
        assert!(fake.calls.is_empty());
        assert!(report.outcomes.iter().all(|o| !o.is_ok()));
        assert!(report.failures().iter().all(|f| f.kind == "translate"));
    }

    #[test]
    fn cancelled_before_start() {
        let generator = generator();
        let cancel = Arc::new(AtomicBool::new(true));
        let mut sweep = Sweep::new(&generator, MemorySink::default()).cancel_flag(cancel);
        let mut fake = Fake {
            fail_on: "never",
            calls: vec![],
        };
        let report = sweep.run(&mut fake);
        assert!(fake.calls.is_empty());
        assert_eq!(report.skipped, 4);
        assert_eq!(sweep.sink().messages, vec![DONE]);
    }

    #[test]
    fn records() {
        let generator = generator();
        let mut sweep = Sweep::new(&generator, MemorySink::default());
        let mut fake = Fake {
            fail_on: "-pvtNetBw 1000\n",
            calls: vec![],
        };
        let report = sweep.run(&mut fake);
        let mut writer = csv::Writer::from_writer(vec![]);
        report.write_records(&mut writer).unwrap();
        let csv = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("index,base,attribute,success"));
        assert!(lines[1].starts_with("0,euds=1,pvtNetBw=100,true,,,"));
        assert!(lines[2].starts_with("1,euds=1,pvtNetBw=1000,false,simulation,"));
        assert_eq!(VariantOutcome::record_title().len(), 8 + SAMPLE_LEN);
    }
}

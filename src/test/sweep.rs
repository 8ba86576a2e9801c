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
//! End-to-end sweeps against the script builder and simulator.

use std::fs;

use super::{layout, write_script, BUILDER_OK};
use crate::experiments::{
    test::YAML, ExperimentDescriptor, ExternalRunner, FileSink, MemorySink, PlotData, Sweep,
    VariantGenerator, DONE,
};

/// Fails exactly the variant with 10 devices on a 1000 Mbps private network.
const SIMULATOR_FAIL_ONE: &str = r#"#!/bin/sh
[ "$1" = "-is" ] || exit 3
if grep -q -- '^-euds 10$' "$2" && grep -q -- '^-pvtNetBw 1000$' "$2"; then
    echo "queue overflow" >&2
    exit 2
fi
echo "Comp Pattern class has spread 0.1, 0.2, 0.2, 0.2, 0.2, 0.3"
echo "Done"
"#;

fn descriptor() -> ExperimentDescriptor {
    serde_yaml::from_str(YAML).unwrap()
}

#[test]
fn sweep_with_one_failure() {
    let layout = layout(BUILDER_OK, SIMULATOR_FAIL_ONE);
    let generator = VariantGenerator::new(&descriptor());
    let counter = layout.dir.path().join("expCounter");
    let mut runner = ExternalRunner::new(layout.config.clone());

    let mut sweep = Sweep::new(&generator, FileSink::new(&counter));
    let report = sweep.run(&mut runner);

    assert_eq!(report.total, 4);
    assert_eq!(report.table.len(), 3);
    assert!(!report.table.contains("10", "1000"));
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, "simulation");
    assert!(failures[0].error.contains("queue overflow"));
    assert_eq!(fs::read_to_string(&counter).unwrap(), format!("{DONE}\n"));

    let sample = report.table.get("1", "100").unwrap();
    assert!(sample.fidelity.is_exact());
    assert!((sample.values[5] - 300.0).abs() < 1e-9);
}

#[test]
fn builder_receives_translated_flags() {
    let layout = layout(BUILDER_OK, SIMULATOR_FAIL_ONE);
    let mut desc = descriptor();
    desc.base_param_list = vec!["10".to_string()];
    desc.attrb_param_list = vec!["100".to_string()];
    let generator = VariantGenerator::new(&desc);
    let mut runner = ExternalRunner::new(layout.config.clone());
    let report = Sweep::new(&generator, MemorySink::default()).run(&mut runner);
    assert_eq!(report.table.len(), 1);

    let input = fs::read_to_string(layout.config.builder.input_path()).unwrap();
    let lines: Vec<&str> = input.lines().collect();
    assert_eq!(lines[0], "-outputLib ../sim-dir");
    assert!(lines.contains(&"-euds 10"));
    assert!(lines.contains(&"-pvtNetBw 100"));
    assert!(lines.contains(&"-sslsrvr True"));
    // the router and the SSL server bridge both networks
    assert!(lines.contains(&"-pvtRtrBw 100"));
    assert!(lines.contains(&"-sslCPUBw 100"));
}

#[test]
fn build_failure_is_recorded() {
    let layout = layout(BUILDER_OK, SIMULATOR_FAIL_ONE);
    let mut desc = descriptor();
    desc.base_param_list = vec!["13".to_string(), "1".to_string()];
    desc.attrb_param = "None".to_string();
    let generator = VariantGenerator::new(&desc);
    let mut runner = ExternalRunner::new(layout.config.clone());
    let report = Sweep::new(&generator, MemorySink::default()).run(&mut runner);
    assert_eq!(report.total, 2);
    assert_eq!(report.table.len(), 1);
    assert!(report.table.contains("1", "None"));
    assert_eq!(report.failures()[0].kind, "build");
}

#[test]
fn missing_summary_line() {
    let layout = layout(BUILDER_OK, "#!/bin/sh\necho 'no statistics: 1, 2'\n");
    let mut desc = descriptor();
    desc.base_param = "None".to_string();
    desc.attrb_param = "None".to_string();
    let generator = VariantGenerator::new(&desc);
    let mut runner = ExternalRunner::new(layout.config.clone());
    let mut sweep = Sweep::new(&generator, MemorySink::default());
    let report = sweep.run(&mut runner);
    assert!(report.table.is_empty());
    assert_eq!(report.failures()[0].kind, "summary");
    assert_eq!(
        sweep.sink().messages,
        vec!["running experiment 1 of 1 ...", DONE]
    );
}

#[test]
fn parallel_sweep_matches_sequential() {
    let layout = layout(BUILDER_OK, SIMULATOR_FAIL_ONE);
    let generator = VariantGenerator::new(&descriptor());
    let runner = ExternalRunner::new(layout.config.clone());
    let scratch = layout.dir.path().join("scratch");

    let mut sweep = Sweep::new(&generator, MemorySink::default());
    let parallel = sweep.run_parallel(&runner, 2, &scratch);
    let indices: Vec<usize> = parallel.outcomes.iter().map(|o| o.variant.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(sweep.sink().messages.len(), 5);
    assert_eq!(sweep.sink().last(), Some(DONE));
    // only the worker copies were used, and they are removed afterwards
    assert!(!layout.config.builder.input_path().exists());
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);

    let sequential = Sweep::new(&generator, MemorySink::default()).run(&mut runner.clone());
    assert_eq!(parallel.table, sequential.table);
    assert_eq!(parallel.failures(), sequential.failures());
}

#[test]
fn lazy_compilation_before_the_first_variant() {
    let layout = layout(BUILDER_OK, SIMULATOR_FAIL_ONE);
    let mut config = layout.config.clone();
    assert!(config.simulator.is_compiled());
    // the "source" of the simulator is a script that is copied into place
    fs::remove_file(config.simulator.program()).unwrap();
    write_script(&config.simulator.dir.join("sim.sh"), SIMULATOR_FAIL_ONE);
    config.simulator.compile = vec!["cp".into(), "sim.sh".into(), "sim".into()];

    let mut desc = descriptor();
    desc.base_param_list = vec!["1".to_string()];
    let generator = VariantGenerator::new(&desc);
    let mut runner = ExternalRunner::new(config.clone());
    let report = Sweep::new(&generator, MemorySink::default()).run(&mut runner);
    assert_eq!(report.table.len(), 2);
    assert!(config.simulator.is_compiled());
}

#[test]
fn exported_plot_data() {
    let layout = layout(BUILDER_OK, SIMULATOR_FAIL_ONE);
    let mut desc = descriptor();
    desc.plot_file = layout.dir.path().join("rtt.png");
    let generator = VariantGenerator::new(&desc);
    let mut runner = ExternalRunner::new(layout.config.clone());
    let report = Sweep::new(&generator, MemorySink::default()).run(&mut runner);

    let data = PlotData::new(
        &generator,
        &desc.inv_key_conv,
        report.table.clone(),
        report.failures(),
    );
    let json = data.write_json(&desc.plot_file).unwrap();
    let csv = report.write_csv(&desc.plot_file).unwrap();

    let read: PlotData = serde_json::from_str(&fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(read.title, "RTT as function of EUDs and PvtNet Mbps");
    assert_eq!(read.samples.len(), 3);
    assert_eq!(read.failures.len(), 1);
    assert_eq!(fs::read_to_string(csv).unwrap().lines().count(), 5);
    assert!(read.inv_key_conv.contains_key("euds"));
}

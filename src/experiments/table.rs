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
//! Aggregation of reconstructed samples and the data handed to the plotting front-end.

use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use pces_utils::{other::with_extension, serde::serialize_ordered};

use super::{is_none, label_for_setting, VariantGenerator};
use crate::summary::ReconstructedSample;

/// Reconstructed samples indexed by base value, then attribute value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregationTable {
    #[serde(serialize_with = "serialize_ordered")]
    entries: HashMap<String, HashMap<String, ReconstructedSample>>,
}

impl AggregationTable {
    /// Store a sample at its coordinate, replacing any previous one.
    pub fn insert(&mut self, base_value: &str, attrb_value: &str, sample: ReconstructedSample) {
        self.entries
            .entry(base_value.to_string())
            .or_default()
            .insert(attrb_value.to_string(), sample);
    }

    pub fn get(&self, base_value: &str, attrb_value: &str) -> Option<&ReconstructedSample> {
        self.entries.get(base_value)?.get(attrb_value)
    }

    pub fn contains(&self, base_value: &str, attrb_value: &str) -> bool {
        self.get(base_value, attrb_value).is_some()
    }

    /// Number of stored samples (not the number of base values).
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All base values that hold at least one sample, in no particular order.
    pub fn base_values(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// A variant that produced no sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub index: usize,
    pub base_value: String,
    pub attrb_value: String,
    /// `translate`, `build`, `simulation` or `summary`.
    pub kind: String,
    pub error: String,
}

/// Everything the plotting front-end needs to render the sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotData {
    pub title: String,
    pub base_param: String,
    pub base_label: String,
    pub base_values: Vec<String>,
    pub attrb_param: String,
    pub attrb_label: String,
    pub attrb_values: Vec<String>,
    /// Setting name -> human-readable label for every setting with a known label.
    pub inv_key_conv: BTreeMap<String, String>,
    pub samples: AggregationTable,
    pub failures: Vec<FailureRecord>,
}

impl PlotData {
    pub fn new(
        generator: &VariantGenerator,
        overrides: &BTreeMap<String, String>,
        samples: AggregationTable,
        failures: Vec<FailureRecord>,
    ) -> Self {
        let base_label = label_for_setting(generator.base_param(), overrides).to_string();
        let attrb_label = label_for_setting(generator.attrb_param(), overrides).to_string();
        let mut inv_key_conv: BTreeMap<String, String> = super::AXIS_LABELS
            .iter()
            .map(|(label, setting)| (setting.to_string(), label.to_string()))
            .collect();
        inv_key_conv.extend(overrides.clone());
        Self {
            title: plot_title(
                generator.base_param(),
                &base_label,
                generator.attrb_param(),
                &attrb_label,
            ),
            base_param: generator.base_param().to_string(),
            base_label,
            base_values: generator.base_values().to_vec(),
            attrb_param: generator.attrb_param().to_string(),
            attrb_label,
            attrb_values: generator.attrb_values().to_vec(),
            inv_key_conv,
            samples,
            failures,
        }
    }

    /// Write the data as pretty JSON next to the plot file, i.e., `<plot file stem>.json`.
    pub fn write_json(&self, plot_file: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = with_extension(plot_file, "json");
        let content = serde_json::to_string_pretty(self).map_err(io::Error::from)?;
        fs::write(&path, content)?;
        log::info!("Wrote plot data to {path:?}");
        Ok(path)
    }
}

/// Title of the box plot, naming every axis that is swept.
pub fn plot_title(
    base_param: &str,
    base_label: &str,
    attrb_param: &str,
    attrb_label: &str,
) -> String {
    match (is_none(base_param), is_none(attrb_param)) {
        (false, false) => format!("RTT as function of {base_label} and {attrb_label}"),
        (false, true) => format!("RTT as function of {base_label}"),
        (true, false) => format!("RTT as function of {attrb_label}"),
        (true, true) => "RTT measurements".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        experiments::{test::YAML, ExperimentDescriptor},
        summary::reconstruct,
    };

    fn sample(line: &str) -> ReconstructedSample {
        reconstruct(line).unwrap()
    }

    #[test]
    fn insert_and_count() {
        let mut table = AggregationTable::default();
        assert!(table.is_empty());
        table.insert("10", "100", sample("1 2 3 3 4 5"));
        table.insert("10", "1000", sample("1 2 3 3 4 5"));
        table.insert("20", "100", sample("1 2 3 3 4 5"));
        table.insert("20", "100", sample("2 3 4 4 5 6"));
        assert_eq!(table.len(), 3);
        assert!(table.contains("10", "1000"));
        assert!(!table.contains("20", "1000"));
        assert_eq!(table.get("20", "100").unwrap().values[0], 2000.0);
    }

    #[test]
    fn serialized_in_key_order() {
        let mut table = AggregationTable::default();
        table.insert("b", "y", sample("1 2 3 3 4 5"));
        table.insert("a", "z", sample("1 2 3 3 4 5"));
        table.insert("a", "x", sample("1 2 3 3 4 5"));
        let json = serde_json::to_string(&table).unwrap();
        let pos = |key: &str| json.find(key).unwrap();
        assert!(pos("\"a\"") < pos("\"b\""));
        assert!(pos("\"x\"") < pos("\"z\""));
    }

    #[test]
    fn titles() {
        assert_eq!(
            plot_title("euds", "EUDs", "pvtNetBw", "PvtNet Mbps"),
            "RTT as function of EUDs and PvtNet Mbps"
        );
        assert_eq!(plot_title("None", "None", "rtr", "Router"), "RTT as function of Router");
        assert_eq!(plot_title("euds", "EUDs", "None", "None"), "RTT as function of EUDs");
        assert_eq!(plot_title("None", "None", "none", "none"), "RTT measurements");
    }

    #[test]
    fn plot_data_labels_and_export() {
        let descriptor: ExperimentDescriptor = serde_yaml::from_str(YAML).unwrap();
        let generator = VariantGenerator::new(&descriptor);
        let mut overrides = BTreeMap::new();
        overrides.insert("pvtNetBw".to_string(), "Private bandwidth".to_string());
        let data = PlotData::new(&generator, &overrides, AggregationTable::default(), vec![]);
        assert_eq!(data.base_label, "EUDs");
        assert_eq!(data.attrb_label, "Private bandwidth");
        assert_eq!(data.title, "RTT as function of EUDs and Private bandwidth");
        assert_eq!(data.inv_key_conv["rtr"], "Router");

        let dir = tempfile::tempdir().unwrap();
        let path = data.write_json(dir.path().join("rtt.png")).unwrap();
        assert_eq!(path, dir.path().join("rtt.json"));
        let read: PlotData = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(read.base_values, generator.base_values());
        assert!(read.samples.is_empty());
    }
}

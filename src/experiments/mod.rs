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
//! Module facilitating to sweep an experiment over two parameter axes, running the external
//! builder and simulator once per combination.

pub mod invoker;
pub mod progress;
pub mod runner;
pub mod table;
pub mod translate;
pub mod variants;

pub use invoker::*;
pub use progress::*;
pub use runner::*;
pub use table::*;
pub use translate::*;
pub use variants::*;

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Sentinel used for an axis that is not swept.
pub const NONE: &str = "None";

/// Returns `true` if `name` is the "None" sentinel (case-insensitive).
pub fn is_none(name: &str) -> bool {
    name.eq_ignore_ascii_case(NONE)
}

/// A single scalar experiment setting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Flag(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Flag(x) => write!(f, "{x}"),
            Setting::Integer(x) => write!(f, "{x}"),
            Setting::Real(x) => write!(f, "{x}"),
            Setting::Text(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for Setting {
    fn from(value: &str) -> Self {
        Setting::Text(value.to_string())
    }
}

/// Describes a sweep as written by the configuration front-end.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentDescriptor {
    /// Name of the setting varied in the outer loop, or `"None"`.
    pub base_param: String,
    #[serde(default, deserialize_with = "scalar_strings")]
    pub base_param_list: Vec<String>,
    /// Name of the setting varied in the inner loop, or `"None"`.
    pub attrb_param: String,
    #[serde(default, deserialize_with = "scalar_strings")]
    pub attrb_param_list: Vec<String>,
    /// Where the plotting front-end expects its output. Only the stem is used.
    pub plot_file: PathBuf,
    /// Optional file whose lines are appended verbatim to every builder input.
    #[serde(default)]
    pub passthru: Option<PathBuf>,
    /// Progress file polled by the front-end.
    #[serde(default)]
    pub exp_counter: Option<PathBuf>,
    /// Maps setting names back to human-readable axis labels.
    #[serde(default)]
    pub inv_key_conv: BTreeMap<String, String>,
    /// All fixed settings (architecture, devices, bandwidths, crypto, packet shaping, ...).
    #[serde(flatten)]
    pub settings: BTreeMap<String, Setting>,
}

/// Accept a list of arbitrary scalars and keep their textual representation.
fn scalar_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values: Option<Vec<Setting>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect())
}

/// The axis lists read straight from the YAML source. Plain scalars keep the text they were
/// written with, so `1e-3` and `0.001` stay two distinct menu entries.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct YamlAxes {
    #[serde(default)]
    base_param_list: Option<Vec<SourceText>>,
    #[serde(default)]
    attrb_param_list: Option<Vec<SourceText>>,
}

struct SourceText(String);

impl<'de> Deserialize<'de> for SourceText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = SourceText;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a scalar axis value")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(SourceText(v.to_string()))
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

fn source_texts(values: Option<Vec<SourceText>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|SourceText(s)| s)
        .collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read the experiment descriptor {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Invalid YAML experiment descriptor: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid JSON experiment descriptor: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown descriptor format of {0:?} (expected .yaml, .yml or .json)")]
    UnknownFormat(PathBuf),
    #[error("The {axis} axis varies {param:?}, which is not an experiment setting")]
    UnknownAxis { axis: &'static str, param: String },
    #[error("Cannot choose {0:?} as both base and attribute parameter")]
    SameAxis(String),
    #[error("The {axis} axis lists the value {value:?} twice")]
    DuplicateValue { axis: &'static str, value: String },
    #[error("Unable to write to plot file {0:?}: {1}")]
    PlotFile(PathBuf, #[source] std::io::Error),
}

impl ExperimentDescriptor {
    /// Load a descriptor from a YAML or JSON file, chosen by its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut descriptor = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => return Err(ConfigError::UnknownFormat(path.to_path_buf())),
        };
        // the front-end writes an empty string if no pass-through file was chosen
        if descriptor
            .passthru
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            descriptor.passthru = None;
        }
        log::debug!("Loaded experiment descriptor from {path:?}");
        Ok(descriptor)
    }

    /// Parse a YAML descriptor, keeping the axis values as written.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut descriptor: Self = serde_yaml::from_str(content)?;
        let axes: YamlAxes = serde_yaml::from_str(content)?;
        descriptor.base_param_list = source_texts(axes.base_param_list);
        descriptor.attrb_param_list = source_texts(axes.attrb_param_list);
        Ok(descriptor)
    }

    /// Check the descriptor before any variant is generated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (axis, param, list) in [
            ("base", &self.base_param, &self.base_param_list),
            ("attribute", &self.attrb_param, &self.attrb_param_list),
        ] {
            if is_none(param) {
                continue;
            }
            if !list.is_empty() && !self.settings.contains_key(param) {
                return Err(ConfigError::UnknownAxis {
                    axis,
                    param: param.clone(),
                });
            }
            // each value is one coordinate of the result table
            if let Some(value) = list.iter().duplicates().next() {
                return Err(ConfigError::DuplicateValue {
                    axis,
                    value: value.clone(),
                });
            }
        }
        if self.base_param == self.attrb_param && !is_none(&self.base_param) {
            return Err(ConfigError::SameAxis(self.base_param.clone()));
        }
        self.probe_plot_file()
    }

    /// Make sure that we can create files next to the plot file.
    fn probe_plot_file(&self) -> Result<(), ConfigError> {
        let probe = pces_utils::other::with_extension(&self.plot_file, "png");
        let err = |e| ConfigError::PlotFile(self.plot_file.clone(), e);
        if probe.exists() {
            return fs::OpenOptions::new()
                .append(true)
                .open(&probe)
                .map(|_| ())
                .map_err(err);
        }
        fs::write(&probe, "msg").map_err(err)?;
        fs::remove_file(&probe).map_err(err)
    }
}

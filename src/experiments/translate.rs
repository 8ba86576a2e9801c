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
//! Translation of experiment settings into the flag vocabulary of the external model builder.

use std::collections::BTreeMap;

use thiserror::Error;

use super::Setting;

/// Architecture value that places an SSL server between the two networks.
pub const SSL_ARCH: &str = "SSL";
/// Builder flag recording whether an SSL server is present.
pub const SSL_SERVER_KEY: &str = "sslsrvr";

/// Builder flag -> experiment setting. Flags containing `ssl` are only emitted for the SSL
/// architecture.
pub const KEY_TABLE: &[(&str, &str)] = &[
    ("srcCPU", "srcCPU"),
    ("srcCPUBw", "pvtNetBw"),
    ("pvtNetBw", "pvtNetBw"),
    ("pubNetBw", "pubNetBw"),
    ("pvtSwitch", "pvtSwitch"),
    ("pubSwitch", "pubSwitch"),
    ("pvtSwitchBw", "pvtNetBw"),
    ("pubSwitchBw", "pubNetBw"),
    ("pvtRtr", "rtr"),
    ("pubRtr", "rtr"),
    ("pvtRtrBw", "pvtNetBw"),
    ("pubRtrBw", "pubNetBw"),
    ("sslCPU", "sslCPU"),
    ("sslCPUBw", "pvtNetBw"),
    ("pcktlen", "pcktLen"),
    ("pcktburst", "pcktBurst"),
    ("pcktMu", "pcktMu"),
    ("euds", "euds"),
    ("eudCPU", "eudCPU"),
    ("eudCPUBw", "pvtNetBw"),
    ("cryptoalg", "crypto"),
    ("keylength", "keylength"),
];

/// Menu label shown to the user -> experiment setting.
pub const AXIS_LABELS: &[(&str, &str)] = &[
    ("EUDs", "euds"),
    ("Architecture", "arch"),
    ("PcktMu", "pcktMu"),
    ("CryptoAlg", "crypto"),
    ("Key Lengths", "keylength"),
    ("PcktLen", "pcktLen"),
    ("PcktBurst", "pcktBurst"),
    ("PubNet Switch", "pubSwitch"),
    ("PvtNet Switch", "pvtSwitch"),
    ("PubNet Mbps", "pubNetBw"),
    ("PvtNet Mbps", "pvtNetBw"),
    ("Router", "rtr"),
    ("None", "None"),
];

/// Look up the setting behind a menu label.
pub fn setting_for_label(label: &str) -> Option<&'static str> {
    AXIS_LABELS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, s)| *s)
}

/// Look up the menu label of a setting, falling back to the setting name itself.
pub fn label_for_setting<'a>(
    setting: &'a str,
    overrides: &'a BTreeMap<String, String>,
) -> &'a str {
    overrides
        .get(setting)
        .map(String::as_str)
        .or_else(|| {
            AXIS_LABELS
                .iter()
                .find(|(_, s)| *s == setting)
                .map(|(l, _)| *l)
        })
        .unwrap_or(setting)
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Missing setting {field:?} required for builder flag -{key}")]
    Missing { key: &'static str, field: &'static str },
    #[error("Setting {field:?} = {value:?} is not an integer bandwidth")]
    Bandwidth { field: &'static str, value: String },
}

/// The builder flags of one variant, in the order of [`KEY_TABLE`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslatedParameters {
    entries: Vec<(String, String)>,
}

impl TranslatedParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a flag, keeping its position if it is already present.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ssl_server_present(&self) -> bool {
        self.get(SSL_SERVER_KEY) == Some("True")
    }

    /// Builder command-line lines, one `-key value` per line.
    pub fn to_args(&self) -> String {
        self.iter().map(|(k, v)| format!("-{k} {v}\n")).collect()
    }
}

fn lookup<'a>(
    settings: &'a BTreeMap<String, Setting>,
    key: &'static str,
    field: &'static str,
) -> Result<&'a Setting, TranslateError> {
    settings
        .get(field)
        .ok_or(TranslateError::Missing { key, field })
}

fn bandwidth(
    settings: &BTreeMap<String, Setting>,
    key: &'static str,
    field: &'static str,
) -> Result<i64, TranslateError> {
    match lookup(settings, key, field)? {
        Setting::Integer(x) => Ok(*x),
        other => other
            .to_string()
            .trim()
            .parse()
            .map_err(|_| TranslateError::Bandwidth {
                field,
                value: other.to_string(),
            }),
    }
}

/// Rewrite the settings of a variant into builder flags.
///
/// The SSL server and the private router bridge both networks, so their bandwidth is the larger
/// one of the private and public network bandwidth.
pub fn translate(
    settings: &BTreeMap<String, Setting>,
) -> Result<TranslatedParameters, TranslateError> {
    let max_link_speed = bandwidth(settings, "pvtRtrBw", "pvtNetBw")?
        .max(bandwidth(settings, "pvtRtrBw", "pubNetBw")?)
        .to_string();
    let ssl = lookup(settings, SSL_SERVER_KEY, "arch")?.to_string() == SSL_ARCH;

    let mut params = TranslatedParameters::default();
    for &(key, field) in KEY_TABLE {
        if !key.contains("ssl") || ssl {
            params.set(key, lookup(settings, key, field)?.to_string());
        }
    }

    if ssl {
        params.set("sslCPUBw", max_link_speed.clone());
        params.set(SSL_SERVER_KEY, "True");
    } else {
        params.set(SSL_SERVER_KEY, "False");
    }
    params.set("pvtRtrBw", max_link_speed);

    Ok(params)
}

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
//! Editable parameter menus from which sweeps are composed.
//!
//! Every menu holds its current items, an optional cached copy and its defaults. What may be
//! added to a menu is decided by the [`MenuRule`] of that menu, see [`RULES`].

use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
#[strum(ascii_case_insensitive)]
/// All menus, named by their label. Each one also parses from the setting it provides values
/// for.
pub enum MenuId {
    #[strum(to_string = "EUDs", serialize = "euds")]
    Euds,
    #[strum(to_string = "CryptoAlg", serialize = "crypto")]
    CryptoAlg,
    #[strum(to_string = "PcktSrc CPU", serialize = "srcCPU")]
    SrcCpu,
    #[strum(to_string = "SSL CPU", serialize = "sslCPU")]
    SslCpu,
    #[strum(to_string = "EUD CPU", serialize = "eudCPU")]
    EudCpu,
    #[strum(to_string = "PvtNet Switch", serialize = "pvtSwitch")]
    PvtSwitch,
    #[strum(to_string = "PubNet Switch", serialize = "pubSwitch")]
    PubSwitch,
    #[strum(to_string = "Router", serialize = "rtr")]
    Router,
    #[strum(to_string = "PvtNet Mbps", serialize = "pvtNetBw")]
    PvtNetBw,
    #[strum(to_string = "PubNet Mbps", serialize = "pubNetBw")]
    PubNetBw,
    #[strum(to_string = "PcktLen", serialize = "pcktLen")]
    PcktLen,
    #[strum(to_string = "PcktBurst", serialize = "pcktBurst")]
    PcktBurst,
    #[strum(to_string = "InterPckt delay", serialize = "pcktMu")]
    PcktMu,
    #[strum(to_string = "Key Lengths", serialize = "keylength")]
    KeyLengths,
}

impl MenuId {
    pub fn rule(self) -> &'static MenuRule {
        &RULES[self as usize]
    }
}

/// What a user may add to a menu.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Check {
    /// Digits only, within `[min, max]`.
    IntRange { min: u64, max: u64 },
    /// Digits only, at least 1.
    PositiveInt,
    /// Digits and decimal points only.
    NonNegativeReal,
    /// Digits only.
    Integer,
}

impl Check {
    pub fn accepts(&self, item: &str) -> bool {
        let digits = !item.is_empty() && item.chars().all(|c| c.is_ascii_digit());
        match *self {
            Check::IntRange { min, max } => {
                digits && item.parse::<u64>().is_ok_and(|x| (min..=max).contains(&x))
            }
            Check::PositiveInt => digits && item.parse::<u64>().is_ok_and(|x| x >= 1),
            Check::NonNegativeReal => {
                item.chars().all(|c| c.is_ascii_digit() || c == '.')
                    && item.parse::<f64>().is_ok_and(|x| x >= 0.0)
            }
            Check::Integer => digits,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::IntRange { min, max } => write!(f, "must be an integer in [{min},{max}]"),
            Check::PositiveInt => write!(f, "must be a positive integer"),
            Check::NonNegativeReal => write!(f, "must be a non-negative number"),
            Check::Integer => write!(f, "must be an integer"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MenuRule {
    pub menu: MenuId,
    /// `None` if nothing can be added to the menu.
    pub check: Option<Check>,
    /// Key under which the menu is saved, `None` if it is not saved.
    pub save_key: Option<&'static str>,
}

impl MenuRule {
    pub fn addable(&self) -> bool {
        self.check.is_some()
    }
}

const fn rule(menu: MenuId, check: Option<Check>, save_key: Option<&'static str>) -> MenuRule {
    MenuRule {
        menu,
        check,
        save_key,
    }
}

/// Rules of all menus, in the order of [`MenuId`].
pub const RULES: [MenuRule; 14] = [
    rule(MenuId::Euds, Some(Check::IntRange { min: 1, max: 5000 }), Some("allEUDs")),
    rule(MenuId::CryptoAlg, None, None),
    rule(MenuId::SrcCpu, None, None),
    rule(MenuId::SslCpu, None, None),
    rule(MenuId::EudCpu, None, None),
    rule(MenuId::PvtSwitch, None, None),
    rule(MenuId::PubSwitch, None, None),
    rule(MenuId::Router, None, None),
    rule(MenuId::PvtNetBw, Some(Check::IntRange { min: 10, max: 10000 }), Some("allPvtNetBw")),
    rule(MenuId::PubNetBw, Some(Check::IntRange { min: 10, max: 10000 }), Some("allPubNetBw")),
    rule(MenuId::PcktLen, Some(Check::IntRange { min: 1, max: 1464 }), Some("allPcktLen")),
    rule(MenuId::PcktBurst, Some(Check::PositiveInt), Some("allPcktBurst")),
    rule(MenuId::PcktMu, Some(Check::NonNegativeReal), Some("allPcktMu")),
    rule(MenuId::KeyLengths, Some(Check::Integer), Some("allKeyLengths")),
];

const DEFAULT_EUDS: &[&str] = &["1", "10", "100", "1000"];
const DEFAULT_PCKT_LEN: &[&str] = &["64", "128", "256", "512", "1024"];
const DEFAULT_PCKT_BURST: &[&str] = &["1", "10", "100"];
const DEFAULT_PCKT_MU: &[&str] = &[
    "0", "0.001", "1e-3", "0.01", "1e-2", "0.1", "1e-1", "1", "1e+0",
];
const DEFAULT_KEY_LENGTHS: &[&str] = &["256"];
const DEFAULT_NET_BW: &[&str] = &["1", "10", "100", "1000", "10000"];

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("Cannot add items to menu {0}")]
    NotAddable(MenuId),
    #[error("Offered addition {item} already exists in {menu} menu")]
    Duplicate { menu: MenuId, item: String },
    #[error("{menu}: {item:?} {check}")]
    Invalid {
        menu: MenuId,
        item: String,
        check: Check,
    },
    #[error("Entry {item} not found in menu {menu}")]
    NotFound { menu: MenuId, item: String },
    #[error("Index #{index} is outside of menu {menu} with {len} items")]
    OutOfBounds {
        menu: MenuId,
        index: usize,
        len: usize,
    },
    #[error("Not permitted to empty menu {0} with a deletion")]
    WouldEmpty(MenuId),
    #[error("No cached state of menu {0} is found")]
    NothingCached(MenuId),
    #[error("The device description has no entries for menu {0}")]
    NoDevices(MenuId),
    #[error("Cannot access {0:?}: {1}")]
    Io(PathBuf, #[source] io::Error),
    #[error("Invalid JSON in {0:?}: {1}")]
    Json(PathBuf, #[source] serde_json::Error),
    #[error("Invalid YAML in {0:?}: {1}")]
    Yaml(PathBuf, #[source] serde_yaml::Error),
}

/// Device models by name, with the roles each of them can take.
pub type DeviceDescription = BTreeMap<String, DeviceEntry>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub devtype: Vec<String>,
}

/// Crypto algorithms and the key lengths each of them supports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoDescription {
    pub algs: Vec<CryptoAlgorithm>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoAlgorithm {
    pub name: String,
    pub keylen: Vec<u32>,
}

/// Read a YAML or JSON file (JSON is parsed as YAML unless the extension says `.json`).
pub fn read_description<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, MenuError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| MenuError::Io(path.to_path_buf(), e))?;
    if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&content).map_err(|e| MenuError::Json(path.to_path_buf(), e))
    } else {
        serde_yaml::from_str(&content).map_err(|e| MenuError::Yaml(path.to_path_buf(), e))
    }
}

/// Contents of the saved menus, keyed by [`MenuRule::save_key`].
pub type SavedMenus = BTreeMap<String, Vec<String>>;

#[derive(Clone, Debug, PartialEq)]
pub struct MenuStore {
    current: BTreeMap<MenuId, Vec<String>>,
    cached: BTreeMap<MenuId, Vec<String>>,
    defaults: BTreeMap<MenuId, Vec<String>>,
    key_lengths: BTreeMap<String, Vec<String>>,
}

impl Default for MenuStore {
    fn default() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        let defaults: BTreeMap<MenuId, Vec<String>> = MenuId::iter()
            .map(|menu| {
                let items = match menu {
                    MenuId::Euds => strings(DEFAULT_EUDS),
                    MenuId::PvtNetBw | MenuId::PubNetBw => strings(DEFAULT_NET_BW),
                    MenuId::PcktLen => strings(DEFAULT_PCKT_LEN),
                    MenuId::PcktBurst => strings(DEFAULT_PCKT_BURST),
                    MenuId::PcktMu => strings(DEFAULT_PCKT_MU),
                    MenuId::KeyLengths => strings(DEFAULT_KEY_LENGTHS),
                    _ => Vec::new(),
                };
                (menu, items)
            })
            .collect();
        Self {
            current: defaults.clone(),
            cached: BTreeMap::new(),
            defaults,
            key_lengths: BTreeMap::new(),
        }
    }
}

impl MenuStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the device menus. Host and server models go to the packet source menu, switches to
    /// both switch menus.
    pub fn with_devices(mut self, devices: &DeviceDescription) -> Result<Self, MenuError> {
        let mut menus: BTreeMap<MenuId, Vec<String>> = BTreeMap::new();
        for (name, entry) in devices {
            for devtype in &entry.devtype {
                let targets: &[MenuId] = match devtype.as_str() {
                    "host" | "server" => &[MenuId::SrcCpu],
                    "ssl" => &[MenuId::SslCpu],
                    "eud" => &[MenuId::EudCpu],
                    "switch" => &[MenuId::PvtSwitch, MenuId::PubSwitch],
                    "router" => &[MenuId::Router],
                    other => {
                        log::debug!("Ignoring device type {other:?} of {name}");
                        &[]
                    }
                };
                for menu in targets {
                    let items = menus.entry(*menu).or_default();
                    if !items.contains(name) {
                        items.push(name.clone());
                    }
                }
            }
        }
        for menu in [
            MenuId::SrcCpu,
            MenuId::SslCpu,
            MenuId::PvtSwitch,
            MenuId::PubSwitch,
            MenuId::Router,
        ] {
            if menus.get(&menu).map_or(true, Vec::is_empty) {
                return Err(MenuError::NoDevices(menu));
            }
        }
        for (menu, items) in menus {
            self.defaults.insert(menu, items.clone());
            self.current.insert(menu, items);
        }
        Ok(self)
    }

    /// Fill the crypto menus. The key length menu becomes the union of all supported lengths.
    pub fn with_crypto(mut self, crypto: &CryptoDescription) -> Self {
        let names: Vec<String> = crypto.algs.iter().map(|a| a.name.clone()).collect();
        let mut lengths: Vec<u32> = crypto.algs.iter().flat_map(|a| a.keylen.clone()).collect();
        lengths.sort_unstable();
        lengths.dedup();
        let lengths: Vec<String> = lengths.iter().map(u32::to_string).collect();

        self.key_lengths = crypto
            .algs
            .iter()
            .map(|a| (a.name.clone(), a.keylen.iter().map(u32::to_string).collect()))
            .collect();
        for (menu, items) in [(MenuId::CryptoAlg, names), (MenuId::KeyLengths, lengths)] {
            self.defaults.insert(menu, items.clone());
            self.current.insert(menu, items);
        }
        self
    }

    /// Whether `algorithm` supports `length`. Unknown algorithms support every length.
    pub fn key_length_allowed(&self, algorithm: &str, length: &str) -> bool {
        self.key_lengths
            .get(algorithm)
            .map_or(true, |lengths| lengths.iter().any(|l| l == length))
    }

    pub fn items(&self, menu: MenuId) -> &[String] {
        self.current.get(&menu).map(Vec::as_slice).unwrap_or_default()
    }

    /// An independent copy of the current items.
    pub fn snapshot(&self, menu: MenuId) -> Vec<String> {
        self.items(menu).to_vec()
    }

    /// Add an item and keep the menu sorted by numeric value. Returns the added (trimmed) item.
    pub fn add(&mut self, menu: MenuId, item: &str) -> Result<String, MenuError> {
        let check = menu.rule().check.ok_or(MenuError::NotAddable(menu))?;
        let item = item.trim().to_string();
        if self.items(menu).iter().any(|x| x.trim() == item) {
            return Err(MenuError::Duplicate { menu, item });
        }
        if !check.accepts(&item) {
            return Err(MenuError::Invalid { menu, item, check });
        }
        let items = self.current.entry(menu).or_default();
        items.push(item.clone());
        items.sort_by(|a, b| numeric_key(a).total_cmp(&numeric_key(b)));
        log::debug!("Added {item} to menu {menu}");
        Ok(item)
    }

    /// Delete an item given by its value or by its position as `#<index>`. Returns the deleted
    /// item.
    pub fn delete(&mut self, menu: MenuId, item: &str) -> Result<String, MenuError> {
        let item = item.trim();
        let items = self.current.entry(menu).or_default();
        let position = match item.strip_prefix('#').map(str::parse::<usize>) {
            Some(Ok(index)) if index < items.len() => index,
            Some(Ok(index)) => {
                return Err(MenuError::OutOfBounds {
                    menu,
                    index,
                    len: items.len(),
                })
            }
            _ => items
                .iter()
                .position(|x| x.trim() == item)
                .ok_or_else(|| MenuError::NotFound {
                    menu,
                    item: item.to_string(),
                })?,
        };
        if items.len() == 1 {
            return Err(MenuError::WouldEmpty(menu));
        }
        let removed = items.remove(position);
        log::debug!("Removed {removed} from menu {menu}");
        Ok(removed)
    }

    pub fn cache(&mut self, menu: MenuId) {
        self.cached.insert(menu, self.snapshot(menu));
    }

    pub fn restore_cached(&mut self, menu: MenuId) -> Result<(), MenuError> {
        match self.cached.get(&menu) {
            Some(items) if !items.is_empty() => {
                self.current.insert(menu, items.clone());
                Ok(())
            }
            _ => Err(MenuError::NothingCached(menu)),
        }
    }

    pub fn restore_default(&mut self, menu: MenuId) {
        let items = self.defaults.get(&menu).cloned().unwrap_or_default();
        self.current.insert(menu, items);
    }

    /// Current contents of all saved menus.
    pub fn saved(&self) -> SavedMenus {
        MenuId::iter()
            .filter_map(|menu| Some((menu.rule().save_key?.to_string(), self.snapshot(menu))))
            .collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MenuError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.saved())
            .map_err(|e| MenuError::Json(path.to_path_buf(), e))?;
        fs::write(path, content).map_err(|e| MenuError::Io(path.to_path_buf(), e))?;
        log::info!("Saved menus to {path:?}");
        Ok(())
    }

    /// Replace the saved menus with the contents of `path`. The loaded items also become the
    /// defaults of these menus.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), MenuError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| MenuError::Io(path.to_path_buf(), e))?;
        let saved: SavedMenus =
            serde_json::from_str(&content).map_err(|e| MenuError::Json(path.to_path_buf(), e))?;
        for (key, items) in saved {
            match RULES.iter().find(|r| r.save_key == Some(key.as_str())) {
                Some(rule) => {
                    self.defaults.insert(rule.menu, items.clone());
                    self.current.insert(rule.menu, items);
                }
                None => log::warn!("Ignoring unknown menu {key:?} in {path:?}"),
            }
        }
        Ok(())
    }
}

/// Items that are not numbers are placed at the end.
fn numeric_key(item: &str) -> f64 {
    item.trim().parse().unwrap_or(f64::INFINITY)
}

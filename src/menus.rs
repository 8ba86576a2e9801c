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
    io::{self, BufRead},
    path::PathBuf,
    str::FromStr,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use strum::IntoEnumIterator;

use pces_sweep::{
    menu::{read_description, CryptoDescription, DeviceDescription, MenuError, MenuId, MenuStore},
    util,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Saved menus. They are loaded if the file exists, and written after every modification.
    #[arg(short, long, default_value = "menus.json")]
    file: PathBuf,
    /// Device description used to fill the device menus.
    #[arg(short, long)]
    devices: Option<PathBuf>,
    /// Crypto description used to fill the algorithm and key length menus.
    #[arg(short, long)]
    crypto: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a single menu, or all of them.
    Show { menu: Option<MenuId> },
    /// Add an item to a menu.
    Add { menu: MenuId, item: String },
    /// Delete an item, given either by value or by position as `#<index>`.
    Delete { menu: MenuId, item: String },
    /// Restore the default items of a menu.
    Reset { menu: MenuId },
    /// Read commands from stdin, one per line: `show [menu]`, `add <menu> <item>`,
    /// `delete <menu> <item>`, `cache <menu>`, `restore <menu>` and `reset <menu>`. Menus are
    /// named by the setting they provide values for, e.g. `euds` or `srcCPU`.
    Session,
}

fn main() -> Result<()> {
    let args = Args::parse();
    util::init_logging(&MultiProgress::new());

    let mut store = MenuStore::new();
    if let Some(path) = &args.devices {
        let devices: DeviceDescription = read_description(path)?;
        store = store
            .with_devices(&devices)
            .with_context(|| format!("Cannot fill the device menus from {path:?}"))?;
    }
    if let Some(path) = &args.crypto {
        store = store.with_crypto(&read_description::<CryptoDescription>(path)?);
    }
    if args.file.exists() {
        store
            .load(&args.file)
            .with_context(|| format!("Cannot restore the saved menus from {:?}", args.file))?;
    }

    let modified = match args.command {
        Command::Show { menu } => {
            show(&store, menu);
            false
        }
        Command::Add { menu, item } => {
            let item = store.add(menu, &item)?;
            println!("{item} successfully added to {menu} menu");
            true
        }
        Command::Delete { menu, item } => {
            let item = store.delete(menu, &item)?;
            println!("successfully removed {item} from {menu} menu");
            true
        }
        Command::Reset { menu } => {
            store.restore_default(menu);
            println!("successfully set default state of menu {menu}");
            true
        }
        Command::Session => session(&mut store).context("Cannot read commands")?,
    };

    if modified {
        store.save(&args.file)?;
    }
    Ok(())
}

fn show(store: &MenuStore, menu: Option<MenuId>) {
    let menus: Vec<MenuId> = match menu {
        Some(menu) => vec![menu],
        None => MenuId::iter().collect(),
    };
    for menu in menus {
        println!("{menu:>16}: {}", store.items(menu).join(", "));
    }
}

/// Apply commands read from stdin. Invalid commands are reported and skipped. Returns whether
/// any menu was modified.
fn session(store: &mut MenuStore) -> io::Result<bool> {
    let mut modified = false;
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match apply(store, line) {
            Ok((message, changed)) => {
                modified |= changed;
                if !message.is_empty() {
                    println!("{message}");
                }
            }
            Err(e) => println!("{e}"),
        }
    }
    Ok(modified)
}

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("unknown menu {0:?}")]
    Menu(String),
    #[error("{0}")]
    Store(#[from] MenuError),
}

fn apply(store: &mut MenuStore, line: &str) -> Result<(String, bool), CommandError> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let menu = words
        .next()
        .map(|m| MenuId::from_str(m).map_err(|_| CommandError::Menu(m.to_string())))
        .transpose()?;
    let item = words.collect::<Vec<_>>().join(" ");
    let menu_or_missing = || menu.ok_or(CommandError::Missing("menu"));

    Ok(match command {
        "show" => {
            show(store, menu);
            (String::new(), false)
        }
        "add" => {
            let menu = menu_or_missing()?;
            let item = store.add(menu, &item)?;
            (format!("{item} successfully added to {menu} menu"), true)
        }
        "delete" => {
            let menu = menu_or_missing()?;
            if item.is_empty() {
                return Err(CommandError::Missing("item"));
            }
            let item = store.delete(menu, &item)?;
            (format!("successfully removed {item} from {menu} menu"), true)
        }
        "cache" => {
            let menu = menu_or_missing()?;
            store.cache(menu);
            (format!("cached state of menu {menu}"), false)
        }
        "restore" => {
            let menu = menu_or_missing()?;
            store.restore_cached(menu)?;
            (format!("successfully recovered cached state of menu {menu}"), true)
        }
        "reset" => {
            let menu = menu_or_missing()?;
            store.restore_default(menu);
            (format!("successfully set default state of menu {menu}"), true)
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    })
}

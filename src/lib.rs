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
//! Library for sweeping experiments of an external network simulator over two parameter axes,
//! and for reconstructing box-plot samples from the summaries it reports.

pub mod experiments;
pub mod menu;
pub mod summary;
pub mod util;

#[cfg(test)]
mod test;

pub mod prelude {
    pub use super::{
        experiments::{
            ExperimentDescriptor, ExternalRunner, Invoke, PlotData, RunnerConfig, Sweep,
            SweepReport, VariantGenerator,
        },
        menu::{MenuId, MenuStore},
        summary::{reconstruct, ReconstructedSample},
    };
}

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
//! Generation of all experiment variants of a sweep, i.e., the cartesian product of the base and
//! the attribute parameter values.

use std::{collections::BTreeMap, fmt};

use itertools::iproduct;

use super::{is_none, ExperimentDescriptor, Setting, NONE};

/// One fully resolved experiment at a single (base value, attribute value) coordinate.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentVariant {
    /// Position of the variant in the sweep, starting at 0.
    pub index: usize,
    /// `"<param>=<value>"`, or `"None"` if the base axis is not swept.
    pub base_code: String,
    /// `"<param>=<value>"`, or `"None"` if the attribute axis is not swept.
    pub attrb_code: String,
    pub base_value: String,
    pub attrb_value: String,
    pub settings: BTreeMap<String, Setting>,
}

impl ExperimentVariant {
    pub fn coordinate(&self) -> (&str, &str) {
        (&self.base_value, &self.attrb_value)
    }
}

impl fmt::Display for ExperimentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.base_code, self.attrb_code)
    }
}

/// Builds the experiment matrix from a descriptor. The base axis forms the outer loop, the
/// attribute axis the inner loop.
#[derive(Clone, Debug)]
pub struct VariantGenerator {
    base_param: String,
    base_values: Vec<String>,
    attrb_param: String,
    attrb_values: Vec<String>,
    settings: BTreeMap<String, Setting>,
}

impl VariantGenerator {
    pub fn new(descriptor: &ExperimentDescriptor) -> Self {
        let (base_param, base_values) =
            normalize_axis(&descriptor.base_param, &descriptor.base_param_list);
        let (attrb_param, attrb_values) =
            normalize_axis(&descriptor.attrb_param, &descriptor.attrb_param_list);
        Self {
            base_param,
            base_values,
            attrb_param,
            attrb_values,
            settings: descriptor.settings.clone(),
        }
    }

    /// Total number of variants of the sweep.
    pub fn len(&self) -> usize {
        self.base_values.len() * self.attrb_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base_param(&self) -> &str {
        &self.base_param
    }

    pub fn attrb_param(&self) -> &str {
        &self.attrb_param
    }

    pub fn base_values(&self) -> &[String] {
        &self.base_values
    }

    pub fn attrb_values(&self) -> &[String] {
        &self.attrb_values
    }

    /// Iterate over all variants in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = ExperimentVariant> + '_ {
        iproduct!(self.base_values.iter(), self.attrb_values.iter())
            .enumerate()
            .map(|(index, (base_value, attrb_value))| {
                let mut settings = self.settings.clone();
                let base_code = apply(&mut settings, &self.base_param, base_value);
                let attrb_code = apply(&mut settings, &self.attrb_param, attrb_value);
                ExperimentVariant {
                    index,
                    base_code,
                    attrb_code,
                    base_value: base_value.clone(),
                    attrb_value: attrb_value.clone(),
                    settings,
                }
            })
    }
}

/// An axis without values, or one explicitly set to "None", becomes `("None", ["None"])`.
fn normalize_axis(param: &str, values: &[String]) -> (String, Vec<String>) {
    if values.is_empty() || is_none(param) {
        (NONE.to_string(), vec![NONE.to_string()])
    } else {
        (param.to_string(), values.to_vec())
    }
}

/// Override the swept setting and return the naming code of the variant.
fn apply(settings: &mut BTreeMap<String, Setting>, param: &str, value: &str) -> String {
    if is_none(param) || is_none(value) {
        return NONE.to_string();
    }
    settings.insert(param.to_string(), Setting::from(value));
    format!("{param}={value}")
}

#[cfg(test)]
mod test {
    use super::super::test::YAML;
    use super::*;

    fn descriptor() -> ExperimentDescriptor {
        serde_yaml::from_str(YAML).unwrap()
    }

    #[test]
    fn full_product_in_order() {
        let gen = VariantGenerator::new(&descriptor());
        assert_eq!(gen.len(), 4);
        let variants: Vec<_> = gen.iter().collect();
        assert_eq!(variants.len(), 4);
        let coords: Vec<_> = variants
            .iter()
            .map(|v| (v.base_value.as_str(), v.attrb_value.as_str()))
            .collect();
        assert_eq!(
            coords,
            vec![("1", "100"), ("1", "1000"), ("10", "100"), ("10", "1000")]
        );
        assert_eq!(variants[3].index, 3);
        assert_eq!(variants[3].base_code, "euds=10");
        assert_eq!(variants[3].attrb_code, "pvtNetBw=1000");
        assert_eq!(variants[3].settings["euds"], Setting::from("10"));
        assert_eq!(variants[3].settings["pvtNetBw"], Setting::from("1000"));
        assert_eq!(variants[0].settings["pvtNetBw"], Setting::from("100"));
        assert_eq!(variants[2].to_string(), "[euds=10, pvtNetBw=100]");
    }

    #[test]
    fn variants_do_not_share_overrides() {
        let mut desc = descriptor();
        desc.attrb_param = NONE.to_string();
        let variants: Vec<_> = VariantGenerator::new(&desc).iter().collect();
        assert_eq!(variants.len(), 2);
        // the fixed setting is untouched, only the base axis is overwritten
        assert!(variants
            .iter()
            .all(|v| v.settings["pvtNetBw"] == Setting::from("1000")));
        assert_eq!(variants[0].attrb_code, NONE);
        assert_eq!(variants[0].attrb_value, NONE);
    }

    #[test]
    fn none_axis_substitution() {
        let mut implicit = descriptor();
        implicit.base_param = "none".to_string();
        implicit.base_param_list = vec![];
        let mut explicit = descriptor();
        explicit.base_param = NONE.to_string();
        explicit.base_param_list = vec![NONE.to_string()];

        let a = VariantGenerator::new(&implicit);
        let b = VariantGenerator::new(&explicit);
        assert_eq!(a.len(), 2);
        assert_eq!(a.base_param(), NONE);
        assert_eq!(a.base_values(), b.base_values());
        assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
        assert!(a.iter().all(|v| v.base_code == NONE && v.base_value == NONE));
    }

    #[test]
    fn empty_list_disables_axis() {
        let mut desc = descriptor();
        desc.base_param_list = vec![];
        desc.attrb_param_list = vec![];
        let gen = VariantGenerator::new(&desc);
        assert_eq!(gen.len(), 1);
        let variant = gen.iter().next().unwrap();
        assert_eq!(variant.coordinate(), (NONE, NONE));
        assert_eq!(variant.settings, desc.settings);
    }

    #[test]
    fn count_is_product_of_list_lengths() {
        for (n_base, n_attrb) in [(1, 1), (1, 5), (3, 2), (4, 4)] {
            let mut desc = descriptor();
            desc.base_param_list = (0..n_base).map(|i| i.to_string()).collect();
            desc.attrb_param_list = (0..n_attrb).map(|i| (100 * i).to_string()).collect();
            let gen = VariantGenerator::new(&desc);
            assert_eq!(gen.len(), n_base * n_attrb);
            assert_eq!(gen.iter().count(), n_base * n_attrb);
        }
    }
}

//! Utility module for serde of types.

use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

use itertools::Itertools;
use serde::{Serialize, Serializer};

/// Serialize a HashMap of HashMaps sorted by the keys of both levels, so that the output is
/// stable between runs.
pub fn serialize_ordered<
    K: Serialize + Ord,
    K2: Clone + Hash + Serialize + Ord,
    V: Clone + Serialize,
    S: Serializer,
>(
    map: &HashMap<K, HashMap<K2, V>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        map.iter()
            .sorted_by(|(k, _), (k2, _)| k.cmp(k2))
            .map(|(key, inner)| (key, BTreeMap::<K2, V>::from_iter(inner.clone()))),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Wrapper {
        #[serde(serialize_with = "serialize_ordered")]
        map: HashMap<String, HashMap<String, u32>>,
    }

    #[test]
    fn test_serialize_sorted() {
        let wrapper = Wrapper {
            map: HashMap::from_iter([
                (
                    "b".to_string(),
                    HashMap::from_iter([("z".to_string(), 1), ("a".to_string(), 2)]),
                ),
                ("a".to_string(), HashMap::from_iter([("x".to_string(), 3)])),
            ]),
        };
        assert_eq!(
            serde_json::to_string(&wrapper).unwrap(),
            r#"{"map":{"a":{"x":3},"b":{"a":2,"z":1}}}"#
        );
    }
}

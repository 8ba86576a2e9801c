//! Module containing some utility functions that didn't fit anywhere else.

use std::path::{Path, PathBuf};

use time::{format_description, OffsetDateTime};

/// Produces a timestamp `String` of the current time in YYYY-MM-DD_HH-mm-SS format.
pub fn get_timestamp() -> String {
    let format = format_description::parse("[year]-[month]-[day]_[hour]-[minute]-[second]")
        .expect("static format description is valid");
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .format(&format)
        .unwrap_or_else(|_| "unknown-time".to_string())
}

/// Replace the extension of `path` with `ext`, keeping the rest of the file name, e.g.
/// `plots/rtt.png` becomes `plots/rtt.json` for `ext = "json"`.
pub fn with_extension(path: impl AsRef<Path>, ext: &str) -> PathBuf {
    let mut path = path.as_ref().to_path_buf();
    path.set_extension(ext);
    path
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timestamp_shape() {
        let ts = get_timestamp();
        assert_eq!(ts.len(), "2024-10-03_19-38-32".len());
        assert_eq!(ts.matches('-').count(), 4);
        assert!(ts.contains('_'));
    }

    #[test]
    fn extension_replaced() {
        assert_eq!(
            with_extension("plots/rtt.png", "json"),
            PathBuf::from("plots/rtt.json")
        );
        assert_eq!(with_extension("rtt", "csv"), PathBuf::from("rtt.csv"));
    }
}

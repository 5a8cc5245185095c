//! Config file loading (spec.md §6 "Config files"): `/etc/flowbuf.rc`,
//! `<prefix>/etc/flowbuf.rc`, `$HOME/.flowbuf.rc`, later overriding earlier.
//! CLI flags in turn override whatever the rc files set.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Key/value pairs accumulated from every rc file found, in override order.
#[derive(Debug, Default, Clone)]
pub struct RcSettings {
    values: HashMap<String, String>,
}

impl RcSettings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Keys this build recognizes; anything else in an rc file produces a
/// warning but does not abort loading.
const KNOWN_KEYS: &[&str] = &[
    "block-size",
    "num-blocks",
    "memory",
    "low-watermark",
    "high-watermark",
    "read-rate",
    "write-rate",
    "pause",
    "verbosity",
    "watchdog",
    "status-interval",
    "autoload-time",
    "autoload-cmd",
    "tapeaware",
];

fn search_paths(name: &str, install_prefix: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(format!("/etc/{name}.rc"))];
    if let Some(prefix) = install_prefix {
        paths.push(prefix.join("etc").join(format!("{name}.rc")));
    }
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(format!(".{name}.rc")));
    }
    paths
}

/// Load and merge every rc file that exists and is readable by this process
/// (spec.md §6: "A config file owned by a different non-root user is
/// ignored").
pub fn load(name: &str, install_prefix: Option<&Path>) -> RcSettings {
    let mut settings = RcSettings::default();
    for path in search_paths(name, install_prefix) {
        if !path.exists() {
            continue;
        }
        if !owned_by_us_or_root(&path) {
            warn!(path = %path.display(), "ignoring config file owned by a different user");
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(contents) => merge_file(&mut settings, &path, &contents),
            Err(err) => warn!(path = %path.display(), error = %err, "could not read config file"),
        }
    }
    settings
}

fn merge_file(settings: &mut RcSettings, path: &Path, contents: &str) {
    for (lineno, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!(path = %path.display(), line = lineno + 1, "malformed config line, ignoring");
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if !KNOWN_KEYS.contains(&key) {
            warn!(path = %path.display(), key, "unknown config key, ignoring");
            continue;
        }
        settings.values.insert(key.to_string(), value.to_string());
    }
}

#[cfg(unix)]
fn owned_by_us_or_root(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    let Ok(meta) = fs::metadata(path) else { return false };
    let uid = meta.uid();
    uid == 0 || uid == unsafe { libc::getuid() }
}

#[cfg(not(unix))]
fn owned_by_us_or_root(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_skipped_not_fatal() {
        let mut settings = RcSettings::default();
        merge_file(&mut settings, Path::new("<test>"), "block-size=4k\nbogus=1\n");
        assert_eq!(settings.get("block-size"), Some("4k"));
        assert_eq!(settings.get("bogus"), None);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let mut settings = RcSettings::default();
        merge_file(&mut settings, Path::new("<test>"), "# comment\n\nverbosity=info\n");
        assert_eq!(settings.get("verbosity"), Some("info"));
    }
}

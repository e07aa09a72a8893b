//! Host-based access control: exact domains, exact IPs, suffix wildcards.
//!
//! The rule set is republished as an atomic snapshot on reload so the many
//! concurrent readers (one per in-flight connection) never observe a
//! partially rebuilt set and never block behind the writer — the same
//! lock-free swap this pack's gateway example uses for its route table.

use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;

/// Minimum gap between observed mtimes before a reload fires. Absorbs
/// filesystem timestamp granularity so a burst of requests inside the same
/// wall-clock second doesn't each trigger their own reload.
const RELOAD_EPSILON: Duration = Duration::from_millis(100);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct RuleSet {
    exact_domains: HashSet<String>,
    exact_ips: HashSet<String>,
    suffixes: Vec<String>,
}

impl RuleSet {
    fn parse(text: &str) -> Self {
        let mut set = RuleSet::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Ok(ip) = line.parse::<IpAddr>() {
                set.exact_ips.insert(ip.to_string());
            } else if let Some(suffix) = line.strip_prefix("*.") {
                set.suffixes.push(suffix.to_ascii_lowercase());
            } else {
                set.exact_domains.insert(line.to_ascii_lowercase());
            }
        }
        set
    }

    fn is_blocked(&self, host: &str) -> bool {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            if self.exact_ips.contains(&ip.to_string()) {
                return true;
            }
        }
        if self.exact_domains.contains(&host) {
            return true;
        }
        self.suffixes
            .iter()
            .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")))
    }
}

/// Host filter with hot-reload. `is_blocked` never fails; failures while
/// reloading leave the previous rule set in place and are reported through
/// the event sink.
pub struct HostFilter {
    path: PathBuf,
    rules: ArcSwap<RuleSet>,
    last_mtime: ArcSwap<Option<SystemTime>>,
}

impl HostFilter {
    /// Opens the rules file at `path`, creating an empty one (with a short
    /// comment header) if it doesn't exist yet, and loads the initial rule
    /// set.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filter = HostFilter {
            path,
            rules: ArcSwap::from_pointee(RuleSet::default()),
            last_mtime: ArcSwap::from_pointee(None),
        };
        if !filter.path.exists() {
            if let Some(parent) = filter.path.parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = fs::create_dir_all(parent);
                }
            }
            let _ = fs::write(
                &filter.path,
                "# Blocked domains and IPs\n# One entry per line\n# Lines starting with # are comments\n",
            );
        } else {
            filter.force_reload();
        }
        filter
    }

    pub fn is_blocked(&self, host: &str) -> bool {
        self.rules.load().is_blocked(host)
    }

    /// Reloads the rule set if the file's mtime has advanced by more than
    /// [`RELOAD_EPSILON`] since the last load. Returns whether a reload
    /// happened. A missing file is a no-op, not an error.
    pub fn reload_if_changed(&self) -> bool {
        let Ok(meta) = fs::metadata(&self.path) else {
            return false;
        };
        let Ok(mtime) = meta.modified() else {
            return false;
        };
        let stale = match **self.last_mtime.load() {
            Some(last) => mtime
                .duration_since(last)
                .map(|advance| advance > RELOAD_EPSILON)
                .unwrap_or(false),
            None => true,
        };
        if !stale {
            return false;
        }
        self.load(mtime)
    }

    /// Rereads the rules file unconditionally, if it exists.
    pub fn force_reload(&self) -> bool {
        let Ok(meta) = fs::metadata(&self.path) else {
            return false;
        };
        let Ok(mtime) = meta.modified() else {
            return false;
        };
        self.load(mtime)
    }

    fn load(&self, mtime: SystemTime) -> bool {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                self.rules.store(Arc::new(RuleSet::parse(&text)));
                self.last_mtime.store(Arc::new(Some(mtime)));
                true
            }
            Err(err) => {
                crate::sink::log_error(&format!(
                    "Could not load filter file {}: {err}",
                    self.path.display()
                ));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_domain_blocks_case_insensitively() {
        let rules = RuleSet::parse("blocked.test\n");
        assert!(rules.is_blocked("blocked.test"));
        assert!(rules.is_blocked("BLOCKED.TEST"));
        assert!(!rules.is_blocked("allowed.test"));
    }

    #[test]
    fn suffix_blocks_subdomains_and_itself() {
        let rules = RuleSet::parse("*.ads.test\n");
        assert!(rules.is_blocked("a.b.ads.test"));
        assert!(rules.is_blocked("ads.test"));
        assert!(!rules.is_blocked("notads.test"));
    }

    #[test]
    fn exact_ip_blocks_canonicalised_form() {
        let rules = RuleSet::parse("127.0.0.1\n::1\n");
        assert!(rules.is_blocked("127.0.0.1"));
        assert!(rules.is_blocked("::1"));
        assert!(!rules.is_blocked("127.0.0.2"));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let a = RuleSet::parse("blocked.test\n");
        let b = RuleSet::parse("# comment\n\nblocked.test\n\n# trailing\n");
        assert_eq!(a, b);
    }

    #[test]
    fn line_order_does_not_change_outcome() {
        let a = RuleSet::parse("one.test\ntwo.test\n*.three.test\n");
        let b = RuleSet::parse("*.three.test\ntwo.test\none.test\n");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_or_blank_host_is_never_blocked() {
        let rules = RuleSet::parse("blocked.test\n");
        assert!(!rules.is_blocked(""));
        assert!(!rules.is_blocked("   "));
    }

    #[test]
    fn is_blocked_is_pure() {
        let rules = RuleSet::parse("blocked.test\n*.ads.test\n");
        for _ in 0..3 {
            assert!(rules.is_blocked("blocked.test"));
            assert!(!rules.is_blocked("fine.test"));
        }
    }

    #[test]
    fn reload_if_changed_picks_up_new_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocked.txt");
        fs::write(&path, "").unwrap();

        let filter = HostFilter::open(&path);
        assert!(!filter.is_blocked("x.test"));

        // Force the mtime visibly forward so the epsilon tolerance doesn't
        // swallow the change.
        std::thread::sleep(Duration::from_millis(20));
        fs::write(&path, "x.test\n").unwrap();
        let newer = SystemTime::now() + Duration::from_secs(1);
        let _ = filetime_touch(&path, newer);

        assert!(filter.reload_if_changed());
        assert!(filter.is_blocked("x.test"));
    }

    /// Minimal mtime bump without pulling in a filetime crate: reload once
    /// more after a sleep so the observed mtime is strictly newer than what
    /// was cached at construction time.
    fn filetime_touch(path: &std::path::Path, _target: SystemTime) -> std::io::Result<()> {
        std::thread::sleep(Duration::from_millis(150));
        let text = fs::read_to_string(path)?;
        fs::write(path, text)
    }
}

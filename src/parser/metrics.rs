//! Scraping of cumulative per-module counters from Prometheus text.
//!
//! Lines of the form
//!
//! ```text
//! begin_blocker_sum{chain_id="x",module="oracle"} 123.45
//! ```
//!
//! contribute `123.45` to module `oracle` in the `begin` direction.

use log::debug;
use regex::Regex;
use std::collections::BTreeMap;

/// Cumulative counter values per module, split by direction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterSnapshot {
    pub begin: BTreeMap<String, f64>,
    pub end: BTreeMap<String, f64>,
}

impl CounterSnapshot {
    pub fn is_empty(&self) -> bool {
        self.begin.is_empty() && self.end.is_empty()
    }
}

/// Compiled matchers for the begin/end counter families
#[derive(Debug, Clone)]
pub struct CounterScraper {
    begin: Regex,
    end: Regex,
}

impl CounterScraper {
    /// Build a scraper for `<begin_prefix>_sum` and `<end_prefix>_sum`
    pub fn new(begin_prefix: &str, end_prefix: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            begin: sum_pattern(begin_prefix)?,
            end: sum_pattern(end_prefix)?,
        })
    }

    /// Parse one exposition body. Unparsable values are skipped.
    pub fn scrape(&self, text: &str) -> CounterSnapshot {
        CounterSnapshot {
            begin: collect(&self.begin, text),
            end: collect(&self.end, text),
        }
    }
}

fn sum_pattern(prefix: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r#"{}_sum\{{[^}}]*module="([^"]+)"[^}}]*\}}\s+(\S+)"#,
        regex::escape(prefix)
    ))
}

fn collect(pattern: &Regex, text: &str) -> BTreeMap<String, f64> {
    let mut values = BTreeMap::new();

    for caps in pattern.captures_iter(text) {
        let module = &caps[1];
        match caps[2].parse::<f64>() {
            Ok(v) if v.is_finite() => {
                *values.entry(module.to_string()).or_insert(0.0) += v;
            }
            _ => debug!("Skipping counter sample for {}: {:?}", module, &caps[2]),
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# HELP begin_blocker Time spent in BeginBlock
# TYPE begin_blocker summary
begin_blocker_sum{chain_id="layer",module="oracle"} 120.5
begin_blocker_count{chain_id="layer",module="oracle"} 10
begin_blocker_sum{chain_id="layer",module="bank"} 3
end_blocker_sum{module="dispute",chain_id="layer"} 42.25
end_blocker_sum{module="bridge"} NaN
"#;

    fn scraper() -> CounterScraper {
        CounterScraper::new("begin_blocker", "end_blocker").unwrap()
    }

    #[test]
    fn test_scrape_begin_and_end() {
        let snap = scraper().scrape(SAMPLE);

        assert_eq!(snap.begin.len(), 2);
        assert_eq!(snap.begin["oracle"], 120.5);
        assert_eq!(snap.begin["bank"], 3.0);
        assert_eq!(snap.end.len(), 1);
        assert_eq!(snap.end["dispute"], 42.25);
    }

    #[test]
    fn test_count_lines_are_ignored() {
        let snap = scraper().scrape("begin_blocker_count{module=\"oracle\"} 99\n");
        assert!(snap.is_empty());
    }

    #[test]
    fn test_repeated_module_lines_are_summed() {
        let text = "end_blocker_sum{module=\"oracle\",phase=\"a\"} 1.5\n\
                    end_blocker_sum{module=\"oracle\",phase=\"b\"} 2.5\n";
        let snap = scraper().scrape(text);
        assert_eq!(snap.end["oracle"], 4.0);
    }

    #[test]
    fn test_custom_prefix() {
        let scraper = CounterScraper::new("layer_preblocker", "layer_end").unwrap();
        let snap = scraper.scrape("layer_preblocker_sum{module=\"x\"} 7\n");
        assert_eq!(snap.begin["x"], 7.0);
    }

    #[test]
    fn test_empty_text() {
        assert!(scraper().scrape("").is_empty());
    }
}

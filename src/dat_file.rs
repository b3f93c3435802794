// src/dat_file.rs
//
// Reader/editor for the solver's key-value `.dat` parameter files.
//
// Grammar, one entry per line:
//
//     <value>    !<name> <free-text description>
//     // comment
//
// Only lines containing '!' carry parameters. The value is whatever precedes
// the first '!'; the name is the first whitespace-separated token after it.
// Values that are not numbers (file names, flags) are not parameters.
//
// Edits must not disturb anything else in the file: the original lines are
// kept verbatim, including line endings, and only the leading number of a
// matching line is rewritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{IoContext, Result};
use crate::numfmt::{parse_float_token, sci};

fn leading_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)([-+]?(?:\d+\.?\d*|\.\d+)(?:[eEdD][-+]?\d+)?)")
            .expect("leading-number pattern is valid")
    })
}

/// Parsed parameter file. Holds the raw lines so writes are minimal edits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamFile {
    lines: Vec<String>,
}

/// Name and numeric value on a parameter line, if it has both.
fn parse_entry(line: &str) -> Option<(&str, f64)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") {
        return None;
    }
    let (raw, label) = line.split_once('!')?;
    let name = label.split_whitespace().next()?;
    let value = parse_float_token(raw)?;
    Some((name, value))
}

/// Does the label of `line` (text after '!') begin with `target` as a whole word?
fn label_matches(line: &str, target: &str) -> bool {
    let Some((_, label)) = line.split_once('!') else {
        return false;
    };
    let label = label.trim();
    match label.strip_prefix(target) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

impl ParamFile {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        Ok(Self::parse(&text))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text()).at(path)
    }

    pub fn to_text(&self) -> String {
        self.lines.concat()
    }

    /// All numeric parameters. A later duplicate name overrides an earlier one.
    pub fn parameters(&self) -> BTreeMap<String, f64> {
        let mut params = BTreeMap::new();
        for line in &self.lines {
            match parse_entry(line) {
                Some((name, value)) => {
                    params.insert(name.to_string(), value);
                }
                None => {
                    if line.contains('!') && !line.trim_start().starts_with("//") {
                        debug!(line = line.trim(), "skipping non-numeric parameter line");
                    }
                }
            }
        }
        params
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.lines
            .iter()
            .filter_map(|l| parse_entry(l))
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .last()
    }

    /// Replace the leading number of every line whose label starts with `target`.
    ///
    /// `target` may be given with or without the leading '!' (`"!field ext (mT)"`
    /// and `"field ext"` both match `-350.0  !field ext (mT)`). The new value is
    /// written as `sci(value, precision)`. Returns the number of updated lines.
    pub fn set(&mut self, target: &str, value: f64, precision: usize) -> usize {
        let target = target.trim().trim_start_matches('!').trim_start();
        if target.is_empty() {
            return 0;
        }
        let formatted = sci(value, precision);
        let re = leading_number();

        let mut updated = 0;
        for line in &mut self.lines {
            let body = line.trim_end_matches(['\r', '\n']);
            if body.trim_start().starts_with("//") || !label_matches(body, target) {
                continue;
            }
            let Some(caps) = re.captures(body) else {
                continue;
            };
            let (Some(indent), Some(number)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let new_line = format!(
                "{}{}{}",
                indent.as_str(),
                formatted,
                &line[number.end()..]
            );
            info!(line = new_line.trim(), "updated parameter line");
            *line = new_line;
            updated += 1;
        }
        updated
    }
}

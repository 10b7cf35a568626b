use regex_lite::Regex;

use super::{Coordinate, SourceArtifact};

/// Checks `value` against a comma separated list of globs.
///
/// `*` matches any run of characters and `?` exactly one; everything else is literal.
/// An entry equal to the value ignoring case also matches. An empty list matches everything.
pub fn glob_match(patterns: &str, value: &str) -> bool {
    if patterns.trim().is_empty() {
        return true;
    }
    patterns
        .split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .any(|pattern| {
            glob_to_regex(pattern).is_some_and(|re| re.is_match(value))
                || pattern.eq_ignore_ascii_case(value)
        })
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut expression = String::with_capacity(pattern.len() + 8);
    expression.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            c => expression.push_str(&regex_lite::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    expression.push('$');
    Regex::new(&expression).ok()
}

/// Matches a module selector against a coordinate.
///
/// A selector containing `:` is read as positional globs `group:artifact[:version]`.
/// Anything else is a loose token tried against the group, the artifact, `group:artifact`
/// and their dash-to-dot variants, either as a glob or as a substring.
pub fn module_match(selector: &str, coordinate: &Coordinate) -> bool {
    let selector = selector.trim();
    if selector.is_empty() {
        return true;
    }
    if selector.contains(':') {
        let mut parts = selector.split(':');
        let group = parts.next().unwrap_or("");
        let artifact = parts.next().unwrap_or("");
        if !glob_match(group, &coordinate.group) || !glob_match(artifact, &coordinate.artifact) {
            return false;
        }
        return match parts.next() {
            Some(version) if !version.is_empty() => glob_match(version, coordinate.version_str()),
            _ => true,
        };
    }

    let group_artifact = format!("{}:{}", coordinate.group, coordinate.artifact);
    let candidates = [
        coordinate.group.clone(),
        coordinate.artifact.clone(),
        group_artifact.clone(),
        coordinate.artifact.replace('-', "."),
        group_artifact.replace('-', "."),
    ];
    candidates
        .iter()
        .any(|candidate| glob_match(selector, candidate) || candidate.contains(selector))
}

/// Module, group, artifact and version filters applied to resolved sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    pub module: String,
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl SourceFilter {
    pub fn matches(&self, coordinate: &Coordinate) -> bool {
        (self.module.trim().is_empty() || module_match(&self.module, coordinate))
            && glob_match(&self.group, &coordinate.group)
            && glob_match(&self.artifact, &coordinate.artifact)
            && glob_match(&self.version, coordinate.version_str())
    }

    pub fn apply(&self, sources: Vec<SourceArtifact>) -> Vec<SourceArtifact> {
        sources
            .into_iter()
            .filter(|source| self.matches(&source.coordinate))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.module.trim().is_empty()
            && self.group.trim().is_empty()
            && self.artifact.trim().is_empty()
            && self.version.trim().is_empty()
    }

    /// The exact coordinate the filter pins, if any.
    ///
    /// Explicit group and artifact win; otherwise a `group:artifact[:version]` module selector
    /// is used, with the version filter taking precedence over the selector's version.
    pub fn exact_coordinate(&self) -> Option<Coordinate> {
        let version = Some(self.version.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let (group, artifact) = (self.group.trim(), self.artifact.trim());
        if !group.is_empty() && !artifact.is_empty() {
            return Some(Coordinate::new(group, artifact, version));
        }

        let module = self.module.trim();
        if !module.contains(':') {
            return None;
        }
        let mut parts = module.split(':');
        let group = parts.next().unwrap_or("");
        let artifact = parts.next().unwrap_or("");
        if group.is_empty() || artifact.is_empty() {
            return None;
        }
        let selector_version = parts
            .next()
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Some(Coordinate::new(group, artifact, version.or(selector_version)))
    }
}

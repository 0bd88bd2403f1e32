//! Deterministic, unique identifiers for indexed nodes.
//!
//! A node's name comes from the trailing parts of its canonical URL: path
//! segments (extension dropped) followed by pointer segments, with
//! named-container keywords such as `properties` skipped when a name follows
//! them. Colliding nodes take more parts until they differ; whatever still
//! collides gets a numeric suffix in URL order.

use std::collections::{BTreeMap, HashMap, HashSet};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::indexer::NodeIndex;
use crate::pointer::decode_pointer;
use crate::types::DEFAULT_NAME_PLACEHOLDER;

/// Keywords whose next segment is a user-chosen name.
const NAMED_CONTAINERS: &[&str] = &[
    "properties",
    "patternProperties",
    "definitions",
    "$defs",
    "dependentSchemas",
    "dependencies",
];

/// Canonical node URL -> assigned name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: BTreeMap<Url, String>,
}

impl NameTable {
    pub fn get(&self, url: &Url) -> Option<&str> {
        self.names.get(url).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Assignments in URL order.
    pub fn iter(&self) -> impl Iterator<Item = (&Url, &str)> {
        self.names.iter().map(|(url, name)| (url, name.as_str()))
    }
}

struct Candidate<'a> {
    url: &'a Url,
    parts: Vec<String>,
    /// Number of trailing parts in use.
    taken: usize,
}

impl Candidate<'_> {
    /// PascalCase of the trailing parts in use, reaching further back while
    /// the result would start with a digit.
    fn name(&self, placeholder: &str) -> String {
        let mut start = self.parts.len() - self.taken;
        loop {
            let joined: String = self.parts[start..].iter().map(|p| pascal_case(p)).collect();
            if joined.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return joined;
            }
            if start == 0 {
                return format!("{placeholder}{joined}");
            }
            start -= 1;
        }
    }

    fn grow(&mut self) -> bool {
        if self.taken < self.parts.len() {
            self.taken += 1;
            true
        } else {
            false
        }
    }
}

/// Assign a unique name to every node of `index`.
///
/// The result depends only on the set of indexed URLs.
pub fn assign_names(index: &NodeIndex, placeholder: &str) -> NameTable {
    let placeholder = sanitize_placeholder(placeholder);
    let mut candidates: Vec<Candidate<'_>> = index
        .urls()
        .map(|url| {
            let parts = name_parts(url);
            let taken = shortest_usable(&parts);
            Candidate { url, parts, taken }
        })
        .collect();

    loop {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, candidate) in candidates.iter().enumerate() {
            groups.entry(candidate.name(&placeholder)).or_default().push(i);
        }
        let mut changed = false;
        for members in groups.values().filter(|members| members.len() > 1) {
            for &i in members {
                changed |= candidates[i].grow();
            }
        }
        if !changed {
            break;
        }
    }

    let bases: Vec<String> = candidates.iter().map(|c| c.name(&placeholder)).collect();
    let mut used: HashSet<String> = bases.iter().cloned().collect();
    let mut issued: HashSet<&str> = HashSet::new();
    let mut names = BTreeMap::new();

    for (candidate, base) in candidates.iter().zip(&bases) {
        let name = if issued.insert(base.as_str()) {
            base.clone()
        } else {
            let mut suffix = 2;
            loop {
                let attempt = format!("{base}{suffix}");
                if used.insert(attempt.clone()) {
                    break attempt;
                }
                suffix += 1;
            }
        };
        names.insert(candidate.url.clone(), name);
    }

    NameTable { names }
}

/// Raw name parts of a canonical URL, outermost first.
fn name_parts(url: &Url) -> Vec<String> {
    let mut parts: Vec<String> = match url.path_segments() {
        Some(segments) => segments
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .map(|s| match s.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => s,
            })
            .collect(),
        None => vec![url.path().to_string()],
    };

    let pointer = decode_pointer(url.fragment().unwrap_or(""));
    let mut in_name_position = false;
    for (i, segment) in pointer.iter().enumerate() {
        if in_name_position {
            // A property may itself be called `properties`.
            in_name_position = false;
            parts.push(segment.clone());
        } else if i + 1 < pointer.len() && NAMED_CONTAINERS.contains(&segment.as_str()) {
            in_name_position = true;
        } else {
            parts.push(segment.clone());
        }
    }

    parts.retain(|p| p.chars().any(|c| c.is_ascii_alphanumeric()));
    parts
}

fn shortest_usable(parts: &[String]) -> usize {
    (1..=parts.len())
        .find(|&k| {
            parts[parts.len() - k..]
                .iter()
                .map(|p| pascal_case(p))
                .collect::<String>()
                .starts_with(|c: char| c.is_ascii_alphabetic())
        })
        .unwrap_or(parts.len())
}

/// `first-name` -> `FirstName`, `$defs` -> `Defs`, `2020-12` -> `202012`.
fn pascal_case(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for word in part
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn sanitize_placeholder(placeholder: &str) -> String {
    let name = pascal_case(placeholder);
    let name = name.trim_start_matches(|c: char| c.is_ascii_digit());
    if name.is_empty() {
        DEFAULT_NAME_PLACEHOLDER.to_string()
    } else {
        name.to_string()
    }
}

//! Variable values and the flattened, case-insensitive variable map.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A variable value.
///
/// Pipeline files only ever produce strings, booleans and numbers; timestamps
/// are injected by the agent (see [`DATE_KEY`](super::store::DATE_KEY)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean, rendered as `true` / `false`.
    Bool(bool),
    /// Any number.
    Number(f64),
    /// Plain text.
    String(String),
    /// Point in time, the only kind a `:format` suffix applies to.
    #[serde(skip_deserializing)]
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    /// Render the value, applying `format` when the value is a timestamp.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use conveyor::variables::Scalar;
    ///
    /// let ts = Scalar::Timestamp(Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap());
    /// assert_eq!(ts.render(Some("yyyyMMdd")), "20240307");
    /// assert_eq!(Scalar::Bool(true).render(Some("yyyy")), "true");
    /// ```
    pub fn render(&self, format: Option<&str>) -> String {
        match (self, format) {
            (Scalar::Timestamp(ts), Some(pattern)) => format_timestamp(ts, pattern),
            _ => self.to_string(),
        }
    }

    /// Returns the value as text when it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(true) => f.write_str("true"),
            Scalar::Bool(false) => f.write_str("false"),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => f.write_str(s),
            Scalar::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(f64::from(value))
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Scalar::Timestamp(value)
    }
}

/// A declared variable entry.
///
/// Only [`Variable::Simple`] entries take part in lookups; group and template
/// references are resolved before a pipeline reaches the agent and are skipped
/// by the variable layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// `name: value` pair.
    Simple { name: String, value: Scalar },
    /// Reference to a variable group.
    Group { group: String },
    /// Reference to a variable template file.
    Template { template: String },
}

impl Variable {
    /// Create a simple name/value variable.
    pub fn simple(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Variable::Simple {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The name/value pair, if this is a simple variable.
    pub fn as_simple(&self) -> Option<(&str, &Scalar)> {
        match self {
            Variable::Simple { name, value } => Some((name, value)),
            _ => None,
        }
    }
}

/// Flattened name → value map with case-insensitive keys.
///
/// The name as last inserted is kept for display.
///
/// # Example
///
/// ```
/// use conveyor::variables::{Scalar, VariableMap};
///
/// let mut map = VariableMap::new();
/// map.insert("Build.BuildId", 42);
/// assert_eq!(map.get("build.buildid"), Some(&Scalar::Number(42.0)));
///
/// map.insert("BUILD.BUILDID", "43");
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.get("Build.BuildId").unwrap().to_string(), "43");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableMap {
    entries: HashMap<String, (String, Scalar)>,
}

impl VariableMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value; later inserts win regardless of name case.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        let name = name.into();
        self.entries
            .insert(name.to_lowercase(), (name, value.into()));
    }

    /// Look up a value by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.entries.get(&name.to_lowercase()).map(|(_, v)| v)
    }

    /// Check whether a name is present, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Remove a value by name, ignoring case.
    pub fn remove(&mut self, name: &str) -> Option<Scalar> {
        self.entries.remove(&name.to_lowercase()).map(|(_, v)| v)
    }

    /// Copy every entry of `other` into this map, overriding existing names.
    pub fn extend_from(&mut self, other: &VariableMap) {
        for (name, value) in other.iter() {
            self.insert(name, value.clone());
        }
    }

    /// Iterate over `(display name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.values().map(|(n, v)| (n.as_str(), v))
    }

    /// Entries sorted by lowercase name, for stable display.
    pub fn sorted(&self) -> Vec<(&str, &Scalar)> {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| {
                let (name, value) = &self.entries[k];
                (name.as_str(), value)
            })
            .collect()
    }

    /// Number of distinct (case-folded) names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<N: Into<String>, V: Into<Scalar>> FromIterator<(N, V)> for VariableMap {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut map = VariableMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Format a timestamp with a .NET-style custom date pattern.
///
/// Supported specifiers: `yyyy`, `yy`, `MM`, `M`, `dd`, `d`, `HH`, `H`, `hh`,
/// `h`, `mm`, `m`, `ss`, `s`, `fff`, `ff`, `f`, `tt`. Text in single quotes and
/// characters after a backslash are copied literally, as is anything else.
pub fn format_timestamp(ts: &DateTime<Utc>, pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if c == '\\' {
            if let Some(&next) = chars.get(i + 1) {
                out.push(next);
            }
            i += 2;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        let hour12 = match ts.hour() % 12 {
            0 => 12,
            h => h,
        };
        let millis = ts.timestamp_subsec_millis();

        let rendered = match (c, run) {
            ('y', 1) => format!("{}", ts.year() % 100),
            ('y', 2) => format!("{:02}", ts.year() % 100),
            ('y', _) => format!("{:04}", ts.year()),
            ('M', 1) => format!("{}", ts.month()),
            ('M', _) => format!("{:02}", ts.month()),
            ('d', 1) => format!("{}", ts.day()),
            ('d', _) => format!("{:02}", ts.day()),
            ('H', 1) => format!("{}", ts.hour()),
            ('H', _) => format!("{:02}", ts.hour()),
            ('h', 1) => format!("{}", hour12),
            ('h', _) => format!("{:02}", hour12),
            ('m', 1) => format!("{}", ts.minute()),
            ('m', _) => format!("{:02}", ts.minute()),
            ('s', 1) => format!("{}", ts.second()),
            ('s', _) => format!("{:02}", ts.second()),
            ('f', 1) => format!("{}", millis / 100),
            ('f', 2) => format!("{:02}", millis / 10),
            ('f', _) => format!("{:03}", millis),
            ('t', _) => {
                if ts.hour() < 12 {
                    "AM".to_string()
                } else {
                    "PM".to_string()
                }
            }
            _ => std::iter::repeat(c).take(run).collect(),
        };

        out.push_str(&rendered);
        i += run;
    }

    out
}

//! Leveled diagnostics and program output.

use ariadne::{Config, Label, Report as AriadneReport, ReportKind, Source};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        match value {
            0 => Level::Info,
            1 => Level::Warning,
            _ => Level::Error,
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        match level {
            Level::Info => 0,
            Level::Warning => 1,
            Level::Error => 2,
        }
    }
}

/// Zero-based source location; tabs count as four columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Lexer token; only its location is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub location: Location,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub level: Level,
    pub position: Option<usize>,
    pub location: Option<Location>,
    pub string: String,
}

impl Report {
    /// Renders a located report against its source text.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let Some(location) = self.location else {
            return self.string.clone();
        };
        let kind = match self.level {
            Level::Info => ReportKind::Advice,
            Level::Warning => ReportKind::Warning,
            Level::Error => ReportKind::Error,
        };
        let start = offset(source, location);
        let span = start..(start + 1).min(source.chars().count()).max(start);
        let (message, detail) = match self.string.split_once(" -> ") {
            Some((node, detail)) => (detail.to_string(), node.to_string()),
            None => (self.string.clone(), String::new()),
        };

        let mut bytes = Vec::new();
        let written = AriadneReport::build(kind, (filename, span.clone()))
            .with_config(Config::default().with_color(false))
            .with_message(&message)
            .with_label(Label::new((filename, span)).with_message(detail))
            .finish()
            .write((filename, Source::from(source)), &mut bytes);
        match written {
            Ok(()) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => format!("{location}: {}", self.string),
        }
    }
}

/// Character offset of a location.
fn offset(source: &str, location: Location) -> usize {
    let mut line = 0;
    let mut column = 0;
    for (index, character) in source.chars().enumerate() {
        if line == location.line && column >= location.column {
            return index;
        }
        if character == '\n' {
            if line == location.line {
                return index;
            }
            line += 1;
            column = 0;
        } else {
            column += if character == '\t' { 4 } else { 1 };
        }
    }
    source.chars().count()
}

/// Accumulated reports of one run.
#[derive(Debug, Clone)]
pub struct Reports {
    entries: Vec<Report>,
    allowed: Level,
}

impl Default for Reports {
    fn default() -> Self {
        Self::new(Level::Error)
    }
}

impl Reports {
    pub fn new(allowed: Level) -> Self {
        Self {
            entries: Vec::new(),
            allowed,
        }
    }

    /// Records a diagnostic unless its level exceeds the allowed one or an
    /// identical (location, message) pair was already recorded.
    pub fn push(&mut self, level: Level, position: usize, location: Location, string: String) {
        if level > self.allowed {
            return;
        }
        let duplicate = self
            .entries
            .iter()
            .any(|report| report.location == Some(location) && report.string == string);
        if duplicate {
            return;
        }
        self.entries.push(Report {
            level,
            position: Some(position),
            location: Some(location),
            string,
        });
    }

    /// Program output; never de-duplicated.
    pub fn print(&mut self, string: String) {
        self.entries.push(Report {
            level: Level::Info,
            position: None,
            location: None,
            string,
        });
    }

    pub fn entries(&self) -> &[Report] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Report> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_dropped() {
        let mut reports = Reports::default();
        let location = Location { line: 1, column: 2 };
        reports.push(Level::Error, 3, location, "a -> b".into());
        reports.push(Level::Error, 3, location, "a -> b".into());
        reports.push(Level::Warning, 4, Location { line: 1, column: 3 }, "a -> b".into());

        assert_eq!(reports.entries().len(), 2);
    }

    #[test]
    fn output_is_never_deduplicated() {
        let mut reports = Reports::default();
        reports.print("hi".into());
        reports.print("hi".into());

        assert_eq!(reports.entries().len(), 2);
    }

    #[test]
    fn levels_above_allowed_are_suppressed() {
        let mut reports = Reports::new(Level::Warning);
        reports.push(Level::Error, 0, Location::default(), "x".into());
        reports.push(Level::Warning, 0, Location::default(), "y".into());

        assert_eq!(reports.entries().len(), 1);
        assert_eq!(reports.entries()[0].string, "y");
    }

    #[test]
    fn offsets_follow_lines_and_tabs() {
        let source = "a\n\tb";
        assert_eq!(offset(source, Location { line: 1, column: 4 }), 3);
        assert_eq!(offset(source, Location { line: 0, column: 0 }), 0);
    }

    #[test]
    fn render_mentions_message() {
        let report = Report {
            level: Level::Error,
            position: Some(0),
            location: Some(Location { line: 0, column: 4 }),
            string: "callExpression -> Composite wasn't found.".into(),
        };

        let rendered = report.render("main.arc", "let x = y.z");
        assert!(rendered.contains("Composite wasn't found."));
    }
}

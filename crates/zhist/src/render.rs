//! Text and JSON reports.

use chrono::{Local, TimeZone};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use zhist_history::{Field, FieldValue, PathHistory, PathReport, RollupEvent};

/// Order in which payload fields are printed.
const DISPLAY_ORDER: [Field; 8] = [
    Field::ModifyTime,
    Field::Size,
    Field::Mode,
    Field::Owner,
    Field::Group,
    Field::Inode,
    Field::LinkCount,
    Field::ChangeTime,
];

/// Write one block per successful path to `out` and one line per failure to
/// `err`.
pub fn write_text(
    out: &mut impl Write,
    err: &mut impl Write,
    reports: &[PathReport],
) -> io::Result<()> {
    for report in reports {
        match &report.outcome {
            Ok(history) => write_history(out, history)?,
            Err(e) => report_failure(err, &report.input, e)?,
        }
    }
    Ok(())
}

fn write_history(out: &mut impl Write, history: &PathHistory) -> io::Result<()> {
    writeln!(out, "{}", history.path.display())?;
    if history.events.is_empty() {
        writeln!(out, "  (no history)")?;
    }
    for event in &history.events {
        writeln!(out, "  {}", event_line(event))?;
    }
    match history.skipped_snapshots.len() {
        0 => {}
        1 => writeln!(out, "  (1 snapshot skipped, creation time unknown)")?,
        n => writeln!(out, "  ({n} snapshots skipped, creation time unknown)")?,
    }
    Ok(())
}

fn report_failure(err: &mut impl Write, input: &Path, e: &dyn std::fmt::Display) -> io::Result<()> {
    writeln!(err, "zhist: {}: {}", input.display(), e)
}

/// `<code> <path> [field=value ...]`
pub fn event_line(event: &RollupEvent) -> String {
    let mut line = format!("{} {}", event.kind.code(), event.path.display());
    for field in DISPLAY_ORDER {
        if let Some(value) = event.payload.get(&field) {
            line.push(' ');
            line.push_str(field.as_str());
            line.push('=');
            line.push_str(&format_value(field, *value));
        }
    }
    line
}

fn format_value(field: Field, value: FieldValue) -> String {
    match (field, value) {
        (Field::Mode, FieldValue::Int(mode)) => mode_string(mode as u32),
        (_, FieldValue::Time(secs)) => format_time(secs),
        (_, FieldValue::Int(n)) => n.to_string(),
    }
}

/// `ls -l` style rendering of a file mode, e.g. `-rw-r--r--`.
pub fn mode_string(mode: u32) -> String {
    let kind = match mode & 0o170000 {
        0o040000 => 'd',
        0o120000 => 'l',
        0o020000 => 'c',
        0o060000 => 'b',
        0o010000 => 'p',
        0o140000 => 's',
        _ => '-',
    };

    let mut s = String::with_capacity(10);
    s.push(kind);
    for (shift, special, letter) in [(6, 0o4000, 's'), (3, 0o2000, 's'), (0, 0o1000, 't')] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(match (mode & special != 0, bits & 0o1 != 0) {
            (true, true) => letter,
            (true, false) => letter.to_ascii_uppercase(),
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    s
}

/// `ctime(3)` style local time. Falls back to the raw number when out of range.
pub fn format_time(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0).single() {
        Some(when) => when.format("%a %b %e %H:%M:%S %Y").to_string(),
        None => secs.to_string(),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    input: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<&'a PathHistory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Write every report as one JSON array. Failures are also reported on `err`.
pub fn write_json(
    out: &mut impl Write,
    err: &mut impl Write,
    reports: &[PathReport],
) -> io::Result<()> {
    let mut entries = Vec::with_capacity(reports.len());
    for report in reports {
        let entry = match &report.outcome {
            Ok(history) => JsonReport {
                input: &report.input,
                history: Some(history),
                error: None,
            },
            Err(e) => {
                report_failure(err, &report.input, e)?;
                JsonReport {
                    input: &report.input,
                    history: None,
                    error: Some(e.to_string()),
                }
            }
        };
        entries.push(entry);
    }

    serde_json::to_writer_pretty(&mut *out, &entries)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use zhist_history::{EventKind, HistoryError, MountBoundary, Payload, RelativePath};

    fn history(events: Vec<RollupEvent>) -> PathHistory {
        PathHistory {
            boundary: MountBoundary::new("/tank"),
            relative: RelativePath::new("notes.txt"),
            path: PathBuf::from("/tank/notes.txt"),
            versions: 2,
            events,
            skipped_snapshots: Vec::new(),
        }
    }

    fn event(kind: EventKind, payload: Payload) -> RollupEvent {
        RollupEvent {
            kind,
            path: PathBuf::from("/tank/.zfs/snapshot/s1/notes.txt"),
            timestamp: 100,
            payload,
        }
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(0o100644), "-rw-r--r--");
        assert_eq!(mode_string(0o040755), "drwxr-xr-x");
        assert_eq!(mode_string(0o120777), "lrwxrwxrwx");
        assert_eq!(mode_string(0o104755), "-rwsr-xr-x");
        assert_eq!(mode_string(0o102644), "-rw-r-Sr--");
        assert_eq!(mode_string(0o041777), "drwxrwxrwt");
        assert_eq!(mode_string(0o041776), "drwxrwxrwT");
    }

    #[test]
    fn test_format_time_shape() {
        let rendered = format_time(1_700_000_000);
        // e.g. "Tue Nov 14 22:13:20 2023"
        assert_eq!(rendered.len(), 24);
        assert!(rendered.ends_with("2023"));
    }

    #[test]
    fn test_event_lines() {
        let added: Payload = [
            (Field::Size, FieldValue::Int(12)),
            (Field::ModifyTime, FieldValue::Time(1_700_000_000)),
        ]
        .into_iter()
        .collect();
        let line = event_line(&event(EventKind::Added, added));
        assert!(line.starts_with("A /tank/.zfs/snapshot/s1/notes.txt mtime="));
        assert!(line.ends_with(" size=12"));

        let perms: Payload = [(Field::Mode, FieldValue::Int(0o100600))].into_iter().collect();
        assert_eq!(
            event_line(&event(EventKind::PermissionChanged, perms)),
            "P /tank/.zfs/snapshot/s1/notes.txt mode=-rw-------"
        );

        assert_eq!(
            event_line(&event(EventKind::Deleted, Payload::new())),
            "D /tank/.zfs/snapshot/s1/notes.txt"
        );
    }

    #[test]
    fn test_write_text() {
        let reports = vec![
            PathReport {
                input: PathBuf::from("missing"),
                outcome: Err(HistoryError::PathNotFound(PathBuf::from("missing"))),
            },
            PathReport {
                input: PathBuf::from("/tank/notes.txt"),
                outcome: Ok(history(Vec::new())),
            },
        ];

        let mut out = Vec::new();
        let mut err = Vec::new();
        write_text(&mut out, &mut err, &reports).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "/tank/notes.txt\n  (no history)\n"
        );
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "zhist: missing: path not found: missing\n"
        );
    }

    #[test]
    fn test_skipped_snapshots_are_noted() {
        let mut partial = history(Vec::new());
        partial.skipped_snapshots = vec!["daily-1".to_string(), "daily-2".to_string()];
        let reports = vec![PathReport {
            input: PathBuf::from("/tank/notes.txt"),
            outcome: Ok(partial),
        }];

        let mut out = Vec::new();
        write_text(&mut out, &mut Vec::new(), &reports).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "/tank/notes.txt\n  (no history)\n  (2 snapshots skipped, creation time unknown)\n"
        );

        let mut out = Vec::new();
        write_json(&mut out, &mut Vec::new(), &reports).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["history"]["skipped_snapshots"][1], "daily-2");
    }

    #[test]
    fn test_write_json() {
        let reports = vec![
            PathReport {
                input: PathBuf::from("/tank/notes.txt"),
                outcome: Ok(history(vec![event(EventKind::Deleted, Payload::new())])),
            },
            PathReport {
                input: PathBuf::from("missing"),
                outcome: Err(HistoryError::PathNotFound(PathBuf::from("missing"))),
            },
        ];

        let mut out = Vec::new();
        let mut err = Vec::new();
        write_json(&mut out, &mut err, &reports).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["history"]["events"][0]["kind"], "deleted");
        assert!(value[0].get("error").is_none());
        assert!(value[0]["history"].get("skipped_snapshots").is_none());
        assert_eq!(value[1]["error"], "path not found: missing");
        assert!(!err.is_empty());
    }
}

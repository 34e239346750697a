//! Purpose: Render namespace reports as JSON envelopes or human-readable listings.
//! Exports: `report_json`, `report_text`.
//! Role: Presentation for `wtscope list`; keeps key names and line layout in one place.
//! Invariants: `stats`/`utilization_pct` keys appear only when the report carries them.
//! Invariants: Colors are applied only when requested; the JSON form never carries escapes.

use serde_json::{Map, Value, json};
use wtscope::api::{DiskFileRef, NamespaceReport, Warning};

use crate::color::{Color, paint};

const MB: f64 = 1024.0 * 1024.0;

pub(crate) fn report_json(report: &NamespaceReport) -> Value {
    let mut map = Map::new();
    map.insert("namespace".to_string(), json!(report.namespace));
    map.insert("ident".to_string(), json!(report.ident));
    map.insert("internal".to_string(), json!(report.is_internal()));
    map.insert("file".to_string(), disk_file_json(&report.file));
    if let Some(stats) = &report.stats {
        let mut block = Map::new();
        block.insert("data_size".to_string(), json!(stats.data_size));
        block.insert("num_records".to_string(), json!(stats.num_records));
        if let Some(pct) = stats.utilization_pct {
            block.insert("utilization_pct".to_string(), json!(pct));
        }
        map.insert("stats".to_string(), Value::Object(block));
    }
    let indexes = report
        .indexes
        .iter()
        .map(|index| {
            json!({
                "name": index.name,
                "ident": index.ident,
                "file": disk_file_json(&index.file),
            })
        })
        .collect::<Vec<_>>();
    map.insert("indexes".to_string(), Value::Array(indexes));
    map.insert("index_size_bytes".to_string(), json!(report.index_size_bytes));
    map.insert("total_size_bytes".to_string(), json!(report.total_size_bytes));
    let warnings = report.warnings.iter().map(warning_json).collect::<Vec<_>>();
    map.insert("warnings".to_string(), Value::Array(warnings));
    Value::Object(map)
}

fn disk_file_json(file: &DiskFileRef) -> Value {
    json!({
        "path": file.path.display().to_string(),
        "exists": file.exists,
        "size_bytes": file.size_bytes,
    })
}

fn warning_json(warning: &Warning) -> Value {
    let mut map = Map::new();
    map.insert("code".to_string(), json!(warning.code()));
    match warning {
        Warning::MissingArtifact { ident, path, index } => {
            map.insert("ident".to_string(), json!(ident));
            map.insert("path".to_string(), json!(path.display().to_string()));
            if let Some(index) = index {
                map.insert("index".to_string(), json!(index));
            }
        }
        Warning::MissingStatistics { ident } => {
            map.insert("ident".to_string(), json!(ident));
        }
    }
    Value::Object(map)
}

pub(crate) fn report_text(report: &NamespaceReport, use_color: bool) -> String {
    let mut lines = Vec::new();
    let ns_color = if report.is_internal() {
        Color::Yellow
    } else {
        Color::Blue
    };
    lines.push(format!(
        "Namespace         : {}",
        paint(&report.namespace, ns_color, use_color)
    ));
    lines.push(format!("Table             : {}", report.ident));
    if !report.file.exists {
        lines.push(paint(
            &format!("*** Collection file {} not found ***", file_name(&report.file)),
            Color::Red,
            use_color,
        ));
    }
    if let Some(stats) = &report.stats {
        lines.push(format!("File Size         : {}", bytes_text(report.file.size_bytes)));
        lines.push(format!("Data Size         : {}", bytes_text(stats.data_size)));
        if let Some(pct) = stats.utilization_pct {
            lines.push(format!("Space Utilization : {pct:.2} %"));
        }
        lines.push(format!("Num Records       : {}", stats.num_records));
    } else if report.file.exists {
        lines.push(paint("No statistics recorded", Color::Yellow, use_color));
    }
    if !report.indexes.is_empty() {
        lines.push("Indexes :".to_string());
        for index in &report.indexes {
            if index.file.exists {
                lines.push(format!(
                    "    {} : {}    Size: {}",
                    paint(&index.name, Color::Green, use_color),
                    index.ident,
                    bytes_text(index.file.size_bytes)
                ));
            } else {
                lines.push(paint(
                    &format!("    *** Index file {} not found ***", file_name(&index.file)),
                    Color::Red,
                    use_color,
                ));
            }
        }
    }
    lines.push(format!(
        "Total namespace size : {}",
        bytes_text(report.total_size_bytes)
    ));
    lines.join("\n")
}

fn file_name(file: &DiskFileRef) -> String {
    file.path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.path.display().to_string())
}

fn bytes_text(bytes: u64) -> String {
    format!("{bytes} bytes ({:.2} MB)", bytes as f64 / MB)
}

#[cfg(test)]
mod tests {
    use super::{report_json, report_text};
    use std::path::PathBuf;
    use wtscope::api::{DiskFileRef, IndexReport, NamespaceReport, StatsBlock, Warning};

    fn file(path: &str, exists: bool, size_bytes: u64) -> DiskFileRef {
        DiskFileRef {
            path: PathBuf::from(path),
            exists,
            size_bytes,
        }
    }

    fn sample() -> NamespaceReport {
        NamespaceReport {
            namespace: "test.foo".to_string(),
            ident: "collection-1".to_string(),
            file: file("/db/collection-1.wt", true, 2000),
            stats: Some(StatsBlock {
                data_size: 1000,
                num_records: 5,
                utilization_pct: Some(50.0),
            }),
            indexes: vec![
                IndexReport {
                    name: "_id_".to_string(),
                    ident: "index-1".to_string(),
                    file: file("/db/index-1.wt", true, 300),
                },
                IndexReport {
                    name: "b_1".to_string(),
                    ident: "index-2".to_string(),
                    file: file("/db/index-2.wt", false, 0),
                },
            ],
            index_size_bytes: 300,
            total_size_bytes: 1300,
            warnings: vec![Warning::MissingArtifact {
                ident: "index-2".to_string(),
                path: PathBuf::from("/db/index-2.wt"),
                index: Some("b_1".to_string()),
            }],
        }
    }

    #[test]
    fn json_envelope_carries_stats_and_warnings() {
        let value = report_json(&sample());
        assert_eq!(value["namespace"], "test.foo");
        assert_eq!(value["internal"], false);
        assert_eq!(value["stats"]["utilization_pct"], 50.0);
        assert_eq!(value["stats"]["num_records"], 5);
        assert_eq!(value["total_size_bytes"], 1300);
        assert_eq!(value["warnings"][0]["code"], "missing_artifact");
        assert_eq!(value["warnings"][0]["index"], "b_1");
    }

    #[test]
    fn json_omits_stats_when_absent() {
        let mut report = sample();
        report.stats = None;
        let value = report_json(&report);
        assert!(value.get("stats").is_none());
    }

    #[test]
    fn human_text_lists_sizes_and_missing_files() {
        let text = report_text(&sample(), false);
        assert!(text.contains("Namespace         : test.foo"));
        assert!(text.contains("Space Utilization : 50.00 %"));
        assert!(text.contains("Num Records       : 5"));
        assert!(text.contains("    _id_ : index-1    Size: 300 bytes"));
        assert!(text.contains("*** Index file index-2.wt not found ***"));
        assert!(text.ends_with("Total namespace size : 1300 bytes (0.00 MB)"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn missing_file_lines_use_the_probed_file_name() {
        let mut report = sample();
        report.file = file("/db/collection-1.dat", false, 0);
        report.stats = None;
        report.indexes[1].file = file("/db/index-2.dat", false, 0);
        let text = report_text(&report, false);
        assert!(text.contains("*** Collection file collection-1.dat not found ***"));
        assert!(text.contains("*** Index file index-2.dat not found ***"));
        assert!(!text.contains(".wt"));
    }

    #[test]
    fn internal_namespaces_are_yellow() {
        let mut report = sample();
        report.namespace = "admin.system.version".to_string();
        let text = report_text(&report, true);
        assert!(text.contains("\u{1b}[33madmin.system.version\u{1b}[0m"));
    }
}

//! Plain-text report rendering.

use bfscope_contention::{Metric, Report};
use bfscope_parsers::format_duration;
use std::io::{self, Write};

/// One `name: value` line per scalar metric. Structured metrics and series
/// are only carried by the JSON output.
pub fn write_text<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
    writeln!(out, "report: {}", report.kind)?;
    writeln!(out, "tenant: {}", report.tenant)?;
    writeln!(out, "window: {}", report.window)?;

    for (name, metric) in &report.metrics {
        if matches!(metric, Metric::Record(_)) {
            continue;
        }
        write!(out, "{name}: {metric}")?;
        if let Some(seconds) = duration_of(name, metric) {
            write!(out, " ({})", format_duration(seconds))?;
        }
        writeln!(out)?;
    }

    let warnings = &report.warnings;
    if !warnings.is_empty() {
        writeln!(
            out,
            "warnings: {} malformed records, {} inconsistent samples",
            warnings.malformed_records, warnings.inconsistent_samples
        )?;
    }
    Ok(())
}

fn duration_of(name: &str, metric: &Metric) -> Option<u64> {
    if !name.ends_with("_seconds") {
        return None;
    }
    match metric {
        Metric::Count(n) => Some(*n),
        Metric::Number(x) if *x >= 0.0 => Some(x.round() as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfscope_contention::ReportKind;
    use bfscope_core::{RecordWarning, TenantSelector, TimeWindow, WarningSummary};
    use std::collections::BTreeMap;

    fn report() -> Report {
        let mut metrics = BTreeMap::new();
        metrics.insert("blocking_probability".to_string(), Metric::Number(0.5));
        metrics.insert("eligible_samples".to_string(), Metric::Count(2));
        metrics.insert("first_block_mean_seconds".to_string(), Metric::Number(5400.0));
        metrics.insert(
            "welch_p".to_string(),
            Metric::Undefined {
                reason: "too few waits".to_string(),
            },
        );
        metrics.insert("monthly".to_string(), Metric::Record(serde_json::json!([1, 2])));

        Report {
            kind: ReportKind::Blocking,
            tenant: TenantSelector::new("CSC108", "doleynik"),
            window: TimeWindow::new(0, 86_400).unwrap(),
            metrics,
            series: Vec::new(),
            warnings: WarningSummary::default(),
        }
    }

    fn render(report: &Report) -> String {
        let mut buf = Vec::new();
        write_text(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_scalar_metrics_one_per_line() {
        let text = render(&report());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "report: blocking");
        assert_eq!(lines[1], "tenant: CSC108/doleynik");
        assert!(lines.contains(&"blocking_probability: 0.500000"));
        assert!(lines.contains(&"eligible_samples: 2"));
        assert!(lines.contains(&"first_block_mean_seconds: 5400.000000 (01:30:00)"));
        assert!(lines.contains(&"welch_p: undefined (too few waits)"));
        assert!(!text.contains("monthly"));
        assert!(!text.contains("warnings"));
    }

    #[test]
    fn test_warning_line() {
        let mut report = report();
        report.warnings.push(RecordWarning::InconsistentJoin {
            sample_id: "abc".into(),
            sample_times: vec![1, 2],
        });
        let text = render(&report);
        assert!(text.ends_with("warnings: 0 malformed records, 1 inconsistent samples\n"));
    }
}

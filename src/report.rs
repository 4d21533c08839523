// Incident summary documents

use crate::domain::incident::{DateRange, IncidentReportRow, IncidentStatus, Priority};
use crate::errors::Result;
use bytes::Bytes;
use std::fmt::Write;

/// A rendered report, opaque to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub content_type: &'static str,
    pub filename: String,
    pub bytes: Bytes,
}

/// Turns incident snapshots for a period into a document
pub trait ReportRenderer: Send + Sync {
    fn render(&self, range: &DateRange, rows: &[IncidentReportRow]) -> Result<ReportDocument>;
}

/// Plain-text summary: totals, then one line per incident
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReportRenderer;

impl ReportRenderer for TextReportRenderer {
    fn render(&self, range: &DateRange, rows: &[IncidentReportRow]) -> Result<ReportDocument> {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "Incident report {} to {}",
            range.start_date, range.end_date
        );
        let _ = writeln!(out, "Total incidents: {}", rows.len());
        out.push('\n');

        out.push_str("By status\n");
        for status in IncidentStatus::ALL {
            let count = rows.iter().filter(|r| r.status == *status).count();
            let _ = writeln!(out, "  {:<12} {}", status.as_str(), count);
        }

        out.push_str("By priority\n");
        for priority in Priority::ALL {
            let count = rows.iter().filter(|r| r.priority == *priority).count();
            let _ = writeln!(out, "  {:<12} {}", priority.as_str(), count);
        }

        out.push_str("\nIncidents\n");
        for row in rows {
            let _ = writeln!(
                out,
                "  {} | {} | {} | {} | {} | {} <{}>",
                row.created_at.format("%Y-%m-%d %H:%M"),
                row.title,
                row.priority,
                row.status,
                row.category,
                row.owner_name,
                row.owner_email
            );
        }

        Ok(ReportDocument {
            content_type: "text/plain; charset=utf-8",
            filename: format!(
                "incident-report-{}-{}.txt",
                range.start_date.format("%Y%m%d"),
                range.end_date.format("%Y%m%d")
            ),
            bytes: Bytes::from(out),
        })
    }
}

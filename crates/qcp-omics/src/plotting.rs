//! Plotting collaborator.
//!
//! Steps describe what they want drawn as a [`PlotRequest`]; a [`Plotter`]
//! turns it into an opaque [`Artifact`] that the report embeds as-is.

use crate::utils::{quantile_sorted, sorted};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Rendered figure, opaque to the pipeline (typically an HTML/SVG fragment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(pub String);

impl Artifact {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Five-number summary of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub column: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxSummary {
    /// `None` when there are no values.
    pub fn from_values(column: &str, values: &[f64]) -> Option<Self> {
        let s = sorted(values);
        Some(Self {
            column: column.to_string(),
            min: *s.first()?,
            q1: quantile_sorted(&s, 0.25)?,
            median: quantile_sorted(&s, 0.5)?,
            q3: quantile_sorted(&s, 0.75)?,
            max: *s.last()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlotRequest {
    Histogram {
        column: String,
        bins: Vec<HistogramBin>,
    },
    BoxPlot {
        title: String,
        boxes: Vec<BoxSummary>,
    },
    Heatmap {
        title: String,
        labels: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    },
    Scatter {
        title: String,
        x_label: String,
        y_label: String,
        points: Vec<(String, f64, f64)>,
    },
    BarChart {
        title: String,
        labels: Vec<String>,
        values: Vec<f64>,
    },
}

impl PlotRequest {
    pub fn title(&self) -> String {
        match self {
            Self::Histogram { column, .. } => format!("Distribution of {column}"),
            Self::BoxPlot { title, .. }
            | Self::Heatmap { title, .. }
            | Self::Scatter { title, .. }
            | Self::BarChart { title, .. } => title.clone(),
        }
    }
}

/// Turns plot requests into artifacts.
///
/// Implementations must be thread-safe so a configured pipeline can be moved
/// across threads.
pub trait Plotter: Send + Sync {
    fn render(&self, request: &PlotRequest) -> Artifact;
}

/// Default plotter: an HTML `<figure>` holding a compact table of the numbers
/// behind the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryPlotter;

impl Plotter for SummaryPlotter {
    fn render(&self, request: &PlotRequest) -> Artifact {
        let mut body = String::new();
        // Writing to a String cannot fail
        let _ = write_body(&mut body, request);
        Artifact(format!(
            "<figure class=\"qcp-plot\"><figcaption>{}</figcaption>{}</figure>",
            escape(&request.title()),
            body
        ))
    }
}

fn write_body(out: &mut String, request: &PlotRequest) -> fmt::Result {
    out.push_str("<table>");
    match request {
        PlotRequest::Histogram { bins, .. } => {
            out.push_str("<tr><th>bin</th><th>count</th></tr>");
            for bin in bins {
                write!(
                    out,
                    "<tr><td>[{:.4}, {:.4}]</td><td>{}</td></tr>",
                    bin.lower, bin.upper, bin.count
                )?;
            }
        }
        PlotRequest::BoxPlot { boxes, .. } => {
            out.push_str(
                "<tr><th>column</th><th>min</th><th>q1</th><th>median</th><th>q3</th><th>max</th></tr>",
            );
            for b in boxes {
                write!(
                    out,
                    "<tr><td>{}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td></tr>",
                    escape(&b.column),
                    b.min,
                    b.q1,
                    b.median,
                    b.q3,
                    b.max
                )?;
            }
        }
        PlotRequest::Heatmap { labels, values, .. } => {
            out.push_str("<tr><th></th>");
            for label in labels {
                write!(out, "<th>{}</th>", escape(label))?;
            }
            out.push_str("</tr>");
            for (label, row) in labels.iter().zip(values) {
                write!(out, "<tr><th>{}</th>", escape(label))?;
                for cell in row {
                    match cell {
                        Some(v) => write!(out, "<td>{v:.3}</td>")?,
                        None => out.push_str("<td>n/a</td>"),
                    }
                }
                out.push_str("</tr>");
            }
        }
        PlotRequest::Scatter {
            x_label,
            y_label,
            points,
            ..
        } => {
            write!(
                out,
                "<tr><th>label</th><th>{}</th><th>{}</th></tr>",
                escape(x_label),
                escape(y_label)
            )?;
            for (label, x, y) in points {
                write!(
                    out,
                    "<tr><td>{}</td><td>{x:.4}</td><td>{y:.4}</td></tr>",
                    escape(label)
                )?;
            }
        }
        PlotRequest::BarChart { labels, values, .. } => {
            for (label, value) in labels.iter().zip(values) {
                write!(
                    out,
                    "<tr><td>{}</td><td>{value:.4}</td></tr>",
                    escape(label)
                )?;
            }
        }
    }
    out.push_str("</table>");
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_summary() {
        let summary = BoxSummary::from_values("gene_a", &[5.0, 1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.q3, 4.0);
        assert_eq!(summary.max, 5.0);
        assert!(BoxSummary::from_values("empty", &[]).is_none());
    }

    #[test]
    fn test_summary_plotter_renders_figure() {
        let request = PlotRequest::Histogram {
            column: "a<b".to_string(),
            bins: vec![HistogramBin {
                lower: 0.0,
                upper: 1.0,
                count: 3,
            }],
        };
        let artifact = SummaryPlotter.render(&request);
        assert!(artifact.as_str().starts_with("<figure"));
        assert!(artifact.as_str().contains("Distribution of a&lt;b"));
        assert!(artifact.as_str().contains("<td>3</td>"));
    }

    #[test]
    fn test_heatmap_marks_undefined_cells() {
        let request = PlotRequest::Heatmap {
            title: "Correlation".to_string(),
            labels: vec!["x".to_string(), "y".to_string()],
            values: vec![vec![Some(1.0), None], vec![None, Some(1.0)]],
        };
        let artifact = SummaryPlotter.render(&request);
        assert!(artifact.as_str().contains("n/a"));
        assert!(artifact.as_str().contains("1.000"));
    }

    #[test]
    fn test_artifact_serializes_as_string() {
        let json = serde_json::to_string(&Artifact("<p>x</p>".into())).unwrap();
        assert_eq!(json, "\"<p>x</p>\"");
    }
}

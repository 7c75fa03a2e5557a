use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use citest_core::{RunReport, TagReport, TestStatus};

use crate::ansi::escape_html;
use crate::store::ArtifactStore;

pub const INDEX_FILE: &str = "index.html";

/// Turns a finished run into report files. Pure consumer of the report.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &RunReport, store: &dyn ArtifactStore) -> Result<Vec<PathBuf>>;
}

/// Writes `index.html`, `report.md`, `report.json`, `badge.svg` and `ci-status.yml`.
#[derive(Clone, Debug, Default)]
pub struct FsReportRenderer;

impl ReportRenderer for FsReportRenderer {
    fn render(&self, report: &RunReport, store: &dyn ArtifactStore) -> Result<Vec<PathBuf>> {
        let json = serde_json::to_vec_pretty(report).context("serialize report.json")?;
        Ok(vec![
            store.write_bytes("report.json", &json)?,
            store.write_text("report.md", &render_markdown(report))?,
            store.write_text(INDEX_FILE, &render_html(report))?,
            store.write_text("badge.svg", &render_badge("CI", report.report_status))?,
            store.write_text("ci-status.yml", &render_status_yaml(report)?)?,
        ])
    }
}

pub fn render_status_yaml(report: &RunReport) -> Result<String> {
    let mut doc = BTreeMap::new();
    doc.insert("CI", report.report_status.as_str());
    serde_yaml::to_string(&doc).context("serialize ci-status.yml")
}

pub fn render_badge(label: &str, status: TestStatus) -> String {
    let color = match status {
        TestStatus::Pass => "#4c1",
        TestStatus::Fail => "#e05d44",
    };
    let value = status.as_str();
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="80" height="20" role="img" aria-label="{label}: {value}">
<rect width="30" height="20" fill="#555"/>
<rect x="30" width="50" height="20" fill="{color}"/>
<g fill="#fff" text-anchor="middle" font-family="Verdana,Geneva,DejaVu Sans,sans-serif" font-size="11">
<text x="15" y="14">{label}</text>
<text x="55" y="14">{value}</text>
</g>
</svg>
"##
    )
}

pub fn render_markdown(report: &RunReport) -> String {
    let mut s = String::new();
    s.push_str(&format!("# {}:{}\n\n", report.image, report.meta_tag));
    s.push_str(&format!("**Status:** {}\n\n", report.report_status));
    s.push_str(&format!("**Total runtime:** {}\n\n", report.total_runtime));
    s.push_str("| Tag | Platform | Test | Status | Message | Runtime |\n");
    s.push_str("|---|---|---|---|---|---|\n");
    for tag_report in report.tags.values() {
        for t in tag_report.tests.values() {
            s.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                tag_report.tag, tag_report.platform, t.name, t.status, t.message.replace('|', "\\|"), t.runtime
            ));
        }
    }
    if !report.launch_failures.is_empty() {
        s.push_str("\n## Launch failures\n\n");
        for (tag, msg) in &report.launch_failures {
            s.push_str(&format!("- {}: {}\n", tag, msg));
        }
    }
    s
}

fn render_tag_section(r: &TagReport, screenshot_enabled: bool) -> String {
    let mut s = String::new();
    let verdict = TestStatus::from_success(r.test_success);
    s.push_str(&format!(
        "<section class=\"tag {}\">\n<h2>{} <small>{}</small> <span class=\"status\">{}</span></h2>\n",
        verdict.as_str().to_lowercase(),
        escape_html(r.tag.as_str()),
        r.platform,
        verdict
    ));
    if r.warnings.dotnet {
        s.push_str("<p class=\"warning\">.NET applications may misbehave on emulated arm32.</p>\n");
    }
    if r.warnings.uwsgi {
        s.push_str("<p class=\"warning\">uwsgi is known to be unstable on emulated arm.</p>\n");
    }
    let b = &r.build_info;
    s.push_str("<table class=\"build\">\n");
    for (k, v) in [
        ("Version", &b.version),
        ("Created", &b.created),
        ("Size", &b.size),
        ("Maintainer", &b.maintainer),
        ("Builder", &b.builder),
    ] {
        s.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>\n", k, escape_html(v)));
    }
    s.push_str("</table>\n<table class=\"tests\">\n<tr><th>Test</th><th>Status</th><th>Message</th><th>Runtime</th></tr>\n");
    for t in r.tests.values() {
        s.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            t.status.as_str().to_lowercase(),
            escape_html(&t.name),
            t.status,
            escape_html(&t.message),
            escape_html(&t.runtime)
        ));
    }
    s.push_str("</table>\n<ul class=\"links\">\n");
    if let Some(log) = &r.html_logs {
        s.push_str(&format!("<li><a href=\"{0}\">Container log</a></li>\n", escape_html(log)));
    }
    if r.sysinfo != citest_core::ERROR_MARKER {
        s.push_str(&format!("<li><a href=\"{}.sbom.html\">Package list</a></li>\n", escape_html(r.tag.as_str())));
    }
    if !r.build_url.is_empty() {
        s.push_str(&format!("<li><a href=\"{0}\">Image</a></li>\n", escape_html(&r.build_url)));
    }
    s.push_str("</ul>\n");
    if screenshot_enabled {
        match &r.screenshot {
            Some(png) => s.push_str(&format!(
                "<img class=\"screenshot\" src=\"{0}\" alt=\"{0}\" width=\"640\">\n",
                escape_html(png)
            )),
            None => s.push_str("<p class=\"screenshot missing\">No screenshot captured.</p>\n"),
        }
    }
    s.push_str("</section>\n");
    s
}

pub fn render_html(report: &RunReport) -> String {
    let mut s = String::new();
    s.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    s.push_str(&format!(
        "<title>{}:{} {}</title>\n",
        escape_html(&report.image),
        escape_html(&report.meta_tag),
        report.report_status
    ));
    s.push_str(
        "<style>.pass .status,tr.pass td:nth-child(2){color:#2e7d32}.fail .status,tr.fail td:nth-child(2){color:#c62828}\
.warning{color:#ef6c00}table{border-collapse:collapse}td,th{padding:2px 8px;text-align:left}</style>\n",
    );
    s.push_str("</head>\n<body>\n");
    s.push_str(&format!(
        "<h1>{}:{}</h1>\n<p><img src=\"badge.svg\" alt=\"{}\"> Total runtime {}</p>\n",
        escape_html(&report.image),
        escape_html(&report.meta_tag),
        report.report_status,
        escape_html(&report.total_runtime)
    ));
    for r in report.tags.values() {
        s.push_str(&render_tag_section(r, report.screenshot_enabled));
    }
    if !report.launch_failures.is_empty() {
        s.push_str("<section class=\"tag fail\">\n<h2>Launch failures</h2>\n<ul>\n");
        for (tag, msg) in &report.launch_failures {
            s.push_str(&format!("<li>{}: {}</li>\n", escape_html(tag.as_str()), escape_html(msg)));
        }
        s.push_str("</ul>\n</section>\n");
    }
    s.push_str("<p><a href=\"report.json\">report.json</a></p>\n</body>\n</html>\n");
    s
}

use tracing::info;

use tshrag_core::{Job, Test, Window};
use tshrag_mdb::Mdb;

use crate::error::Result;
use crate::evaluator::{evaluate_rule, render_report_data};
use crate::schema::{
    Report, ReportEntry, ReportItem, ReportSection, View, ViewEntry, ViewItem, ViewSection,
};

/// Render every section of `view` against `mdb` over `window`.
pub fn render(view: &View, mdb: &Mdb, window: &Window) -> Result<Vec<ReportSection>> {
    view.sections
        .iter()
        .map(|section| render_section(section, mdb, window))
        .collect()
}

fn render_section(section: &ViewSection, mdb: &Mdb, window: &Window) -> Result<ReportSection> {
    let items = section
        .items
        .iter()
        .map(|item| match item {
            ViewItem::Section(inner) => render_section(inner, mdb, window).map(ReportItem::Section),
            ViewItem::Entry(entry) => render_entry(entry, mdb, window).map(ReportItem::Entry),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ReportSection {
        name: section.name.clone(),
        items,
    })
}

fn render_entry(entry: &ViewEntry, mdb: &Mdb, window: &Window) -> Result<ReportEntry> {
    let mut violations = Vec::new();
    for rule in &entry.rules {
        violations.extend(evaluate_rule(mdb, &entry.key, rule, window)?);
    }
    let data = render_report_data(mdb, &entry.key, &entry.statistics, window)?;

    Ok(ReportEntry {
        key: entry.key.clone(),
        name: entry.name.clone(),
        unit: entry.unit.clone(),
        description: entry.description.clone(),
        style: entry.style.clone(),
        violations,
        data,
    })
}

/// Full report of `test`.
///
/// `window` defaults to the test's own window. Only jobs that overlap the
/// window are listed.
pub fn render_report(test: &Test, jobs: Vec<Job>, mdb: &Mdb, window: Option<Window>) -> Result<Report> {
    let window = window.unwrap_or_else(|| test.run.window());
    let view = View::from_value(&test.profile.reporting)?;
    let sections = render(&view, mdb, &window)?;
    let jobs: Vec<Job> = jobs.into_iter().filter(|job| job.run.overlaps(&window)).collect();

    let report = Report {
        id: test.id.clone(),
        profile: test.profile.clone(),
        start_time: window.start,
        end_time: window.end,
        machine: test.machine.clone(),
        device: test.device.clone(),
        env: test.env.clone(),
        jobs,
        sections,
    };
    info!(
        test_id = %test.id,
        sections = report.sections.len(),
        violations = report.violations().len(),
        "Report rendered"
    );
    Ok(report)
}

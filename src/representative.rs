//! Representative run selection
//!
//! Several runs of the same URL are collapsed to the single run closest to
//! the joint median of first-contentful-paint and time-to-interactive. That
//! run stands in for the whole group wherever one concrete report is needed
//! (diff views, `median-run` assertions).

use crate::report::{AuditReport, FIRST_CONTENTFUL_PAINT, INTERACTIVE};
use crate::stats::median;
use tracing::warn;

/// Group runs by their final URL, in first-seen order
pub fn group_runs_by_url(runs: &[AuditReport]) -> Vec<Vec<&AuditReport>> {
    let mut groups: Vec<Vec<&AuditReport>> = Vec::new();
    for run in runs {
        match groups
            .iter_mut()
            .find(|group| group[0].final_url == run.final_url)
        {
            Some(group) => group.push(run),
            None => groups.push(vec![run]),
        }
    }
    groups
}

/// Pick one representative run per URL group
///
/// Empty groups are skipped, so the output may be shorter than the input.
pub fn select_representative_runs<'a>(groups: &[Vec<&'a AuditReport>]) -> Vec<&'a AuditReport> {
    groups
        .iter()
        .filter_map(|group| representative_run(group))
        .collect()
}

/// Run minimizing the squared distance to the median (FCP, TTI) point
///
/// Runs missing either metric are not candidates. When no run has both, the
/// first run of the group is returned. Ties keep the earlier run.
pub fn representative_run<'a>(group: &[&'a AuditReport]) -> Option<&'a AuditReport> {
    let first = *group.first()?;

    let candidates: Vec<(&'a AuditReport, f64, f64)> = group
        .iter()
        .filter_map(|run| {
            let fcp = run.metric(FIRST_CONTENTFUL_PAINT)?;
            let tti = run.metric(INTERACTIVE)?;
            Some((*run, fcp, tti))
        })
        .collect();

    let fcp_values: Vec<f64> = candidates.iter().map(|(_, fcp, _)| *fcp).collect();
    let tti_values: Vec<f64> = candidates.iter().map(|(_, _, tti)| *tti).collect();
    let (Some(median_fcp), Some(median_tti)) = (median(&fcp_values), median(&tti_values)) else {
        warn!(
            url = %first.final_url,
            runs = group.len(),
            "no run has both paint and interactive metrics, using the first run"
        );
        return Some(first);
    };

    let mut best: Option<(&'a AuditReport, f64)> = None;
    for (run, fcp, tti) in candidates {
        let distance = (fcp - median_fcp).powi(2) + (tti - median_tti).powi(2);
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((run, distance));
        }
    }

    best.map(|(run, _)| run)
}

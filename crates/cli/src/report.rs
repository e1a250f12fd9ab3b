use domgen_graph::IntegrationReport;

/// One-paragraph summary of an integration run for the log
pub fn render_summary(report: &IntegrationReport) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "Integrated {} fragments ({} deprecated)",
        report.fragments, report.deprecated_fragments
    ));
    text.push_str(&format!(
        "; partials: {} folded, {} skipped",
        report.partials_folded, report.partials_skipped
    ));
    text.push_str(&format!(
        "; includes: {} folded, {} skipped",
        report.includes_folded, report.includes_skipped
    ));
    if report.exposure_overrides > 0 {
        text.push_str(&format!(
            "; {} exposure overrides",
            report.exposure_overrides
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary_mentions_skips() {
        let report = IntegrationReport {
            fragments: 3,
            deprecated_fragments: 1,
            partials_folded: 4,
            partials_skipped: 1,
            includes_folded: 2,
            includes_skipped: 0,
            exposure_overrides: 0,
        };

        assert_eq!(
            render_summary(&report),
            "Integrated 3 fragments (1 deprecated); partials: 4 folded, 1 skipped; includes: 2 folded, 0 skipped"
        );
    }
}

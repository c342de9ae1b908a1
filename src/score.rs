use crate::core::{Finding, Severity};

/// Per-severity base deduction for the first finding of that severity.
const fn base_weight(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 15,
        Severity::Warning => 8,
        Severity::Suggestion => 3,
        Severity::Info => 0,
    }
}

/// Each further finding of the same severity costs a diminishing share
/// of the base weight, and the total deduction per severity is capped,
/// so a pile of low-severity findings cannot outweigh a few criticals.
const DECAY: f64 = 0.8;
const CAP_FACTOR: u32 = 5;

fn severity_penalty(severity: Severity, count: usize) -> u32 {
    let base = base_weight(severity);
    if base == 0 || count == 0 {
        return 0;
    }
    let cap = base * CAP_FACTOR;
    let mut total: u32 = 0;
    for k in 0..count {
        let step = (f64::from(base) * DECAY.powi(k as i32)).ceil() as u32;
        total = total.saturating_add(step);
        if total >= cap {
            return cap;
        }
    }
    total
}

/// Health score in [0, 100], a pure function of the finding list.
/// Order-invariant (only counts per severity matter) and monotonically
/// non-increasing as findings are added.
pub fn score(findings: &[&Finding]) -> u32 {
    let mut counts = [0usize; 4];
    for f in findings {
        counts[f.severity.rank() as usize] += 1;
    }
    let deduction: u32 = [
        Severity::Critical,
        Severity::Warning,
        Severity::Suggestion,
        Severity::Info,
    ]
    .iter()
    .map(|&s| severity_penalty(s, counts[s.rank() as usize]))
    .sum();
    100u32.saturating_sub(deduction)
}

pub fn band(score: u32) -> &'static str {
    if score >= 90 {
        "Excellent"
    } else if score >= 75 {
        "Good"
    } else if score >= 50 {
        "Needs Attention"
    } else if score >= 25 {
        "Poor"
    } else {
        "Critical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Category;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding::new(id, Category::Schema, severity, id, "", "")
    }

    fn score_of(findings: &[Finding]) -> u32 {
        let refs: Vec<&Finding> = findings.iter().collect();
        score(&refs)
    }

    #[test]
    fn empty_finding_list_scores_100() {
        assert_eq!(score_of(&[]), 100);
        assert_eq!(band(100), "Excellent");
    }

    #[test]
    fn first_findings_use_base_weights() {
        assert_eq!(score_of(&[finding("S001", Severity::Critical)]), 85);
        assert_eq!(score_of(&[finding("S004", Severity::Warning)]), 92);
        assert_eq!(score_of(&[finding("S009", Severity::Suggestion)]), 97);
        assert_eq!(score_of(&[finding("S020", Severity::Info)]), 100);
    }

    #[test]
    fn adding_a_finding_never_increases_the_score() {
        for severity in [
            Severity::Critical,
            Severity::Warning,
            Severity::Suggestion,
            Severity::Info,
        ] {
            let mut findings = Vec::new();
            let mut prev = score_of(&findings);
            for n in 0..40 {
                findings.push(finding(&format!("S{n:03}"), severity));
                let next = score_of(&findings);
                assert!(next <= prev, "{severity}: score rose from {prev} to {next}");
                prev = next;
            }
        }
    }

    #[test]
    fn marginal_penalty_diminishes() {
        let one = 100 - score_of(&[finding("S001", Severity::Critical)]);
        let two = 100
            - score_of(&[
                finding("S001", Severity::Critical),
                finding("S002", Severity::Critical),
            ]);
        let second_cost = two - one;
        assert!(second_cost < one, "second critical cost {second_cost} >= first {one}");
        assert!(second_cost > 0);
    }

    #[test]
    fn per_severity_deduction_is_capped() {
        let many: Vec<Finding> = (0..60)
            .map(|n| finding(&format!("S{n:03}"), Severity::Suggestion))
            .collect();
        // Suggestion cap is 3 * 5 = 15.
        assert_eq!(score_of(&many), 85);

        let criticals: Vec<Finding> = (0..60)
            .map(|n| finding(&format!("S{n:03}"), Severity::Critical))
            .collect();
        assert_eq!(score_of(&criticals), 25);
    }

    #[test]
    fn score_is_order_invariant() {
        let a = vec![
            finding("S001", Severity::Critical),
            finding("D004", Severity::Warning),
            finding("P005", Severity::Suggestion),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(score_of(&a), score_of(&b));
    }

    #[test]
    fn bands_cover_their_boundaries() {
        assert_eq!(band(90), "Excellent");
        assert_eq!(band(89), "Good");
        assert_eq!(band(75), "Good");
        assert_eq!(band(74), "Needs Attention");
        assert_eq!(band(50), "Needs Attention");
        assert_eq!(band(49), "Poor");
        assert_eq!(band(25), "Poor");
        assert_eq!(band(24), "Critical");
        assert_eq!(band(0), "Critical");
    }
}

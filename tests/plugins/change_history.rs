use dmct::core::error::DmctError;
use dmct::plugins::change_history::{
    self, ChangeCategory, ChangeEntry, HistoryFormat, ImpactLevel,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn classify_ethical_change_as_high() {
    let a = change_history::classify("Added ethical transparency section", 90);
    assert_eq!(a.level, ImpactLevel::High);
    assert_eq!(a.delta_range, (-3, 3));
    assert_eq!(a.predicted_score_range(), (87, 93));
    assert_eq!(
        a.recommended_categories,
        [ChangeCategory::ComplianceCorrections, ChangeCategory::ContentUpdates]
    );
}

#[test]
fn classify_tiers_and_components() {
    assert_eq!(change_history::classify("Content revision of intro", 90).level, ImpactLevel::Medium);
    assert_eq!(change_history::classify("Fixed a typo", 90).level, ImpactLevel::Low);
    assert_eq!(change_history::classify("Renamed file", 90).level, ImpactLevel::None);

    let a = change_history::classify("Verify sources and disclose limits", 99);
    assert_eq!(a.affected_components, vec!["verification", "transparency"]);
    assert_eq!(a.predicted_score_range(), (99, 99));

    let capped = change_history::classify("Ethical review", 99);
    assert_eq!(capped.predicted_score_range(), (96, 100));
}

#[test]
fn parse_category_and_impact() {
    assert_eq!("violation_fixes".parse::<ChangeCategory>().unwrap(), ChangeCategory::ViolationFixes);
    assert_eq!("IMPACT_HIGH".parse::<ImpactLevel>().unwrap(), ImpactLevel::High);
    assert!(matches!(
        "SOMETIMES".parse::<ImpactLevel>(),
        Err(DmctError::ArgumentError(_))
    ));
    assert!(matches!(
        "REWRITES".parse::<ChangeCategory>(),
        Err(DmctError::ArgumentError(_))
    ));
}

#[test]
fn rendered_table_validates_as_enhanced() {
    let mut entry = ChangeEntry::new("2025-04-07");
    entry.version = "2.1.0".to_string();
    entry.description = "Split a | b columns".to_string();
    let row = change_history::render_row(&entry);
    assert!(row.starts_with("| **2.1.0** | **2025-04-07** |"));
    assert!(row.contains("Split a \\| b columns"));

    let mut new_doc = ChangeEntry::new("2025-04-08");
    new_doc.impact = ImpactLevel::NewDocument;
    new_doc.new_score = Some(94);
    let new_row = change_history::render_row(&new_doc);
    assert!(new_row.contains("NEW_DOCUMENT: 94"));

    let doc = format!(
        "# Title\n\nBody.\n\n{}\n# Next\n",
        change_history::render_table(&[row, new_row])
    );
    let report = change_history::validate_history(&doc);
    assert_eq!(report.format, HistoryFormat::Enhanced);
    assert!(report.valid);
    assert_eq!(report.version_entries, 2);
}

#[test]
fn legacy_and_missing_histories() {
    let legacy = "#### **Change History**\n\n| Version | Date | Notes |\n|---|---|---|\n| **1.0.0** | 2024-01-01 | init |\n| **1.1.0** | 2024-02-01 | more |\n";
    let report = change_history::validate_history(legacy);
    assert_eq!(report.format, HistoryFormat::Legacy);
    assert!(report.valid);
    assert_eq!(report.version_entries, 2);

    let report = change_history::validate_history("# Nothing here\n");
    assert_eq!(report.format, HistoryFormat::Missing);
    assert!(!report.valid);
}

#[test]
fn enhanced_table_missing_columns_is_invalid() {
    let doc = "#### **Enhanced Audit Trail - Change History**\n\n| **Version** | **Ethical Impact** |\n|---|---|\n| **1.0.0** | LOW |\n";
    let report = change_history::validate_history(doc);
    assert_eq!(report.format, HistoryFormat::Enhanced);
    assert!(!report.valid);
    assert_eq!(
        report.missing_columns,
        vec!["Change Category", "Reviewer", "Approval Notes"]
    );
}

#[test]
fn assessment_written_as_markdown() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("out/assessment.md");
    let a = change_history::classify("Compliance audit correction", 80);
    change_history::write_assessment(&a, &path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# Ethical Impact Assessment"));
    assert!(text.contains("**Impact Level:** HIGH"));
    assert!(text.contains("(77 to 83)"));
}

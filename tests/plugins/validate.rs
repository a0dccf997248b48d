use dmct::core::config::DmctConfig;
use dmct::core::document::Document;
use dmct::plugins::validate::{self, Classification};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const GOOD: &str = concat!(
    "---\n",
    "title: Good\n",
    "document_category: guide\n",
    "document_type: reference\n",
    "version: 1.2.0\n",
    "last_updated: 2025-01-01 00:00:00 CET\n",
    "ai_keywords: k-one, k-two, k-three, k-four, k-five, k-six, k-seven, k-eight\n",
    "evolutionary_phase: \"6.x\"\n",
    "consciousness_score: 1.5\n",
    "---\n",
    "Body\n",
);

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn compliant_document_has_no_problems() {
    let doc = Document::parse(Path::new("/r/6.x-standards/a.md"), GOOD.to_string()).unwrap();
    assert!(validate::check_document(&doc, Path::new("/r")).is_empty());
}

#[test]
fn problems_are_itemized() {
    let text = GOOD
        .replace("version: 1.2.0\n", "")
        .replace("k-eight", "k-one, Bad Token")
        .replace("2025-01-01 00:00:00 CET", "2025-01-01T00:00:00")
        .replace("1.5", "4");
    let doc = Document::parse(Path::new("/r/2.x-arch/a.md"), text).unwrap();
    let problems = validate::check_document(&doc, Path::new("/r"));

    assert!(problems.iter().any(|p| p == "missing required field: version"));
    assert!(problems.iter().any(|p| p.starts_with("invalid keyword token")));
    assert!(problems.iter().any(|p| p == "duplicate keyword: k-one"));
    assert!(problems.iter().any(|p| p.contains("disagrees with directory phase 2.x")));
    assert!(problems.iter().any(|p| p.starts_with("last_updated not canonical")));
    assert!(problems.iter().any(|p| p.contains("outside (0, 3]")));
}

#[test]
fn keyword_count_bounds() {
    let few = GOOD.replace(
        "k-one, k-two, k-three, k-four, k-five, k-six, k-seven, k-eight",
        "k-one, k-two",
    );
    let doc = Document::parse(Path::new("a.md"), few).unwrap();
    let problems = validate::check_document(&doc, Path::new("."));
    assert_eq!(problems, vec!["too few keywords: 2 < 8"]);
}

#[test]
fn corpus_summary_counts_each_class() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(&root.join("6.x-standards/good.md"), GOOD);
    write(&root.join("6.x-standards/partial.md"), &GOOD.replace("title: Good\n", ""));
    write(&root.join("broken.md"), "no front matter\n");

    let summary = validate::validate_corpus(&DmctConfig::new(root)).unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.compliant, 1);
    assert_eq!(summary.non_compliant, 1);
    assert_eq!(summary.errors, 1);
    assert!(!summary.all_compliant());
    assert_eq!(summary.problem_messages().len(), 2);

    let broken = summary
        .documents
        .iter()
        .find(|d| d.path.ends_with("broken.md"))
        .unwrap();
    assert_eq!(broken.classification, Classification::Error);
}

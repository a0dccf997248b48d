use dmct::core::config::DmctConfig;
use dmct::core::document::Document;
use dmct::core::pass::{FileStatus, PassRunner};
use dmct::core::phase::CorePhase;
use dmct::core::time;
use dmct::plugins::keywords::{self, KeywordPass, Plan, TARGET_KEYWORDS};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn doc_with_keywords(keywords: &str, phase: &str) -> String {
    format!(
        "---\ntitle: Harmonized Requirements Catalogue\nai_keywords: {}\nevolutionary_phase: \"{}\"\nlast_updated: 2025-01-01 00:00:00 CET\n---\n# Stakeholder Requirements\n\n## Acceptance Gates\n\nText.\n",
        keywords, phase
    )
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn plan_keeps_originals_and_draws_from_phase_pool() {
    let existing = strings(&["biological", "consciousness", "harmonization", "godhood"]);
    let phase = CorePhase::new(5).unwrap();
    let content = strings(&["harmonized", "requirements", "catalogue"]);

    let Plan::Enhance { before, after } = keywords::plan_keywords(&existing, phase, &content) else {
        panic!("expected enhancement");
    };
    assert_eq!(before, existing);
    assert_eq!(after.len(), TARGET_KEYWORDS);
    for original in &existing {
        assert!(after.contains(original), "lost original {}", original);
    }
    let phase_terms = after
        .iter()
        .filter(|k| keywords::phase_pool(phase).contains(&k.as_str()))
        .count();
    assert!(phase_terms >= 3, "only {} phase terms in {:?}", phase_terms, after);

    let mut sorted = after.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, after);
    assert!(after.iter().all(|k| keywords::is_valid_token(k)));
}

#[test]
fn plan_reports_already_compliant_sets() {
    let existing: Vec<String> = keywords::CORE_POOL.iter().map(|s| s.to_string()).collect();
    assert_eq!(
        keywords::plan_keywords(&existing, CorePhase::default(), &[]),
        Plan::AlreadyCompliant
    );
}

#[test]
fn plan_normalizes_and_dedups_existing_tokens() {
    let existing = strings(&["User Stories", "user_stories", "QA!", "  "]);
    let Plan::Enhance { after, .. } = keywords::plan_keywords(&existing, CorePhase::new(6).unwrap(), &[]) else {
        panic!("expected enhancement");
    };
    assert_eq!(after.len(), TARGET_KEYWORDS);
    assert!(after.contains(&"user-stories".to_string()));
    assert!(after.contains(&"qa".to_string()));
    assert_eq!(keywords::normalize_token("!!!"), None);
}

#[test]
fn content_pool_uses_title_and_headers() {
    let doc = Document::parse(
        Path::new("docs/5.x-req/a.md"),
        doc_with_keywords("one, two", "5.x"),
    )
    .unwrap();
    let pool = keywords::content_pool(&doc);
    assert_eq!(&pool[..3], &["harmonized", "requirements", "catalogue"]);
    assert!(pool.contains(&"stakeholder".to_string()));
    assert!(pool.contains(&"acceptance".to_string()));
}

#[test]
fn dry_run_pass_proposes_without_writing() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("docs");
    let a = root.join("5.x-requirements-harmonization/a.md");
    let b = root.join("misc/b.md");
    let full: Vec<&str> = keywords::CORE_POOL.to_vec();
    write(&a, &doc_with_keywords("biological, consciousness, harmonization, godhood", "5.x"));
    write(&b, &doc_with_keywords(&full.join(", "), "0.x"));
    let before_a = fs::read(&a).unwrap();

    let mut cfg = DmctConfig::new(&root);
    cfg.dry_run = true;
    let summary = PassRunner::new(&cfg, time::now_cet()).run(&KeywordPass).unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.skipped, 1);
    assert!(summary.files.iter().all(|f| !f.written));
    let updated = summary.files.iter().find(|f| f.status == FileStatus::Updated).unwrap();
    assert!(updated.detail.as_deref().unwrap().contains("requirements"));
    assert_eq!(fs::read(&a).unwrap(), before_a);
    assert!(!root.join(".dmct.lock").exists());
}

#[test]
fn pass_rewrites_keywords_and_timestamp() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("docs");
    let a = root.join("2.x-architecture/a.md");
    write(&a, &doc_with_keywords("design", "2.x"));

    let cfg = DmctConfig::new(&root);
    let summary = PassRunner::new(&cfg, time::now_cet()).run(&KeywordPass).unwrap();
    assert_eq!(summary.changed, 1);

    let doc = Document::load(&a).unwrap();
    assert_eq!(doc.keywords().len(), TARGET_KEYWORDS);
    assert!(doc.keywords().contains(&"design".to_string()));
    assert_ne!(doc.last_updated(), Some("2025-01-01 00:00:00 CET"));
    assert!(time::is_canonical(doc.last_updated().unwrap()));
    assert!(a.with_file_name("a.md.bak").exists());
    assert!(doc.body.starts_with("# Stakeholder Requirements"));
}

use dmct::core::config::DmctConfig;
use dmct::core::document::Document;
use dmct::core::error::DmctError;
use dmct::core::pass::{FileStatus, PassRunner};
use dmct::core::store::CorpusLock;
use dmct::core::time;
use dmct::plugins::align::AlignPass;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const BODY: &str = "# Ensemble\n\nTrailing spaces stay.   \n\n| a | b |\n|---|---|\n";

fn write_doc(path: &Path, phase: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        path,
        format!("---\ntitle: X\nevolutionary_phase: \"{}\"\n---\n{}", phase, BODY),
    )
    .unwrap();
}

#[test]
fn align_rewrites_phase_and_preserves_body() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("docs");
    let x = root.join("3.x-conscious-ai-ensemble-orchestration/x.md");
    let ok = root.join("3.x-conscious-ai-ensemble-orchestration/ok.md");
    let loose = root.join("misc/loose.md");
    write_doc(&x, "7.x");
    write_doc(&ok, "3.x");
    write_doc(&loose, "4.x");

    let cfg = DmctConfig::new(&root);
    let summary = PassRunner::new(&cfg, time::now_cet()).run(&AlignPass).unwrap();
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.skipped, 2);

    let text = fs::read_to_string(&x).unwrap();
    assert!(text.contains("evolutionary_phase: \"3.x\"\n"));
    assert!(text.ends_with(BODY));
    let doc = Document::load(&x).unwrap();
    assert_eq!(doc.body, BODY);

    let report = summary.files.iter().find(|f| f.path == x).unwrap();
    assert_eq!(report.status, FileStatus::Updated);
    assert_eq!(report.detail.as_deref(), Some("7.x -> 3.x"));
}

#[test]
fn align_overwrites_unknown_phase_values() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let doc = root.join("12.x-academy/course.md");
    write_doc(&doc, "42.x");

    let cfg = DmctConfig::new(root);
    let summary = PassRunner::new(&cfg, time::now_cet()).run(&AlignPass).unwrap();
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.files[0].detail.as_deref(), Some("42.x -> 12.x"));
}

#[test]
fn locked_corpus_refuses_a_second_writer() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_doc(&root.join("3.x-a/x.md"), "7.x");

    let _held = CorpusLock::acquire(root).unwrap();
    let cfg = DmctConfig::new(root);
    let err = PassRunner::new(&cfg, time::now_cet()).run(&AlignPass).unwrap_err();
    assert!(matches!(err, DmctError::CorpusLocked(_)));
    assert!(fs::read_to_string(root.join("3.x-a/x.md")).unwrap().contains("7.x"));
}

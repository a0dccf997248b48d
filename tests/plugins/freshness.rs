use chrono::TimeZone;
use dmct::core::config::DmctConfig;
use dmct::core::document::Document;
use dmct::core::pass::{FileStatus, PassRunner};
use dmct::core::time;
use dmct::plugins::freshness::{self, Freshness, FreshnessPass};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_doc(path: &Path, last_updated: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        path,
        format!(
            "---\ntitle: Notes\nlast_updated: \"{}\"\n---\nbody stays put\n",
            last_updated
        ),
    )
    .unwrap();
}

#[test]
fn threshold_is_strict() {
    let now = time::cet().with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap();
    assert_eq!(
        freshness::assess(Some("2025-05-31 12:00:00 CET"), &now, 30),
        Freshness::Fresh
    );
    assert_eq!(
        freshness::assess(Some("2025-05-31 11:59:59 CET"), &now, 30),
        Freshness::Stale { age_days: 30 }
    );
}

#[test]
fn refresh_restamps_only_stale_documents() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let stale = root.join("old.md");
    let fresh = root.join("new.md");
    let broken = root.join("broken.md");
    write_doc(&stale, "2020-01-01 00:00:00 CET");
    let recent = time::format_canonical(&time::now_cet());
    write_doc(&fresh, &recent);
    write_doc(&broken, "last tuesday");
    let fresh_before = fs::read(&fresh).unwrap();

    let cfg = DmctConfig::new(root);
    let started = time::now_cet();
    let summary = PassRunner::new(&cfg, started)
        .run(&FreshnessPass { threshold_days: 30 })
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.changed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(fs::read(&fresh).unwrap(), fresh_before);

    let doc = Document::load(&stale).unwrap();
    let stamped = time::parse_canonical(doc.last_updated().unwrap()).expect("canonical stamp");
    let drift = time::now_cet().signed_duration_since(stamped).num_seconds().abs();
    assert!(drift <= 60, "stamp drifted {}s", drift);
    assert_eq!(doc.body, "body stays put\n");

    let unparseable = summary
        .files
        .iter()
        .find(|f| f.path == broken)
        .unwrap();
    assert_eq!(unparseable.status, FileStatus::Updated);
    assert!(unparseable.detail.as_deref().unwrap().contains("unparseable"));
}

#[test]
fn malformed_documents_are_reported_not_fatal() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_doc(&root.join("ok.md"), "2020-01-01 00:00:00 CET");
    fs::write(root.join("bad.md"), "---\ntitle: never closed\n").unwrap();

    let cfg = DmctConfig::new(root);
    let summary = PassRunner::new(&cfg, time::now_cet())
        .run(&FreshnessPass { threshold_days: 30 })
        .unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.changed, 1);
    assert_eq!(
        fs::read_to_string(root.join("bad.md")).unwrap(),
        "---\ntitle: never closed\n"
    );
    assert!(summary.error_messages()[0].contains("bad.md"));
}

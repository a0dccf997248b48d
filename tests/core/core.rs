use dmct::core::config::{self, DmctConfig};
use dmct::core::document::{self, Document};
use dmct::core::error::DmctError;
use dmct::core::frontmatter::{self, FieldValue};
use dmct::core::phase::{self, CorePhase};
use dmct::core::scanner::{self, IgnoreRules};
use dmct::core::store::{self, CorpusLock};
use dmct::core::time;
use chrono::TimeZone;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const SAMPLE: &str = concat!(
    "---\n",
    "title: \"Design Notes: Phase 3\"\n",
    "# reviewed quarterly\n",
    "ai_keywords: architecture, design, patterns\n",
    "evolutionary_phase: '3.x'\n",
    "consciousness_score: 2.4\n",
    "last_updated: 2024-01-05 10:00:00 CET\n",
    "cross_references:\n",
    "  - overview.md\n",
    "  - api.md\n",
    "---\n",
    "# Design Notes\n\nBody text   with odd   spacing.\n",
);

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn codec_round_trip_is_byte_identical() {
    let (fm, body) = frontmatter::decode(SAMPLE).unwrap();
    assert_eq!(frontmatter::encode(&fm, &body), SAMPLE);
    assert_eq!(fm.get_str("title"), Some("Design Notes: Phase 3"));
    assert_eq!(fm.get_str("evolutionary_phase"), Some("3.x"));
    assert_eq!(
        fm.get("cross_references"),
        Some(&FieldValue::Sequence(vec!["overview.md".into(), "api.md".into()]))
    );
    assert!(body.starts_with("# Design Notes"));
}

#[test]
fn codec_edit_touches_only_the_edited_line() {
    let (mut fm, body) = frontmatter::decode(SAMPLE).unwrap();
    fm.set_scalar("last_updated", "2025-02-02 08:00:00 CET");
    let out = frontmatter::encode(&fm, &body);

    let before: Vec<&str> = SAMPLE.lines().collect();
    let after: Vec<&str> = out.lines().collect();
    assert_eq!(before.len(), after.len());
    let changed: Vec<usize> = (0..before.len()).filter(|&i| before[i] != after[i]).collect();
    assert_eq!(changed.len(), 1);
    assert!(after[changed[0]].starts_with("last_updated:"));
    assert!(out.ends_with("Body text   with odd   spacing.\n"));
}

#[test]
fn codec_rejects_documents_without_front_matter() {
    let err = frontmatter::decode("# Just a heading\n").unwrap_err();
    assert!(matches!(err, DmctError::MalformedFrontMatter(_)));

    let err = frontmatter::decode("---\ntitle: open\n\nno closing delimiter\n").unwrap_err();
    assert!(matches!(err, DmctError::MalformedFrontMatter(_)));
}

#[test]
fn codec_accepts_nested_mappings_and_wrapped_scalars() {
    let text = concat!(
        "---\n",
        "title: A long\n",
        "  wrapped title\n",
        "metadata:\n",
        "  owner: docs\n",
        "evolutionary_phase: \"2.x\"\n",
        "---\n",
        "Body\n",
    );
    let doc = Document::parse(Path::new("docs/2.x-arch/a.md"), text.to_string()).unwrap();
    assert_eq!(doc.title(), "A long wrapped title");
    assert_eq!(doc.declared_phase().unwrap().unwrap(), CorePhase::new(2).unwrap());
    let meta = doc.metadata();
    assert_eq!(
        meta.extra_fields,
        vec![("metadata".to_string(), FieldValue::Mapping("owner: docs".to_string()))]
    );
    assert_eq!(doc.encode(), text);
}

#[test]
fn document_accessors_read_schema_fields() {
    let doc = Document::parse(Path::new("docs/3.x-design/notes.md"), SAMPLE.to_string()).unwrap();
    assert_eq!(doc.title(), "Design Notes: Phase 3");
    assert_eq!(doc.keywords(), vec!["architecture", "design", "patterns"]);
    assert_eq!(doc.declared_phase().unwrap().unwrap(), CorePhase::new(3).unwrap());
    assert_eq!(doc.headers(), vec!["Design Notes"]);
    assert!(doc.has_section("# Design Notes"));
    assert!(!doc.is_modified());

    let meta = doc.metadata();
    assert_eq!(meta.consciousness_score_value(), Some(2.4));
    assert_eq!(meta.cross_references, vec!["overview.md", "api.md"]);
    assert!(document::score_in_range(3.0));
    assert!(!document::score_in_range(0.0));
}

#[test]
fn phase_catalogue_and_resolution() {
    assert_eq!(CorePhase::parse("7.x").unwrap().number(), 7);
    assert!(matches!(CorePhase::parse("20.x"), Err(DmctError::UnknownPhase(_))));
    assert!(CorePhase::parse("07.x").is_err());
    assert!(CorePhase::parse("seven").is_err());

    let nested = Path::new("3.x-design/sub/7.x-implementation/a.md");
    assert_eq!(phase::resolve(nested), CorePhase::new(3));
    assert_eq!(phase::resolve(Path::new("misc/a.md")), None);
    assert_eq!(phase::resolve(Path::new("25.x-future/a.md")), None);

    let root = PathBuf::from("/corpus/0.x-root");
    let inside = root.join("misc/a.md");
    assert_eq!(phase::resolve_in_root(&root, &inside), None);
}

#[test]
fn scanner_walks_markdown_in_sorted_order_and_prunes_ignored_dirs() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(&root.join("b.md"), SAMPLE);
    write(&root.join("a/z.md"), SAMPLE);
    write(&root.join("a/notes.txt"), "not markdown");
    write(&root.join(".hidden/h.md"), SAMPLE);
    write(&root.join("__pycache__/p.md"), SAMPLE);
    write(&root.join("drafts/d.md"), SAMPLE);

    let (paths, errors) = scanner::collect(root, &IgnoreRules::default()).unwrap();
    assert!(errors.is_empty());
    let rel: Vec<String> = paths
        .iter()
        .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(rel, vec!["a/z.md", "b.md", "drafts/d.md"]);

    let rules = IgnoreRules::new(vec!["drafts".to_string()]);
    let (paths, _) = scanner::collect(root, &rules).unwrap();
    assert_eq!(paths.len(), 2);
}

#[test]
fn scanner_reports_missing_root() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope");
    assert!(matches!(
        scanner::scan(&missing, &IgnoreRules::default()),
        Err(DmctError::RootUnavailable(_))
    ));
}

#[test]
fn write_document_keeps_backup_of_previous_bytes() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("doc.md");
    write(&path, "old\n");

    let outcome = store::write_document(&path, "new\n", true).unwrap();
    let bak = outcome.backup.expect("backup requested");
    assert_eq!(bak, store::backup_path(&path));
    assert_eq!(fs::read_to_string(&bak).unwrap(), "old\n");
    assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");

    let outcome = store::write_document(&path, "newer\n", false).unwrap();
    assert!(outcome.backup.is_none());
    assert_eq!(fs::read_to_string(&path).unwrap(), "newer\n");
    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".dmct-tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn write_document_failure_leaves_target_and_no_temp_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("occupied.md");
    write(&path.join("inner.md"), "keep\n");

    let err = store::write_document(&path, "new\n", false).unwrap_err();
    assert!(matches!(err, DmctError::WriteFailure { .. }));
    assert!(path.is_dir());
    assert_eq!(fs::read_to_string(path.join("inner.md")).unwrap(), "keep\n");
    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".dmct-tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn write_atomic_creates_parent_directories() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("reports/nested/out.json");
    store::write_atomic(&path, b"{}").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"{}");
}

#[test]
fn corpus_lock_is_exclusive_until_dropped() {
    let tmp = tempdir().unwrap();
    let first = CorpusLock::acquire(tmp.path()).unwrap();
    assert!(first.path().exists());
    assert!(matches!(
        CorpusLock::acquire(tmp.path()),
        Err(DmctError::CorpusLocked(_))
    ));
    let content = fs::read_to_string(first.path()).unwrap();
    assert!(content.contains(&first.token().to_string()));

    drop(first);
    assert!(!tmp.path().join(store::LOCK_FILE_NAME).exists());
    let second = CorpusLock::acquire(tmp.path()).unwrap();
    drop(second);
}

#[test]
fn config_file_overlays_defaults() {
    let tmp = tempdir().unwrap();
    write(
        &tmp.path().join(config::CONFIG_FILE_NAME),
        "[freshness]\nstale_threshold_days = 14\n\n[audit]\nhistory_cap = 8\n\n[scan]\nignore = [\"drafts\"]\n\n[write]\nbackup = false\n",
    );
    let file = config::load_config_file(tmp.path(), None).unwrap();
    let cfg = DmctConfig::new(tmp.path()).apply_file(file).unwrap();
    assert_eq!(cfg.stale_threshold_days, 14);
    assert_eq!(cfg.history_cap, 8);
    assert!(!cfg.backup);
    assert_eq!(cfg.extra_ignore, vec!["drafts"]);
    assert_eq!(cfg.reports_dir, PathBuf::from(config::DEFAULT_REPORTS_DIR));
}

#[test]
fn config_rejects_unknown_keys_and_missing_explicit_file() {
    let tmp = tempdir().unwrap();
    let err = config::parse_config("[freshness]\nstale_days = 3\n", Path::new("dmct.toml")).unwrap_err();
    assert!(matches!(err, DmctError::ConfigError(_)));

    let missing = tmp.path().join("other.toml");
    assert!(matches!(
        config::load_config_file(tmp.path(), Some(&missing)),
        Err(DmctError::ConfigError(_))
    ));
    assert!(config::load_config_file(tmp.path(), None).is_ok());
}

#[test]
fn canonical_timestamps() {
    let ts = time::cet().with_ymd_and_hms(2025, 3, 9, 7, 5, 0).unwrap();
    assert_eq!(time::format_canonical(&ts), "2025-03-09 07:05:00 CET");
    assert_eq!(time::parse_canonical("2025-03-09 07:05:00 CET"), Some(ts));
    assert!(!time::is_canonical("2025-03-09T07:05:00"));
    assert_eq!(time::parse_or_epoch(Some("garbage")), time::epoch());
    assert_eq!(time::file_stamp(&ts), "20250309_070500");
}

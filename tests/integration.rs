use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use polyvis::models::NodeKind;
use polyvis::store::GraphStore;
use polyvis::vectors;

fn polyvis_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("polyvis");
    path
}

fn setup_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("data")).unwrap();
    fs::create_dir_all(root.join("notes")).unwrap();
    fs::create_dir_all(root.join("debriefs")).unwrap();

    fs::write(
        root.join("lexicon.json"),
        r#"[
            {
                "id": "term-flow-state",
                "title": "Flow State",
                "definition": "Deep absorption in a single task.",
                "category": "Mindset"
            }
        ]"#,
    )
    .unwrap();

    fs::write(
        root.join("cda.json"),
        r#"[
            {
                "id": "directive-deep-focus",
                "title": "Deep Focus",
                "content": "Protect long blocks of uninterrupted attention.",
                "relationships": [
                    { "type": "implements", "target": "term-flow-state" }
                ]
            }
        ]"#,
    )
    .unwrap();

    let settings = format!(
        r#"{{
            "paths": {{
                "database": {{ "resonance": "{root}/data/resonance.db" }},
                "sources": {{
                    "persona": {{
                        "lexicon": "{root}/lexicon.json",
                        "cda": "{root}/cda.json"
                    }},
                    "experience": [
                        {{ "path": "{root}/notes", "kind": "note" }},
                        {{ "path": "{root}/debriefs", "kind": "debrief" }}
                    ]
                }}
            }},
            "embedding": {{ "provider": "local", "dims": 64 }}
        }}"#,
        root = root.display()
    );

    let settings_path = root.join("polyvis.settings.json");
    fs::write(&settings_path, settings).unwrap();

    (tmp, settings_path)
}

fn run_polyvis(settings: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(polyvis_binary())
        .arg("--config")
        .arg(settings)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run polyvis: {}", e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code(),
    )
}

fn multi_section_note() -> &'static str {
    "---\ntitle: Foo\n---\n## One\n\nThe opening section describes the morning routine in enough detail to embed.\n\n## Two\n\nA quiet second section covering the afternoon review process at length.\n\n## Three\n\nClosing thoughts about tomorrow's planning cadence and open loops.\n"
}

#[test]
fn init_creates_database_idempotently() {
    let (tmp, settings) = setup_env();

    let (stdout, stderr, code) = run_polyvis(&settings, &["init"]);
    assert_eq!(code, Some(0), "init failed: {}{}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/resonance.db").exists());

    let (_, _, code) = run_polyvis(&settings, &["init"]);
    assert_eq!(code, Some(0), "second init not idempotent");
}

#[test]
fn box_and_audit_round_trip() {
    let (tmp, settings) = setup_env();
    let draft = tmp.path().join("draft.md");
    // Headless, with a deep heading: the boxer repairs both.
    fs::write(
        &draft,
        "Opening prose without any title.\n\n## Detail\n\nMore text here.\n\n#### Minutiae\n\nFine print paragraph.\n",
    )
    .unwrap();

    let boxed = tmp.path().join("boxed.md");
    let (stdout, stderr, code) = run_polyvis(
        &settings,
        &["box", "--file", draft.to_str().unwrap(), "--output", boxed.to_str().unwrap()],
    );
    assert_eq!(code, Some(0), "box failed: {}{}", stdout, stderr);
    let boxed_content = fs::read_to_string(&boxed).unwrap();
    assert!(boxed_content.contains("<!-- locus:"));

    let (stdout, _, code) = run_polyvis(
        &settings,
        &["audit", "--file", draft.to_str().unwrap(), "--output", boxed.to_str().unwrap()],
    );
    assert_eq!(code, Some(0));
    assert!(stdout.contains("✅ audit"));

    // Dropping real content must be detected.
    let tampered = boxed_content.replace("Fine print paragraph.", "");
    fs::write(&boxed, tampered).unwrap();
    let (stdout, _, code) = run_polyvis(
        &settings,
        &["audit", "--file", draft.to_str().unwrap(), "--output", boxed.to_str().unwrap()],
    );
    assert_eq!(code, Some(1));
    assert!(stdout.contains("❌ audit"));
}

#[test]
fn boxing_mints_stable_locus_ids() {
    let (tmp, settings) = setup_env();
    let draft = tmp.path().join("stable.md");
    fs::write(
        &draft,
        "# Stable\n\nFirst paragraph of text.\n\n## Later\n\nSecond paragraph of text.\n",
    )
    .unwrap();

    let out_a = tmp.path().join("a.md");
    let out_b = tmp.path().join("b.md");
    run_polyvis(
        &settings,
        &["box", "--file", draft.to_str().unwrap(), "--output", out_a.to_str().unwrap()],
    );
    run_polyvis(
        &settings,
        &["box", "--file", draft.to_str().unwrap(), "--output", out_b.to_str().unwrap()],
    );

    // Same content, same ledger: identical ids both times.
    assert_eq!(
        fs::read_to_string(&out_a).unwrap(),
        fs::read_to_string(&out_b).unwrap()
    );
}

#[tokio::test]
async fn cold_ingest_of_multi_section_file() {
    let (tmp, settings) = setup_env();
    let alpha = tmp.path().join("notes/alpha.md");
    fs::write(&alpha, multi_section_note()).unwrap();

    let (stdout, stderr, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(0), "ingest failed: {}{}", stdout, stderr);
    assert!(stdout.contains("+3 nodes"), "stdout: {}", stdout);

    // Locus markers were persisted back to the source.
    let rewritten = fs::read_to_string(&alpha).unwrap();
    assert_eq!(rewritten.matches("<!-- locus:").count(), 3);

    let store = GraphStore::open(&tmp.path().join("data/resonance.db"))
        .await
        .unwrap();
    let notes = store.get_nodes_by_type(NodeKind::Note).await.unwrap();
    assert_eq!(notes.len(), 3);
    for node in &notes {
        assert!(
            uuid::Uuid::parse_str(&node.id).is_ok(),
            "locus id should be a UUID: {}",
            node.id
        );
        let blob = node.embedding.as_ref().expect("every section embeds");
        assert_eq!(blob.len(), 64 * 4);
        let norm = vectors::norm(&vectors::decode(blob));
        assert!((norm - 1.0).abs() < 1e-5, "norm was {}", norm);
        assert!(node.hash.is_some());
    }

    let stats = store.get_stats().await.unwrap();
    // 3 notes + 1 concept + 1 directive, FTS in bijection.
    assert_eq!(stats.nodes, 5);
    assert_eq!(stats.fts_rows, 5);
    assert_eq!(stats.vectors, 3);
    store.close().await;
}

#[test]
fn reingest_unchanged_corpus_adds_nothing() {
    let (tmp, settings) = setup_env();
    fs::write(tmp.path().join("notes/alpha.md"), multi_section_note()).unwrap();

    let (_, _, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(0));

    let (stdout, _, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(0));
    assert!(
        stdout.contains("(3 unchanged), +0 nodes, ~0 updated"),
        "stdout: {}",
        stdout
    );
    assert!(stdout.contains("+0 edges"), "stdout: {}", stdout);
}

#[tokio::test]
async fn content_edit_updates_only_the_touched_box() {
    let (tmp, settings) = setup_env();
    let alpha = tmp.path().join("notes/alpha.md");
    fs::write(&alpha, multi_section_note()).unwrap();

    run_polyvis(&settings, &["ingest"]);

    // Edit one section's prose in the now-marked file.
    let marked = fs::read_to_string(&alpha).unwrap();
    let edited = marked.replace("afternoon review process", "evening review process");
    assert_ne!(marked, edited);
    fs::write(&alpha, edited).unwrap();

    let (stdout, _, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(0));
    assert!(
        stdout.contains("(2 unchanged), +0 nodes, ~1 updated"),
        "stdout: {}",
        stdout
    );

    let store = GraphStore::open(&tmp.path().join("data/resonance.db"))
        .await
        .unwrap();
    let notes = store.get_nodes_by_type(NodeKind::Note).await.unwrap();
    assert_eq!(notes.len(), 3, "identity survived the edit");
    assert!(notes
        .iter()
        .any(|n| n.content.as_deref().unwrap().contains("evening review")));
    store.close().await;
}

#[tokio::test]
async fn wikilink_resolves_to_citation_edge() {
    let (tmp, settings) = setup_env();
    fs::write(
        tmp.path().join("notes/cite.md"),
        "## Citing\n\nToday I finally understood [[Flow State]] while pairing on the parser.\n",
    )
    .unwrap();

    let (stdout, stderr, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(0), "ingest failed: {}{}", stdout, stderr);

    let store = GraphStore::open(&tmp.path().join("data/resonance.db"))
        .await
        .unwrap();
    let edges = store.get_edges_of("cite").await.unwrap();
    assert!(
        edges
            .iter()
            .any(|e| e.source == "cite" && e.target == "term-flow-state" && e.kind == "CITES"),
        "edges: {:?}",
        edges
    );
    store.close().await;
}

#[tokio::test]
async fn timeline_chains_debriefs_newest_first() {
    let (tmp, settings) = setup_env();
    fs::write(
        tmp.path().join("debriefs/2024-01-01-kickoff.md"),
        "## Kickoff\n\nFirst day of the effort, setting up the working agreements.\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join("debriefs/2024-01-02-standup.md"),
        "## Standup\n\nSecond day, reviewing what landed overnight and unblocking.\n",
    )
    .unwrap();

    let (stdout, _, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("timeline: 1 SUCCEEDS"), "stdout: {}", stdout);

    let store = GraphStore::open(&tmp.path().join("data/resonance.db"))
        .await
        .unwrap();
    let edges = store.get_edges_of("2024-01-02-standup").await.unwrap();
    assert!(edges.iter().any(|e| {
        e.source == "2024-01-02-standup"
            && e.target == "2024-01-01-kickoff"
            && e.kind == "SUCCEEDS"
    }));
    store.close().await;
}

#[test]
fn hybrid_search_tags_fused_results() {
    let (tmp, settings) = setup_env();
    fs::write(
        tmp.path().join("notes/fox.md"),
        "## Sighting\n\nThe quick brown fox jumps over the lazy dog near the old fence line.\n",
    )
    .unwrap();

    let (_, _, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(0));

    let (stdout, _, code) = run_polyvis(&settings, &["search", "fox"]);
    assert_eq!(code, Some(0));
    // The fox note is a vector candidate that the keyword path confirms.
    assert!(stdout.contains("(hybrid)"), "stdout: {}", stdout);
    assert!(stdout.contains("fox"), "stdout: {}", stdout);
}

#[test]
fn failed_expectations_exit_with_code_two() {
    let (_tmp, settings) = setup_env();
    // Raise the bar beyond what an empty corpus can deliver.
    let raw = fs::read_to_string(&settings).unwrap();
    let strict = raw.replace(
        "\"embedding\":",
        "\"validation\": { \"min_nodes_added\": 99 },\n            \"embedding\":",
    );
    fs::write(&settings, strict).unwrap();

    let (stdout, _, code) = run_polyvis(&settings, &["ingest"]);
    assert_eq!(code, Some(2), "stdout: {}", stdout);
    assert!(stdout.contains("❌ validation"), "stdout: {}", stdout);

    let (_, _, code) = run_polyvis(&settings, &["get", "missing-node"]);
    assert_eq!(code, Some(1));
}

#[test]
fn harvest_reports_unknown_stubs() {
    let (tmp, settings) = setup_env();
    fs::write(
        tmp.path().join("notes/stubs.md"),
        "## Stubs\n\nKnown tag-flow-state stub and unknown tag-mystery-topic stub.\n",
    )
    .unwrap();

    let (stdout, _, code) = run_polyvis(&settings, &["harvest"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("tag-mystery-topic"), "stdout: {}", stdout);
    assert!(!stdout.contains("`tag-flow-state`"), "stdout: {}", stdout);
}

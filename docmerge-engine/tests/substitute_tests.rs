use docmerge_engine::{MailMerge, MemoryWorkspace, MergeConfig, MergeError, Substituter};
use docmerge_model::{Body, ContentElement, FieldMap, ListItem, Paragraph, Table, TextRun};
use docmerge_types::RevisionId;
use pretty_assertions::assert_eq;
use serde_json::json;

const USER: &str = "alice@example.com";

fn paragraphs(lines: &[&str]) -> Body {
    let mut body = Body::default();
    for line in lines {
        body.append_paragraph(Paragraph::new(*line));
    }
    body
}

// ── Scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn total_is_substituted_then_stale_resubmit_conflicts() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws
        .add_document_at_revision("Invoice", &[], paragraphs(&["Total: {{total}}"]), RevisionId::from("rev-1"))
        .await;
    let fields = FieldMap::new().with("{{total}}", "42").unwrap();
    let substituter = Substituter::new(&ws);

    let done = substituter
        .apply(&doc, &RevisionId::from("rev-1"), &fields)
        .await
        .unwrap();
    assert_eq!(done.occurrences.get("{{total}}"), Some(&1));
    assert_ne!(done.revision, RevisionId::from("rev-1"));
    let after = ws.document(&doc).await.unwrap();
    assert_eq!(after.body.text(), "Total: 42");
    assert_eq!(after.revision_id, done.revision);

    let err = substituter
        .apply(&doc, &RevisionId::from("rev-1"), &fields)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::RevisionConflict { .. }));
    assert_eq!(ws.document(&doc).await.unwrap(), after);
}

#[tokio::test]
async fn every_code_is_replaced_everywhere() {
    let ws = MemoryWorkspace::new(USER);
    let mut body = paragraphs(&["Dear {{name}},", "Your order {{order}} ships today."]);
    body.append_list_item(ListItem::new("{{name}}: {{order}}"));
    body.append_table(Table::from_text_grid([["Name", "{{name}}"], ["Order", "{{order}}"]]));
    let doc = ws.add_document("Letter", &[], body).await;
    let revision = ws.document(&doc).await.unwrap().revision_id;

    let fields = FieldMap::new()
        .with("{{name}}", "Alice")
        .unwrap()
        .with("{{order}}", "#1001")
        .unwrap();
    let done = Substituter::new(&ws).apply(&doc, &revision, &fields).await.unwrap();
    assert_eq!(done.total(), 6);

    let after = ws.document(&doc).await.unwrap().body;
    assert_eq!(after.count_occurrences("{{name}}"), 0);
    assert_eq!(after.count_occurrences("{{order}}"), 0);
    assert_eq!(
        after.text(),
        "Dear Alice,\nYour order #1001 ships today.\nAlice: #1001\nName\nAlice\nOrder\n#1001"
    );
}

#[tokio::test]
async fn applying_twice_equals_applying_once() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws.add_document("Letter", &[], paragraphs(&["{{a}} and {{b}}"])).await;
    let fields = FieldMap::new().with("{{a}}", "1").unwrap().with("{{b}}", "2").unwrap();
    let substituter = Substituter::new(&ws);

    let rev = ws.document(&doc).await.unwrap().revision_id;
    let first = substituter.apply(&doc, &rev, &fields).await.unwrap();
    let once = ws.document(&doc).await.unwrap().body;

    let second = substituter.apply(&doc, &first.revision, &fields).await.unwrap();
    assert_eq!(second.total(), 0);
    assert_eq!(ws.document(&doc).await.unwrap().body, once);
}

#[tokio::test]
async fn longer_code_is_replaced_before_its_prefix() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws
        .add_document("Letter", &[], paragraphs(&["{{name}} / {{name_full}}"]))
        .await;
    let fields = FieldMap::new()
        .with("{{name", "X")
        .unwrap()
        .with("{{name_full}}", "Alice Liddell")
        .unwrap();
    let rev = ws.document(&doc).await.unwrap().revision_id;

    Substituter::new(&ws).apply(&doc, &rev, &fields).await.unwrap();
    assert_eq!(ws.document(&doc).await.unwrap().body.text(), "X}} / Alice Liddell");
}

#[tokio::test]
async fn match_spanning_runs_keeps_first_run_style() {
    let ws = MemoryWorkspace::new(USER);
    let mut attrs = serde_json::Map::new();
    attrs.insert("bold".to_string(), json!(true));
    let mut body = Body::default();
    body.append_paragraph(Paragraph {
        runs: vec![
            TextRun::new("Hi {{na"),
            TextRun::styled("me}}!", attrs),
        ],
        attributes: Default::default(),
    });
    let doc = ws.add_document("Letter", &[], body).await;
    let rev = ws.document(&doc).await.unwrap().revision_id;
    let fields = FieldMap::new().with("{{name}}", "Bob").unwrap();

    Substituter::new(&ws).apply(&doc, &rev, &fields).await.unwrap();
    let after = ws.document(&doc).await.unwrap().body;
    match after.child(0) {
        Some(ContentElement::Paragraph(p)) => {
            assert_eq!(p.text(), "Hi Bob!");
            assert_eq!(p.runs[0].text, "Hi Bob");
            assert!(p.runs[0].attributes.is_empty());
            assert_eq!(p.runs[1].text, "!");
        }
        other => panic!("expected paragraph, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_field_map_submits_nothing() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws.add_document("Letter", &[], paragraphs(&["{{x}}"])).await;
    let before = ws.document(&doc).await.unwrap();

    let done = Substituter::new(&ws)
        .apply(&doc, &before.revision_id, &FieldMap::new())
        .await
        .unwrap();
    assert_eq!(done.attempts, 0);
    assert_eq!(done.revision, before.revision_id);
    assert_eq!(ws.document(&doc).await.unwrap(), before);
}

// ── Retry ───────────────────────────────────────────────────────

#[tokio::test]
async fn retry_rereads_revision_after_conflict() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws
        .add_document_at_revision("Letter", &[], paragraphs(&["{{x}}"]), RevisionId::from("rev-1"))
        .await;
    ws.edit_externally(&doc, |b| b.append_paragraph(Paragraph::new("and {{x}}")))
        .await
        .unwrap();
    let fields = FieldMap::new().with("{{x}}", "y").unwrap();

    let done = Substituter::new(&ws)
        .apply_with_retry(&doc, &RevisionId::from("rev-1"), &fields, 1)
        .await
        .unwrap();
    assert_eq!(done.attempts, 2);
    assert_eq!(done.total(), 2);
    assert_eq!(ws.document(&doc).await.unwrap().body.text(), "y\nand y");
}

#[tokio::test]
async fn zero_retries_surfaces_the_conflict() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws
        .add_document_at_revision("Letter", &[], paragraphs(&["{{x}}"]), RevisionId::from("rev-1"))
        .await;
    ws.edit_externally(&doc, |_| {}).await.unwrap();
    let merge = MailMerge::new(ws.clone(), MergeConfig::default());
    let fields = FieldMap::new().with("{{x}}", "y").unwrap();

    let err = merge
        .apply_substitution(&doc, &RevisionId::from("rev-1"), &fields)
        .await
        .unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(ws.document(&doc).await.unwrap().body.text(), "{{x}}");
}

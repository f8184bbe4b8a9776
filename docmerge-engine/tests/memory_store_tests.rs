use docmerge_engine::{
    edit_document, DocumentStore, EditableDocumentStore, FolderStore, MemoryWorkspace, MergeError,
    PermissionGrade, ROOT_FOLDER_ID,
};
use docmerge_model::{BatchUpdateRequest, Body, Paragraph, Request};
use docmerge_types::{FolderId, RevisionId};
use tempfile::TempDir;

const USER: &str = "alice@example.com";

fn body(lines: &[&str]) -> Body {
    let mut body = Body::default();
    for line in lines {
        body.append_paragraph(Paragraph::new(*line));
    }
    body
}

// ── Folders ─────────────────────────────────────────────────────

#[tokio::test]
async fn new_workspace_has_owned_root() {
    let ws = MemoryWorkspace::new(USER);
    let root = ws.root_folder().await.unwrap();
    assert_eq!(root.id, FolderId::from(ROOT_FOLDER_ID));
    assert_eq!(root.name, "My Drive");
    assert_eq!(ws.permission(&root).await.unwrap(), PermissionGrade::Owner);
    assert_eq!(ws.provider_name(), "Memory");
}

#[tokio::test]
async fn create_folder_requires_write_access() {
    let ws = MemoryWorkspace::new(USER);
    let root = FolderId::from(ROOT_FOLDER_ID);
    let ro = ws.add_folder("Read Only", Some(&root), PermissionGrade::View).await;
    let ro = ws.get_folder(&ro).await.unwrap();

    let err = ws.create_folder(&ro, "child").await.unwrap_err();
    assert!(matches!(err, MergeError::PermissionDenied(_)));

    let root = ws.root_folder().await.unwrap();
    let created = ws.create_folder(&root, "child").await.unwrap();
    assert_eq!(created.name, "child");
    let children = ws.folders_in(&root.id).await;
    assert_eq!(children.len(), 2);
    assert!(children.contains(&created));
    assert!(children.contains(&ro));
}

#[tokio::test]
async fn list_parents_in_enumeration_order() {
    let ws = MemoryWorkspace::new(USER);
    let a = ws.add_folder("A", None, PermissionGrade::Edit).await;
    let b = ws.add_folder("B", None, PermissionGrade::View).await;
    let doc = ws.add_document("Template", &[b.clone(), a.clone()], body(&["x"])).await;

    let parents = ws.list_parents(&doc).await.unwrap();
    let ids: Vec<FolderId> = parents.into_iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![b, a]);
}

// ── Documents ───────────────────────────────────────────────────

#[tokio::test]
async fn copy_gets_new_id_and_revision() {
    let ws = MemoryWorkspace::new(USER);
    let root = FolderId::from(ROOT_FOLDER_ID);
    let tmpl = ws.add_document("Template", &[root.clone()], body(&["Hi {{name}}"])).await;
    let original = ws.get_document(&tmpl).await.unwrap();

    let copy = ws.copy_file(&tmpl, "Copy", &root).await.unwrap();
    assert_ne!(copy.id, tmpl);
    assert_eq!(copy.name, "Copy");
    assert_eq!(copy.parents, vec![root]);

    let copied = ws.get_document(&copy.id).await.unwrap();
    assert_eq!(copied.body, original.body);
    assert_ne!(copied.revision_id, original.revision_id);
}

#[tokio::test]
async fn copy_into_read_only_folder_is_denied() {
    let ws = MemoryWorkspace::new(USER);
    let ro = ws.add_folder("Read Only", None, PermissionGrade::Comment).await;
    let tmpl = ws.add_document("Template", &[ro.clone()], body(&["x"])).await;

    let err = ws.copy_file(&tmpl, "Copy", &ro).await.unwrap_err();
    assert!(matches!(err, MergeError::PermissionDenied(_)));
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let ws = MemoryWorkspace::new(USER);
    let err = ws
        .get_document(&docmerge_types::DocumentId::from("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::DocumentNotFound(_)));
}

// ── Revision-guarded batches ────────────────────────────────────

#[tokio::test]
async fn batch_update_applies_and_advances_revision() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws
        .add_document_at_revision("Doc", &[], body(&["a {{x}} b {{x}}"]), RevisionId::from("rev-1"))
        .await;

    let request = BatchUpdateRequest::guarded(
        RevisionId::from("rev-1"),
        vec![Request::replace_all_text("{{x}}", "1")],
    );
    let response = ws.batch_update(&doc, &request).await.unwrap();
    assert_eq!(response.applied_count(), 2);

    let after = ws.get_document(&doc).await.unwrap();
    assert_eq!(after.body.text(), "a 1 b 1");
    assert_eq!(Some(&after.revision_id), response.new_revision_id());
    assert_ne!(after.revision_id, RevisionId::from("rev-1"));
}

#[tokio::test]
async fn stale_batch_is_rejected_without_effect() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws
        .add_document_at_revision("Doc", &[], body(&["{{x}}"]), RevisionId::from("rev-1"))
        .await;
    let live = ws
        .edit_externally(&doc, |b| b.append_paragraph(Paragraph::new("more {{x}}")))
        .await
        .unwrap();
    let before = ws.document(&doc).await.unwrap();

    let request = BatchUpdateRequest::guarded(
        RevisionId::from("rev-1"),
        vec![Request::replace_all_text("{{x}}", "1")],
    );
    let err = ws.batch_update(&doc, &request).await.unwrap_err();
    match err {
        MergeError::RevisionConflict { current, .. } => assert_eq!(current, Some(live)),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(ws.document(&doc).await.unwrap(), before);
}

#[tokio::test]
async fn unguarded_batch_always_applies() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws.add_document("Doc", &[], body(&["{{x}}"])).await;
    let request = BatchUpdateRequest {
        requests: vec![Request::replace_all_text("{{x}}", "y")],
        write_control: None,
    };
    ws.batch_update(&doc, &request).await.unwrap();
    assert_eq!(ws.document(&doc).await.unwrap().body.text(), "y");
}

// ── Edit handles ────────────────────────────────────────────────

#[tokio::test]
async fn second_open_is_busy_until_closed() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws.add_document("Doc", &[], body(&["x"])).await;

    let mut handle = ws.open_for_edit(&doc).await.unwrap();
    assert!(ws.is_open(&doc).await);
    assert!(matches!(
        ws.open_for_edit(&doc).await,
        Err(MergeError::DocumentBusy(_))
    ));

    handle.body_mut().append_paragraph(Paragraph::new("y"));
    // Edits are invisible until saved.
    assert_eq!(ws.document(&doc).await.unwrap().body.text(), "x");

    let base = handle.base_revision().clone();
    ws.save_and_close(handle).await.unwrap();
    assert!(!ws.is_open(&doc).await);
    let saved = ws.document(&doc).await.unwrap();
    assert_eq!(saved.body.text(), "x\ny");
    assert_ne!(saved.revision_id, base);
}

#[tokio::test]
async fn edit_document_releases_handle() {
    let ws = MemoryWorkspace::new(USER);
    let doc = ws.add_document("Doc", &[], body(&["x", "y"])).await;

    let count = edit_document(&ws, &doc, |b| {
        let n = b.num_children();
        b.clear();
        n
    })
    .await
    .unwrap();
    assert_eq!(count, 2);
    assert!(!ws.is_open(&doc).await);
    assert_eq!(ws.document(&doc).await.unwrap().body.num_children(), 0);
}

// ── Snapshots ───────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workspace.json");

    let ws = MemoryWorkspace::new(USER);
    let folder = ws.add_folder("Templates", None, PermissionGrade::Edit).await;
    let doc = ws.add_document("Invoice", &[folder.clone()], body(&["Total {{total}}"])).await;
    ws.save(&path).await.unwrap();

    let restored = MemoryWorkspace::load(&path).await.unwrap();
    assert_eq!(restored.acting_user().await, USER);
    assert_eq!(restored.document(&doc).await, ws.document(&doc).await);
    assert_eq!(restored.files_in(&folder).await.len(), 1);
}

#[tokio::test]
async fn snapshot_without_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{"acting_user": "alice@example.com", "folders": {}, "files": {}}"#,
    )
    .unwrap();

    let result = MemoryWorkspace::load(&path).await;
    assert!(matches!(result, Err(MergeError::Storage(_))));
}

#[tokio::test]
async fn snapshot_missing_file_is_storage_error() {
    let dir = TempDir::new().unwrap();
    let result = MemoryWorkspace::load(&dir.path().join("absent.json")).await;
    assert!(matches!(result, Err(MergeError::Storage(_))));
}

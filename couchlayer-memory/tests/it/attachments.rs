use couchlayer_core::backend::{Attachment, StoreBackend};
use serde_json::json;

use super::helpers::{blog_store, body};

#[tokio::test]
async fn test_attachment_lifecycle() {
    let store = blog_store().await;
    let revision = store
        .put_document("blog", body(json!({"_id": "p1"})))
        .await
        .unwrap();

    let rev = store
        .put_attachment("blog", "p1", &revision.rev, "note.txt", Attachment::new("text/plain", "hi"))
        .await
        .unwrap();
    assert!(rev.starts_with("2-"));

    let stored = store.get_document("blog", "p1").await.unwrap();
    assert_eq!(stored["_rev"], json!(rev));
    assert_eq!(
        stored["_attachments"]["note.txt"],
        json!({"content_type": "text/plain", "length": 2, "stub": true})
    );

    let fetched = store.get_attachment("blog", "p1", "note.txt").await.unwrap();
    assert_eq!(fetched, Some(Attachment::new("text/plain", "hi")));
    assert_eq!(store.get_attachment("blog", "p1", "other").await.unwrap(), None);

    let stale = store.delete_attachment("blog", "p1", &revision.rev, "note.txt").await;
    assert!(stale.unwrap_err().is_conflict());

    let rev = store.delete_attachment("blog", "p1", &rev, "note.txt").await.unwrap();
    assert!(rev.starts_with("3-"));
    assert!(!store.get_document("blog", "p1").await.unwrap().contains_key("_attachments"));
}

#[tokio::test]
async fn test_attachments_survive_plain_updates() {
    let store = blog_store().await;
    let revision = store
        .put_document("blog", body(json!({"_id": "p1"})))
        .await
        .unwrap();
    let rev = store
        .put_attachment("blog", "p1", &revision.rev, "a", Attachment::new("text/plain", "a"))
        .await
        .unwrap();

    let rev = store
        .put_document("blog", body(json!({"_id": "p1", "_rev": rev, "title": "t"})))
        .await
        .unwrap()
        .rev;
    assert!(store.get_attachment("blog", "p1", "a").await.unwrap().is_some());

    // Stubs that leave an attachment out drop it.
    store
        .put_document("blog", body(json!({"_id": "p1", "_rev": rev, "_attachments": {}})))
        .await
        .unwrap();
    assert!(store.get_attachment("blog", "p1", "a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_attachment_changes_keep_earlier_revisions() {
    let store = blog_store().await;
    let first = store
        .put_document("blog", body(json!({"_id": "p1"})))
        .await
        .unwrap();
    let second = store
        .put_attachment("blog", "p1", &first.rev, "a", Attachment::new("text/plain", "a"))
        .await
        .unwrap();
    let third = store
        .delete_attachment("blog", "p1", &second, "a")
        .await
        .unwrap();

    let bare = store.get_revision("blog", "p1", &first.rev).await.unwrap();
    assert!(!bare.contains_key("_attachments"));
    assert_eq!(bare["_rev"], json!(first.rev));

    let attached = store.get_revision("blog", "p1", &second).await.unwrap();
    assert_eq!(attached["_attachments"]["a"]["stub"], json!(true));
    assert_eq!(attached["_rev"], json!(second));

    let current = store.get_revision("blog", "p1", &third).await.unwrap();
    assert!(!current.contains_key("_attachments"));

    // A missing attachment leaves the history alone.
    let missing = store.delete_attachment("blog", "p1", &third, "a").await;
    assert!(missing.unwrap_err().is_not_found());
    assert!(store.get_revision("blog", "p1", &third).await.is_ok());
}

//! Page store replacement semantics

use readning_common::db::init_memory_database;
use readning_cue::generation::ChunkArtifact;
use readning_cue::store::{BookRecord, PageStore};

fn artifact(index: usize, emotion: &str) -> ChunkArtifact {
    ChunkArtifact {
        chunk_index: index,
        text_preview: format!("chunk {}", index),
        full_text: format!("chunk {} text", index),
        emotion: emotion.to_string(),
        artifact_url: format!("/gen_musics/b/page_1/chunk_{}/audio.wav", index),
        text_url: format!("/gen_musics/b/page_1/chunk_{}/chunk_{}.txt", index, index),
        duration: 2.0,
        success: true,
        error: None,
        processing_ms: 1,
    }
}

fn book(title: &str) -> BookRecord {
    BookRecord {
        id: "b".to_string(),
        user_id: "u".to_string(),
        title: title.to_string(),
    }
}

#[tokio::test]
async fn test_persist_replaces_previous_chunks() {
    let store = PageStore::new(init_memory_database().await.unwrap(), 1000);

    let first: Vec<_> = (1..=3).map(|i| artifact(i, "calm")).collect();
    store.persist(&book("Draft"), 1, &first, 6.0).await.unwrap();

    let second: Vec<_> = (1..=2).map(|i| artifact(i, "fear")).collect();
    store.persist(&book("Final"), 1, &second, 4.0).await.unwrap();

    let cached = store.ensure_generated("b", 1).await.unwrap().unwrap();
    assert_eq!(cached.total_duration, 4.0);
    assert_eq!(cached.chunks.len(), 2);
    assert!(cached.chunks.iter().all(|c| c.emotion == "fear"));
    assert_eq!(
        cached.chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let title: String = sqlx::query_scalar("SELECT title FROM books WHERE id = 'b'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(title, "Final");

    let chapters: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(chapters, 1);
}

#[tokio::test]
async fn test_pages_are_independent() {
    let store = PageStore::new(init_memory_database().await.unwrap(), 1000);

    store.persist(&book("T"), 1, &[artifact(1, "calm")], 2.0).await.unwrap();
    store.persist(&book("T"), 2, &[artifact(1, "joy"), artifact(2, "joy")], 4.0).await.unwrap();
    store.persist(&book("T"), 1, &[artifact(1, "sad")], 2.0).await.unwrap();

    let page_two = store.ensure_generated("b", 2).await.unwrap().unwrap();
    assert_eq!(page_two.chunks.len(), 2);
    assert_eq!(page_two.chunks[0].emotion, "joy");

    assert!(store.ensure_generated("b", 3).await.unwrap().is_none());
    assert!(store.ensure_generated("other", 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleting_book_cascades() {
    let store = PageStore::new(init_memory_database().await.unwrap(), 1000);
    store.persist(&book("T"), 1, &[artifact(1, "calm")], 2.0).await.unwrap();

    sqlx::query("DELETE FROM books WHERE id = 'b'")
        .execute(store.pool())
        .await
        .unwrap();

    let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(chunks, 0);
    assert!(store.ensure_generated("b", 1).await.unwrap().is_none());
}

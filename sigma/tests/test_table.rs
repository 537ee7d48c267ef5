mod common;

use std::sync::Arc;

use bytes::Bytes;
use common::{ACTOR_TYPE, TestState, write_read};
use sigma::{
    backend::table::DEFAULT_LIMITS,
    chunk::{self, SlotNaming},
    prelude::*,
    record::RecordWrite,
};

const LARGE_COMPACT: usize = 15 * 64 * 1024 - 256;
const LARGE_TEXT: usize = 15 * 32 * 1024 - 256;

fn table(name: &str) -> Arc<TableService> {
    Arc::new(TableService::new(name))
}

fn provider(service: &Arc<TableService>, format: Format) -> StorageProvider {
    let backend = TableBackend::new(service.clone(), DEFAULT_LIMITS);
    StorageProvider::new("table", Arc::new(backend), format)
}

#[tokio::test]
async fn test_write_read() {
    common::init_tracing();
    let service = table("write_read");

    for format in [Format::Compact, Format::Text] {
        let storage = provider(&service, format);
        write_read(&storage, &ActorIdentity::random("Store"), TestState::random(None)).await;
    }
}

#[tokio::test]
async fn test_large_state_is_chunked() {
    let service = table("chunked");
    let storage = provider(&service, Format::Compact);
    let id = ActorIdentity::random("Store");

    write_read(&storage, &id, TestState::random(Some(LARGE_COMPACT))).await;

    let columns = service.columns(&id.record_key(ACTOR_TYPE)).unwrap();
    assert_eq!(columns.len(), 15);
    assert!(columns.iter().all(|name| name.starts_with("slot_")));
}

#[tokio::test]
async fn test_large_text_state_fits() {
    let service = table("large_text");
    let storage = provider(&service, Format::Text);
    let id = ActorIdentity::random("Store");

    write_read(&storage, &id, TestState::random(Some(LARGE_TEXT))).await;

    let columns = service.columns(&id.record_key(ACTOR_TYPE)).unwrap();
    assert_eq!(columns.len(), 15);
    assert!(columns.iter().all(|name| name.starts_with("text_")));
}

#[tokio::test]
async fn test_text_too_large_for_compact_limits() {
    let service = table("too_large");
    let compact = provider(&service, Format::Compact);
    let text = provider(&service, Format::Text);
    let state = TestState::random(Some(LARGE_COMPACT));

    let mut written = ActorState::new(state.clone());
    compact
        .write_state(ACTOR_TYPE, &ActorIdentity::random("Store"), &mut written)
        .await
        .unwrap();

    let id = ActorIdentity::random("Store");
    let mut rejected = ActorState::new(state);
    let err = text
        .write_state(ACTOR_TYPE, &id, &mut rejected)
        .await
        .unwrap_err();

    assert!(err.is_capacity(), "unexpected error: {err}");
    assert_eq!(rejected.token, VersionToken::NEW_RECORD);
    assert!(service.columns(&id.record_key(ACTOR_TYPE)).is_none());
}

#[tokio::test]
async fn test_oversized_write_leaves_existing_record() {
    let service = table("oversized");
    let storage = provider(&service, Format::Compact);
    let id = ActorIdentity::random("Store");

    let mut state = ActorState::new(TestState::hello());
    storage.write_state(ACTOR_TYPE, &id, &mut state).await.unwrap();
    let token = state.token.clone();

    state.state = TestState::random(Some(16 * 64 * 1024));
    let err = storage
        .write_state(ACTOR_TYPE, &id, &mut state)
        .await
        .unwrap_err();
    assert!(err.is_capacity());
    assert_eq!(state.token, token);

    let mut stored = ActorState::<TestState>::default();
    storage.read_state(ACTOR_TYPE, &id, &mut stored).await.unwrap();
    assert_eq!(stored.state, TestState::hello());
    assert_eq!(stored.token, token);
}

#[tokio::test]
async fn test_write_clear_read() {
    let service = table("clear");

    for (format, len) in [(Format::Compact, LARGE_COMPACT), (Format::Text, LARGE_TEXT)] {
        let storage = provider(&service, format);
        let id = ActorIdentity::random("Store");

        let mut state = ActorState::new(TestState::random(Some(len)));
        storage.write_state(ACTOR_TYPE, &id, &mut state).await.unwrap();
        storage.clear_state(ACTOR_TYPE, &id, &mut state).await.unwrap();

        assert_eq!(state, ActorState::new(TestState::default()));

        let mut stored = ActorState::new(TestState::default());
        storage.read_state(ACTOR_TYPE, &id, &mut stored).await.unwrap();
        assert_eq!(stored.state, TestState::default());
        assert_eq!(stored.token, VersionToken::NEW_RECORD);
    }
}

#[tokio::test]
async fn test_change_read_format() {
    let service = TableService::shared("change_read_format");
    let id = ActorIdentity::random("Store");

    let compact = StorageProvider::activate(
        "Store",
        &ProviderConfig::new()
            .with("provider", "table")
            .with("table_name", "change_read_format")
            .with("format", "compact"),
    )
    .unwrap();

    let mut state = ActorState::new(TestState::hello());
    compact.write_state(ACTOR_TYPE, &id, &mut state).await.unwrap();

    // Reopen the same table configured for text
    let text = StorageProvider::activate(
        "Store",
        &ProviderConfig::new()
            .with("provider", "table")
            .with("table_name", "change_read_format")
            .with("use_json", "true"),
    )
    .unwrap();
    assert_eq!(text.format(), Format::Text);

    let mut stored = ActorState::<TestState>::default();
    text.read_state(ACTOR_TYPE, &id, &mut stored).await.unwrap();

    assert_eq!(stored.state, TestState::hello());
    assert_eq!(stored.token, state.token);
    assert_eq!(service.len(), 1);
}

#[tokio::test]
async fn test_change_write_format() {
    let service = table("change_write_format");

    for (first, second) in [(Format::Compact, Format::Text), (Format::Text, Format::Compact)] {
        let id = ActorIdentity::random("Store");
        write_read(
            &provider(&service, first),
            &id,
            TestState::random(Some(LARGE_TEXT)),
        )
        .await;

        let storage = provider(&service, second);
        let mut overwrite = ActorState::new(TestState::random(None))
            .with_token(VersionToken::UNCONDITIONAL);
        storage.write_state(ACTOR_TYPE, &id, &mut overwrite).await.unwrap();

        let mut stored = ActorState::<TestState>::default();
        storage.read_state(ACTOR_TYPE, &id, &mut stored).await.unwrap();
        assert_eq!(stored.state, overwrite.state);

        // The first write's columns are gone
        let columns = service.columns(&id.record_key(ACTOR_TYPE)).unwrap();
        assert_eq!(columns.len(), 1);
    }
}

#[tokio::test]
async fn test_stale_columns_after_shrinking() {
    let service = table("shrinking");
    let storage = provider(&service, Format::Compact);
    let id = ActorIdentity::random("Store");

    let mut state = ActorState::new(TestState::random(Some(5 * 64 * 1024)));
    storage.write_state(ACTOR_TYPE, &id, &mut state).await.unwrap();
    assert_eq!(service.columns(&id.record_key(ACTOR_TYPE)).unwrap().len(), 6);

    state.state = TestState::random(Some(70 * 1024));
    storage.write_state(ACTOR_TYPE, &id, &mut state).await.unwrap();
    assert_eq!(
        service.columns(&id.record_key(ACTOR_TYPE)).unwrap(),
        ["slot_0", "slot_1"]
    );

    let mut stored = ActorState::<TestState>::default();
    storage.read_state(ACTOR_TYPE, &id, &mut stored).await.unwrap();
    assert_eq!(stored.state, state.state);
}

#[tokio::test]
async fn test_gap_truncates_payload() {
    let service = table("gap");
    let backend = TableBackend::new(service.clone(), DEFAULT_LIMITS);
    let storage = StorageProvider::new("table", Arc::new(backend.clone()), Format::Compact);
    let id = ActorIdentity::random("Store");
    let key = id.record_key(ACTOR_TYPE);

    let mut state = ActorState::new(TestState::random(Some(3 * 64 * 1024)));
    storage.write_state(ACTOR_TYPE, &id, &mut state).await.unwrap();

    // Drop a middle slot behind the provider's back
    let write = RecordWrite {
        slots: chunk::split(Bytes::new(), &DEFAULT_LIMITS, SlotNaming::BINARY).unwrap(),
        removals: vec![SlotNaming::BINARY.name(1)],
    };
    backend.put_record(&key, write, &state.token).await.unwrap();

    let mut stored = ActorState::<TestState>::default();
    let err = storage
        .read_state(ACTOR_TYPE, &id, &mut stored)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Decode(_)));
    assert_eq!(stored, ActorState::default());
}

#[tokio::test]
async fn test_unavailable_is_not_a_conflict() {
    let service = table("unavailable");
    let storage = provider(&service, Format::Compact);
    let id = ActorIdentity::random("Store");

    service.set_available(false);

    let mut state = ActorState::new(TestState::hello());
    let err = storage
        .write_state(ACTOR_TYPE, &id, &mut state)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::BackendUnavailable(_)));
    assert_eq!(state.token, VersionToken::NEW_RECORD);

    let err = storage
        .read_state(ACTOR_TYPE, &id, &mut state)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::BackendUnavailable(_)));

    service.set_available(true);
    storage.write_state(ACTOR_TYPE, &id, &mut state).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_with_same_token() {
    let service = table("concurrent");
    let storage = provider(&service, Format::Text);
    let id = ActorIdentity::random("Store");

    let mut base = ActorState::new(TestState::hello());
    storage.write_state(ACTOR_TYPE, &id, &mut base).await.unwrap();

    let (a, b) = tokio::join!(
        {
            let mut state = base.clone();
            let storage = storage.clone();
            let id = id.clone();
            tokio::spawn(async move { storage.write_state(ACTOR_TYPE, &id, &mut state).await })
        },
        {
            let mut state = base.clone();
            let storage = storage.clone();
            let id = id.clone();
            tokio::spawn(async move { storage.write_state(ACTOR_TYPE, &id, &mut state).await })
        }
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_ok() != b.is_ok());
    assert!(a.err().or(b.err()).unwrap().is_conflict());
}

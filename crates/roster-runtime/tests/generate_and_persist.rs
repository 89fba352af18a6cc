use persistence::{IdentityReturn, MemoryStore, NamePoolProvider, SqliteStore};
use roster_core::{validate_player, ConfigError, NamePool};
use roster_gen::seeded_rng;
use roster_runtime::{Engine, GenerationError, GenerationRequest, InsertMode, PREVIEW_LEN};

fn names() -> NamePool {
    NamePool::new(["Kai", "Jun", "Ming"], ["Lin", "Wu", "O"]).unwrap()
}

fn engine(store: MemoryStore, seed: u64) -> Engine<MemoryStore, NamePool, rand_chacha::ChaCha8Rng> {
    Engine::new(store, names(), seeded_rng(Some(seed)))
}

fn identities(summary: &roster_runtime::GenerationSummary) -> Vec<Option<i64>> {
    summary.preview.iter().map(|p| p.identity).collect()
}

#[test]
fn zero_count_does_nothing() {
    for request in [GenerationRequest::single(0, 1), GenerationRequest::bulk(0, 1, 10)] {
        let mut engine = engine(MemoryStore::default(), 1);
        let summary = engine.generate_and_persist(&request).unwrap();
        assert_eq!(summary.total_generated, 0);
        assert_eq!(summary.total_inserted, 0);
        assert!(summary.preview.is_empty());
        assert_eq!(engine.store().flush_count(), 0);
        assert!(engine.store().is_empty());
    }
}

#[test]
fn bulk_preview_gets_ids_across_batches() {
    let mut engine = engine(MemoryStore::default(), 2);
    let summary = engine
        .generate_and_persist(&GenerationRequest::bulk(5, 3, 2))
        .unwrap();
    assert_eq!(summary.total_generated, 5);
    assert_eq!(summary.total_inserted, 5);
    assert_eq!(summary.mode, InsertMode::Bulk);
    assert_eq!(engine.store().flush_count(), 3);
    assert_eq!(
        identities(&summary),
        vec![Some(1), Some(2), Some(3), Some(4), Some(5)]
    );
    assert_eq!(summary.inserted_ids, Some(vec![1, 2, 3, 4, 5]));
    for (entry, (id, row)) in summary.preview.iter().zip(engine.store().rows()) {
        assert_eq!(Some(*id), entry.identity);
        assert_eq!(&entry.record, row);
    }
}

#[test]
fn single_mode_previews_first_five() {
    let mut engine = engine(MemoryStore::default(), 3);
    let summary = engine
        .generate_and_persist(&GenerationRequest::single(7, 9))
        .unwrap();
    assert_eq!(summary.total_inserted, 7);
    assert_eq!(summary.preview.len(), PREVIEW_LEN);
    assert_eq!(summary.inserted_ids.as_deref(), Some(&[1, 2, 3, 4, 5, 6, 7][..]));
    assert_eq!(identities(&summary), vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    assert!(engine.store().rows().iter().all(|(_, r)| r.owner_id == 9));
    assert!(engine
        .store()
        .rows()
        .iter()
        .all(|(_, r)| validate_player(r).is_ok()));
}

#[test]
fn count_only_store_leaves_preview_unidentified() {
    let mut engine = engine(MemoryStore::new(IdentityReturn::AffectedCount), 4);
    let summary = engine
        .generate_and_persist(&GenerationRequest::bulk(6, 1, 4))
        .unwrap();
    assert_eq!(summary.total_inserted, 6);
    assert_eq!(summary.inserted_ids, None);
    assert!(identities(&summary).iter().all(Option::is_none));
}

#[test]
fn failed_flush_keeps_committed_batches() {
    let mut engine = engine(MemoryStore::default().fail_flush_after(2), 5);
    let err = engine
        .generate_and_persist(&GenerationRequest::bulk(10, 1, 2))
        .unwrap_err();
    let partial = err.partial().expect("persistence failure carries a summary");
    assert_eq!(partial.total_inserted, 4);
    assert_eq!(partial.total_generated, 6);
    assert_eq!(partial.shortfall(10), 6);
    assert_eq!(
        identities(partial),
        vec![Some(1), Some(2), Some(3), Some(4), None]
    );
    assert_eq!(engine.store().len(), 4);
    assert!(matches!(err, GenerationError::Persistence { requested: 10, .. }));
}

#[test]
fn failed_single_insert_stops_the_call() {
    let mut engine = engine(MemoryStore::default().fail_insert_after(3), 6);
    let err = engine
        .generate_and_persist(&GenerationRequest::single(5, 1))
        .unwrap_err();
    let partial = err.partial().unwrap();
    assert_eq!(partial.total_inserted, 3);
    assert_eq!(partial.inserted_ids, Some(vec![1, 2, 3]));
    assert_eq!(partial.preview.len(), 3);
    assert_eq!(engine.store().len(), 3);
}

struct NoNames;

impl NamePoolProvider for NoNames {
    fn load(&self) -> Result<NamePool, ConfigError> {
        Err(ConfigError::EmptyFirstNames)
    }
}

#[test]
fn empty_name_source_fails_before_generating() {
    let mut engine = Engine::new(MemoryStore::default(), NoNames, seeded_rng(Some(7)));
    let err = engine
        .generate_and_persist(&GenerationRequest::bulk(3, 1, 2))
        .unwrap_err();
    assert!(matches!(err, GenerationError::Config(ConfigError::EmptyFirstNames)));
    assert!(err.partial().is_none());
    assert!(engine.store().is_empty());
}

#[test]
fn request_pool_overrides_provider() {
    let mut engine = Engine::new(MemoryStore::default(), NoNames, seeded_rng(Some(8)));
    let pool = NamePool::new(["Ari"], ["Sun"]).unwrap();
    let summary = engine
        .generate_and_persist(&GenerationRequest::single(4, 1).with_name_pool(pool))
        .unwrap();
    assert!(summary.preview.iter().all(|p| p.record.name == "Ari Sun"));
}

#[test]
fn same_seed_same_players() {
    let run = |seed| {
        let mut engine = engine(MemoryStore::default(), seed);
        engine
            .generate_and_persist(&GenerationRequest::bulk(20, 1, 7))
            .unwrap();
        let (store, _, _) = engine.into_parts();
        store
            .rows()
            .iter()
            .map(|(_, r)| (r.name.clone(), r.overall_grade, r.height_cm, r.sum_all_stats()))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(11), run(11));
    assert_ne!(run(11), run(12));
}

#[test]
fn summary_serializes_flat_preview() {
    let mut engine = engine(MemoryStore::default(), 9);
    let summary = engine
        .generate_and_persist(&GenerationRequest::bulk(2, 5, 10))
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["total_generated"], 2);
    assert_eq!(json["mode"], "bulk");
    assert_eq!(json["preview"][0]["identity"], 1);
    assert_eq!(json["preview"][0]["owner_id"], 5);
    assert!(json["preview"][0]["ath_stamina"].is_u64());
    assert_eq!(json["inserted_ids"], serde_json::json!([1, 2]));
}

#[test]
fn sqlite_end_to_end() {
    let mut store = SqliteStore::connect("sqlite::memory:", IdentityReturn::Ids).unwrap();
    store.seed_names(&names()).unwrap();
    let pool = store.load().unwrap();

    let mut engine = Engine::new(&mut store, pool, seeded_rng(Some(10)));
    let summary = engine
        .generate_and_persist(&GenerationRequest::bulk(12, 77, 5))
        .unwrap();
    let single = engine
        .generate_and_persist(&GenerationRequest::single(2, 77))
        .unwrap();
    drop(engine);

    assert_eq!(summary.total_inserted, 12);
    let ids = summary.inserted_ids.clone().unwrap();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let stored = store.players_of(77).unwrap();
    assert_eq!(stored.len(), 14);
    for entry in &summary.preview {
        let id = entry.identity.unwrap();
        let (_, row) = stored.iter().find(|(sid, _)| *sid == id).unwrap();
        assert_eq!(row, &entry.record);
    }
    assert_eq!(single.preview[0].identity, Some(stored[12].0));
    store.close();
}

#[test]
fn sqlite_failed_flush_rolls_back_only_itself() {
    let mut store = SqliteStore::connect("sqlite::memory:", IdentityReturn::Ids).unwrap();
    store.seed_names(&names()).unwrap();
    store
        .block_on(
            sqlx::query(
                "CREATE TRIGGER cap_roster BEFORE INSERT ON players_basic \
                 WHEN (SELECT COUNT(*) FROM players_basic) >= 5 \
                 BEGIN SELECT RAISE(ABORT, 'roster full'); END",
            )
            .execute(store.pool()),
        )
        .unwrap();
    let pool = store.load().unwrap();

    let mut engine = Engine::new(&mut store, pool, seeded_rng(Some(13)));
    let err = engine
        .generate_and_persist(&GenerationRequest::bulk(9, 21, 3))
        .unwrap_err();
    drop(engine);

    assert!(matches!(err, GenerationError::Persistence { requested: 9, .. }));
    let partial = err.partial().unwrap();
    assert_eq!(partial.total_generated, 6);
    assert_eq!(partial.total_inserted, 3);
    assert_eq!(partial.shortfall(9), 6);

    // The second flush hit the trigger on its third row; its first two rows
    // must not survive.
    let stored = store.players_of(21).unwrap();
    assert_eq!(stored.len(), partial.total_inserted);
    let committed: Vec<i64> = stored.iter().map(|(id, _)| *id).collect();
    assert_eq!(partial.inserted_ids.as_deref(), Some(committed.as_slice()));

    let ids = identities(partial);
    assert!(ids[..3].iter().all(Option::is_some));
    assert_eq!(&ids[3..], &[None, None]);
    for (entry, (id, row)) in partial.preview.iter().zip(&stored) {
        assert_eq!(entry.identity, Some(*id));
        assert_eq!(&entry.record, row);
    }
    store.close();
}

proptest::proptest! {
    #[test]
    fn preview_ids_match_first_inserted(
        count in 0usize..40,
        batch in 1usize..12,
        seed in 0u64..1000,
    ) {
        let mut engine = engine(MemoryStore::default(), seed);
        let summary = engine
            .generate_and_persist(&GenerationRequest::bulk(count, 1, batch))
            .unwrap();
        proptest::prop_assert_eq!(summary.total_inserted, count);
        proptest::prop_assert_eq!(summary.preview.len(), count.min(PREVIEW_LEN));
        proptest::prop_assert_eq!(engine.store().flush_count(), count.div_ceil(batch));
        let expected: Vec<Option<i64>> = (1..=summary.preview.len() as i64).map(Some).collect();
        proptest::prop_assert_eq!(identities(&summary), expected);
    }
}

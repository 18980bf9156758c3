//! 文単位のクリーンアップに関するテスト
//!
//! 候補集合の解放、デコードキャッシュの縮小、遅延インデックスの作業集合の縮小と、
//! 縮小後も検索結果が変わらないことを検証します。

use std::sync::Arc;

use crate::model::ResidencyMode;
use crate::model::index::SourceIndex;
use crate::table::PhraseTable;
use crate::test_utils::{identity_scoring, many_blocks_builder, write_fixture};

const NUM_PHRASES: usize = 40;

fn source(i: usize) -> [String; 1] {
    [format!("s{i:03}")]
}

#[test]
fn test_cleanup_releases_collections() {
    let fixture = write_fixture(&many_blocks_builder(NUM_PHRASES));
    for mode in [ResidencyMode::InMemory, ResidencyMode::OnDisk] {
        let table = PhraseTable::from_path(&fixture.path, mode, identity_scoring(2)).unwrap();
        let mut worker = table.new_worker();

        let kept = worker.lookup(&source(3)).unwrap().unwrap();
        worker.lookup(&source(3)).unwrap().unwrap();
        worker.lookup(&source(4)).unwrap().unwrap();
        assert_eq!(worker.sentence_cache().len(), 3);
        assert_eq!(Arc::strong_count(&kept), 2);

        assert_eq!(worker.cleanup_after_sentence(), 3);
        assert!(worker.sentence_cache().is_empty());
        // 呼び出し側が保持している参照は有効なままです。
        assert_eq!(Arc::strong_count(&kept), 1);
        assert_eq!(kept.len(), 2);
    }
}

#[test]
fn test_decode_cache_is_pruned() {
    let fixture = write_fixture(&many_blocks_builder(NUM_PHRASES));
    let table = PhraseTable::from_path(&fixture.path, ResidencyMode::InMemory, identity_scoring(2))
        .unwrap()
        .decode_cache_capacity(5);
    let mut worker = table.new_worker();

    for i in 0..NUM_PHRASES {
        worker.lookup(&source(i)).unwrap().unwrap();
    }
    assert_eq!(worker.decode_cache().len(), NUM_PHRASES);
    worker.cleanup_after_sentence();
    assert_eq!(worker.decode_cache().len(), 5);

    // 容量内であれば縮小されません。
    worker.lookup(&source(0)).unwrap().unwrap();
    worker.cleanup_after_sentence();
    assert_eq!(worker.decode_cache().len(), 6);
}

#[test]
fn test_zero_cache_capacity() {
    let fixture = write_fixture(&many_blocks_builder(NUM_PHRASES));
    let table = PhraseTable::from_path(&fixture.path, ResidencyMode::OnDisk, identity_scoring(2))
        .unwrap()
        .decode_cache_capacity(0);
    let mut worker = table.new_worker();

    worker.lookup(&source(1)).unwrap().unwrap();
    assert_eq!(worker.decode_cache().len(), 1);
    worker.cleanup_after_sentence();
    assert!(worker.decode_cache().is_empty());
}

#[test]
fn test_default_policy_evicts_lazy_blocks() {
    let fixture = write_fixture(&many_blocks_builder(NUM_PHRASES));
    let table = PhraseTable::from_path(&fixture.path, ResidencyMode::OnDisk, identity_scoring(2))
        .unwrap()
        .table_limit(0);
    let index = table.model().index();
    assert_eq!(index.num_blocks(), NUM_PHRASES / 2);
    assert_eq!(index.num_resident_blocks(), 0);

    let mut worker = table.new_worker();
    for i in 0..NUM_PHRASES {
        worker.lookup(&source(i)).unwrap().unwrap();
    }
    assert_eq!(index.num_resident_blocks(), NUM_PHRASES / 2);

    worker.cleanup_after_sentence();
    assert_eq!(index.num_resident_blocks(), 0);

    // 縮小後も検索結果は変わりません。
    let mut worker = table.new_worker();
    for i in 0..NUM_PHRASES {
        let candidates = worker.lookup(&source(i)).unwrap().unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates.best().unwrap().future_score(), i as f32);
    }
}

#[test]
fn test_policy_keeps_recent_blocks() {
    let fixture = write_fixture(&many_blocks_builder(NUM_PHRASES));
    // 20ブロック: 6ブロックを超えたら最近使われた4ブロックを残す
    let table = PhraseTable::from_path(&fixture.path, ResidencyMode::OnDisk, identity_scoring(2))
        .unwrap()
        .eviction_policy(0.25, 0.2)
        .unwrap();
    let index = table.model().index();

    let mut worker = table.new_worker();
    for i in 0..NUM_PHRASES {
        worker.lookup(&source(i)).unwrap().unwrap();
    }

    // 新しいワーカーはデコードキャッシュが空なので、インデックスを参照します。
    let mut recent = table.new_worker();
    for i in 0..8 {
        recent.lookup(&source(i)).unwrap().unwrap();
    }
    recent.cleanup_after_sentence();
    assert_eq!(index.num_resident_blocks(), 4);

    // 作業集合が上限内なので、これ以上は縮小されません。
    recent.cleanup_after_sentence();
    assert_eq!(index.num_resident_blocks(), 4);

    worker.cleanup_after_sentence();
    let mut fresh = table.new_worker();
    let candidates = fresh.lookup(&source(NUM_PHRASES - 1)).unwrap().unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(index.num_resident_blocks(), 5);
}

#[test]
fn test_resident_index_ignores_policy() {
    let fixture = write_fixture(&many_blocks_builder(NUM_PHRASES));
    let table = PhraseTable::from_path(&fixture.path, ResidencyMode::InMemory, identity_scoring(2))
        .unwrap();
    let index = table.model().index();

    let mut worker = table.new_worker();
    worker.lookup(&source(0)).unwrap().unwrap();
    worker.cleanup_after_sentence();
    assert_eq!(index.num_resident_blocks(), index.num_blocks());
}

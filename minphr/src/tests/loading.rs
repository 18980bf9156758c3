//! 辞書ファイルの読み込みに関するテスト
//!
//! 拡張子の解決、セクションの検証、配置方法ごとのバックエンドの選択を検証します。

use std::fs::{self, OpenOptions};

use crate::errors::MinphrError;
use crate::model::index::SourceIndex;
use crate::model::{CompactModel, ResidencyMode};
use crate::scoring::ScoringContext;
use crate::table::PhraseTable;
use crate::test_utils::{scenario_builder, write_fixture};
use crate::utils::padding_len;

const MODES: [ResidencyMode; 2] = [ResidencyMode::InMemory, ResidencyMode::OnDisk];

#[test]
fn test_load_both_modes() {
    let fixture = write_fixture(&scenario_builder());
    for mode in MODES {
        let model = CompactModel::from_path(&fixture.path, mode).unwrap();
        assert_eq!(model.mode(), mode);
        assert_eq!(model.index().num_entries(), 3);
        assert_eq!(model.index().is_lazy(), mode == ResidencyMode::OnDisk);
        assert_eq!(model.store().is_mapped(), mode == ResidencyMode::OnDisk);
        assert_eq!(model.max_source_phrase_length(), 4);
        assert_eq!(model.num_scores(), 1);
        assert_eq!(model.store().num_phrases(), 4);
    }
}

#[test]
fn test_suffix_is_appended() {
    let fixture = write_fixture(&scenario_builder());
    let bare = fixture.path.with_extension("");
    let model = CompactModel::from_path(&bare, ResidencyMode::InMemory).unwrap();
    assert_eq!(model.path(), fixture.path.as_path());
}

#[test]
fn test_missing_file_with_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let result = CompactModel::from_path(dir.path().join("none.minphr"), ResidencyMode::InMemory);
    assert!(matches!(result, Err(MinphrError::InvalidArgument(_))));
}

#[test]
fn test_bare_path_is_never_opened() {
    let fixture = write_fixture(&scenario_builder());
    let bare = fixture.path.with_extension("");
    fs::rename(&fixture.path, &bare).unwrap();

    for mode in MODES {
        let result = CompactModel::from_path(&bare, mode);
        assert!(matches!(result, Err(MinphrError::InvalidArgument(_))));
    }
}

#[test]
fn test_directory_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.minphr");
    fs::create_dir(&path).unwrap();
    let result = CompactModel::from_path(&path, ResidencyMode::InMemory);
    assert!(matches!(result, Err(MinphrError::PathIsDirectory(_))));
}

#[test]
fn test_magic_mismatch() {
    let fixture = write_fixture(&scenario_builder());
    let mut bytes = fs::read(&fixture.path).unwrap();
    bytes[0] = b'X';
    fs::write(&fixture.path, bytes).unwrap();

    for mode in MODES {
        let result = CompactModel::from_path(&fixture.path, mode);
        assert!(matches!(result, Err(MinphrError::InvalidFormat(_))));
    }
}

#[test]
fn test_truncated_file() {
    let fixture = write_fixture(&scenario_builder());
    let len = fs::metadata(&fixture.path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&fixture.path).unwrap();
    file.set_len(len - 40).unwrap();
    drop(file);

    for mode in MODES {
        let result = CompactModel::from_path(&fixture.path, mode);
        assert!(matches!(result, Err(MinphrError::InvalidFormat(_))));
    }
}

#[test]
fn test_truncated_in_index() {
    let fixture = write_fixture(&scenario_builder());
    let file = OpenOptions::new().write(true).open(&fixture.path).unwrap();
    file.set_len(48).unwrap();
    drop(file);

    for mode in MODES {
        let result = CompactModel::from_path(&fixture.path, mode);
        assert!(matches!(result, Err(MinphrError::InvalidFormat(_))));
    }
}

/// `section`番目(0始まり)のセクションヘッダーの位置を返します。
fn section_header_offset(bytes: &[u8], section: usize) -> usize {
    let mut offset = 16;
    for _ in 0..section {
        let mut len = [0; 8];
        len.copy_from_slice(&bytes[offset..offset + 8]);
        let len = usize::try_from(u64::from_le_bytes(len)).unwrap();
        offset += 16 + len + padding_len(len);
    }
    offset
}

#[test]
fn test_oversized_section_len() {
    for section in 0..3 {
        let fixture = write_fixture(&scenario_builder());
        let mut bytes = fs::read(&fixture.path).unwrap();
        let offset = section_header_offset(&bytes, section);
        bytes[offset..offset + 8].copy_from_slice(&(1u64 << 45).to_le_bytes());
        fs::write(&fixture.path, bytes).unwrap();

        for mode in MODES {
            let result = CompactModel::from_path(&fixture.path, mode);
            assert!(
                matches!(result, Err(MinphrError::InvalidFormat(_))),
                "section {section} in {mode:?}"
            );
        }
    }
}

#[test]
fn test_weight_count_mismatch() {
    let fixture = write_fixture(&scenario_builder());
    let scoring = ScoringContext::new(vec![1.0, 1.0], 0.0);
    let result = PhraseTable::from_path(&fixture.path, ResidencyMode::InMemory, scoring);
    assert!(matches!(result, Err(MinphrError::InvalidArgument(_))));
}

#[test]
fn test_invalid_eviction_policy() {
    let fixture = write_fixture(&scenario_builder());
    let scoring = ScoringContext::new(vec![1.0], 0.0);
    let table = PhraseTable::from_path(&fixture.path, ResidencyMode::OnDisk, scoring).unwrap();
    assert!(table.clone().eviction_policy(0.0, 0.2).is_err());
    assert!(table.clone().eviction_policy(0.5, 1.0).is_err());
    assert!(table.eviction_policy(1.0, 0.0).is_ok());
}

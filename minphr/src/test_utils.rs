//! テスト用ユーティリティ
//!
//! 小さなフレーズテーブルを一時ディレクトリに構築する関数を提供します。

use std::fs::File;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::model::builder::PhraseTableBuilder;
use crate::scoring::ScoringContext;

/// 一時ディレクトリに書き出された辞書ファイル
///
/// ディレクトリは値がドロップされるまで残ります。
pub(crate) struct Fixture {
    _dir: TempDir,
    pub(crate) path: PathBuf,
}

/// ビルダーの内容を`phrase-table.minphr`として書き出します。
pub(crate) fn write_fixture(builder: &PhraseTableBuilder) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phrase-table.minphr");
    builder.write(File::create(&path).unwrap()).unwrap();
    Fixture { _dir: dir, path }
}

/// 基本的な検索シナリオ用のビルダーを返します。
///
/// - `a b`: `x`(0.9), `y z`(0.5), `w`(0.1)
/// - `a b c d`: 最大長(4)のフレーズ
/// - `c`: 候補1つ
pub(crate) fn scenario_builder() -> PhraseTableBuilder {
    let mut builder = PhraseTableBuilder::new();
    builder.add_record(&["a", "b"], &["x"], &[0.9]).unwrap();
    builder.add_record(&["a", "b"], &["y", "z"], &[0.5]).unwrap();
    builder.add_record(&["a", "b"], &["w"], &[0.1]).unwrap();
    builder.add_record(&["a", "b", "c", "d"], &["v"], &[0.3]).unwrap();
    builder.add_record(&["c"], &["x"], &[0.7]).unwrap();
    builder
}

/// 多数のインデックスブロックを持つビルダーを返します。
///
/// ソースフレーズ`s{i}`(`0 <= i < n`)はそれぞれ2つの候補を持ち、
/// インデックスブロックあたりのキー数は2です。
pub(crate) fn many_blocks_builder(n: usize) -> PhraseTableBuilder {
    let mut builder = PhraseTableBuilder::new().keys_per_block(2).unwrap();
    for i in 0..n {
        let source = format!("s{i:03}");
        let first = format!("t{i}");
        builder
            .add_record(&[source.as_str()], &[first.as_str()], &[i as f32, 1.0])
            .unwrap();
        builder
            .add_record(&[source.as_str()], &["common"], &[0.0, 0.5])
            .unwrap();
    }
    builder
}

/// スコアをそのまま推定スコアとするコンテキストを返します。
pub(crate) fn identity_scoring(num_scores: usize) -> ScoringContext {
    let mut weights = vec![0.0; num_scores];
    weights[0] = 1.0;
    ScoringContext::new(weights, 0.0)
}

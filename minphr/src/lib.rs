//! # minphr
//!
//! minphrは、統計的機械翻訳のためのコンパクトなフレーズテーブルの実行時ライブラリです。
//!
//! ## 概要
//!
//! ソース言語のトークン列を受け取り、事前に計算されたターゲット言語の候補フレーズと
//! そのスコアを返します。辞書はrkyvアーカイブとLEB128可変長整数で符号化された
//! 単一のファイルで、すべてをメモリに読み込むことも、ディスク上に置いたまま
//! (遅延インデックスとメモリマップ)使うこともできます。
//!
//! ## 主な機能
//!
//! - **2つの配置方法**: [`ResidencyMode::InMemory`]と[`ResidencyMode::OnDisk`]
//! - **ワーカー単位のキャッシュ**: デコード結果のキャッシュと文単位の候補レジストリ
//! - **上位K件の選択**: 全体をソートせずに推定スコアの上位候補を選択
//! - **辞書の構築**: テキスト形式のフレーズテーブルからのビルド
//!
//! ## 使用例
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use minphr::{PhraseTable, PhraseTableBuilder, ResidencyMode, ScoringContext};
//!
//! let text = "das haus ||| the house ||| 0.9\n\
//!             das haus ||| the building ||| 0.5\n\
//!             das haus ||| a house ||| 0.1\n";
//! let builder = PhraseTableBuilder::from_reader(text.as_bytes(), Default::default())?;
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("phrase-table.minphr");
//! builder.write(std::fs::File::create(&path)?)?;
//!
//! let scoring = ScoringContext::new(vec![1.0], 0.0);
//! let table = PhraseTable::from_path(&path, ResidencyMode::InMemory, scoring)?.table_limit(2);
//! let mut worker = table.new_worker();
//!
//! let candidates = worker.lookup(&["das", "haus"])?.unwrap();
//! assert_eq!(candidates.len(), 2);
//! assert_eq!(candidates.best().unwrap().to_string(), "the house ||| 0.9 ||| 0.9");
//!
//! assert!(worker.lookup(&["das", "auto"])?.is_none());
//! worker.cleanup_after_sentence();
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("`target_pointer_width` must be 32 or 64");

/// エラー型の定義
pub mod errors;

/// 辞書ファイルの読み込みと構築
pub mod model;

/// ターゲットフレーズ候補
pub mod phrase;

/// 推定スコアの計算
pub mod scoring;

/// フレーズテーブルとワーカー
pub mod table;

/// 内部ユーティリティ関数
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-exports
pub use model::builder::{PhraseTableBuilder, ScoreTransform};
pub use model::{CompactModel, ResidencyMode};
pub use phrase::{TargetPhrase, TargetPhraseCollection};
pub use scoring::{LanguageModel, ScoringContext};
pub use table::PhraseTable;
pub use table::worker::Worker;

/// このライブラリのバージョン番号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

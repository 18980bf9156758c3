//! フレーズテーブルの検索インターフェース
//!
//! # 主要な構造体
//!
//! - [`PhraseTable`]: 読み込み済みのモデルと設定を保持し、スレッド間で共有されます。
//! - [`Worker`]: スレッドごとのデコードキャッシュと文単位のレジストリを持ち、実際の検索を行います。
//!
//! # 例
//!
//! ```no_run
//! use minphr::{PhraseTable, ResidencyMode, ScoringContext};
//!
//! let scoring = ScoringContext::new(vec![0.2, 0.2, 0.2, 0.2], 0.5);
//! let table = PhraseTable::from_path("model/phrase-table", ResidencyMode::OnDisk, scoring)?
//!     .table_limit(20);
//! let mut worker = table.new_worker();
//!
//! if let Some(candidates) = worker.lookup(&["das", "haus"])? {
//!     for cand in candidates.iter() {
//!         println!("{cand}");
//!     }
//! }
//! worker.cleanup_after_sentence();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod decode_cache;
pub mod decoder;
pub mod sentence_cache;
pub mod worker;

use std::path::Path;
use std::sync::Arc;

use crate::errors::{MinphrError, Result};
use crate::model::{CompactModel, ResidencyMode};
use crate::scoring::ScoringContext;
use crate::table::decoder::PhraseDecoder;
use crate::table::worker::Worker;

/// 1回の検索で返す候補数の既定値
pub const DEFAULT_TABLE_LIMIT: usize = 20;

/// デコードキャッシュの容量の既定値
pub const DEFAULT_DECODE_CACHE_CAPACITY: usize = 5000;

/// デコードキャッシュの許容超過率
pub const DECODE_CACHE_TOLERANCE: f32 = 0.2;

/// 遅延インデックスに残すブロックの割合の既定値
pub const DEFAULT_EVICTION_FRACTION: f32 = 0.01;

/// 遅延インデックスの縮小を始めるまでの余裕の既定値
pub const DEFAULT_EVICTION_RATIO: f32 = 0.2;

/// 読み込み済みのフレーズテーブル
///
/// モデルは[`Arc`]で共有されるため、複製は安価です。各スレッドは
/// [`PhraseTable::new_worker`]で自分の[`Worker`]を作成して検索を行います。
#[derive(Clone)]
pub struct PhraseTable {
    decoder: PhraseDecoder,
    table_limit: usize,
    decode_cache_capacity: usize,
    eviction_fraction: f32,
    eviction_ratio: f32,
}

impl PhraseTable {
    /// モデルとスコアリングコンテキストからフレーズテーブルを作成します。
    ///
    /// # エラー
    ///
    /// 特徴量の重みの数がモデルのスコア数と一致しない場合に
    /// [`MinphrError::InvalidArgument`]を返します。
    pub fn new(model: CompactModel, scoring: ScoringContext) -> Result<Self> {
        Self::from_shared_model(Arc::new(model), scoring)
    }

    /// 共有されたモデルからフレーズテーブルを作成します。
    ///
    /// 異なるスコアリングコンテキストで同じモデルを使う場合に便利です。
    ///
    /// # エラー
    ///
    /// [`PhraseTable::new`]と同じです。
    pub fn from_shared_model(model: Arc<CompactModel>, scoring: ScoringContext) -> Result<Self> {
        if scoring.weights().len() != model.num_scores() {
            return Err(MinphrError::invalid_argument(
                "scoring",
                format!(
                    "{} weights were given, but the model has {} scores per phrase.",
                    scoring.weights().len(),
                    model.num_scores()
                ),
            ));
        }
        Ok(Self {
            decoder: PhraseDecoder::new(model, Arc::new(scoring)),
            table_limit: DEFAULT_TABLE_LIMIT,
            decode_cache_capacity: DEFAULT_DECODE_CACHE_CAPACITY,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
            eviction_ratio: DEFAULT_EVICTION_RATIO,
        })
    }

    /// ファイルからモデルを読み込み、フレーズテーブルを作成します。
    ///
    /// # エラー
    ///
    /// [`CompactModel::from_path`]と[`PhraseTable::new`]のエラーを返します。
    pub fn from_path<P>(path: P, mode: ResidencyMode, scoring: ScoringContext) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Self::new(CompactModel::from_path(path, mode)?, scoring)
    }

    /// 1回の検索で返す候補数の上限を設定します。
    ///
    /// 0を指定するとすべての候補を返します。
    pub const fn table_limit(mut self, table_limit: usize) -> Self {
        self.table_limit = table_limit;
        self
    }

    /// ワーカーごとのデコードキャッシュの容量を設定します。
    ///
    /// 0を指定すると、文の区切りごとにキャッシュが空になります。
    pub const fn decode_cache_capacity(mut self, capacity: usize) -> Self {
        self.decode_cache_capacity = capacity;
        self
    }

    /// 遅延インデックスの縮小方針を設定します。
    ///
    /// 文の区切りで、読み込み済みブロック数がおよそ`fraction * (1 + ratio)`の割合を
    /// 超えていれば、最近使われた`fraction * (1 - ratio)`の割合だけを残します。
    ///
    /// # エラー
    ///
    /// `fraction`が`(0, 1]`の範囲外、または`ratio`が`[0, 1)`の範囲外の場合に
    /// [`MinphrError::InvalidArgument`]を返します。
    pub fn eviction_policy(mut self, fraction: f32, ratio: f32) -> Result<Self> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(MinphrError::invalid_argument(
                "fraction",
                "must be in the range (0, 1].",
            ));
        }
        if !(0.0..1.0).contains(&ratio) {
            return Err(MinphrError::invalid_argument("ratio", "must be in the range [0, 1)."));
        }
        self.eviction_fraction = fraction;
        self.eviction_ratio = ratio;
        Ok(self)
    }

    /// 読み込み済みのモデルを返します。
    #[inline(always)]
    pub fn model(&self) -> &CompactModel {
        self.decoder.model()
    }

    /// スコアリングコンテキストを返します。
    #[inline(always)]
    pub fn scoring(&self) -> &ScoringContext {
        self.decoder.scoring()
    }

    /// 1回の検索で返す候補数の上限を返します。
    #[inline(always)]
    pub const fn limit(&self) -> usize {
        self.table_limit
    }

    #[inline(always)]
    pub(crate) const fn decoder(&self) -> &PhraseDecoder {
        &self.decoder
    }

    #[inline(always)]
    pub(crate) const fn eviction(&self) -> (f32, f32) {
        (self.eviction_fraction, self.eviction_ratio)
    }

    /// 新しいワーカーを作成します。
    ///
    /// ワーカーは独自のデコードキャッシュと文単位のレジストリを持つため、
    /// スレッドごとに1つ作成して並列に検索できます。
    pub fn new_worker(&self) -> Worker {
        Worker::new(self.clone(), self.decode_cache_capacity)
    }
}

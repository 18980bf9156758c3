//! 検索処理を行うワーカー
//!
//! ワーカーはデコードキャッシュと文単位のレジストリを所有し、再利用することで
//! 同じソースフレーズの再デコードを避けます。
use std::sync::Arc;

use crate::errors::Result;
use crate::model::index::SourceIndex;
use crate::phrase::{TargetPhrase, TargetPhraseCollection, select_top};
use crate::table::PhraseTable;
use crate::table::DECODE_CACHE_TOLERANCE;
use crate::table::decode_cache::DecodeCache;
use crate::table::sentence_cache::SentenceScopedCache;

/// 検索処理を行う構造体
///
/// 1つのスレッドが1つのワーカーを所有します。文を処理し終えたら
/// [`Worker::cleanup_after_sentence`]を呼び出してください。
///
/// # 例
///
/// ```ignore
/// let mut worker = table.new_worker();
/// let candidates = worker.lookup(&["das", "haus"])?;
/// worker.cleanup_after_sentence();
/// ```
pub struct Worker {
    pub(crate) table: PhraseTable,
    pub(crate) decode_cache: DecodeCache,
    pub(crate) sentence_cache: SentenceScopedCache,
}

impl Worker {
    pub(crate) fn new(table: PhraseTable, decode_cache_capacity: usize) -> Self {
        Self {
            table,
            decode_cache: DecodeCache::new(decode_cache_capacity, DECODE_CACHE_TOLERANCE),
            sentence_cache: SentenceScopedCache::new(),
        }
    }

    /// ソースフレーズの上位候補を返します。
    ///
    /// フレーズが最大長を超える場合、フレーズが存在しない場合、または候補が空の場合は
    /// `None`を返します。返された集合はこのワーカーの文単位のレジストリにも登録され、
    /// [`Worker::cleanup_after_sentence`]まで保持されます。
    ///
    /// # エラー
    ///
    /// 符号化ブロックがストアと一致しない場合、または遅延インデックスの
    /// 読み込みに失敗した場合にエラーを返します。
    pub fn lookup<S>(&mut self, phrase: &[S]) -> Result<Option<Arc<TargetPhraseCollection>>>
    where
        S: AsRef<str>,
    {
        let Some(candidates) =
            self.table
                .decoder()
                .create_candidates(&mut self.decode_cache, phrase, true)?
        else {
            return Ok(None);
        };
        if candidates.is_empty() {
            return Ok(None);
        }

        let selected = select_top(&candidates, self.table.limit());
        if log::log_enabled!(log::Level::Trace) {
            for cand in &selected {
                log::trace!("[minphr] selected: {cand}");
            }
        }

        let collection = Arc::new(TargetPhraseCollection::new(selected));
        self.sentence_cache.register_for_cleanup(Arc::clone(&collection));
        Ok(Some(collection))
    }

    /// ソースフレーズの候補をすべて、選択や並べ替えをせずに返します。
    ///
    /// 結果は文単位のレジストリには登録されません。
    ///
    /// # エラー
    ///
    /// [`Worker::lookup`]と同じです。
    pub fn lookup_raw<S>(&mut self, phrase: &[S]) -> Result<Option<Arc<Vec<TargetPhrase>>>>
    where
        S: AsRef<str>,
    {
        self.table
            .decoder()
            .create_candidates(&mut self.decode_cache, phrase, true)
    }

    /// 文の処理の終わりに呼び出し、ワーカーが保持する資源を解放します。
    ///
    /// 遅延インデックスの作業集合を縮小し、デコードキャッシュを容量まで削減し、
    /// この文で返した候補集合をすべて解放します。解放した候補集合の数を返します。
    pub fn cleanup_after_sentence(&mut self) -> usize {
        let index = self.table.model().index();
        if index.is_lazy() {
            let (fraction, ratio) = self.table.eviction();
            index.keep_recent_fraction(fraction, ratio);
        }
        let pruned = self.decode_cache.prune();
        let released = self.sentence_cache.release_all();
        log::debug!(
            "[minphr] sentence cleanup: released {released} collections, \
             pruned {pruned} cache entries"
        );
        released
    }

    /// このワーカーのデコードキャッシュを返します。
    #[inline(always)]
    pub fn decode_cache(&self) -> &DecodeCache {
        &self.decode_cache
    }

    /// このワーカーの文単位のレジストリを返します。
    #[inline(always)]
    pub fn sentence_cache(&self) -> &SentenceScopedCache {
        &self.sentence_cache
    }

    /// ワーカーが参照しているフレーズテーブルを返します。
    #[inline(always)]
    pub fn table(&self) -> &PhraseTable {
        &self.table
    }
}

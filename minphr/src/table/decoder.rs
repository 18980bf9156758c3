//! 符号化ブロックのデコーダー

use std::sync::Arc;

use crate::errors::Result;
use crate::model::CompactModel;
use crate::model::blocks::ByteRange;
use crate::model::codec::decode_block;
use crate::model::index::SourceIndex;
use crate::phrase::TargetPhrase;
use crate::scoring::ScoringContext;
use crate::table::decode_cache::DecodeCache;
use crate::utils::{FromU32, phrase_key};

/// 符号化ブロックを候補列に変換するデコーダー
///
/// スコアリングコンテキストは構築時に固定されるため、同じブロックのデコード結果は
/// 常に同一です。
#[derive(Clone)]
pub struct PhraseDecoder {
    model: Arc<CompactModel>,
    scoring: Arc<ScoringContext>,
}

impl PhraseDecoder {
    pub(crate) fn new(model: Arc<CompactModel>, scoring: Arc<ScoringContext>) -> Self {
        Self { model, scoring }
    }

    #[inline(always)]
    pub fn model(&self) -> &CompactModel {
        &self.model
    }

    #[inline(always)]
    pub fn scoring(&self) -> &ScoringContext {
        &self.scoring
    }

    /// ソースフレーズの候補列を返します。
    ///
    /// フレーズが最大長を超える場合はインデックスを参照せずに`None`を返します。
    /// `use_cache`が`true`の場合、`cache`を参照し、結果を登録します。
    ///
    /// # エラー
    ///
    /// ブロックの内容がストアと一致しない場合に[`MinphrError::Decode`](crate::errors::MinphrError::Decode)を、
    /// 遅延インデックスの読み込みに失敗した場合にはその原因となったエラーを返します。
    pub fn create_candidates<S>(
        &self,
        cache: &mut DecodeCache,
        phrase: &[S],
        use_cache: bool,
    ) -> Result<Option<Arc<Vec<TargetPhrase>>>>
    where
        S: AsRef<str>,
    {
        if phrase.len() > self.model.max_source_phrase_length() {
            return Ok(None);
        }
        let key = phrase_key(phrase);
        if use_cache && let Some(candidates) = cache.get(&key) {
            return Ok(Some(candidates));
        }

        let Some(range) = self.model.index().lookup(&key)? else {
            return Ok(None);
        };
        let candidates = Arc::new(self.decode_range(range).inspect_err(|e| {
            log::error!("[minphr] failed to decode the candidates of {key:?}: {e}");
        })?);
        if use_cache {
            cache.insert(key, Arc::clone(&candidates));
        }
        Ok(Some(candidates))
    }

    fn decode_range(&self, range: ByteRange) -> Result<Vec<TargetPhrase>> {
        let store = self.model.store();
        let meta = self.model.meta();
        let bytes = store.blocks().read(range)?;

        decode_block(bytes, meta.num_scores())?
            .into_iter()
            .map(|cand| -> Result<TargetPhrase> {
                let words = store.phrase_words(usize::from_u32(cand.phrase_id))?;
                let scores = cand
                    .score_indices
                    .iter()
                    .enumerate()
                    .map(|(feature, &idx)| meta.score(feature, usize::from_u32(idx)))
                    .collect::<Result<Vec<_>>>()?;
                let future_score = self.scoring.future_score(&words, &scores);
                Ok(TargetPhrase::new(words, scores, future_score))
            })
            .collect()
    }
}

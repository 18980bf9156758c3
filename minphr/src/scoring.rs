//! 推定スコアの計算に使う外部コンテキスト
//!
//! 特徴量の重み、単語ペナルティの重み、言語モデルはデコーダーの利用側から与えられ、
//! フレーズテーブルの構築後は変更されません。

use std::fmt;
use std::sync::Arc;

/// 言語モデルによる推定値を提供するトレイト
pub trait LanguageModel: Send + Sync {
    /// このモデルの重みを返します。
    fn weight(&self) -> f32;

    /// ターゲット単語列の推定スコアを返します。
    fn score(&self, words: &[String]) -> f32;
}

/// 推定スコアの計算に使う重みと言語モデル
#[derive(Clone)]
pub struct ScoringContext {
    weights: Vec<f32>,
    word_penalty: f32,
    language_models: Vec<Arc<dyn LanguageModel>>,
}

impl ScoringContext {
    /// 特徴量の重みと単語ペナルティの重みからコンテキストを作成します。
    pub fn new(weights: Vec<f32>, word_penalty: f32) -> Self {
        Self {
            weights,
            word_penalty,
            language_models: vec![],
        }
    }

    /// 言語モデルを追加します。
    pub fn with_language_model(mut self, lm: Arc<dyn LanguageModel>) -> Self {
        self.language_models.push(lm);
        self
    }

    #[inline(always)]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[inline(always)]
    pub const fn word_penalty(&self) -> f32 {
        self.word_penalty
    }

    /// 候補の推定スコアを計算します。
    ///
    /// `Σ weight_i · score_i − word_penalty · |words| + Σ lm.weight() · lm.score(words)`
    pub fn future_score(&self, words: &[String], scores: &[f32]) -> f32 {
        let weighted: f32 = self.weights.iter().zip(scores).map(|(w, s)| w * s).sum();
        let lm: f32 = self
            .language_models
            .iter()
            .map(|lm| lm.weight() * lm.score(words))
            .sum();
        weighted - self.word_penalty * words.len() as f32 + lm
    }
}

impl fmt::Debug for ScoringContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringContext")
            .field("weights", &self.weights)
            .field("word_penalty", &self.word_penalty)
            .field("language_models", &self.language_models.len())
            .finish()
    }
}

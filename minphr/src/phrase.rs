//! ターゲットフレーズ候補の型定義

use std::fmt;
use std::ops::Deref;

/// 1つのターゲットフレーズ候補
///
/// 構築後に変更されることはありません。
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPhrase {
    words: Vec<String>,
    scores: Vec<f32>,
    future_score: f32,
}

impl TargetPhrase {
    /// 新しい候補を作成します。
    #[inline(always)]
    pub const fn new(words: Vec<String>, scores: Vec<f32>, future_score: f32) -> Self {
        Self {
            words,
            scores,
            future_score,
        }
    }

    /// ターゲット側の単語列を返します。
    #[inline(always)]
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// 特徴量ごとのスコアを返します。
    #[inline(always)]
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// 重み付けされた推定スコアを返します。
    #[inline(always)]
    pub const fn future_score(&self) -> f32 {
        self.future_score
    }
}

impl fmt::Display for TargetPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} |||", self.words.join(" "))?;
        for score in &self.scores {
            write!(f, " {score}")?;
        }
        write!(f, " ||| {}", self.future_score)
    }
}

/// 1回の検索で返される候補の集合
///
/// 候補の並び順は保証されません。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetPhraseCollection {
    phrases: Vec<TargetPhrase>,
}

impl TargetPhraseCollection {
    #[inline(always)]
    pub(crate) const fn new(phrases: Vec<TargetPhrase>) -> Self {
        Self { phrases }
    }

    /// 推定スコアが最大の候補を返します。
    pub fn best(&self) -> Option<&TargetPhrase> {
        self.phrases
            .iter()
            .max_by(|a, b| a.future_score.total_cmp(&b.future_score))
    }
}

impl Deref for TargetPhraseCollection {
    type Target = [TargetPhrase];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.phrases
    }
}

impl<'a> IntoIterator for &'a TargetPhraseCollection {
    type Item = &'a TargetPhrase;
    type IntoIter = std::slice::Iter<'a, TargetPhrase>;

    fn into_iter(self) -> Self::IntoIter {
        self.phrases.iter()
    }
}

/// 推定スコアの上位`limit`個の候補を選びます。
///
/// 全体のソートは行わず、平均線形時間で分割します。返される候補の並び順は保証されません。
/// `limit`が0の場合、または候補数が`limit`以下の場合はすべての候補を返します。
pub fn select_top(candidates: &[TargetPhrase], limit: usize) -> Vec<TargetPhrase> {
    let mut selected = candidates.to_vec();
    if limit == 0 || selected.len() <= limit {
        return selected;
    }
    selected.select_nth_unstable_by(limit - 1, |a, b| b.future_score.total_cmp(&a.future_score));
    selected.truncate(limit);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrase(word: &str, score: f32) -> TargetPhrase {
        TargetPhrase::new(vec![word.to_string()], vec![score], score)
    }

    fn sorted_scores(phrases: &[TargetPhrase]) -> Vec<f32> {
        let mut scores: Vec<f32> = phrases.iter().map(TargetPhrase::future_score).collect();
        scores.sort_by(|a, b| b.total_cmp(a));
        scores
    }

    #[test]
    fn test_select_top() {
        let candidates = vec![
            phrase("c", 0.1),
            phrase("a", 0.9),
            phrase("d", -3.0),
            phrase("b", 0.5),
        ];
        assert_eq!(sorted_scores(&select_top(&candidates, 2)), vec![0.9, 0.5]);
        assert_eq!(select_top(&candidates, 0).len(), 4);
        assert_eq!(select_top(&candidates, 4).len(), 4);
        assert_eq!(select_top(&candidates, 10).len(), 4);
    }

    #[test]
    fn test_select_top_partition() {
        let candidates: Vec<_> = (0..50)
            .map(|i| phrase("x", ((i * 37) % 50) as f32))
            .collect();
        let selected = select_top(&candidates, 7);
        let min_selected = selected
            .iter()
            .map(TargetPhrase::future_score)
            .fold(f32::INFINITY, f32::min);
        let rejected = candidates
            .iter()
            .filter(|c| c.future_score() < min_selected)
            .count();
        assert_eq!(selected.len(), 7);
        assert_eq!(rejected, 43);
    }

    #[test]
    fn test_display() {
        let p = TargetPhrase::new(
            vec!["the".to_string(), "house".to_string()],
            vec![0.5, -1.0],
            0.25,
        );
        assert_eq!(p.to_string(), "the house ||| 0.5 -1 ||| 0.25");
    }

    #[test]
    fn test_best() {
        let collection = TargetPhraseCollection::new(vec![phrase("a", 0.1), phrase("b", 0.7)]);
        assert_eq!(collection.best().unwrap().words(), ["b"]);
        assert_eq!(collection.len(), 2);
    }
}

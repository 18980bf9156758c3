//! コンパクトフレーズテーブルのビルダー
//!
//! `(ソースフレーズ, ターゲットフレーズ, スコア)`のレコードを集め、
//! 語彙・コードブック・符号化ブロック・インデックスを構築してファイルに書き出します。

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};

use hashbrown::HashMap;
use rkyv::rancor::Error;

use crate::errors::{MinphrError, Result};
use crate::model::blocks::ByteRange;
use crate::model::codec::{EncodedCandidate, encode_block};
use crate::model::format;
use crate::model::index::{IndexBlock, IndexBlockMeta, IndexSkeleton};
use crate::model::meta::DecoderMeta;
use crate::model::store::PhraseStoreData;
use crate::utils::{padding_len, phrase_key};

/// テキスト形式のフレーズテーブルの区切り文字
const FIELD_SEPARATOR: &str = "|||";

/// インデックスブロックあたりのキー数の既定値
pub const DEFAULT_KEYS_PER_BLOCK: usize = 64;

/// [`ScoreTransform::FloorLog`]の下限値
pub const LOG_SCORE_FLOOR: f32 = -100.0;

/// スコアを格納する前に適用する変換
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoreTransform {
    /// そのまま格納します。
    #[default]
    Identity,

    /// 自然対数を取り、[`LOG_SCORE_FLOOR`]未満を切り上げます。
    FloorLog,
}

impl ScoreTransform {
    #[inline(always)]
    fn apply(self, score: f32) -> f32 {
        match self {
            Self::Identity => score,
            Self::FloorLog => score.ln().max(LOG_SCORE_FLOOR),
        }
    }
}

struct Record {
    target: Vec<String>,
    scores: Vec<f32>,
}

/// コンパクトフレーズテーブルのビルダー
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use minphr::PhraseTableBuilder;
///
/// let mut builder = PhraseTableBuilder::new();
/// builder.add_record(&["das", "haus"], &["the", "house"], &[0.8])?;
/// builder.add_record(&["das"], &["the"], &[0.6])?;
///
/// let mut buf = vec![];
/// builder.write(&mut buf)?;
/// # Ok(())
/// # }
/// ```
pub struct PhraseTableBuilder {
    records: BTreeMap<String, Vec<Record>>,
    num_scores: Option<usize>,
    max_source_phrase_length: usize,
    keys_per_block: usize,
    score_transform: ScoreTransform,
}

impl Default for PhraseTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhraseTableBuilder {
    /// 空のビルダーを作成します。
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            num_scores: None,
            max_source_phrase_length: 0,
            keys_per_block: DEFAULT_KEYS_PER_BLOCK,
            score_transform: ScoreTransform::Identity,
        }
    }

    /// インデックスブロックあたりのキー数を設定します。
    ///
    /// # エラー
    ///
    /// `keys_per_block`が0の場合にエラーを返します。
    pub fn keys_per_block(mut self, keys_per_block: usize) -> Result<Self> {
        if keys_per_block == 0 {
            return Err(MinphrError::invalid_argument(
                "keys_per_block",
                "must be at least 1.",
            ));
        }
        self.keys_per_block = keys_per_block;
        Ok(self)
    }

    /// 以降に追加されるレコードのスコア変換を設定します。
    pub const fn score_transform(mut self, score_transform: ScoreTransform) -> Self {
        self.score_transform = score_transform;
        self
    }

    /// 異なるソースフレーズの数を返します。
    pub fn num_entries(&self) -> usize {
        self.records.len()
    }

    /// レコードを1つ追加します。
    ///
    /// # エラー
    ///
    /// 以下の場合に[`MinphrError::InvalidArgument`]を返します:
    /// - ソースまたはターゲットのフレーズが空の場合、あるいは空のトークンや空白を含む
    ///   トークンがある場合。
    /// - スコア数が0の場合、またはそれまでのレコードと異なる場合。
    /// - 変換後のスコアが有限でない場合。
    pub fn add_record<S, T>(&mut self, source: &[S], target: &[T], scores: &[f32]) -> Result<()>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        check_tokens("source", source)?;
        check_tokens("target", target)?;

        if scores.is_empty() {
            return Err(MinphrError::invalid_argument("scores", "must not be empty."));
        }
        if let Some(num_scores) = self.num_scores
            && num_scores != scores.len()
        {
            return Err(MinphrError::invalid_argument(
                "scores",
                format!("expected {num_scores} scores, got {}.", scores.len()),
            ));
        }
        let scores: Vec<f32> = scores.iter().map(|&s| self.score_transform.apply(s)).collect();
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(MinphrError::invalid_argument("scores", "must be finite."));
        }

        self.num_scores = Some(scores.len());
        self.max_source_phrase_length = self.max_source_phrase_length.max(source.len());
        self.records
            .entry(phrase_key(source))
            .or_default()
            .push(Record {
                target: target.iter().map(|t| t.as_ref().to_string()).collect(),
                scores,
            });
        Ok(())
    }

    /// テキスト形式のフレーズテーブルを読み込みます。
    ///
    /// 各行は`source ||| target ||| s1 s2 ...`の形式で、4番目以降のフィールドは無視されます。
    /// 空行は読み飛ばします。
    ///
    /// # エラー
    ///
    /// 行の形式が不正な場合に[`MinphrError::InvalidFormat`]を返します。
    pub fn from_reader<R>(rdr: R, score_transform: ScoreTransform) -> Result<Self>
    where
        R: Read,
    {
        let mut builder = Self::new().score_transform(score_transform);
        let reader = BufReader::new(rdr);
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split(FIELD_SEPARATOR);
            let (Some(source), Some(target), Some(scores)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(MinphrError::invalid_format(
                    "phrase-table",
                    format!("line {}: expected at least 3 fields", i + 1),
                ));
            };
            let source: Vec<&str> = source.split_whitespace().collect();
            let target: Vec<&str> = target.split_whitespace().collect();
            let scores = scores
                .split_whitespace()
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    MinphrError::invalid_format("phrase-table", format!("line {}: {e}", i + 1))
                })?;
            builder.add_record(&source, &target, &scores).map_err(|e| {
                MinphrError::invalid_format("phrase-table", format!("line {}: {e}", i + 1))
            })?;
        }
        Ok(builder)
    }

    /// 辞書ファイルを書き出します。
    ///
    /// # エラー
    ///
    /// レコードが1つもない場合、または書き込みに失敗した場合にエラーを返します。
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        let Some(num_scores) = self.num_scores else {
            return Err(MinphrError::invalid_state(
                "cannot write a phrase table",
                "no records were added",
            ));
        };

        let codebooks = self.build_codebooks(num_scores);
        let (store, ranges) = self.build_store(&codebooks)?;
        let index = self.build_index(&ranges)?;
        let meta = DecoderMeta {
            max_source_phrase_length: u32::try_from(self.max_source_phrase_length)?,
            num_scores: u32::try_from(num_scores)?,
            codebooks,
        };

        format::write_magic(&mut wtr)?;
        format::write_section(&mut wtr, &index)?;
        format::write_section(&mut wtr, &rkyv::to_bytes::<Error>(&meta)?)?;
        format::write_section(&mut wtr, &rkyv::to_bytes::<Error>(&store)?)?;
        Ok(())
    }

    fn build_codebooks(&self, num_scores: usize) -> Vec<Vec<f32>> {
        let mut codebooks = vec![vec![]; num_scores];
        for record in self.records.values().flatten() {
            for (codebook, &score) in codebooks.iter_mut().zip(&record.scores) {
                codebook.push(score);
            }
        }
        for codebook in &mut codebooks {
            codebook.sort_unstable_by(f32::total_cmp);
            codebook.dedup_by(|a, b| a.to_bits() == b.to_bits());
        }
        codebooks
    }

    fn build_store(&self, codebooks: &[Vec<f32>]) -> Result<(PhraseStoreData, Vec<ByteRange>)> {
        let mut vocab = vec![];
        let mut word_ids = HashMap::new();
        let mut phrase_ids: HashMap<&[String], u32> = HashMap::new();
        let mut phrase_offsets = vec![0];
        let mut phrase_words = vec![];
        let mut blocks = vec![];
        let mut ranges = Vec::with_capacity(self.records.len());

        for records in self.records.values() {
            let mut candidates = Vec::with_capacity(records.len());
            for record in records {
                let next_id = u32::try_from(phrase_ids.len())?;
                let phrase_id = *phrase_ids.entry(record.target.as_slice()).or_insert(next_id);
                if phrase_id == next_id {
                    for word in &record.target {
                        let next_word = u32::try_from(vocab.len())?;
                        let word_id = *word_ids.entry(word.as_str()).or_insert(next_word);
                        if word_id == next_word {
                            vocab.push(word.clone());
                        }
                        phrase_words.push(word_id);
                    }
                    phrase_offsets.push(u32::try_from(phrase_words.len())?);
                }

                let score_indices = codebooks
                    .iter()
                    .zip(&record.scores)
                    .map(|(codebook, score)| -> Result<u32> {
                        let idx = codebook
                            .binary_search_by(|v| v.total_cmp(score))
                            .map_err(|_| {
                                MinphrError::invalid_state("score is missing", "codebook")
                            })?;
                        Ok(u32::try_from(idx)?)
                    })
                    .collect::<Result<Vec<_>>>()?;
                candidates.push(EncodedCandidate {
                    phrase_id,
                    score_indices,
                });
            }

            let offset = u64::try_from(blocks.len())?;
            encode_block(&candidates, &mut blocks);
            let len = u32::try_from(blocks.len() - usize::try_from(offset)?)?;
            ranges.push(ByteRange::new(offset, len));
        }

        let store = PhraseStoreData {
            blocks,
            phrase_offsets,
            phrase_words,
            vocab,
        };
        Ok((store, ranges))
    }

    fn build_index(&self, ranges: &[ByteRange]) -> Result<Vec<u8>> {
        let keys: Vec<&String> = self.records.keys().collect();
        let mut region = vec![];
        let mut metas = vec![];
        for (keys, ranges) in keys
            .chunks(self.keys_per_block)
            .zip(ranges.chunks(self.keys_per_block))
        {
            let block = IndexBlock {
                keys: keys.iter().map(|&k| k.clone()).collect(),
                ranges: ranges.to_vec(),
            };
            let bytes = rkyv::to_bytes::<Error>(&block)?;
            metas.push(IndexBlockMeta {
                first_key: keys[0].clone(),
                offset: u64::try_from(region.len())?,
                len: u64::try_from(bytes.len())?,
            });
            region.extend_from_slice(&bytes);
            region.resize(region.len() + padding_len(bytes.len()), 0);
        }

        let skeleton = IndexSkeleton {
            num_entries: u64::try_from(self.records.len())?,
            blocks: metas,
        };
        let skeleton = rkyv::to_bytes::<Error>(&skeleton)?;

        let mut payload = Vec::with_capacity(
            format::SECTION_HEADER_LEN + skeleton.len() + 16 + region.len(),
        );
        payload.extend_from_slice(&u64::try_from(skeleton.len())?.to_le_bytes());
        payload.extend_from_slice(&0u64.to_le_bytes());
        payload.extend_from_slice(&skeleton);
        payload.resize(payload.len() + padding_len(skeleton.len()), 0);
        payload.extend_from_slice(&region);
        Ok(payload)
    }
}

fn check_tokens<S>(arg: &'static str, tokens: &[S]) -> Result<()>
where
    S: AsRef<str>,
{
    if tokens.is_empty() {
        return Err(MinphrError::invalid_argument(arg, "must not be empty."));
    }
    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return Err(MinphrError::invalid_argument(
                arg,
                format!(
                    "invalid token {token:?}: tokens must be non-empty and contain no whitespace."
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reader() {
        let text = "das haus ||| the house ||| 0.5 0.25 ||| 0-0 1-1\n\
                    \n\
                    das ||| the ||| 1 0.5\n\
                    das ||| this ||| 0.5 0.5\n";
        let builder =
            PhraseTableBuilder::from_reader(text.as_bytes(), ScoreTransform::Identity).unwrap();
        assert_eq!(builder.num_entries(), 2);
        assert_eq!(builder.max_source_phrase_length, 2);
        assert_eq!(builder.records["das"].len(), 2);
    }

    #[test]
    fn test_floor_log() {
        let text = "a ||| b ||| 0 1\n";
        let builder =
            PhraseTableBuilder::from_reader(text.as_bytes(), ScoreTransform::FloorLog).unwrap();
        assert_eq!(builder.records["a"][0].scores, vec![LOG_SCORE_FLOOR, 0.0]);
    }

    #[test]
    fn test_from_reader_bad_score() {
        let text = "a ||| b ||| 0.5\na ||| c ||| high\n";
        let result = PhraseTableBuilder::from_reader(text.as_bytes(), ScoreTransform::Identity);
        assert!(matches!(result, Err(MinphrError::InvalidFormat(_))));
    }

    #[test]
    fn test_from_reader_missing_field() {
        let text = "a ||| b\n";
        let result = PhraseTableBuilder::from_reader(text.as_bytes(), ScoreTransform::Identity);
        assert!(matches!(result, Err(MinphrError::InvalidFormat(_))));
    }

    #[test]
    fn test_inconsistent_score_count() {
        let mut builder = PhraseTableBuilder::new();
        builder.add_record(&["a"], &["b"], &[0.1, 0.2]).unwrap();
        let result = builder.add_record(&["a"], &["c"], &[0.1]);
        assert!(matches!(result, Err(MinphrError::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_tokens() {
        let mut builder = PhraseTableBuilder::new();
        assert!(builder.add_record(&["a b"], &["c"], &[0.0]).is_err());
        assert!(builder.add_record(&[""], &["c"], &[0.0]).is_err());
        assert!(builder.add_record::<&str, &str>(&[], &["c"], &[0.0]).is_err());
    }

    #[test]
    fn test_write_without_records() {
        let builder = PhraseTableBuilder::new();
        let result = builder.write(vec![]);
        assert!(matches!(result, Err(MinphrError::InvalidState(_))));
    }

    #[test]
    fn test_target_phrases_are_shared() {
        let mut builder = PhraseTableBuilder::new();
        builder.add_record(&["a"], &["x", "y"], &[0.1]).unwrap();
        builder.add_record(&["b"], &["x", "y"], &[0.2]).unwrap();
        builder.add_record(&["c"], &["y"], &[0.1]).unwrap();

        let codebooks = builder.build_codebooks(1);
        assert_eq!(codebooks, vec![vec![0.1, 0.2]]);

        let (store, ranges) = builder.build_store(&codebooks).unwrap();
        assert_eq!(store.vocab, vec!["x", "y"]);
        assert_eq!(store.phrase_offsets, vec![0, 2, 3]);
        assert_eq!(store.phrase_words, vec![0, 1, 1]);
        assert_eq!(ranges.len(), 3);
    }
}

//! デコーダーメタデータ
//!
//! 特徴量ごとのスコアのコードブックと、ソースフレーズの最大長を保持します。

use std::io::Read;

use rkyv::rancor::Error;
use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::{MinphrError, Result};
use crate::model::format;
use crate::utils::FromU32;

/// デコーダーメタデータ
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct DecoderMeta {
    /// 格納されているソースフレーズの最大トークン数
    pub max_source_phrase_length: u32,

    /// 候補1つあたりのスコア数
    pub num_scores: u32,

    /// 特徴量ごとのスコア値の表。符号化ブロックはこの表への添字を保持します。
    pub codebooks: Vec<Vec<f32>>,
}

impl DecoderMeta {
    /// リーダーから長さ`len`のメタデータセクションを読み込みます。
    ///
    /// # エラー
    ///
    /// アーカイブの検証に失敗した場合、スコア数がゼロの場合、またはコードブックの数が
    /// スコア数と一致しない場合に[`MinphrError::InvalidFormat`]を返します。
    pub fn load<R>(rdr: &mut R, len: usize) -> Result<Self>
    where
        R: Read,
    {
        let bytes = format::read_aligned(rdr, len, "decoder")?;
        let meta = rkyv::from_bytes::<Self, Error>(&bytes).map_err(|e| {
            MinphrError::invalid_format("decoder", format!("invalid metadata archive: {e}"))
        })?;
        if meta.num_scores == 0 || meta.max_source_phrase_length == 0 {
            return Err(MinphrError::invalid_format(
                "decoder",
                "The decoder metadata is empty.",
            ));
        }
        if meta.codebooks.len() != usize::try_from(meta.num_scores)? {
            return Err(MinphrError::invalid_format(
                "decoder",
                "The number of codebooks mismatches the number of scores.",
            ));
        }
        Ok(meta)
    }

    /// ソースフレーズの最大トークン数を返します。
    #[inline(always)]
    pub fn max_source_phrase_length(&self) -> usize {
        usize::from_u32(self.max_source_phrase_length)
    }

    /// 候補1つあたりのスコア数を返します。
    #[inline(always)]
    pub fn num_scores(&self) -> usize {
        self.codebooks.len()
    }

    /// `feature`番目のコードブックの`idx`番目の値を返します。
    ///
    /// # エラー
    ///
    /// 添字がコードブックの範囲外の場合に[`MinphrError::Decode`]を返します。
    #[inline(always)]
    pub fn score(&self, feature: usize, idx: usize) -> Result<f32> {
        self.codebooks
            .get(feature)
            .and_then(|codebook| codebook.get(idx))
            .copied()
            .ok_or_else(|| {
                MinphrError::decode(
                    "codebook",
                    format!("index {idx} is out of bounds for feature {feature}"),
                )
            })
    }
}

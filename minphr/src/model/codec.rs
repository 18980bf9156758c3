//! 符号化ブロックの形式
//!
//! ```text
//! count: varint
//! count x { phrase_id: varint, num_scores x codebook index: varint }
//! ```

use crate::errors::{MinphrError, Result};
use crate::utils::{decode_varint, encode_varint};

/// 符号化された候補1つ分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCandidate {
    /// ターゲットフレーズストア内のフレーズID
    pub phrase_id: u32,

    /// 特徴量ごとのコードブック添字
    pub score_indices: Vec<u32>,
}

/// 候補列をブロックに符号化して`buf`に追記します。
pub fn encode_block(candidates: &[EncodedCandidate], buf: &mut Vec<u8>) {
    encode_varint(candidates.len() as u64, buf);
    for cand in candidates {
        encode_varint(u64::from(cand.phrase_id), buf);
        for &idx in &cand.score_indices {
            encode_varint(u64::from(idx), buf);
        }
    }
}

fn decode_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let value = decode_varint(bytes, pos)?;
    u32::try_from(value)
        .map_err(|_| MinphrError::decode("block", format!("value {value} overflows u32")))
}

/// ブロックを復号します。
///
/// # エラー
///
/// ブロックが途中で終わっている場合、または余分なバイトが残る場合に
/// [`MinphrError::Decode`]を返します。
pub fn decode_block(bytes: &[u8], num_scores: usize) -> Result<Vec<EncodedCandidate>> {
    let mut pos = 0;
    let count = decode_varint(bytes, &mut pos)?;
    // 各候補は少なくとも1バイトを占めます。
    if count > (bytes.len() - pos) as u64 {
        return Err(MinphrError::decode(
            "block",
            format!("candidate count {count} exceeds the block length"),
        ));
    }

    let mut candidates = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let phrase_id = decode_u32(bytes, &mut pos)?;
        let score_indices = (0..num_scores)
            .map(|_| decode_u32(bytes, &mut pos))
            .collect::<Result<Vec<_>>>()?;
        candidates.push(EncodedCandidate {
            phrase_id,
            score_indices,
        });
    }

    if pos != bytes.len() {
        return Err(MinphrError::decode(
            "block",
            format!("{} trailing bytes after the last candidate", bytes.len() - pos),
        ));
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<EncodedCandidate> {
        vec![
            EncodedCandidate {
                phrase_id: 3,
                score_indices: vec![0, 200],
            },
            EncodedCandidate {
                phrase_id: 70000,
                score_indices: vec![1, 1],
            },
        ]
    }

    #[test]
    fn test_decode_block() {
        let mut buf = vec![];
        encode_block(&candidates(), &mut buf);
        assert_eq!(decode_block(&buf, 2).unwrap(), candidates());
    }

    #[test]
    fn test_decode_wrong_score_count() {
        let mut buf = vec![];
        encode_block(&candidates(), &mut buf);
        assert!(matches!(decode_block(&buf, 1), Err(MinphrError::Decode(_))));
        assert!(matches!(decode_block(&buf, 3), Err(MinphrError::Decode(_))));
    }

    #[test]
    fn test_decode_bogus_count() {
        let mut buf = vec![];
        encode_varint(1 << 40, &mut buf);
        assert!(matches!(decode_block(&buf, 1), Err(MinphrError::Decode(_))));
    }
}

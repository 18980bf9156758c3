//! ユーティリティ関数と型変換トレイトを提供するモジュール
//!
//! 主に以下の機能を提供します：
//!
//! - `FromU32`: u32からの型変換トレイト
//! - LEB128可変長整数の符号化と復号
//! - rkyvセクションのアライメント計算
//! - ソースフレーズの検索キー生成

use crate::errors::{MinphrError, Result};

/// u32から他の型への変換を提供するトレイト
///
/// 標準ライブラリのFromトレイトとは異なり、ポインタ幅に関する
/// プラットフォーム固有の仮定を行うことができます。
pub trait FromU32 {
    /// u32値から実装型を生成する
    fn from_u32(src: u32) -> Self;
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl FromU32 for usize {
    #[inline(always)]
    fn from_u32(src: u32) -> Self {
        // Since the pointer width is guaranteed to be 32 or 64,
        // the following process always succeeds.
        unsafe { Self::try_from(src).unwrap_unchecked() }
    }
}

/// rkyvアーカイブのアライメント(バイト)
pub(crate) const RKYV_ALIGNMENT: usize = 16;

/// `len`を[`RKYV_ALIGNMENT`]の倍数に揃えるために必要なパディング長を返します。
#[inline(always)]
pub(crate) const fn padding_len(len: usize) -> usize {
    (RKYV_ALIGNMENT - (len % RKYV_ALIGNMENT)) % RKYV_ALIGNMENT
}

/// 符号なし整数をLEB128形式で`buf`に追記します。
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// `buf`の`*pos`からLEB128形式の符号なし整数を読み取り、`*pos`を進めます。
///
/// # エラー
///
/// 入力が途中で終わっている場合、または値が64ビットを超える場合に
/// [`MinphrError::Decode`]を返します。
pub fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let Some(&byte) = buf.get(*pos) else {
            return Err(MinphrError::decode("block", "truncated varint"));
        };
        *pos += 1;

        let payload = u64::from(byte & 0x7F);
        if shift >= 64 || (shift == 63 && payload > 1) {
            return Err(MinphrError::decode("block", "varint overflow"));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// ソースフレーズのトークン列から検索キーを生成します。
///
/// トークンは単一のASCIIスペースで連結されます。トークン自体が空白を含まないことは
/// ビルダー側で保証されています。
pub fn phrase_key<S>(phrase: &[S]) -> String
where
    S: AsRef<str>,
{
    let mut key = String::with_capacity(phrase.iter().map(|t| t.as_ref().len() + 1).sum());
    for (i, token) in phrase.iter().enumerate() {
        if i != 0 {
            key.push(' ');
        }
        key.push_str(token.as_ref());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        let mut buf = vec![];
        encode_varint(127, &mut buf);
        assert_eq!(buf.len(), 1);
        encode_varint(128, &mut buf);
        assert_eq!(buf.len(), 3);

        let mut pos = 0;
        assert_eq!(decode_varint(&buf, &mut pos).unwrap(), 127);
        assert_eq!(decode_varint(&buf, &mut pos).unwrap(), 128);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_varint_truncated() {
        let mut pos = 0;
        let result = decode_varint(&[0x80, 0x80], &mut pos);
        assert!(matches!(result, Err(MinphrError::Decode(_))));
    }

    #[test]
    fn test_padding_len() {
        assert_eq!(padding_len(0), 0);
        assert_eq!(padding_len(13), 3);
        assert_eq!(padding_len(16), 0);
        assert_eq!(padding_len(17), 15);
    }

    #[test]
    fn test_phrase_key() {
        assert_eq!(phrase_key(&["a", "b"]), "a b");
        assert_eq!(phrase_key(&["das"]), "das");
        assert_eq!(phrase_key::<&str>(&[]), "");
    }
}

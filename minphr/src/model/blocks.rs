//! 符号化ブロック領域
//!
//! ソースフレーズごとの候補集合は、ターゲットフレーズストア内の連続した
//! バイト領域に符号化されて格納されています。このモジュールは、その領域への
//! 境界チェック付きの読み取りを提供します。

use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::{MinphrError, Result};

/// 符号化ブロック領域内のバイト範囲
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Archive, Serialize, Deserialize)]
pub struct ByteRange {
    /// 領域先頭からのオフセット
    pub offset: u64,

    /// バイト長
    pub len: u32,
}

impl ByteRange {
    /// 新しいバイト範囲を作成します。
    #[inline(always)]
    pub const fn new(offset: u64, len: u32) -> Self {
        Self { offset, len }
    }
}

impl ArchivedByteRange {
    /// ネイティブ形式に変換します。
    #[inline(always)]
    pub fn to_native(&self) -> ByteRange {
        ByteRange {
            offset: self.offset.to_native(),
            len: self.len.to_native(),
        }
    }
}

/// 符号化ブロック領域の読み取り専用ビュー
#[derive(Clone, Copy)]
pub struct EncodedBlockStore<'a> {
    bytes: &'a [u8],
}

impl<'a> EncodedBlockStore<'a> {
    #[inline(always)]
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// 領域全体のバイト長を返します。
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// 領域が空かどうかを返します。
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 指定された範囲のバイト列を返します。
    ///
    /// # エラー
    ///
    /// 範囲が領域の外にはみ出す場合、インデックスとストアが一致していないため
    /// [`MinphrError::Decode`]を返します。
    pub fn read(&self, range: ByteRange) -> Result<&'a [u8]> {
        let start = usize::try_from(range.offset)?;
        let end = start
            .checked_add(usize::try_from(range.len)?)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                MinphrError::decode(
                    "range",
                    format!(
                        "offset {} + len {} exceeds the block region of {} bytes",
                        range.offset,
                        range.len,
                        self.bytes.len()
                    ),
                )
            })?;
        Ok(&self.bytes[start..end])
    }
}

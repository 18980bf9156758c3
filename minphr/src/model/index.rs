//! ソースフレーズインデックス
//!
//! ソースフレーズの検索キーを、符号化ブロック領域内の[`ByteRange`]に対応付けます。
//! キーはソート済みで固定数ごとのブロックに分割され、各ブロックの先頭キーと
//! 位置だけを保持する「スケルトン」で目的のブロックを特定します。
//!
//! 2つのバックエンドがあります:
//!
//! - [`ResidentIndex`]: セクション全体をメモリに読み込み、アーカイブを直接参照します。
//! - [`LazyIndex`]: スケルトンだけを保持し、ブロックは必要になった時点で
//!   ディスクから読み込みます。作業集合は[`SourceIndex::keep_recent_fraction`]で縮小できます。

mod lazy;
mod resident;

use std::io::Read;

use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::{MinphrError, Result};
use crate::model::blocks::ByteRange;
use crate::model::format;

pub use crate::model::index::lazy::LazyIndex;
pub use crate::model::index::resident::ResidentIndex;

/// インデックスブロックの位置情報
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct IndexBlockMeta {
    /// ブロック内で最小のキー
    pub first_key: String,

    /// ブロック領域の先頭からのオフセット(16バイト境界)
    pub offset: u64,

    /// アーカイブのバイト長
    pub len: u64,
}

/// ブロックを特定するためのスケルトン
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct IndexSkeleton {
    /// インデックス全体のエントリ数
    pub num_entries: u64,

    /// 先頭キーの昇順に並んだブロック
    pub blocks: Vec<IndexBlockMeta>,
}

/// ソート済みのキーと対応するバイト範囲
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct IndexBlock {
    pub keys: Vec<String>,
    pub ranges: Vec<ByteRange>,
}

impl IndexBlock {
    /// キーに対応するバイト範囲を検索します。
    #[inline(always)]
    pub fn find(&self, key: &str) -> Option<ByteRange> {
        self.keys
            .binary_search_by(|k| k.as_str().cmp(key))
            .ok()
            .map(|i| self.ranges[i])
    }
}

impl ArchivedIndexBlock {
    /// キーに対応するバイト範囲を検索します（アーカイブ版）。
    #[inline(always)]
    pub fn find(&self, key: &str) -> Option<ByteRange> {
        self.keys
            .binary_search_by(|k| k.as_str().cmp(key))
            .ok()
            .map(|i| self.ranges[i].to_native())
    }
}

/// キーを含み得るブロックの番号を返します。
///
/// `blocks`は`first_key`の昇順に並んでいなければなりません。
#[inline(always)]
pub(crate) fn locate_block<T, F>(blocks: &[T], key: &str, first_key: F) -> Option<usize>
where
    F: Fn(&T) -> &str,
{
    blocks
        .partition_point(|block| first_key(block) <= key)
        .checked_sub(1)
}

/// インデックスセクション先頭のスケルトン長を読み取ります。
pub(crate) fn read_skeleton_header<R>(rdr: &mut R, section_len: usize) -> Result<usize>
where
    R: Read,
{
    let mut header = [0; format::SECTION_HEADER_LEN];
    format::read_exact_or_truncated(rdr, &mut header, "index")?;
    let mut len = [0; 8];
    len.copy_from_slice(&header[..8]);
    let skeleton_len = usize::try_from(u64::from_le_bytes(len))?;
    if skeleton_len == 0
        || format::SECTION_HEADER_LEN
            .checked_add(skeleton_len)
            .is_none_or(|end| end > section_len)
    {
        return Err(MinphrError::invalid_format(
            "index",
            "The skeleton length is inconsistent with the section length.",
        ));
    }
    Ok(skeleton_len)
}

/// 2つのインデックスバックエンドに共通する操作
pub trait SourceIndex {
    /// キーに対応するバイト範囲を検索します。
    ///
    /// 存在しない場合は`Ok(None)`を返します。遅延バックエンドでは
    /// ディスクからの読み込みに失敗した場合にエラーを返します。
    fn lookup(&self, key: &str) -> Result<Option<ByteRange>>;

    /// インデックスのエントリ数を返します。
    fn num_entries(&self) -> usize;

    /// ブロック数を返します。
    fn num_blocks(&self) -> usize;

    /// 現在メモリ上にあるブロック数を返します。
    fn num_resident_blocks(&self) -> usize;

    /// 最近使われたブロックのおよそ`fraction`の割合だけを残して作業集合を縮小します。
    ///
    /// `ratio`は縮小を始めるまでの余裕と、縮小後に残す量の両方を調整します。
    /// 常駐バックエンドでは何もしません。
    fn keep_recent_fraction(&self, _fraction: f32, _ratio: f32) {}
}

/// インデックスバックエンドのラッパー列挙型
pub enum SourceIndexWrapper {
    Resident(ResidentIndex),
    Lazy(LazyIndex),
}

impl SourceIndexWrapper {
    /// 遅延バックエンドかどうかを返します。
    #[inline(always)]
    pub const fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }
}

impl SourceIndex for SourceIndexWrapper {
    fn lookup(&self, key: &str) -> Result<Option<ByteRange>> {
        match self {
            Self::Resident(index) => index.lookup(key),
            Self::Lazy(index) => index.lookup(key),
        }
    }

    fn num_entries(&self) -> usize {
        match self {
            Self::Resident(index) => index.num_entries(),
            Self::Lazy(index) => index.num_entries(),
        }
    }

    fn num_blocks(&self) -> usize {
        match self {
            Self::Resident(index) => index.num_blocks(),
            Self::Lazy(index) => index.num_blocks(),
        }
    }

    fn num_resident_blocks(&self) -> usize {
        match self {
            Self::Resident(index) => index.num_resident_blocks(),
            Self::Lazy(index) => index.num_resident_blocks(),
        }
    }

    fn keep_recent_fraction(&self, fraction: f32, ratio: f32) {
        match self {
            Self::Resident(index) => index.keep_recent_fraction(fraction, ratio),
            Self::Lazy(index) => index.keep_recent_fraction(fraction, ratio),
        }
    }
}

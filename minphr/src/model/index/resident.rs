use std::io::Read;

use rkyv::access;
use rkyv::rancor::Error;
use rkyv::util::AlignedVec;

use crate::errors::{MinphrError, Result};
use crate::model::blocks::ByteRange;
use crate::model::format::{self, SECTION_HEADER_LEN};
use crate::model::index::{
    ArchivedIndexBlock, ArchivedIndexSkeleton, SourceIndex, locate_block, read_skeleton_header,
};
use crate::utils::padding_len;

/// セクション全体をメモリに保持するインデックス
///
/// 読み込み時にすべてのアーカイブを一度だけ検証し、以降の検索はアーカイブを
/// 直接参照するためコピーが発生しません。
pub struct ResidentIndex {
    num_entries: usize,
    skeleton: &'static ArchivedIndexSkeleton,
    blocks: Vec<&'static ArchivedIndexBlock>,

    // `skeleton`と`blocks`が参照するバッファ。参照より後にドロップされる必要があります。
    _buffer: AlignedVec,
}

impl ResidentIndex {
    /// リーダーから長さ`len`のインデックスセクションを読み込みます。
    ///
    /// # エラー
    ///
    /// セクションが途中で切れている場合、長さの整合性が取れない場合、または
    /// アーカイブの検証に失敗した場合に[`MinphrError::InvalidFormat`]を返します。
    pub fn load<R>(rdr: &mut R, len: usize) -> Result<Self>
    where
        R: Read,
    {
        let buffer = format::read_aligned(rdr, len, "index")?;
        let skeleton_len = read_skeleton_header(&mut buffer.as_slice(), len)?;

        let skeleton_bytes = &buffer[SECTION_HEADER_LEN..SECTION_HEADER_LEN + skeleton_len];
        let skeleton = access::<ArchivedIndexSkeleton, Error>(skeleton_bytes).map_err(|e| {
            MinphrError::invalid_format("index", format!("invalid skeleton archive: {e}"))
        })?;
        // SAFETY: `skeleton`は`buffer`のヒープ領域を指しており、`buffer`は`Self`と共に保持されます。
        let skeleton: &'static ArchivedIndexSkeleton = unsafe { &*(skeleton as *const _) };

        let region_start = SECTION_HEADER_LEN + skeleton_len + padding_len(skeleton_len);
        let mut blocks = Vec::with_capacity(skeleton.blocks.len());
        for meta in skeleton.blocks.iter() {
            let start = usize::try_from(meta.offset.to_native())?
                .checked_add(region_start)
                .ok_or_else(|| MinphrError::invalid_format("index", "block offset overflows"))?;
            let end = start
                .checked_add(usize::try_from(meta.len.to_native())?)
                .filter(|&end| end <= buffer.len())
                .ok_or_else(|| {
                    MinphrError::invalid_format("index", "A block exceeds the index section.")
                })?;
            let block = access::<ArchivedIndexBlock, Error>(&buffer[start..end]).map_err(|e| {
                MinphrError::invalid_format("index", format!("invalid block archive: {e}"))
            })?;
            if block.keys.len() != block.ranges.len() {
                return Err(MinphrError::invalid_format(
                    "index",
                    "The numbers of keys and ranges in a block differ.",
                ));
            }
            // SAFETY: 同上
            blocks.push(unsafe { &*(block as *const ArchivedIndexBlock) });
        }

        Ok(Self {
            num_entries: usize::try_from(skeleton.num_entries.to_native())?,
            skeleton,
            blocks,
            _buffer: buffer,
        })
    }
}

impl SourceIndex for ResidentIndex {
    fn lookup(&self, key: &str) -> Result<Option<ByteRange>> {
        let Some(idx) = locate_block(self.skeleton.blocks.as_slice(), key, |meta| {
            meta.first_key.as_str()
        }) else {
            return Ok(None);
        };
        Ok(self.blocks[idx].find(key))
    }

    #[inline(always)]
    fn num_entries(&self) -> usize {
        self.num_entries
    }

    #[inline(always)]
    fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[inline(always)]
    fn num_resident_blocks(&self) -> usize {
        self.blocks.len()
    }
}

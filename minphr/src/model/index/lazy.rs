use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use rkyv::rancor::Error;

use crate::errors::{MinphrError, Result};
use crate::model::blocks::ByteRange;
use crate::model::format::{self, SECTION_HEADER_LEN};
use crate::model::index::{
    IndexBlock, IndexSkeleton, SourceIndex, locate_block, read_skeleton_header,
};
use crate::utils::padding_len;

/// スケルトンだけを保持し、ブロックを必要に応じてディスクから読み込むインデックス
///
/// 読み込んだブロックは作業集合に保持され、[`SourceIndex::keep_recent_fraction`]で
/// 最近使われたものだけを残すように縮小されます。
pub struct LazyIndex {
    skeleton: IndexSkeleton,
    num_entries: usize,

    // ブロック領域のファイル先頭からの絶対位置
    region_start: u64,
    file: Mutex<File>,

    working_set: RwLock<HashMap<usize, Arc<IndexBlock>>>,
    last_used: Vec<AtomicU64>,
    clock: AtomicU64,
}

impl LazyIndex {
    /// ファイルの現在位置から長さ`len`のインデックスセクションを読み込みます。
    ///
    /// スケルトンだけを読み込み、ファイル位置をセクションの末尾(パディングの直前)まで
    /// 進めます。ブロックの読み込みには複製したファイルハンドルを使います。
    ///
    /// # エラー
    ///
    /// セクションが途中で切れている場合、またはスケルトンの検証に失敗した場合に
    /// [`MinphrError::InvalidFormat`]を返します。
    pub fn load(file: &mut File, len: usize) -> Result<Self> {
        let section_start = file.stream_position()?;
        let file_len = file.metadata()?.len();
        let section_end = section_start.checked_add(u64::try_from(len)?);
        if section_end.is_none_or(|end| end > file_len) {
            return Err(MinphrError::invalid_format("index", "The section is truncated."));
        }
        let skeleton_len = read_skeleton_header(file, len)?;
        let skeleton_bytes = format::read_aligned(file, skeleton_len, "index")?;
        let skeleton = rkyv::from_bytes::<IndexSkeleton, Error>(&skeleton_bytes).map_err(|e| {
            MinphrError::invalid_format("index", format!("invalid skeleton archive: {e}"))
        })?;

        let region_offset = SECTION_HEADER_LEN + skeleton_len + padding_len(skeleton_len);
        let region_len = len.checked_sub(region_offset).ok_or_else(|| {
            MinphrError::invalid_format("index", "The block region is missing.")
        })?;
        for meta in &skeleton.blocks {
            let end = usize::try_from(meta.offset)?.checked_add(usize::try_from(meta.len)?);
            if end.is_none_or(|end| end > region_len) {
                return Err(MinphrError::invalid_format(
                    "index",
                    "A block exceeds the index section.",
                ));
            }
        }

        let region_start = section_start + u64::try_from(region_offset)?;
        file.seek(SeekFrom::Start(section_start + u64::try_from(len)?))?;

        let num_blocks = skeleton.blocks.len();
        Ok(Self {
            num_entries: usize::try_from(skeleton.num_entries)?,
            skeleton,
            region_start,
            file: Mutex::new(file.try_clone()?),
            working_set: RwLock::new(HashMap::new()),
            last_used: (0..num_blocks).map(|_| AtomicU64::new(0)).collect(),
            clock: AtomicU64::new(0),
        })
    }

    fn block(&self, idx: usize) -> Result<Arc<IndexBlock>> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_used[idx].store(tick, Ordering::Relaxed);

        if let Some(block) = self.working_set.read().get(&idx) {
            return Ok(Arc::clone(block));
        }

        let block = Arc::new(self.read_block(idx)?);
        let mut working_set = self.working_set.write();
        Ok(Arc::clone(working_set.entry(idx).or_insert(block)))
    }

    fn read_block(&self, idx: usize) -> Result<IndexBlock> {
        let meta = &self.skeleton.blocks[idx];
        let bytes = {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.region_start + meta.offset))?;
            format::read_aligned(&mut *file, usize::try_from(meta.len)?, "index")?
        };
        let block = rkyv::from_bytes::<IndexBlock, Error>(&bytes).map_err(|e| {
            MinphrError::invalid_format("index", format!("invalid block archive: {e}"))
        })?;
        if block.keys.len() != block.ranges.len() {
            return Err(MinphrError::invalid_format(
                "index",
                "The numbers of keys and ranges in a block differ.",
            ));
        }
        log::trace!("[minphr] loaded index block {idx} ({} keys)", block.keys.len());
        Ok(block)
    }
}

impl SourceIndex for LazyIndex {
    fn lookup(&self, key: &str) -> Result<Option<ByteRange>> {
        let Some(idx) = locate_block(&self.skeleton.blocks, key, |meta| meta.first_key.as_str())
        else {
            return Ok(None);
        };
        Ok(self.block(idx)?.find(key))
    }

    #[inline(always)]
    fn num_entries(&self) -> usize {
        self.num_entries
    }

    #[inline(always)]
    fn num_blocks(&self) -> usize {
        self.skeleton.blocks.len()
    }

    fn num_resident_blocks(&self) -> usize {
        self.working_set.read().len()
    }

    fn keep_recent_fraction(&self, fraction: f32, ratio: f32) {
        let target = self.num_blocks() as f32 * fraction;
        let max_blocks = target * (1.0 + ratio);

        let mut working_set = self.working_set.write();
        let loaded = working_set.len();
        if loaded as f32 <= max_blocks {
            return;
        }

        let keep = (target * (1.0 - ratio)).max(0.0) as usize;
        if keep >= loaded {
            return;
        }
        if keep == 0 {
            working_set.clear();
        } else {
            let mut ticks: Vec<u64> = working_set
                .keys()
                .map(|&idx| self.last_used[idx].load(Ordering::Relaxed))
                .collect();
            ticks.select_nth_unstable_by(keep - 1, |a, b| b.cmp(a));
            let threshold = ticks[keep - 1];
            working_set.retain(|&idx, _| self.last_used[idx].load(Ordering::Relaxed) >= threshold);
        }
        log::debug!(
            "[minphr] index working set shrunk from {loaded} to {} blocks",
            working_set.len()
        );
    }
}

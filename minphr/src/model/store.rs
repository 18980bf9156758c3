//! ターゲットフレーズストア
//!
//! ターゲット側の語彙、フレーズごとの単語ID列、および符号化ブロック領域を保持します。
//! [`ResidencyMode`]に応じて、ヒープ上のバッファかメモリマップされたファイル領域の
//! どちらかから直接アーカイブを参照します。

use std::fs::File;
use std::io::{Seek, SeekFrom};

use memmap2::{Mmap, MmapOptions};
use rkyv::rancor::Error;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, access};

use crate::errors::{MinphrError, Result};
use crate::model::ResidencyMode;
use crate::model::blocks::EncodedBlockStore;
use crate::model::format;
use crate::utils::{FromU32, RKYV_ALIGNMENT};

/// ターゲットフレーズストアのシリアライズ形式
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct PhraseStoreData {
    /// 符号化ブロック領域
    pub blocks: Vec<u8>,

    /// `phrase_words`内での各フレーズの開始位置。末尾に全体の長さを持ちます。
    pub phrase_offsets: Vec<u32>,

    /// すべてのフレーズの単語IDを連結した列
    pub phrase_words: Vec<u32>,

    /// ターゲット語彙
    pub vocab: Vec<String>,
}

/// アーカイブを保持するバッファ
///
/// - `Mmap`: メモリマップされたファイル領域
/// - `Aligned`: アライメントされたヒープ領域
enum PhraseBuffer {
    Mmap(Mmap),
    Aligned(AlignedVec),
}

impl PhraseBuffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Mmap(mmap) => mmap,
            Self::Aligned(aligned) => aligned,
        }
    }
}

/// ターゲットフレーズストア
pub struct TargetPhraseStore {
    data: &'static ArchivedPhraseStoreData,
    _buffer: PhraseBuffer,
}

impl TargetPhraseStore {
    /// ファイルの現在位置から長さ`len`のストアセクションを読み込みます。
    ///
    /// `ResidencyMode::InMemory`ではセクションをヒープに読み込み、
    /// `ResidencyMode::OnDisk`ではメモリマップします。どちらの場合もファイル位置は
    /// セクションの末尾まで進みます。
    ///
    /// # エラー
    ///
    /// アーカイブの検証に失敗した場合、または空のストアの場合に
    /// [`MinphrError::InvalidFormat`]を返します。
    pub fn load(file: &mut File, len: usize, mode: ResidencyMode) -> Result<Self> {
        let buffer = match mode {
            ResidencyMode::InMemory => {
                PhraseBuffer::Aligned(format::read_aligned(file, len, "store")?)
            }
            ResidencyMode::OnDisk => {
                let offset = file.stream_position()?;
                let file_len = file.metadata()?.len();
                if offset
                    .checked_add(u64::try_from(len)?)
                    .is_none_or(|end| end > file_len)
                {
                    return Err(MinphrError::invalid_format("store", "The section is truncated."));
                }
                // SAFETY: ファイルは読み取り専用で開かれており、ストアの存続中に
                // 変更されないことを前提とします。
                let mmap = unsafe { MmapOptions::new().offset(offset).len(len).map(&*file)? };
                file.seek(SeekFrom::Current(i64::try_from(len)?))?;
                PhraseBuffer::Mmap(mmap)
            }
        };
        Self::from_buffer(buffer)
    }

    fn from_buffer(buffer: PhraseBuffer) -> Result<Self> {
        // マップされた領域のアライメントが合わない場合だけヒープにコピーします。
        let buffer = if let PhraseBuffer::Mmap(mmap) = &buffer
            && mmap.as_ptr().align_offset(RKYV_ALIGNMENT) != 0
        {
            let mut aligned_bytes = AlignedVec::with_capacity(mmap.len());
            aligned_bytes.extend_from_slice(mmap);
            PhraseBuffer::Aligned(aligned_bytes)
        } else {
            buffer
        };

        let archived =
            access::<ArchivedPhraseStoreData, Error>(buffer.as_slice()).map_err(|e| {
                MinphrError::invalid_format("store", format!("invalid store archive: {e}"))
            })?;
        // SAFETY: `archived`は`buffer`が所有する領域を指しており、`buffer`は`Self`と共に保持されます。
        let data: &'static ArchivedPhraseStoreData = unsafe { &*(archived as *const _) };

        let offsets = &data.phrase_offsets;
        if offsets.len() < 2 || data.vocab.is_empty() || data.blocks.is_empty() {
            return Err(MinphrError::invalid_format("store", "The phrase store is empty."));
        }
        let last = offsets[offsets.len() - 1].to_native();
        if offsets[0].to_native() != 0 || usize::from_u32(last) != data.phrase_words.len() {
            return Err(MinphrError::invalid_format(
                "store",
                "The phrase offsets are inconsistent with the word list.",
            ));
        }

        Ok(Self {
            data,
            _buffer: buffer,
        })
    }

    /// メモリマップされているかどうかを返します。
    #[inline(always)]
    pub fn is_mapped(&self) -> bool {
        matches!(self._buffer, PhraseBuffer::Mmap(_))
    }

    /// ターゲットフレーズの数を返します。
    #[inline(always)]
    pub fn num_phrases(&self) -> usize {
        self.data.phrase_offsets.len() - 1
    }

    /// ターゲット語彙のサイズを返します。
    #[inline(always)]
    pub fn num_words(&self) -> usize {
        self.data.vocab.len()
    }

    /// 符号化ブロック領域を返します。
    #[inline(always)]
    pub fn blocks(&self) -> EncodedBlockStore<'_> {
        EncodedBlockStore::new(self.data.blocks.as_slice())
    }

    /// `id`番目のターゲットフレーズの単語列を返します。
    ///
    /// # エラー
    ///
    /// `id`または単語IDが範囲外の場合に[`MinphrError::Decode`]を返します。
    pub fn phrase_words(&self, id: usize) -> Result<Vec<String>> {
        let offsets = &self.data.phrase_offsets;
        let next = id.checked_add(1).and_then(|i| offsets.get(i));
        let (Some(start), Some(end)) = (offsets.get(id), next) else {
            return Err(MinphrError::decode(
                "phrase",
                format!("phrase id {id} is out of bounds for {} phrases", self.num_phrases()),
            ));
        };
        let words = self
            .data
            .phrase_words
            .get(usize::from_u32(start.to_native())..usize::from_u32(end.to_native()))
            .ok_or_else(|| {
                MinphrError::decode("phrase", format!("phrase {id} has an invalid word span"))
            })?;

        words
            .iter()
            .map(|w| {
                let w = usize::from_u32(w.to_native());
                self.data
                    .vocab
                    .get(w)
                    .map(|word| word.as_str().to_string())
                    .ok_or_else(|| {
                        MinphrError::decode(
                            "word",
                            format!("word id {w} is out of bounds for {} words", self.num_words()),
                        )
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn write_store(data: &PhraseStoreData) -> tempfile::NamedTempFile {
        let bytes = rkyv::to_bytes::<Error>(data).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn data() -> PhraseStoreData {
        PhraseStoreData {
            blocks: vec![1, 0, 0],
            phrase_offsets: vec![0, 2, 3],
            phrase_words: vec![0, 1, 5],
            vocab: vec!["ein".to_string(), "haus".to_string()],
        }
    }

    fn load(file: &tempfile::NamedTempFile, mode: ResidencyMode) -> Result<TargetPhraseStore> {
        let mut handle = File::open(file.path()).unwrap();
        let len = usize::try_from(handle.metadata().unwrap().len()).unwrap();
        TargetPhraseStore::load(&mut handle, len, mode)
    }

    #[test]
    fn test_phrase_words_both_modes() {
        let file = write_store(&data());
        for mode in [ResidencyMode::InMemory, ResidencyMode::OnDisk] {
            let store = load(&file, mode).unwrap();
            assert_eq!(store.num_phrases(), 2);
            assert_eq!(store.num_words(), 2);
            assert_eq!(store.blocks().len(), 3);
            assert_eq!(store.phrase_words(0).unwrap(), vec!["ein", "haus"]);
        }
    }

    #[test]
    fn test_out_of_bounds_ids() {
        let file = write_store(&data());
        let store = load(&file, ResidencyMode::InMemory).unwrap();
        assert!(matches!(store.phrase_words(1), Err(MinphrError::Decode(_))));
        assert!(matches!(store.phrase_words(2), Err(MinphrError::Decode(_))));
    }

    #[test]
    fn test_corrupt_archive_both_modes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF; 64]).unwrap();
        file.flush().unwrap();
        for mode in [ResidencyMode::InMemory, ResidencyMode::OnDisk] {
            let result = load(&file, mode);
            assert!(matches!(result, Err(MinphrError::InvalidFormat(_))));
        }
    }

    #[test]
    fn test_mapped_store_is_aligned() {
        let file = write_store(&data());
        let store = load(&file, ResidencyMode::OnDisk).unwrap();
        assert!(store.is_mapped());
    }

    #[test]
    fn test_empty_store() {
        let file = write_store(&PhraseStoreData {
            blocks: vec![0],
            phrase_offsets: vec![0],
            phrase_words: vec![],
            vocab: vec!["x".to_string()],
        });
        let result = load(&file, ResidencyMode::InMemory);
        assert!(matches!(result, Err(MinphrError::InvalidFormat(_))));
    }
}

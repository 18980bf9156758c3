//! コンパクトフレーズテーブルのモデル
//!
//! ファイルから読み込まれる3つのコンポーネント(ソースインデックス、デコーダーメタデータ、
//! ターゲットフレーズストア)をまとめた[`CompactModel`]を提供します。

pub mod blocks;
pub mod builder;
pub mod codec;
pub(crate) mod format;
pub mod index;
pub mod meta;
pub mod store;

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::errors::{MinphrError, Result};
use crate::model::index::{LazyIndex, ResidentIndex, SourceIndex, SourceIndexWrapper};
use crate::model::meta::DecoderMeta;
use crate::model::store::TargetPhraseStore;

pub use crate::model::format::MODEL_MAGIC;

/// コンパクトフレーズテーブルの標準拡張子
pub const MODEL_EXTENSION: &str = ".minphr";

/// モデルの配置方法
///
/// 読み込み時に一度だけ選択され、以降は変更されません。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResidencyMode {
    /// インデックスとフレーズストアをすべてメモリに読み込みます。
    #[default]
    InMemory,

    /// インデックスのブロックを必要に応じて読み込み、フレーズストアをメモリマップします。
    OnDisk,
}

/// 読み込み済みのコンパクトフレーズテーブル
///
/// 読み込み後は不変で、複数のスレッドから[`Arc`](std::sync::Arc)を通じて共有されます。
pub struct CompactModel {
    index: SourceIndexWrapper,
    meta: DecoderMeta,
    store: TargetPhraseStore,
    mode: ResidencyMode,
    path: PathBuf,
}

/// 与えられたパスから実際に開くファイルのパスを決定します。
///
/// パスが[`MODEL_EXTENSION`]で終わる場合はそのまま使います。そうでなければ
/// 拡張子を付加したパスを使います。拡張子のないパスそのものは開きません。
///
/// # エラー
///
/// 決定したファイルが存在しない場合に[`MinphrError::InvalidArgument`]を、
/// ディレクトリである場合に[`MinphrError::PathIsDirectory`]を返します。
pub fn resolve_path<P>(path: P) -> Result<PathBuf>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let resolved = if path.as_os_str().to_string_lossy().ends_with(MODEL_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut with_ext = path.as_os_str().to_owned();
        with_ext.push(MODEL_EXTENSION);
        PathBuf::from(with_ext)
    };

    if resolved.is_dir() {
        return Err(MinphrError::PathIsDirectory(resolved));
    }
    if !resolved.exists() {
        return Err(MinphrError::invalid_argument(
            "path",
            format!("the phrase table {} does not exist", resolved.display()),
        ));
    }
    Ok(resolved)
}

impl CompactModel {
    /// ファイルからモデルを読み込みます。
    ///
    /// インデックス、デコーダーメタデータ、ターゲットフレーズストアの順に読み込みます。
    ///
    /// # エラー
    ///
    /// - パスが解決できない場合は[`MinphrError::InvalidArgument`]。
    /// - マジックバイトが一致しない場合、セクションが壊れている場合、または
    ///   いずれかのコンポーネントが空の場合は[`MinphrError::InvalidFormat`]。
    pub fn from_path<P>(path: P, mode: ResidencyMode) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = resolve_path(path)?;
        let mut file = File::open(&path)?;
        format::read_magic(&mut file)?;

        let index_len = format::read_section_len(&mut file, "index")?;
        let index = match mode {
            ResidencyMode::InMemory => {
                SourceIndexWrapper::Resident(ResidentIndex::load(&mut file, index_len)?)
            }
            ResidencyMode::OnDisk => {
                SourceIndexWrapper::Lazy(LazyIndex::load(&mut file, index_len)?)
            }
        };
        format::skip_padding(&mut file, index_len, "index")?;
        if index.num_entries() == 0 || index.num_blocks() == 0 {
            return Err(MinphrError::invalid_format("index", "The index is empty."));
        }
        log::debug!("[minphr] index section: {index_len} bytes");

        let meta_len = format::read_section_len(&mut file, "decoder")?;
        let meta = DecoderMeta::load(&mut file, meta_len)?;
        format::skip_padding(&mut file, meta_len, "decoder")?;
        log::debug!("[minphr] decoder section: {meta_len} bytes");

        let store_len = format::read_section_len(&mut file, "store")?;
        let store = TargetPhraseStore::load(&mut file, store_len, mode)?;
        log::debug!("[minphr] store section: {store_len} bytes");

        log::info!(
            "[minphr] loaded {} ({:?}): {} source phrases, {} target phrases, {} target words",
            path.display(),
            mode,
            index.num_entries(),
            store.num_phrases(),
            store.num_words(),
        );

        Ok(Self {
            index,
            meta,
            store,
            mode,
            path,
        })
    }

    /// ソースインデックスを返します。
    #[inline(always)]
    pub fn index(&self) -> &SourceIndexWrapper {
        &self.index
    }

    /// デコーダーメタデータを返します。
    #[inline(always)]
    pub fn meta(&self) -> &DecoderMeta {
        &self.meta
    }

    /// ターゲットフレーズストアを返します。
    #[inline(always)]
    pub fn store(&self) -> &TargetPhraseStore {
        &self.store
    }

    /// 読み込み時の配置方法を返します。
    #[inline(always)]
    pub fn mode(&self) -> ResidencyMode {
        self.mode
    }

    /// 読み込んだファイルのパスを返します。
    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ソースフレーズの最大トークン数を返します。
    #[inline(always)]
    pub fn max_source_phrase_length(&self) -> usize {
        self.meta.max_source_phrase_length()
    }

    /// 候補1つあたりのスコア数を返します。
    #[inline(always)]
    pub fn num_scores(&self) -> usize {
        self.meta.num_scores()
    }
}

//! 文単位の候補集合レジストリ

use std::sync::Arc;

use crate::phrase::TargetPhraseCollection;

/// 1文の処理中に返した候補集合への参照を保持するレジストリ
///
/// ワーカーごとに1つ存在し、文の区切りで[`SentenceScopedCache::release_all`]により
/// 一括で解放されます。
#[derive(Debug, Default)]
pub struct SentenceScopedCache {
    collections: Vec<Arc<TargetPhraseCollection>>,
}

impl SentenceScopedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 候補集合を文の終わりまで保持します。
    #[inline(always)]
    pub fn register_for_cleanup(&mut self, collection: Arc<TargetPhraseCollection>) {
        self.collections.push(collection);
    }

    /// 保持しているすべての参照を解放し、その数を返します。
    pub fn release_all(&mut self) -> usize {
        let released = self.collections.len();
        self.collections.clear();
        released
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

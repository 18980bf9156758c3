//! ワーカーごとのデコードキャッシュ

use std::sync::Arc;

use hashbrown::HashMap;

use crate::phrase::TargetPhrase;

/// デコード結果をソースフレーズのキーごとに保持するキャッシュ
///
/// 1つの[`Worker`](crate::Worker)が所有し、スレッド間で共有されません。
/// 文の区切りで[`DecodeCache::prune`]によって容量まで縮小されます。
pub struct DecodeCache {
    entries: HashMap<String, (Arc<Vec<TargetPhrase>>, u64)>,
    clock: u64,
    capacity: usize,
    tolerance: f32,
}

impl DecodeCache {
    /// 容量と許容超過率を指定してキャッシュを作成します。
    pub fn new(capacity: usize, tolerance: f32) -> Self {
        Self {
            entries: HashMap::new(),
            clock: 0,
            capacity,
            tolerance,
        }
    }

    #[inline(always)]
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// キーに対応するデコード結果を返し、最終使用時刻を更新します。
    pub fn get(&mut self, key: &str) -> Option<Arc<Vec<TargetPhrase>>> {
        let tick = self.tick();
        self.entries.get_mut(key).map(|(candidates, last_used)| {
            *last_used = tick;
            Arc::clone(candidates)
        })
    }

    /// デコード結果を登録します。
    pub fn insert(&mut self, key: String, candidates: Arc<Vec<TargetPhrase>>) {
        let tick = self.tick();
        self.entries.insert(key, (candidates, tick));
    }

    /// エントリ数が`capacity * (1 + tolerance)`を超えている場合、最近使われていない
    /// エントリを`capacity`個になるまで削除し、削除した数を返します。
    ///
    /// 容量が0の場合はすべてのエントリを削除します。
    pub fn prune(&mut self) -> usize {
        let len = self.entries.len();
        if self.capacity == 0 {
            self.entries.clear();
            return len;
        }
        if len as f32 <= self.capacity as f32 * (1.0 + self.tolerance) || len <= self.capacity {
            return 0;
        }

        let mut ticks: Vec<u64> = self.entries.values().map(|&(_, t)| t).collect();
        ticks.select_nth_unstable_by(self.capacity - 1, |a, b| b.cmp(a));
        let threshold = ticks[self.capacity - 1];
        // 時刻はエントリごとに一意なので、残るのはちょうど`capacity`個です。
        self.entries.retain(|_, &mut (_, t)| t >= threshold);
        len - self.entries.len()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

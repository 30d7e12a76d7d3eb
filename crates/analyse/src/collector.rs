//! Per-row attribute statistics attached by the join hook

use parquetquery::{GroupPredicate, IteratorResult};

/// Selection names of the joined attribute columns
pub const KEY: &str = "key";
pub const VALUE: &str = "value";
pub const IS_ARRAY: &str = "isArray";

/// Slot the collected stats are attached under
pub const STATS: &str = "stats";

/// Statistics of one joined attribute row.
///
/// Instances come from a [`StatsPool`] and are valid for one row only.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AttrStats {
    pub name: String,
    /// String form of the value, elements joined by ',' for arrays
    pub value: String,
    pub bytes: u64,
    pub is_array: bool,
    pub is_null: bool,
}

impl AttrStats {
    fn reset(&mut self) {
        self.name.clear();
        self.value.clear();
        self.bytes = 0;
        self.is_array = false;
        self.is_null = false;
    }
}

/// Free list of [`AttrStats`]. Stats are reset on both get and put.
#[derive(Debug, Default)]
pub struct StatsPool {
    free: Vec<Box<AttrStats>>,
}

impl StatsPool {
    pub fn get(&mut self) -> Box<AttrStats> {
        match self.free.pop() {
            Some(mut stats) => {
                stats.reset();
                stats
            }
            None => Box::default(),
        }
    }

    pub fn put(&mut self, mut stats: Box<AttrStats>) {
        stats.reset();
        self.free.push(stats);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// Join hook turning key/value/isArray entries into [`AttrStats`].
///
/// Rows whose key or value is null are dropped.
#[derive(Debug, Default)]
pub struct AttrStatsCollector {
    pool: StatsPool,
    kept: u64,
    dropped: u64,
}

impl AttrStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands consumed stats back for reuse
    pub fn put(&mut self, stats: Box<AttrStats>) {
        self.pool.put(stats);
    }

    pub fn kept(&self) -> u64 {
        self.kept
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn pool(&self) -> &StatsPool {
        &self.pool
    }
}

impl GroupPredicate<Box<AttrStats>> for AttrStatsCollector {
    fn keep_row(&mut self, result: &mut IteratorResult<Box<AttrStats>>) -> bool {
        let mut stats = match result.other_entries.iter().position(|(k, _)| *k == STATS) {
            Some(pos) => result.other_entries.remove(pos).1,
            None => self.pool.get(),
        };

        for (key, value) in &result.entries {
            match *key {
                KEY => {
                    if value.is_null() {
                        stats.is_null = true;
                    } else {
                        stats.name = value.to_string();
                    }
                }
                VALUE => {
                    if value.is_null() {
                        stats.is_null = true;
                    } else {
                        stats.bytes += value.byte_len();
                        if !stats.value.is_empty() {
                            stats.value.push(',');
                        }
                        stats.value.push_str(&value.to_string());
                    }
                }
                IS_ARRAY => {
                    if !stats.is_array {
                        stats.is_array = value.as_bool().unwrap_or(false);
                    }
                }
                _ => {}
            }
        }

        result.reset_entries();
        if stats.is_null {
            self.pool.put(stats);
            self.dropped += 1;
            return false;
        }

        result.append_other(STATS, stats);
        self.kept += 1;
        true
    }
}

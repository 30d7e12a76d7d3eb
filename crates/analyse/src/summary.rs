//! Per-scope attribute summaries and top-N selection

use crate::collector::AttrStats;
use std::collections::{HashMap, HashSet};

/// Attribute sizes and value counts of one scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericAttrSummary {
    /// Bytes of all scalar and dedicated values
    pub total_bytes: u64,
    /// Attribute name to scalar bytes
    pub attributes: HashMap<String, u64>,
    /// Attribute name to bytes of array values
    pub array_attributes: HashMap<String, u64>,
    /// Names stored in dedicated columns
    pub dedicated: HashSet<String>,
    /// Attribute name to value to occurrence count
    pub cardinality: HashMap<String, HashMap<String, u64>>,
}

impl GenericAttrSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one collected row into the summary.
    ///
    /// Array values only contribute to `array_attributes`.
    pub fn record(&mut self, stats: &AttrStats) {
        if stats.is_array {
            *self.array_attributes.entry(stats.name.clone()).or_default() += stats.bytes;
            return;
        }

        *self.attributes.entry(stats.name.clone()).or_default() += stats.bytes;
        self.total_bytes += stats.bytes;
        self.record_value(&stats.name, &stats.value, 1);
    }

    fn record_value(&mut self, name: &str, value: &str, count: u64) {
        let Some(values) = self.cardinality.get_mut(name) else {
            let values = HashMap::from([(value.to_string(), count)]);
            self.cardinality.insert(name.to_string(), values);
            return;
        };
        match values.get_mut(value) {
            Some(seen) => *seen += count,
            None => {
                values.insert(value.to_string(), count);
            }
        }
    }

    /// Folds the summary of a scope's dedicated columns in, marking its keys
    pub fn merge_dedicated(&mut self, dedicated: GenericAttrSummary) {
        self.total_bytes += dedicated.total_bytes;
        for (name, bytes) in dedicated.attributes {
            *self.attributes.entry(name.clone()).or_default() += bytes;
            self.dedicated.insert(name);
        }
        for (name, values) in dedicated.cardinality {
            for (value, count) in values {
                self.record_value(&name, &value, count);
            }
        }
    }

    /// Additive union, used to merge summaries of several blocks
    pub fn add(&mut self, other: GenericAttrSummary) {
        self.total_bytes += other.total_bytes;
        for (name, bytes) in other.attributes {
            *self.attributes.entry(name).or_default() += bytes;
        }
        for (name, bytes) in other.array_attributes {
            *self.array_attributes.entry(name).or_default() += bytes;
        }
        self.dedicated.extend(other.dedicated);
        for (name, values) in other.cardinality {
            for (value, count) in values {
                self.record_value(&name, &value, count);
            }
        }
    }

    /// Number of distinct values seen for an attribute
    pub fn distinct_values(&self, name: &str) -> usize {
        self.cardinality.get(name).map_or(0, HashMap::len)
    }

    pub fn is_dedicated(&self, name: &str) -> bool {
        self.dedicated.contains(name)
    }

    /// Largest scalar attributes
    pub fn top_n(&self, n: usize) -> Vec<Attribute> {
        top_n(n, &self.attributes)
    }

    /// Largest array attributes
    pub fn top_n_arrays(&self, n: usize) -> Vec<Attribute> {
        top_n(n, &self.array_attributes)
    }

    /// Share of `bytes` in the scope total, in percent
    pub fn percentage(&self, bytes: u64) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub bytes: u64,
}

/// Returns the `n` largest attributes, by bytes descending then name
/// ascending.
pub fn top_n(n: usize, attrs: &HashMap<String, u64>) -> Vec<Attribute> {
    let mut top: Vec<Attribute> = attrs
        .iter()
        .map(|(name, bytes)| Attribute {
            name: name.clone(),
            bytes: *bytes,
        })
        .collect();

    top.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.name.cmp(&b.name)));
    top.truncate(n);
    top
}

/// Summaries of every analysed scope in a block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSummary {
    pub span: GenericAttrSummary,
    pub resource: GenericAttrSummary,
    /// Only for versions storing event attributes
    pub event: Option<GenericAttrSummary>,
}

impl BlockSummary {
    pub fn add(&mut self, other: BlockSummary) {
        self.span.add(other.span);
        self.resource.add(other.resource);
        match (&mut self.event, other.event) {
            (Some(event), Some(other)) => event.add(other),
            (None, Some(other)) => self.event = Some(other),
            (_, None) => {}
        }
    }
}

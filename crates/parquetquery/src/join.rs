//! Joining column iterators on a shared definition level

use crate::error::Result;
use crate::iter::{IteratorResult, RowIterator};
use crate::row_number::RowNumber;
use std::cmp::Ordering;

/// Hook invoked for every joined row before it is returned.
///
/// Implementations may rewrite the result, attach values through
/// [`IteratorResult::append_other`] and drop the row by returning false.
pub trait GroupPredicate<T>: Send {
    fn keep_row(&mut self, result: &mut IteratorResult<T>) -> bool;
}

/// Keeps every joined row untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl<T> GroupPredicate<T> for KeepAll {
    fn keep_row(&mut self, _result: &mut IteratorResult<T>) -> bool {
        true
    }
}

/// Merges iterators whose values share a definition level.
///
/// Row numbers are compared after truncation to `definition_level`; a row
/// is produced only when every source iterator has at least one value for
/// it. All values of a source at that row are collected, so an array
/// attribute joins as one key entry with several value entries.
pub struct JoinIterator<T, P> {
    definition_level: usize,
    iters: Vec<Box<dyn RowIterator<T>>>,
    peeked: Vec<Option<IteratorResult<T>>>,
    predicate: P,
    closed: bool,
}

impl<T: Send, P: GroupPredicate<T>> JoinIterator<T, P> {
    pub fn new(definition_level: usize, iters: Vec<Box<dyn RowIterator<T>>>, predicate: P) -> Self {
        let peeked = iters.iter().map(|_| None).collect();
        Self {
            definition_level,
            iters,
            peeked,
            predicate,
            closed: false,
        }
    }

    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// Mutable access to the row hook, e.g. to hand pooled values back
    pub fn predicate_mut(&mut self) -> &mut P {
        &mut self.predicate
    }

    /// Ensures iterator `i` has a peeked result. Returns false when it is
    /// exhausted.
    fn peek(&mut self, i: usize) -> Result<bool> {
        if self.peeked[i].is_none() {
            self.peeked[i] = self.iters[i].next()?;
        }
        Ok(self.peeked[i].is_some())
    }

    fn peeked_row(&self, i: usize) -> Option<RowNumber> {
        self.peeked[i].as_ref().map(|r| r.row_number)
    }

    /// Moves every peeked result of iterator `i` at `row` into `result`
    fn collect(&mut self, i: usize, row: &RowNumber, result: &mut IteratorResult<T>) -> Result<()> {
        while self.peek(i)? {
            let Some(peeked_row) = self.peeked_row(i) else {
                break;
            };
            if RowNumber::compare(&peeked_row, row, self.definition_level) != Ordering::Equal {
                break;
            }
            if let Some(peeked) = self.peeked[i].take() {
                result.append(peeked);
            }
        }
        Ok(())
    }

    /// Advances iterator `i` until it reaches `row`. Returns false when it
    /// is exhausted first.
    fn seek(&mut self, i: usize, row: &RowNumber) -> Result<bool> {
        while self.peek(i)? {
            let Some(peeked_row) = self.peeked_row(i) else {
                break;
            };
            if RowNumber::compare(&peeked_row, row, self.definition_level) != Ordering::Less {
                return Ok(true);
            }
            self.peeked[i] = None;
        }
        Ok(false)
    }

    fn next_joined(&mut self) -> Result<Option<IteratorResult<T>>> {
        if self.closed || self.iters.is_empty() {
            return Ok(None);
        }

        loop {
            // the highest pending row is the earliest one every source can still reach
            let mut highest: Option<RowNumber> = None;
            for i in 0..self.iters.len() {
                if !self.peek(i)? {
                    return Ok(None);
                }
                let Some(row) = self.peeked_row(i) else {
                    return Ok(None);
                };
                let row = row.truncated(self.definition_level);
                highest = match highest {
                    Some(h) if RowNumber::compare(&h, &row, self.definition_level) != Ordering::Less => Some(h),
                    _ => Some(row),
                };
            }
            let Some(target) = highest else {
                return Ok(None);
            };

            let mut aligned = true;
            for i in 0..self.iters.len() {
                if !self.seek(i, &target)? {
                    return Ok(None);
                }
                let Some(row) = self.peeked_row(i) else {
                    return Ok(None);
                };
                if RowNumber::compare(&row, &target, self.definition_level) != Ordering::Equal {
                    aligned = false;
                }
            }
            if !aligned {
                continue;
            }

            let mut result = IteratorResult::new(target);
            for i in 0..self.iters.len() {
                self.collect(i, &target, &mut result)?;
            }
            if self.predicate.keep_row(&mut result) {
                return Ok(Some(result));
            }
        }
    }
}

impl<T: Send, P: GroupPredicate<T>> RowIterator<T> for JoinIterator<T, P> {
    fn next(&mut self) -> Result<Option<IteratorResult<T>>> {
        self.next_joined()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for iter in self.iters.iter_mut() {
            iter.close();
        }
        for peeked in self.peeked.iter_mut() {
            *peeked = None;
        }
    }
}

impl<T, P> Drop for JoinIterator<T, P> {
    fn drop(&mut self) {
        for iter in self.iters.iter_mut() {
            iter.close();
        }
    }
}

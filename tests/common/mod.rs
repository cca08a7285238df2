//! Fake translation engines shared by the integration tests

#![allow(dead_code)]

use segment_liftover::core::{
    PointQuery, TranslatedPoint, TranslationError, TranslationResult, TranslationService,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Moves every position by `offset` and keeps the chromosome
///
/// Positions inside any `gap` (half-open) are left untranslated.
#[derive(Debug, Clone, Default)]
pub struct ShiftEngine {
    pub offset: u64,
    pub gaps: Vec<(u64, u64)>,
}

impl ShiftEngine {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            gaps: Vec::new(),
        }
    }

    pub fn with_gap(mut self, start: u64, end: u64) -> Self {
        self.gaps.push((start, end));
        self
    }

    fn in_gap(&self, position: u64) -> bool {
        self.gaps.iter().any(|&(s, e)| (s..e).contains(&position))
    }
}

impl TranslationService for ShiftEngine {
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        // Reverse order: callers must match results by id
        Ok(queries
            .iter()
            .rev()
            .filter(|q| !self.in_gap(q.position))
            .map(|q| TranslatedPoint::new(q.id, q.chrom.ucsc_name(), q.position + self.offset))
            .collect())
    }
}

/// Always fails like a crashed engine process
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEngine;

impl TranslationService for FailingEngine {
    fn translate(&self, _queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        Err(TranslationError::Failed {
            program: "liftOver".into(),
            status: "exit status: 1".to_string(),
        })
    }
}

/// Records every batch handed to the wrapped engine
#[derive(Debug, Default)]
pub struct CountingEngine<E> {
    inner: E,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<PointQuery>>>,
}

impl<E: TranslationService> CountingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<PointQuery>> {
        self.batches.lock().unwrap().clone()
    }
}

impl<E: TranslationService> TranslationService for CountingEngine<E> {
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(queries.to_vec());
        self.inner.translate(queries)
    }
}

/// Fails once the wrapped engine has answered `limit` batches
#[derive(Debug)]
pub struct FailAfter<E> {
    inner: E,
    limit: usize,
    calls: AtomicUsize,
}

impl<E> FailAfter<E> {
    pub fn new(inner: E, limit: usize) -> Self {
        Self {
            inner,
            limit,
            calls: AtomicUsize::new(0),
        }
    }
}

impl<E: TranslationService> TranslationService for FailAfter<E> {
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.limit {
            return FailingEngine.translate(queries);
        }
        self.inner.translate(queries)
    }
}

/// A segment table with `rows` segments of `len` bases on alternating chromosomes
pub fn segment_table(rows: usize, len: u64) -> String {
    let mut out = String::from("sample_id\tchromosome\tstart\tstop\tmean\n");
    for i in 0..rows {
        let chrom = if i % 2 == 0 { "1" } else { "X" };
        let start = 10_000 + i as u64 * 50_000;
        out.push_str(&format!(
            "s{}\t{}\t{}\t{}\t{}\n",
            i,
            chrom,
            start,
            start + len,
            i as f64 / 4.0
        ));
    }
    out
}

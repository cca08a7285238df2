//! Direct translation with stepwise fallback
//!
//! Both record converters translate batches of endpoints the same way: one
//! engine call for the whole batch, then the [`UnmappableResolver`] for the
//! ids the engine left out. A fallback result never replaces a direct one.

use crate::core::error::TranslationResult;
use crate::core::remap::{RemapCache, RemapEntry, RemapSettings, UnmappableResolver};
use crate::core::translate::{PointQuery, TranslationService};
use crate::core::Chrom;
use std::collections::{HashMap, HashSet};

/// Which path produced a translated endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Direct,
    Fallback,
}

/// A translated endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Chromosome as reported by the engine (or the original one for fallbacks)
    pub chrom: String,
    pub position: u64,
    pub source: Source,
}

impl Endpoint {
    pub fn direct(chrom: impl Into<String>, position: u64) -> Self {
        Self {
            chrom: chrom.into(),
            position,
            source: Source::Direct,
        }
    }

    pub fn fallback(chrom: Chrom, position: u64) -> Self {
        Self {
            chrom: chrom.ucsc_name(),
            position,
            source: Source::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }

    pub fn valid_chrom(&self) -> Option<Chrom> {
        Chrom::parse(&self.chrom)
    }

    /// Whether two endpoints landed on the same chromosome
    ///
    /// Valid names compare after normalization, anything else verbatim.
    pub fn same_chrom(&self, other: &Endpoint) -> bool {
        match (self.valid_chrom(), other.valid_chrom()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.chrom == other.chrom,
            _ => false,
        }
    }
}

/// Translates endpoint batches, falling back to stepwise search when allowed
pub struct EndpointLifter<'a> {
    engine: &'a dyn TranslationService,
    resolver: Option<UnmappableResolver<'a>>,
}

impl<'a> EndpointLifter<'a> {
    pub fn new(
        engine: &'a dyn TranslationService,
        cache: &'a RemapCache,
        settings: RemapSettings,
        fallback: bool,
    ) -> Self {
        let resolver = fallback.then(|| UnmappableResolver::new(engine, cache, settings));
        Self { engine, resolver }
    }

    pub fn fallback_enabled(&self) -> bool {
        self.resolver.is_some()
    }

    /// Translate every query, keyed by query id
    ///
    /// Ids absent from the result are unmapped. Fails only if the direct
    /// engine call fails; fallback failures are per-position outcomes.
    pub fn lift(&self, queries: &[PointQuery]) -> TranslationResult<HashMap<u64, Endpoint>> {
        let wanted: HashSet<u64> = queries.iter().map(|q| q.id).collect();
        let mut endpoints = HashMap::with_capacity(queries.len());

        for point in self.engine.translate(queries)? {
            if wanted.contains(&point.id) {
                endpoints
                    .entry(point.id)
                    .or_insert_with(|| Endpoint::direct(point.chrom, point.position));
            }
        }
        let direct = endpoints.len();

        let missing: Vec<PointQuery> = queries
            .iter()
            .filter(|q| !endpoints.contains_key(&q.id))
            .copied()
            .collect();

        if let (Some(resolver), false) = (&self.resolver, missing.is_empty()) {
            for resolved in resolver.resolve(&missing) {
                if let RemapEntry::Mapped { chrom, position } = resolved.entry {
                    endpoints
                        .entry(resolved.id)
                        .or_insert_with(|| Endpoint::fallback(chrom, position));
                }
            }
        }

        log::debug!(
            "Translated {}/{} positions directly, {} via fallback",
            direct,
            queries.len(),
            endpoints.len() - direct
        );
        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::translate::TranslatedPoint;

    /// Shifts positions by +1000; positions divisible by 1000 (other than 0) are unmapped
    struct GapEngine;

    impl TranslationService for GapEngine {
        fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
            Ok(queries
                .iter()
                .filter(|q| q.position % 1000 != 0)
                .map(|q| TranslatedPoint::new(q.id, q.chrom.ucsc_name(), q.position + 1000))
                .collect())
        }
    }

    fn chr1() -> Chrom {
        Chrom::autosome(1).unwrap()
    }

    #[test]
    fn test_direct_and_fallback_merge() {
        let cache = RemapCache::new();
        let lifter = EndpointLifter::new(&GapEngine, &cache, RemapSettings::new(400, 3), true);
        let queries = [PointQuery::new(0, chr1(), 1500), PointQuery::new(1, chr1(), 5000)];

        let lifted = lifter.lift(&queries).unwrap();
        assert_eq!(lifted[&0], Endpoint::direct("chr1", 2500));
        // 5400 is the first candidate and maps directly
        assert_eq!(lifted[&1], Endpoint::fallback(chr1(), 6400));
        assert!(lifted[&1].is_fallback());
    }

    #[test]
    fn test_fallback_disabled_leaves_gaps() {
        let cache = RemapCache::new();
        let lifter = EndpointLifter::new(&GapEngine, &cache, RemapSettings::default(), false);
        assert!(!lifter.fallback_enabled());

        let lifted = lifter.lift(&[PointQuery::new(4, chr1(), 5000)]).unwrap();
        assert!(lifted.is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_same_chrom_normalizes_valid_names() {
        let a = Endpoint::direct("chr23", 1);
        let b = Endpoint::fallback(Chrom::X, 2);
        assert!(a.same_chrom(&b));
        assert!(!a.same_chrom(&Endpoint::direct("chr6_apd_hap1", 1)));
        assert!(Endpoint::direct("chrUn_gl000220", 1).same_chrom(&Endpoint::direct("chrUn_gl000220", 9)));
    }
}

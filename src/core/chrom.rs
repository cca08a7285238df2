//! Chromosome names
//!
//! Only the human autosomes 1-22 and the sex chromosomes X and Y take part
//! in a liftover run. Legacy numeric aliases (23 for X, 24 for Y) are folded
//! in before any other processing, so `23`, `chr23`, `X` and `chrX` are the
//! same chromosome everywhere downstream.

use std::fmt;
use std::str::FromStr;

/// A chromosome from the valid set (1-22, X, Y)
///
/// Stored as its ordinal: 1-22 for autosomes, 23 for X, 24 for Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chrom(u8);

impl Chrom {
    pub const X: Chrom = Chrom(23);
    pub const Y: Chrom = Chrom(24);

    /// All valid chromosomes in karyotype order
    pub fn all() -> impl Iterator<Item = Chrom> {
        (1..=24).map(Chrom)
    }

    /// Autosome by number, `None` outside 1-22
    pub fn autosome(n: u8) -> Option<Self> {
        (1..=22).contains(&n).then_some(Chrom(n))
    }

    /// Parse a chromosome name, normalizing the `chr` prefix and numeric aliases
    ///
    /// # Examples
    /// ```
    /// use segment_liftover::core::Chrom;
    ///
    /// assert_eq!(Chrom::parse("1"), Chrom::autosome(1));
    /// assert_eq!(Chrom::parse("chr22"), Chrom::autosome(22));
    /// assert_eq!(Chrom::parse("23"), Some(Chrom::X));
    /// assert_eq!(Chrom::parse("chr24"), Some(Chrom::Y));
    /// assert_eq!(Chrom::parse("chrM"), None);
    /// assert_eq!(Chrom::parse("25"), None);
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        let bare = strip_chr_prefix(name.trim());

        if bare.eq_ignore_ascii_case("x") {
            return Some(Chrom::X);
        }
        if bare.eq_ignore_ascii_case("y") {
            return Some(Chrom::Y);
        }

        // Plain decimal only: "01", "+1" and "1.0" are not chromosome names
        if bare.is_empty() || bare.starts_with('0') || !bare.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match bare.parse::<u8>().ok()? {
            n @ 1..=22 => Some(Chrom(n)),
            23 => Some(Chrom::X),
            24 => Some(Chrom::Y),
            _ => None,
        }
    }

    /// Ordinal in karyotype order (X = 23, Y = 24)
    pub fn ordinal(&self) -> u8 {
        self.0
    }

    /// Short name without prefix: "1", "22", "X", "Y"
    pub fn short_name(&self) -> String {
        match self.0 {
            23 => "X".to_string(),
            24 => "Y".to_string(),
            n => n.to_string(),
        }
    }

    /// UCSC style name as used by chain files: "chr1", "chrX"
    pub fn ucsc_name(&self) -> String {
        format!("chr{}", self.short_name())
    }
}

impl fmt::Display for Chrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chr{}", self.short_name())
    }
}

/// Error for names outside the valid chromosome set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Not a valid chromosome: {0:?}")]
pub struct InvalidChrom(pub String);

impl FromStr for Chrom {
    type Err = InvalidChrom;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chrom::parse(s).ok_or_else(|| InvalidChrom(s.to_string()))
    }
}

/// Remove a case-insensitive "chr" prefix if present
fn strip_chr_prefix(name: &str) -> &str {
    if name.len() > 3 && name.is_char_boundary(3) && name[..3].eq_ignore_ascii_case("chr") {
        &name[3..]
    } else {
        name
    }
}

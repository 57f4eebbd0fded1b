//! Resource quantities keyed by dimension name.
//!
//! A dimension that is absent from a [`Resources`] value is treated as zero
//! everywhere: when summing demands, when checking fit and when computing
//! utilization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValidationError;

/// CPU in millicores.
pub const CPU: &str = "cpu";
/// Memory in bytes.
pub const MEMORY: &str = "memory";

/// Per-dimension resource quantities.
///
/// Deserializes from a map whose values are either integers or strings with
/// a binary (`Ki`, `Mi`, `Gi`, `Ti`) or decimal (`k`, `M`, `G`, `T`) suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, RawQuantity>")]
pub struct Resources(BTreeMap<String, u64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Number(u64),
    Text(String),
}

impl TryFrom<BTreeMap<String, RawQuantity>> for Resources {
    type Error = ValidationError;

    fn try_from(raw: BTreeMap<String, RawQuantity>) -> Result<Self, Self::Error> {
        let mut out = BTreeMap::new();
        for (dim, value) in raw {
            let qty = match value {
                RawQuantity::Number(n) => n,
                RawQuantity::Text(s) => parse_quantity(&s)?,
            };
            out.insert(dim, qty);
        }
        Ok(Self(out))
    }
}

impl Serialize for Resources {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, dim: &str, qty: u64) -> Self {
        self.set(dim, qty);
        self
    }

    /// Quantity for `dim`, zero when the dimension is missing.
    pub fn get(&self, dim: &str) -> u64 {
        self.0.get(dim).copied().unwrap_or(0)
    }

    pub fn set(&mut self, dim: &str, qty: u64) {
        self.0.insert(dim.to_string(), qty);
    }

    /// Add every dimension of `other` into `self`.
    pub fn add(&mut self, other: &Resources) {
        for (dim, qty) in &other.0 {
            let slot = self.0.entry(dim.clone()).or_insert(0);
            *slot = slot.saturating_add(*qty);
        }
    }

    /// True when every requested dimension is at most the available quantity.
    pub fn fits_within(&self, available: &Resources) -> bool {
        self.first_shortfall(available).is_none()
    }

    /// The first dimension (in name order) where `self` exceeds `available`.
    pub fn first_shortfall<'a>(&'a self, available: &Resources) -> Option<Shortfall<'a>> {
        self.0.iter().find_map(|(dim, &requested)| {
            let free = available.get(dim);
            (requested > free).then_some(Shortfall {
                dimension: dim,
                requested,
                available: free,
            })
        })
    }

    /// Fraction of `self` (a capacity) in use once `requested` is added on
    /// top of what is already consumed (`capacity - allocatable`).
    ///
    /// `None` when the capacity for `dim` is zero.
    pub fn used_fraction(&self, allocatable: &Resources, requested: &Resources, dim: &str) -> Option<f64> {
        let capacity = self.get(dim);
        if capacity == 0 {
            return None;
        }
        let used = capacity
            .saturating_sub(allocatable.get(dim))
            .saturating_add(requested.get(dim));
        Some((used as f64 / capacity as f64).min(1.0))
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|&v| v == 0)
    }
}

/// A single dimension that does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall<'a> {
    pub dimension: &'a str,
    pub requested: u64,
    pub available: u64,
}

/// Parse a quantity such as `"512Mi"`, `"4Gi"`, `"2k"` or `"1500"`.
pub fn parse_quantity(s: &str) -> Result<u64, ValidationError> {
    let trimmed = s.trim();
    let invalid = |reason: &str| ValidationError::InvalidQuantity {
        value: s.to_string(),
        reason: reason.to_string(),
    };

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(invalid("missing numeric part"));
    }
    let base: u64 = digits.parse().map_err(|_| invalid("number out of range"))?;

    let multiplier: u64 = match suffix {
        "" => 1,
        "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        _ => return Err(invalid("unknown suffix")),
    };

    base.checked_mul(multiplier)
        .ok_or_else(|| invalid("quantity overflows u64"))
}

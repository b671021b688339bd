// ============================================================================
// Filter Engine
// ============================================================================
//
// Per-field substring criteria, ANDed together. A field with a stored
// pattern must be present (and non-empty) on a row to match; a field with no
// pattern imposes nothing. Filtering never reorders and never mutates.
//
// ============================================================================

pub mod pattern;

pub use pattern::CompiledPattern;

use crate::core::{Field, Record};
use std::collections::BTreeMap;

/// Anything the filter can look at: a raw record or a merged view row.
///
/// Implementors must report *effective* values (overlay over base).
pub trait FilterSubject {
    fn field_value(&self, field: Field) -> Option<&str>;
}

impl FilterSubject for Record {
    fn field_value(&self, field: Field) -> Option<&str> {
        self.get(field)
    }
}

impl<T: FilterSubject + ?Sized> FilterSubject for &T {
    fn field_value(&self, field: Field) -> Option<&str> {
        (**self).field_value(field)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    patterns: BTreeMap<Field, CompiledPattern>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `pattern` for `field`; an empty pattern removes the constraint.
    pub fn set(&mut self, field: Field, pattern: &str) {
        if pattern.is_empty() {
            self.patterns.remove(&field);
        } else {
            self.patterns.insert(field, CompiledPattern::new(pattern));
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.patterns.get(&field).map(CompiledPattern::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.patterns
            .iter()
            .map(|(field, pattern)| (*field, pattern.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    criteria: FilterCriteria,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_filter(&mut self, field: Field, pattern: &str) {
        self.criteria.set(field, pattern);
    }

    pub fn clear(&mut self) {
        self.criteria.clear();
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn matches<S: FilterSubject>(&self, subject: &S) -> bool {
        self.criteria.patterns.iter().all(|(field, pattern)| {
            subject
                .field_value(*field)
                .is_some_and(|value| !value.is_empty() && pattern.matches(value))
        })
    }

    /// Keep, in original order, every row matching all criteria.
    pub fn apply<S, I>(&self, rows: I) -> Vec<S>
    where
        S: FilterSubject,
        I: IntoIterator<Item = S>,
    {
        if self.criteria.is_empty() {
            return rows.into_iter().collect();
        }
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

mod words;

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::words::{
    CITIES, COMPANY_SUFFIXES, FIRST_NAMES, LAST_NAMES, STATES, STREET_NAMES, STREET_SUFFIXES,
};

/// Source of random attribute values.
pub trait DataProvider {
    fn first_name(&mut self) -> String;

    fn last_name(&mut self) -> String;

    fn company_name(&mut self) -> String;

    /// Two-line postal address.
    fn address(&mut self) -> String;

    /// Uniform date in `[start, end]`. Returns `start` when the range is empty.
    fn date_between(&mut self, start: NaiveDate, end: NaiveDate) -> NaiveDate;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize;
}

/// Word-list provider over any [`Rng`]; seed it for reproducible datasets.
pub struct FakeProvider<R = StdRng> {
    rng: R,
}

impl FakeProvider<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> FakeProvider<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn word(&mut self, list: &[&str]) -> String {
        list[self.rng.gen_range(0..list.len())].to_string()
    }
}

impl<R: Rng> DataProvider for FakeProvider<R> {
    fn first_name(&mut self) -> String {
        self.word(FIRST_NAMES)
    }

    fn last_name(&mut self) -> String {
        self.word(LAST_NAMES)
    }

    fn company_name(&mut self) -> String {
        match self.rng.gen_range(0..3) {
            0 => format!("{} {}", self.last_name(), self.word(COMPANY_SUFFIXES)),
            1 => format!("{}-{}", self.last_name(), self.last_name()),
            _ => format!(
                "{}, {} and {}",
                self.last_name(),
                self.last_name(),
                self.last_name()
            ),
        }
    }

    fn address(&mut self) -> String {
        let number = self.rng.gen_range(1..10_000);
        let street = self.word(STREET_NAMES);
        let suffix = self.word(STREET_SUFFIXES);
        let city = self.word(CITIES);
        let state = self.word(STATES);
        let zip = self.rng.gen_range(501..99_951);
        if self.rng.gen_bool(0.2) {
            let suite = self.rng.gen_range(100..1_000);
            format!("{number} {street} {suffix} Suite {suite}\n{city}, {state} {zip:05}")
        } else {
            format!("{number} {street} {suffix}\n{city}, {state} {zip:05}")
        }
    }

    fn date_between(&mut self, start: NaiveDate, end: NaiveDate) -> NaiveDate {
        let span = (end - start).num_days();
        if span <= 0 {
            return start;
        }
        let offset = self.rng.gen_range(0..=span) as u64;
        start.checked_add_days(Days::new(offset)).unwrap_or(end)
    }

    fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

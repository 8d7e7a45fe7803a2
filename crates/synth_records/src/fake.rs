//! Fake data helpers.
//!
//! Wraps the `fake` crate fakers and a few weighted/random helpers around a
//! single seeded RNG so a whole run is reproducible from one seed.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ::fake::faker::address::en::{
    BuildingNumber, CityName, CountryCode, SecondaryAddress, StateName, StreetName, ZipCode,
};
use ::fake::faker::company::en::{CatchPhrase, CompanyName};
use ::fake::faker::internet::en::{SafeEmail, Username};
use ::fake::faker::lorem::en::{Paragraph, Sentence, Word};
use ::fake::faker::name::en::{FirstName, LastName};
use ::fake::faker::phone_number::en::PhoneNumber;
use ::fake::Fake;
use rand::Rng;

const SECONDS_PER_DAY: i64 = 86_400;

/// Fake data generator with deterministic RNG
pub struct FakeData<R: Rng> {
    rng: R,
}

impl<R: Rng> FakeData<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Direct access to the underlying RNG
    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    pub fn first_name(&mut self) -> String {
        FirstName().fake_with_rng(&mut self.rng)
    }

    pub fn last_name(&mut self) -> String {
        LastName().fake_with_rng(&mut self.rng)
    }

    pub fn email(&mut self) -> String {
        SafeEmail().fake_with_rng(&mut self.rng)
    }

    pub fn username(&mut self) -> String {
        Username().fake_with_rng(&mut self.rng)
    }

    pub fn phone(&mut self) -> String {
        PhoneNumber().fake_with_rng(&mut self.rng)
    }

    pub fn street_address(&mut self) -> String {
        let number: String = BuildingNumber().fake_with_rng(&mut self.rng);
        let street: String = StreetName().fake_with_rng(&mut self.rng);
        format!("{} {}", number, street)
    }

    pub fn secondary_address(&mut self) -> String {
        SecondaryAddress().fake_with_rng(&mut self.rng)
    }

    pub fn city(&mut self) -> String {
        CityName().fake_with_rng(&mut self.rng)
    }

    pub fn state(&mut self) -> String {
        StateName().fake_with_rng(&mut self.rng)
    }

    pub fn postcode(&mut self) -> String {
        ZipCode().fake_with_rng(&mut self.rng)
    }

    pub fn country_code(&mut self) -> String {
        CountryCode().fake_with_rng(&mut self.rng)
    }

    /// Single-line postal address
    pub fn address(&mut self) -> String {
        let street = self.street_address();
        let city = self.city();
        let state = self.state();
        let zip = self.postcode();
        format!("{}, {}, {} {}", street, city, state, zip)
    }

    pub fn company(&mut self) -> String {
        CompanyName().fake_with_rng(&mut self.rng)
    }

    pub fn catch_phrase(&mut self) -> String {
        CatchPhrase().fake_with_rng(&mut self.rng)
    }

    pub fn word(&mut self) -> String {
        Word().fake_with_rng(&mut self.rng)
    }

    pub fn sentence(&mut self) -> String {
        Sentence(4..10).fake_with_rng(&mut self.rng)
    }

    /// Paragraph text truncated to at most `max_chars` characters
    pub fn text(&mut self, max_chars: usize) -> String {
        let paragraph: String = Paragraph(2..4).fake_with_rng(&mut self.rng);
        paragraph.chars().take(max_chars).collect()
    }

    /// Random uppercase letters
    pub fn letters(&mut self, count: usize) -> String {
        (0..count)
            .map(|_| self.rng.random_range(b'A'..=b'Z') as char)
            .collect()
    }

    /// Random decimal digits
    pub fn digits(&mut self, count: usize) -> String {
        (0..count)
            .map(|_| char::from(b'0' + self.rng.random_range(0..10u8)))
            .collect()
    }

    /// Generate a price rounded to cents
    pub fn price(&mut self, min: f64, max: f64) -> f64 {
        round2(self.rng.random_range(min..max))
    }

    /// Generate a random integer in range (inclusive)
    pub fn int_range(&mut self, min: i64, max: i64) -> i64 {
        self.rng.random_range(min..=max)
    }

    /// Generate a boolean with given probability of true
    pub fn bool_with_probability(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }

    /// Pick a random element from a non-empty slice
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.random_range(0..items.len())]
    }

    /// Pick from `(value, weight)` pairs proportionally to weight
    pub fn weighted<'a, T>(&mut self, options: &'a [(T, u32)]) -> &'a T {
        let total: u32 = options.iter().map(|(_, w)| *w).sum();
        let mut roll = self.rng.random_range(0..total.max(1));
        for (value, weight) in options {
            if roll < *weight {
                return value;
            }
            roll -= weight;
        }
        &options[options.len() - 1].0
    }

    /// Pick an id from a non-empty slice of parent ids
    pub fn pick_id(&mut self, ids: &[u64]) -> u64 {
        ids[self.rng.random_range(0..ids.len())]
    }

    /// Up to `count` distinct ids from `ids`, in sampling order
    pub fn pick_distinct_ids(&mut self, ids: &[u64], count: usize) -> Vec<u64> {
        let count = count.min(ids.len());
        rand::seq::index::sample(&mut self.rng, ids.len(), count)
            .into_iter()
            .map(|i| ids[i])
            .collect()
    }

    /// Uniform datetime in `[start, end]`
    pub fn datetime_between(&mut self, start: NaiveDateTime, end: NaiveDateTime) -> NaiveDateTime {
        let span = (end - start).num_seconds();
        if span <= 0 {
            return start;
        }
        start + Duration::seconds(self.rng.random_range(0..=span))
    }

    /// Uniform datetime within the last `days` days before `now`
    pub fn datetime_within_days(&mut self, now: NaiveDateTime, days: i64) -> NaiveDateTime {
        let start = now - Duration::seconds(days * SECONDS_PER_DAY);
        self.datetime_between(start, now)
    }

    /// Uniform date in `[start, end]`
    pub fn date_between(&mut self, start: NaiveDate, end: NaiveDate) -> NaiveDate {
        let span = (end - start).num_days();
        if span <= 0 {
            return start;
        }
        start + Duration::days(self.rng.random_range(0..=span))
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

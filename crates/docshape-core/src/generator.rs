//! Synthetic companies and persons.

use bson::DateTime;
use bson::oid::ObjectId;
use chrono::{Days, Months, NaiveDate, NaiveTime};
use docshape_fake::DataProvider;

use crate::error::Error;
use crate::model::{NewCompany, Person};

pub const DAYS_PER_YEAR: u64 = 365;
pub const MIN_AGE: u64 = 18;
pub const MAX_AGE: u64 = 80;
pub const FOUNDING_WINDOW_YEARS: u32 = 50;

/// Midnight UTC of `date` as a BSON datetime.
pub fn midnight_utc(date: NaiveDate) -> DateTime {
    DateTime::from_millis(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

/// UTC calendar date of a BSON datetime.
pub fn utc_date(value: DateTime) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp_millis(value.timestamp_millis()).map(|dt| dt.date_naive())
}

/// Whole years between `birth` and `today`, counting 365-day years.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let days = (today - birth).num_days().max(0) as u64;
    (days / DAYS_PER_YEAR) as i32
}

pub struct CompanyGenerator<'p, P: ?Sized> {
    provider: &'p mut P,
    founded_from: NaiveDate,
    today: NaiveDate,
}

impl<'p, P: DataProvider + ?Sized> CompanyGenerator<'p, P> {
    pub fn new(provider: &'p mut P, today: NaiveDate) -> Self {
        let founded_from = today
            .checked_sub_months(Months::new(FOUNDING_WINDOW_YEARS * 12))
            .unwrap_or(NaiveDate::MIN);
        Self {
            provider,
            founded_from,
            today,
        }
    }

    pub fn generate(&mut self) -> NewCompany {
        let founded = self.provider.date_between(self.founded_from, self.today);
        NewCompany {
            name: self.provider.company_name(),
            address: self.provider.address(),
            founded: midnight_utc(founded),
        }
    }

    pub fn chunk(&mut self, count: usize) -> Vec<NewCompany> {
        (0..count).map(|_| self.generate()).collect()
    }
}

/// Generates persons assigned uniformly to `company_ids`.
pub struct PersonGenerator<'p, 'i, P: ?Sized> {
    provider: &'p mut P,
    company_ids: &'i [ObjectId],
    born_from: NaiveDate,
    born_to: NaiveDate,
    today: NaiveDate,
}

impl<'p, 'i, P: DataProvider + ?Sized> PersonGenerator<'p, 'i, P> {
    pub fn new(
        provider: &'p mut P,
        company_ids: &'i [ObjectId],
        today: NaiveDate,
    ) -> Result<Self, Error> {
        if company_ids.is_empty() {
            return Err(Error::Config(
                "persons need at least one inserted company to reference".into(),
            ));
        }
        // Offsets in [MIN_AGE * 365, (MAX_AGE + 1) * 365 - 1] days keep the
        // computed age within [MIN_AGE, MAX_AGE].
        let born_to = today
            .checked_sub_days(Days::new(MIN_AGE * DAYS_PER_YEAR))
            .unwrap_or(NaiveDate::MIN);
        let born_from = today
            .checked_sub_days(Days::new((MAX_AGE + 1) * DAYS_PER_YEAR - 1))
            .unwrap_or(NaiveDate::MIN);
        Ok(Self {
            provider,
            company_ids,
            born_from,
            born_to,
            today,
        })
    }

    pub fn generate(&mut self) -> Person {
        let birth = self.provider.date_between(self.born_from, self.born_to);
        let company_id = self.company_ids[self.provider.index(self.company_ids.len())];
        Person {
            first_name: self.provider.first_name(),
            last_name: self.provider.last_name(),
            birth_date: midnight_utc(birth),
            age: age_on(birth, self.today),
            company_id,
        }
    }

    pub fn chunk(&mut self, count: usize) -> Vec<Person> {
        (0..count).map(|_| self.generate()).collect()
    }
}

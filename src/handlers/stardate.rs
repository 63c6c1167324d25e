//! `stardate`.
//!
//! Uses the TNG-era convention: 1000 units per year counted from 2323, with
//! the fractional part tracking progress through the year.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::sync::Arc;

use super::{Clock, Handler};

/// Stardate for an instant.
pub fn stardate(now: DateTime<Utc>) -> f64 {
    let days_in_year = if is_leap_year(now.year()) { 366.0 } else { 365.0 };
    let day_fraction = f64::from(now.num_seconds_from_midnight()) / 86_400.0;
    let year_fraction = (f64::from(now.ordinal0()) + day_fraction) / days_in_year;

    1000.0 * f64::from(now.year() - 2323) + 1000.0 * year_fraction
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub struct StardateHandler {
    clock: Arc<dyn Clock>,
}

impl StardateHandler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Handler for StardateHandler {
    async fn handle(&self, _args: &[String]) -> String {
        format!("stardate {:.2}", stardate(self.clock.now()))
    }
}

use chrono::NaiveDate;

/// Number of billable days for a rental. Same-day pickup and return still
/// counts as one day.
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// Rental total: billable days times the car's daily rate.
pub fn rental_total_cents(start: NaiveDate, end: NaiveDate, daily_rate_cents: i64) -> i64 {
    rental_days(start, end) * daily_rate_cents
}

/// Photoshoot total: booked hours times the car's hourly rate.
pub fn photoshoot_total_cents(hours: i32, hourly_rate_cents: i64) -> i64 {
    i64::from(hours) * hourly_rate_cents
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_rental_days_spans() {
        assert_eq!(rental_days(d("2025-09-01"), d("2025-09-03")), 2);
        assert_eq!(rental_days(d("2025-09-01"), d("2025-09-08")), 7);
    }

    #[test]
    fn test_same_day_counts_as_one() {
        assert_eq!(rental_days(d("2025-09-01"), d("2025-09-01")), 1);
        assert_eq!(rental_total_cents(d("2025-09-01"), d("2025-09-01"), 45_000), 45_000);
    }

    #[test]
    fn test_rental_total() {
        // Two days at $450/day
        assert_eq!(rental_total_cents(d("2025-09-01"), d("2025-09-03"), 45_000), 90_000);
    }

    #[test]
    fn test_photoshoot_total() {
        assert_eq!(photoshoot_total_cents(3, 20_000), 60_000);
    }
}

use chrono::NaiveDate;

use crate::models::DayLog;

/// Drop any record for the same date, then append. Order is append order.
#[must_use]
pub fn upsert_by_date(records: &[DayLog], record: DayLog) -> Vec<DayLog> {
    let mut out: Vec<DayLog> = records
        .iter()
        .filter(|r| r.date != record.date)
        .cloned()
        .collect();
    out.push(record);
    out
}

#[must_use]
pub fn find_by_date(records: &[DayLog], date: NaiveDate) -> Option<&DayLog> {
    records.iter().find(|r| r.date == date)
}

/// Copy of the history ordered by date, oldest first.
#[must_use]
pub fn sorted_by_date(records: &[DayLog]) -> Vec<DayLog> {
    let mut out = records.to_vec();
    out.sort_by_key(|r| r.date);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayStatus;

    fn log(date: &str, score: u8) -> DayLog {
        DayLog {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            score,
            weight: 90.0,
            status: DayStatus::Good,
            details: None,
        }
    }

    #[test]
    fn test_upsert_appends_new_date() {
        let records = vec![log("2024-06-01", 50)];
        let out = upsert_by_date(&records, log("2024-06-02", 75));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].score, 75);
    }

    #[test]
    fn test_upsert_replaces_same_date() {
        let records = vec![log("2024-06-01", 50), log("2024-06-02", 60)];
        let out = upsert_by_date(&records, log("2024-06-01", 88));
        assert_eq!(out.len(), 2);
        // Replaced record moves to the end
        assert_eq!(out[0].date, log("2024-06-02", 0).date);
        assert_eq!(out[1].score, 88);
    }

    #[test]
    fn test_upsert_idempotent() {
        let records = vec![log("2024-06-01", 50)];
        let once = upsert_by_date(&records, log("2024-06-03", 100));
        let twice = upsert_by_date(&once, log("2024-06-03", 100));
        assert_eq!(once, twice);
        let date = log("2024-06-03", 0).date;
        assert_eq!(twice.iter().filter(|r| r.date == date).count(), 1);
    }

    #[test]
    fn test_find_by_date() {
        let records = vec![log("2024-06-01", 50), log("2024-06-02", 60)];
        let found = find_by_date(&records, log("2024-06-02", 0).date).unwrap();
        assert_eq!(found.score, 60);
        assert!(find_by_date(&records, log("2024-06-09", 0).date).is_none());
        assert!(find_by_date(&[], log("2024-06-09", 0).date).is_none());
    }

    #[test]
    fn test_sorted_by_date() {
        let records = vec![
            log("2024-06-03", 3),
            log("2024-06-01", 1),
            log("2024-06-02", 2),
        ];
        let sorted = sorted_by_date(&records);
        let scores: Vec<u8> = sorted.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![1, 2, 3]);
        // Input untouched
        assert_eq!(records[0].score, 3);
    }
}

//! Status <-> cell fill codec and the status transition rules.
//!
//! The store keeps a record's status as the fill colour of its `Status` cell,
//! held in the store's fill layer apart from the cell's text and written as an
//! 8-digit ARGB hex string. The in-memory [`Status`] is the authoritative
//! value; the fill is recomputed from it on every write.

use chrono::NaiveDate;
use std::fmt;

use crate::models::{Record, Status};

/// ARGB fill colour of a `Status` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fill(u32);

impl Fill {
    pub const NONE: Fill = Fill(0x0000_0000);
    pub const REJECTED: Fill = Fill(0xFFFF_0000);
    pub const PROCESSING: Fill = Fill(0xFFFF_FF00);
    pub const OFFER: Fill = Fill(0xFF00_FF00);

    pub fn to_hex(&self) -> String {
        format!("{:08X}", self.0)
    }

    /// Parse a stored cell value. Only exact 8-digit ARGB hex is a fill.
    pub fn parse(cell: &str) -> Option<Fill> {
        let hex = cell.trim();
        if hex.len() != 8 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(Fill)
    }
}

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn encode(status: Status) -> Fill {
    match status {
        Status::None => Fill::NONE,
        Status::Processing => Fill::PROCESSING,
        Status::Rejected => Fill::REJECTED,
        Status::Offer => Fill::OFFER,
    }
}

/// Unknown fills decode to `Status::None`.
pub fn decode(fill: Fill) -> Status {
    match fill {
        Fill::PROCESSING => Status::Processing,
        Fill::REJECTED => Status::Rejected,
        Fill::OFFER => Status::Offer,
        _ => Status::None,
    }
}

/// Fill written for a `Status` cell. No fill is stored as no row.
pub fn encode_cell(status: Status) -> Option<String> {
    match encode(status) {
        Fill::NONE => None,
        fill => Some(fill.to_hex()),
    }
}

pub fn decode_cell(cell: Option<&str>) -> Status {
    cell.and_then(Fill::parse).map(decode).unwrap_or_default()
}

/// Move `record` to `to`, stamping the lifecycle date that belongs to it.
///
/// Moving to `None` only clears the status; dates stamped earlier stay. The
/// applied date is never touched.
pub fn transition(record: &mut Record, to: Status, today: NaiveDate) {
    match to {
        Status::Processing => record.processed_date = Some(today),
        Status::Rejected | Status::Offer => record.result_date = Some(today),
        Status::None => {}
    }
    record.status = to;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record() -> Record {
        Record {
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            job_title: "Engineer".to_string(),
            code: None,
            work_type: None,
            link: None,
            applied_date: Some(date(2024, 1, 2)),
            processed_date: None,
            result_date: None,
            status: Status::None,
        }
    }

    #[test]
    fn test_codec_round_trip() {
        for status in Status::ALL {
            assert_eq!(decode(encode(status)), status);
            assert_eq!(decode_cell(encode_cell(status).as_deref()), status);
        }
    }

    #[test]
    fn test_encodings_are_distinct() {
        let fills: HashSet<Fill> = Status::ALL.iter().map(|s| encode(*s)).collect();
        assert_eq!(fills.len(), 4);
        assert_eq!(encode_cell(Status::None), None);
        assert_eq!(encode_cell(Status::Rejected), Some("FFFF0000".to_string()));
        assert_eq!(encode_cell(Status::Processing), Some("FFFFFF00".to_string()));
        assert_eq!(encode_cell(Status::Offer), Some("FF00FF00".to_string()));
    }

    #[test]
    fn test_unknown_fills_decode_to_none() {
        assert_eq!(decode_cell(Some("FF123456")), Status::None);
        assert_eq!(decode_cell(Some("FF0000")), Status::None);
        assert_eq!(decode_cell(Some("#FFFF0000")), Status::None);
        assert_eq!(decode_cell(Some("red")), Status::None);
        assert_eq!(decode_cell(Some("")), Status::None);
        assert_eq!(decode_cell(None), Status::None);
    }

    #[test]
    fn test_decode_accepts_lowercase_and_padding() {
        assert_eq!(decode_cell(Some(" ffff0000 ")), Status::Rejected);
        assert_eq!(decode_cell(Some("ff00ff00")), Status::Offer);
    }

    #[test]
    fn test_processing_stamps_processed_date_only() {
        let mut r = record();
        r.result_date = Some(date(2024, 2, 1));
        transition(&mut r, Status::Processing, date(2024, 3, 4));
        assert_eq!(r.status, Status::Processing);
        assert_eq!(r.processed_date, Some(date(2024, 3, 4)));
        assert_eq!(r.result_date, Some(date(2024, 2, 1)));
        assert_eq!(r.applied_date, Some(date(2024, 1, 2)));
    }

    #[test]
    fn test_result_statuses_stamp_result_date_only() {
        for status in [Status::Rejected, Status::Offer] {
            let mut r = record();
            r.processed_date = Some(date(2024, 2, 1));
            transition(&mut r, status, date(2024, 3, 4));
            assert_eq!(r.status, status);
            assert_eq!(r.result_date, Some(date(2024, 3, 4)));
            assert_eq!(r.processed_date, Some(date(2024, 2, 1)));
            assert_eq!(r.applied_date, Some(date(2024, 1, 2)));
        }
    }

    #[test]
    fn test_clearing_status_keeps_dates() {
        let mut r = record();
        transition(&mut r, Status::Processing, date(2024, 3, 4));
        transition(&mut r, Status::Offer, date(2024, 3, 9));
        transition(&mut r, Status::None, date(2024, 3, 10));
        assert_eq!(r.status, Status::None);
        assert_eq!(r.processed_date, Some(date(2024, 3, 4)));
        assert_eq!(r.result_date, Some(date(2024, 3, 9)));
    }

    #[test]
    fn test_offer_back_to_processing_is_allowed() {
        let mut r = record();
        transition(&mut r, Status::Offer, date(2024, 3, 9));
        transition(&mut r, Status::Processing, date(2024, 3, 12));
        assert_eq!(r.status, Status::Processing);
        assert_eq!(r.processed_date, Some(date(2024, 3, 12)));
        assert_eq!(r.result_date, Some(date(2024, 3, 9)));
    }
}

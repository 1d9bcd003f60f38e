use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an application. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    None,
    Processing,
    Rejected,
    Offer,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::None,
        Status::Processing,
        Status::Rejected,
        Status::Offer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::None => "none",
            Status::Processing => "processing",
            Status::Rejected => "rejected",
            Status::Offer => "offer",
        }
    }

    /// Marker shown next to a record in listings.
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::None => "",
            Status::Processing => "→",
            Status::Rejected => "⨉",
            Status::Offer => "✔",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "clear" | "" => Ok(Status::None),
            "processing" | "process" => Ok(Status::Processing),
            "rejected" | "reject" => Ok(Status::Rejected),
            "offer" => Ok(Status::Offer),
            other => Err(format!(
                "unknown status '{}' (expected none, processing, rejected or offer)",
                other
            )),
        }
    }
}

/// Accepted values for the `Type` column, besides blank.
pub const WORK_TYPES: [&str; 3] = ["Onsite", "Hybrid", "Remote"];

/// One tracked application as stored in a row of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub company: String,
    pub location: String,
    pub job_title: String,
    pub code: Option<String>,
    pub work_type: Option<String>,
    pub link: Option<String>,
    pub applied_date: Option<NaiveDate>,
    pub processed_date: Option<NaiveDate>,
    pub result_date: Option<NaiveDate>,
    pub status: Status,
}

/// Input to `add_record`. Produced by whatever front end gathered the fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub company: String,
    pub location: String,
    pub job_title: String,
    pub code: Option<String>,
    pub work_type: Option<String>,
    pub link: Option<String>,
}

impl Candidate {
    pub fn new(company: &str, location: &str, job_title: &str) -> Self {
        Self {
            company: company.to_string(),
            location: location.to_string(),
            job_title: job_title.to_string(),
            ..Default::default()
        }
    }
}

/// 1-based position of a record among the store's data rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowRef(pub usize);

impl RowRef {
    pub fn from_index(index: usize) -> Self {
        RowRef(index + 1)
    }

    /// Zero-based index into the record list, if this is a valid reference.
    pub fn index(&self) -> Option<usize> {
        self.0.checked_sub(1)
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A record together with the row it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub row: RowRef,
    #[serde(flatten)]
    pub record: Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub rejected: usize,
    pub processing: usize,
    pub offer: usize,
    pub rejection_rate: f64,
    pub processing_rate: f64,
    /// Offers relative to applications that reached processing.
    pub offer_rate: f64,
}

impl Summary {
    pub fn from_records(records: &[Record]) -> Self {
        let total = records.len();
        let count = |status: Status| records.iter().filter(|r| r.status == status).count();
        let rejected = count(Status::Rejected);
        let processing = count(Status::Processing);
        let offer = count(Status::Offer);

        Self {
            total,
            rejected,
            processing,
            offer,
            rejection_rate: ratio(rejected, total),
            processing_rate: ratio(processing, total),
            offer_rate: ratio(offer, processing),
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: Status) -> Record {
        Record {
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            job_title: "Engineer".to_string(),
            code: None,
            work_type: None,
            link: None,
            applied_date: None,
            processed_date: None,
            result_date: None,
            status,
        }
    }

    #[test]
    fn test_status_parses_cli_spellings() {
        assert_eq!("Processing".parse::<Status>(), Ok(Status::Processing));
        assert_eq!(" reject ".parse::<Status>(), Ok(Status::Rejected));
        assert_eq!("offer".parse::<Status>(), Ok(Status::Offer));
        assert_eq!("none".parse::<Status>(), Ok(Status::None));
        assert!("hired".parse::<Status>().is_err());
    }

    #[test]
    fn test_row_ref_is_one_based() {
        assert_eq!(RowRef::from_index(0), RowRef(1));
        assert_eq!(RowRef(3).index(), Some(2));
        assert_eq!(RowRef(0).index(), None);
        assert_eq!(RowRef(7).to_string(), "#7");
    }

    #[test]
    fn test_summary_rates() {
        let records = vec![
            record(Status::Rejected),
            record(Status::Rejected),
            record(Status::Processing),
            record(Status::Processing),
            record(Status::Offer),
            record(Status::None),
            record(Status::None),
            record(Status::None),
        ];
        let summary = Summary::from_records(&records);
        assert_eq!(summary.total, 8);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.processing, 2);
        assert_eq!(summary.offer, 1);
        assert!((summary.rejection_rate - 0.25).abs() < f64::EPSILON);
        assert!((summary.processing_rate - 0.25).abs() < f64::EPSILON);
        assert!((summary.offer_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_of_nothing_has_zero_rates() {
        let summary = Summary::from_records(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.rejection_rate, 0.0);
        assert_eq!(summary.offer_rate, 0.0);

        // offers without anything in processing
        let summary = Summary::from_records(&[record(Status::Offer)]);
        assert_eq!(summary.offer_rate, 0.0);
    }
}

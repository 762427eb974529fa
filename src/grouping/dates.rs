use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar period a date grouping is bucketed by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateGranularity {
    Year,
    Quarter,
    #[default]
    Month,
    Week,
    Day,
}

impl DateGranularity {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "year" => Some(DateGranularity::Year),
            "quarter" => Some(DateGranularity::Quarter),
            "month" => Some(DateGranularity::Month),
            "week" => Some(DateGranularity::Week),
            "day" => Some(DateGranularity::Day),
            _ => None,
        }
    }

    /// Label of the period containing `date`; also used as the group id.
    pub fn label(self, date: NaiveDate) -> String {
        match self {
            DateGranularity::Year => date.format("%Y").to_string(),
            DateGranularity::Quarter => format!("Q{} {}", date.month0() / 3 + 1, date.year()),
            DateGranularity::Month => date.format("%B %Y").to_string(),
            // ISO week with its ISO year, late-December days of week 1 belong to the next year
            DateGranularity::Week => {
                let week = date.iso_week();
                format!("W{:02} {}", week.week(), week.year())
            }
            DateGranularity::Day => date.format("%d %b %Y").to_string(),
        }
    }
}

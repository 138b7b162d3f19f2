use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    // Time of day is optional; all-day events leave it unset.
    pub event_time: Option<NaiveTime>,
    pub image_url: Option<String>,
    pub presenter: Option<String>,
    pub event_url: Option<String>,
    pub is_archived: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Date and time combined, midnight when no time is set. This is what
    /// the countdown widget counts toward.
    pub fn start_datetime(&self) -> chrono::NaiveDateTime {
        self.event_date
            .and_time(self.event_time.unwrap_or(NaiveTime::MIN))
    }
}

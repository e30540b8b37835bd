// libs/doctor-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;

// ==============================================================================
// CALENDAR PRIMITIVES
// ==============================================================================

/// Day of the week, independent of locale. Ordered Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    #[serde(alias = "mon")]
    Monday,
    #[serde(alias = "tue")]
    Tuesday,
    #[serde(alias = "wed")]
    Wednesday,
    #[serde(alias = "thu")]
    Thursday,
    #[serde(alias = "fri")]
    Friday,
    #[serde(alias = "sat")]
    Saturday,
    #[serde(alias = "sun")]
    Sunday,
}

impl DayOfWeek {
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time of day with minute precision, written as `HH:MM` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    /// Minutes elapsed since midnight.
    pub fn minutes(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::new(minutes / 60, minutes % 60)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day '{0}', expected HH:MM")]
pub struct ParseSlotTimeError(String);

impl FromStr for SlotTime {
    type Err = ParseSlotTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Postgres `time` columns come back as HH:MM:SS.
        let parsed = NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map_err(|_| ParseSlotTimeError(s.to_string()))?;

        if parsed.second() != 0 || parsed.nanosecond() != 0 {
            return Err(ParseSlotTimeError(s.to_string()));
        }

        Ok(SlotTime(parsed))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Opening hours of one doctor on one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub doctor_id: Uuid,
    pub day: DayOfWeek,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub is_open: bool,
}

impl DoctorAvailability {
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.is_open && self.start_time >= self.end_time {
            return Err(AvailabilityError::InvalidHours {
                day: self.day,
                start_time: self.start_time,
                end_time: self.end_time,
            });
        }
        Ok(())
    }
}

/// A doctor's recurring weekly template, at most one record per weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyAvailability {
    pub doctor_id: Uuid,
    pub days: BTreeMap<DayOfWeek, DoctorAvailability>,
}

impl WeeklyAvailability {
    pub fn empty(doctor_id: Uuid) -> Self {
        Self { doctor_id, days: BTreeMap::new() }
    }

    pub fn from_records(
        doctor_id: Uuid,
        records: impl IntoIterator<Item = DoctorAvailability>,
    ) -> Result<Self, AvailabilityError> {
        let mut days = BTreeMap::new();
        for record in records {
            if record.doctor_id != doctor_id {
                continue;
            }
            let day = record.day;
            if days.insert(day, record).is_some() {
                return Err(AvailabilityError::DuplicateDay(day));
            }
        }
        Ok(Self { doctor_id, days })
    }

    pub fn for_day(&self, day: DayOfWeek) -> Option<&DoctorAvailability> {
        self.days.get(&day)
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&DoctorAvailability> {
        self.for_day(DayOfWeek::of(date))
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertAvailabilityRequest {
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    #[serde(default = "default_open")]
    pub is_open: bool,
}

fn default_open() -> bool {
    true
}

impl UpsertAvailabilityRequest {
    pub fn into_availability(self, doctor_id: Uuid, day: DayOfWeek) -> DoctorAvailability {
        DoctorAvailability {
            doctor_id,
            day,
            start_time: self.start_time,
            end_time: self.end_time,
            is_open: self.is_open,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("Opening hours on {day} must start before they end ({start_time} - {end_time})")]
    InvalidHours {
        day: DayOfWeek,
        start_time: SlotTime,
        end_time: SlotTime,
    },

    #[error("More than one availability record for {0}")]
    DuplicateDay(DayOfWeek),

    #[error("Availability storage error: {0}")]
    Storage(String),
}

impl From<DatabaseError> for AvailabilityError {
    fn from(err: DatabaseError) -> Self {
        AvailabilityError::Storage(err.to_string())
    }
}

// libs/doctor-cell/src/services/slots.rs
//
// Turns one day of opening hours into the bookable 30-minute grid.

use std::iter::FusedIterator;

use chrono::NaiveDate;

use crate::models::{DoctorAvailability, SlotTime, WeeklyAvailability};

/// Length of one bookable slot.
pub const SLOT_MINUTES: u32 = 30;

/// Grid of slot start times for a single opening window.
///
/// Slots start at `start`, step by [`SLOT_MINUTES`], and only slots that end
/// no later than `end` are offered. A closed day is an empty generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGenerator {
    start: u32,
    end: u32,
}

impl SlotGenerator {
    pub fn new(start: SlotTime, end: SlotTime) -> Self {
        Self { start: start.minutes(), end: end.minutes() }
    }

    pub fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Generator for one availability record; closed or missing records yield nothing.
    pub fn for_availability(availability: Option<&DoctorAvailability>) -> Self {
        match availability {
            Some(day) if day.is_open => Self::new(day.start_time, day.end_time),
            _ => Self::empty(),
        }
    }

    /// Generator for the weekday `date` falls on.
    pub fn for_date(template: &WeeklyAvailability, date: NaiveDate) -> Self {
        Self::for_availability(template.for_date(date))
    }

    pub fn slots(&self) -> Slots {
        Slots { next: self.start, end: self.end }
    }

    /// Whether `time` is one of the slots this generator produces.
    pub fn contains(&self, time: SlotTime) -> bool {
        let minutes = time.minutes();
        minutes >= self.start
            && (minutes - self.start) % SLOT_MINUTES == 0
            && minutes + SLOT_MINUTES <= self.end
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> IntoIterator for &'a SlotGenerator {
    type Item = SlotTime;
    type IntoIter = Slots;

    fn into_iter(self) -> Slots {
        self.slots()
    }
}

/// Lazy iterator over slot start times. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Slots {
    next: u32,
    end: u32,
}

impl Slots {
    fn remaining(&self) -> usize {
        if self.next + SLOT_MINUTES > self.end {
            0
        } else {
            ((self.end - self.next) / SLOT_MINUTES) as usize
        }
    }
}

impl Iterator for Slots {
    type Item = SlotTime;

    fn next(&mut self) -> Option<SlotTime> {
        if self.remaining() == 0 {
            return None;
        }
        let slot = SlotTime::from_minutes(self.next)?;
        self.next += SLOT_MINUTES;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Slots {}

impl FusedIterator for Slots {}

//! Trip aggregate implementation.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use common::{DayId, KeySpace, OwnerId, ScheduleId, TripId};
use serde::{Deserialize, Serialize};

use super::{Day, Schedule, ScheduleDetails, TripError, TripPeriod, TripStatus};
use crate::order_key::OrderKey;

/// Result of moving a schedule.
///
/// Day ids are None for temporary storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub schedule_id: ScheduleId,
    pub before_day_id: Option<DayId>,
    pub after_day_id: Option<DayId>,
    pub position_changed: bool,
}

/// Result of changing a trip's period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodChange {
    /// Days removed from the trip, in date order.
    pub deleted_day_ids: Vec<DayId>,

    /// Days created for newly covered dates, in date order.
    pub created_days: Vec<Day>,

    /// Schedules of the removed days, ordered by (day date, key). They must
    /// be migrated to temporary storage by the store before the days are
    /// deleted.
    pub migrating_schedule_ids: Vec<ScheduleId>,
}

impl PeriodChange {
    pub fn is_empty(&self) -> bool {
        self.deleted_day_ids.is_empty() && self.created_days.is_empty()
    }
}

/// Trip aggregate root.
///
/// Owns the trip's days (sorted by date) and its temporary storage list,
/// and is the only place schedules are created or moved. Every schedule
/// reachable from the trip lives in exactly one of those lists, each
/// ordered by ascending [`OrderKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    id: TripId,
    owner_id: OwnerId,
    title: String,
    period: TripPeriod,
    days: Vec<Day>,
    temporary: Vec<Schedule>,
}

impl Trip {
    /// Creates an undecided trip with no days.
    pub fn new(owner_id: OwnerId, title: impl Into<String>) -> Self {
        Self {
            id: TripId::new(),
            owner_id,
            title: title.into(),
            period: TripPeriod::Undecided,
            days: Vec::new(),
            temporary: Vec::new(),
        }
    }

    /// Reassembles a trip from already validated parts.
    pub(crate) fn restore(
        id: TripId,
        owner_id: OwnerId,
        title: String,
        period: TripPeriod,
        days: Vec<Day>,
        temporary: Vec<Schedule>,
    ) -> Self {
        Self {
            id,
            owner_id,
            title,
            period,
            days,
            temporary,
        }
    }
}

// Query methods
impl Trip {
    pub fn id(&self) -> TripId {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn period(&self) -> TripPeriod {
        self.period
    }

    pub fn status(&self) -> TripStatus {
        self.period.status()
    }

    /// Days sorted by date.
    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn day(&self, day_id: DayId) -> Option<&Day> {
        self.days.iter().find(|day| day.id() == day_id)
    }

    pub fn day_on(&self, date: NaiveDate) -> Option<&Day> {
        self.days.iter().find(|day| day.date() == date)
    }

    /// Unassigned schedules in display order.
    pub fn temporary_storage(&self) -> &[Schedule] {
        &self.temporary
    }

    pub fn schedule(&self, schedule_id: ScheduleId) -> Option<&Schedule> {
        let (day_id, index) = self.locate(schedule_id)?;
        self.list(day_id).ok()?.get(index)
    }

    /// Total number of schedules visible in this aggregate.
    pub fn schedule_count(&self) -> usize {
        self.temporary.len() + self.days.iter().map(|d| d.schedules().len()).sum::<usize>()
    }

    fn list(&self, day_id: Option<DayId>) -> Result<&[Schedule], TripError> {
        match day_id {
            None => Ok(&self.temporary),
            Some(day_id) => self
                .day(day_id)
                .map(Day::schedules)
                .ok_or(TripError::InvalidContainer { day_id }),
        }
    }

    fn list_mut(&mut self, day_id: Option<DayId>) -> Result<&mut Vec<Schedule>, TripError> {
        match day_id {
            None => Ok(&mut self.temporary),
            Some(day_id) => self
                .days
                .iter_mut()
                .find(|day| day.id() == day_id)
                .map(Day::schedules_mut)
                .ok_or(TripError::InvalidContainer { day_id }),
        }
    }

    /// Finds the list holding a schedule and its position in it.
    fn locate(&self, schedule_id: ScheduleId) -> Option<(Option<DayId>, usize)> {
        if let Some(index) = self.temporary.iter().position(|s| s.id() == schedule_id) {
            return Some((None, index));
        }

        self.days.iter().find_map(|day| {
            day.schedules()
                .iter()
                .position(|s| s.id() == schedule_id)
                .map(|index| (Some(day.id()), index))
        })
    }
}

// Command methods
impl Trip {
    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Appends a new schedule to a day, or to temporary storage when
    /// `day_id` is None.
    ///
    /// Capacity limits are not checked here; the caller counts persisted
    /// schedules before calling.
    pub fn create_schedule(
        &mut self,
        day_id: Option<DayId>,
        details: ScheduleDetails,
    ) -> Result<Schedule, TripError> {
        self.create_schedule_in(&KeySpace::current(), day_id, details)
    }

    /// [`Trip::create_schedule`] with keys derived from `space`.
    pub fn create_schedule_in(
        &mut self,
        space: &KeySpace,
        day_id: Option<DayId>,
        details: ScheduleDetails,
    ) -> Result<Schedule, TripError> {
        let trip_id = self.id;
        let list = self.list_mut(day_id)?;

        let order_key = match list.last() {
            None => OrderKey::ZERO,
            Some(last) => last.order_key().next_in(space)?,
        };

        let schedule = Schedule::new(ScheduleId::new(), trip_id, day_id, details, order_key);
        list.push(schedule.clone());
        Ok(schedule)
    }

    /// Moves a schedule so that it ends up at `target_order` in the target
    /// list (a day, or temporary storage when `target_day` is None).
    ///
    /// `target_order` indexes the target list without the moved schedule.
    /// Within the same list, asking for the current position or the one
    /// right after it leaves everything untouched. For the last schedule of
    /// a list that includes `target_order == len`, which is a no-op rather
    /// than [`TripError::InvalidTargetOrder`].
    pub fn move_schedule(
        &mut self,
        schedule_id: ScheduleId,
        target_day: Option<DayId>,
        target_order: usize,
    ) -> Result<MoveOutcome, TripError> {
        self.move_schedule_in(&KeySpace::current(), schedule_id, target_day, target_order)
    }

    /// [`Trip::move_schedule`] with keys derived from `space`.
    pub fn move_schedule_in(
        &mut self,
        space: &KeySpace,
        schedule_id: ScheduleId,
        target_day: Option<DayId>,
        target_order: usize,
    ) -> Result<MoveOutcome, TripError> {
        let target = self.list(target_day)?;
        let (source_day, index) = self
            .locate(schedule_id)
            .ok_or(TripError::ScheduleNotFound(schedule_id))?;

        let mut outcome = MoveOutcome {
            schedule_id,
            before_day_id: source_day,
            after_day_id: target_day,
            position_changed: false,
        };

        if source_day == target_day && (target_order == index || target_order == index + 1) {
            return Ok(outcome);
        }

        let neighbours: Vec<OrderKey> = target
            .iter()
            .filter(|s| s.id() != schedule_id)
            .map(Schedule::order_key)
            .collect();

        if target_order > neighbours.len() {
            return Err(TripError::InvalidTargetOrder {
                order: target_order,
                len: neighbours.len(),
            });
        }

        let order_key = match target_order {
            _ if neighbours.is_empty() => OrderKey::ZERO,
            0 => neighbours[0].before_in(space)?,
            n if n == neighbours.len() => neighbours[n - 1].next_in(space)?,
            n => neighbours[n - 1].mid(&neighbours[n])?,
        };

        let mut schedule = self.list_mut(source_day)?.remove(index);
        schedule.place_at(target_day, order_key);
        self.list_mut(target_day)?.insert(target_order, schedule);

        outcome.position_changed = true;
        Ok(outcome)
    }

    /// Replaces the editable content of a schedule, leaving its placement
    /// alone.
    pub fn update_schedule(
        &mut self,
        schedule_id: ScheduleId,
        details: ScheduleDetails,
    ) -> Result<Schedule, TripError> {
        let (day_id, index) = self
            .locate(schedule_id)
            .ok_or(TripError::ScheduleNotFound(schedule_id))?;

        let schedule = &mut self.list_mut(day_id)?[index];
        schedule.set_details(details);
        Ok(schedule.clone())
    }

    /// Reconciles the trip's days with a new period.
    ///
    /// Days for dates leaving the period are dropped from the aggregate
    /// together with their schedules; the returned change lists those
    /// schedules so the store can migrate them into temporary storage.
    /// Days for dates kept by the new period are untouched.
    pub fn change_period(&mut self, period: TripPeriod) -> Result<PeriodChange, TripError> {
        match (self.period.is_decided(), period.is_decided()) {
            (false, false) => return Ok(PeriodChange::default()),
            (true, false) => return Err(TripError::EmptyPeriodOnDecidedTrip),
            _ => {}
        }

        let new_dates: BTreeSet<NaiveDate> = period.dates().into_iter().collect();
        let old_dates: BTreeSet<NaiveDate> = self.days.iter().map(Day::date).collect();

        let (kept, removed): (Vec<Day>, Vec<Day>) = std::mem::take(&mut self.days)
            .into_iter()
            .partition(|day| new_dates.contains(&day.date()));

        let deleted_day_ids = removed.iter().map(Day::id).collect();
        let migrating_schedule_ids = removed
            .into_iter()
            .flat_map(Day::into_schedules)
            .map(|schedule| schedule.id())
            .collect();

        let created_days: Vec<Day> = new_dates
            .difference(&old_dates)
            .map(|date| Day::create(self.id, *date))
            .collect();

        self.days = kept;
        self.days.extend(created_days.iter().cloned());
        self.days.sort_by_key(Day::date);
        self.period = period;

        Ok(PeriodChange {
            deleted_day_ids,
            created_days,
            migrating_schedule_ids,
        })
    }
}

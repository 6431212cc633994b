//! Per-day data queries.
//!
//! Days are calendar days in a fixed operations time zone, given as a
//! [`FixedOffset`]. A day covers `[local midnight, next local midnight)`, so
//! a sample stamped exactly at midnight belongs to the day it starts.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use log::debug;

use crate::error::{OptionExt, Result};
use crate::store::{PositionStore, RangeQuery};
use crate::Sample;

/// Number of samples of one track with `from <= timestamp <= to`.
pub fn position_count_in_range<St: PositionStore + ?Sized>(
    store: &St,
    track_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<usize> {
    if from > to {
        return Ok(0);
    }
    store.count_in_range(track_id, from, to)
}

/// UTC instants of local midnight starting `day` and the day after it.
pub fn day_bounds(day: NaiveDate, offset: FixedOffset) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = day.succ_opt().ok_or_config("day out of range")?;
    Ok((local_midnight(day, offset)?, local_midnight(next, offset)?))
}

fn local_midnight(day: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let local = day.and_time(NaiveTime::MIN);
    let utc = local
        .checked_sub_signed(Duration::seconds(offset.local_minus_utc() as i64))
        .ok_or_config("day out of range")?;
    Ok(utc.and_utc())
}

fn local_date(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

/// Number of samples a track recorded during one local day.
pub fn position_count_for_day<St: PositionStore + ?Sized>(
    store: &St,
    track_id: &str,
    day: NaiveDate,
    offset: FixedOffset,
) -> Result<usize> {
    let (start, next_start) = day_bounds(day, offset)?;
    position_count_in_range(store, track_id, start, next_start - Duration::nanoseconds(1))
}

/// Local days on which a track has at least one sample, ascending.
///
/// Costs one store query per day with data plus one, regardless of how many
/// samples each day holds.
pub fn dates_with_data<St: PositionStore + ?Sized>(
    store: &St,
    track_id: &str,
    offset: FixedOffset,
) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    let mut query = RangeQuery::ascending().limit(1);

    while let Some(sample) = store.range_query(track_id, &query)?.into_iter().next() {
        let day = local_date(sample.timestamp(), offset);
        dates.push(day);

        let Some(next) = day.succ_opt() else { break };
        let Ok(next_start) = local_midnight(next, offset) else { break };
        query = RangeQuery::ascending().from(next_start).limit(1);
    }

    debug!(
        "[Days] {} has data on {} day(s) at UTC{}",
        track_id,
        dates.len(),
        offset
    );
    Ok(dates)
}

/// Every local day from a track's first sample to its last, inclusive,
/// including days without data. Empty for a track with no samples.
pub fn position_data_date_range<St: PositionStore + ?Sized>(
    store: &St,
    track_id: &str,
    offset: FixedOffset,
) -> Result<Vec<NaiveDate>> {
    let (Some(min), Some(max)) = (store.min_timestamp(track_id)?, store.max_timestamp(track_id)?)
    else {
        return Ok(Vec::new());
    };
    let (first, last) = (local_date(min, offset), local_date(max, offset));
    Ok(first.iter_days().take_while(|d| *d <= last).collect())
}

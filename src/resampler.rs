use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::error::ResampleError;
use crate::series::{Reading, Sample, Series};
use crate::source_type::{AggregationPolicy, SourceType};

/// Bucket width in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution(NonZeroU32);

impl Resolution {
    pub const FIVE: Resolution = Resolution::constant(5);
    pub const FIFTEEN: Resolution = Resolution::constant(15);

    const fn constant(minutes: u32) -> Self {
        match NonZeroU32::new(minutes) {
            Some(n) => Resolution(n),
            None => panic!("resolution constant must be non-zero"),
        }
    }

    pub fn minutes(minutes: i64) -> Result<Self, ResampleError> {
        u32::try_from(minutes)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Resolution)
            .ok_or(ResampleError::InvalidResolution(minutes))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.get())
    }
}

/// Round to the nearest multiple of `resolution` minutes. Sub-minute
/// components are dropped first; a remainder of exactly half the resolution
/// rounds down. Fails only at the edge of the representable date range.
pub fn round_timestamp(
    ts: NaiveDateTime,
    resolution: Resolution,
) -> Result<NaiveDateTime, ResampleError> {
    let res = i64::from(resolution.get());
    let rem = i64::from(ts.minute()) % res;
    let offset = if 2 * rem <= res {
        -Duration::minutes(rem)
    } else {
        Duration::minutes(res - rem)
    };
    ts.checked_sub_signed(Duration::seconds(i64::from(ts.second())))
        .and_then(|t| t.checked_sub_signed(Duration::nanoseconds(i64::from(ts.nanosecond()))))
        .and_then(|t| t.checked_add_signed(offset))
        .ok_or(ResampleError::TimestampOutOfRange {
            timestamp: ts,
            resolution: resolution.get(),
        })
}

/// A series whose timestamps have been rounded, one sample per original sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundedSeries {
    pub id: String,
    pub source_type: SourceType,
    pub resolution: Resolution,
    pub samples: Vec<Sample>,
}

pub fn round_series(
    series: &Series,
    resolution: Resolution,
) -> Result<RoundedSeries, ResampleError> {
    let samples = series
        .samples()
        .iter()
        .map(|s| Ok(Sample::new(round_timestamp(s.timestamp, resolution)?, s.value)))
        .collect::<Result<Vec<_>, ResampleError>>()?;
    Ok(RoundedSeries {
        id: series.id.clone(),
        source_type: series.source_type,
        resolution,
        samples,
    })
}

/// One aggregated value per bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub timestamp: NaiveDateTime,
    pub value: Reading,
}

/// Buckets in the order their timestamps first appeared in the input; no two
/// share a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSeries {
    pub id: String,
    pub source_type: SourceType,
    pub resolution: Resolution,
    pub buckets: Vec<Bucket>,
}

impl AggregatedSeries {
    pub fn lookup(&self) -> HashMap<NaiveDateTime, Reading> {
        self.buckets.iter().map(|b| (b.timestamp, b.value)).collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Merge samples sharing a rounded timestamp using the series' policy.
pub fn aggregate(rounded: &RoundedSeries) -> Result<AggregatedSeries, ResampleError> {
    let policy = rounded
        .source_type
        .policy()
        .ok_or_else(|| ResampleError::UnknownSourceType {
            id: rounded.id.clone(),
        })?;

    let mut order: Vec<NaiveDateTime> = Vec::new();
    let mut groups: HashMap<NaiveDateTime, Vec<i64>> = HashMap::new();
    for sample in &rounded.samples {
        groups
            .entry(sample.timestamp)
            .or_insert_with(|| {
                order.push(sample.timestamp);
                Vec::new()
            })
            .push(sample.value);
    }

    let buckets = order
        .into_iter()
        .map(|timestamp| {
            let values = groups.remove(&timestamp).unwrap_or_default();
            let value = reduce(policy, &values).ok_or_else(|| ResampleError::SumOverflow {
                id: rounded.id.clone(),
                bucket: timestamp,
            })?;
            Ok(Bucket { timestamp, value })
        })
        .collect::<Result<Vec<_>, ResampleError>>()?;

    Ok(AggregatedSeries {
        id: rounded.id.clone(),
        source_type: rounded.source_type,
        resolution: rounded.resolution,
        buckets,
    })
}

/// `None` only on integer overflow.
fn reduce(policy: AggregationPolicy, values: &[i64]) -> Option<Reading> {
    match policy {
        AggregationPolicy::Sum => values
            .iter()
            .try_fold(0i64, |acc, &v| acc.checked_add(v))
            .map(Reading::Int),
        AggregationPolicy::Mean => {
            // i128 so the mean never overflows
            let total: i128 = values.iter().map(|&v| i128::from(v)).sum();
            Some(Reading::Real(total as f64 / values.len() as f64))
        }
    }
}

/// Round then aggregate.
pub fn resample(
    series: &Series,
    resolution: Resolution,
) -> Result<AggregatedSeries, ResampleError> {
    aggregate(&round_series(series, resolution)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_rows, RawRow};
    use crate::series::SeriesDiagnostics;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn at(h: u32, mi: u32) -> NaiveDateTime {
        ts(2008, 1, 1, h, mi, 0)
    }

    fn res(m: i64) -> Resolution {
        Resolution::minutes(m).unwrap()
    }

    fn round(t: NaiveDateTime, r: Resolution) -> NaiveDateTime {
        round_timestamp(t, r).unwrap()
    }

    fn series(id: &str, samples: &[(NaiveDateTime, i64)]) -> Series {
        let samples = samples.iter().map(|&(t, v)| Sample::new(t, v)).collect();
        Series::new(id, samples, SeriesDiagnostics::default())
    }

    #[test]
    fn test_resolution_must_be_positive() {
        assert_eq!(Resolution::minutes(0), Err(ResampleError::InvalidResolution(0)));
        assert_eq!(Resolution::minutes(-5), Err(ResampleError::InvalidResolution(-5)));
        assert_eq!(res(15).get(), 15);
    }

    #[test]
    fn test_round_up_rolls_hour() {
        assert_eq!(round(at(1, 53), res(15)), at(2, 0));
    }

    #[test]
    fn test_half_resolution_rounds_down() {
        assert_eq!(round(at(1, 5), res(10)), at(1, 0));
        assert_eq!(round(at(1, 6), res(10)), at(1, 10));
        assert_eq!(round(at(1, 7), res(15)), at(1, 0));
        assert_eq!(round(at(1, 8), res(15)), at(1, 15));
    }

    #[test]
    fn test_round_rolls_day_month_year() {
        assert_eq!(
            round(ts(2008, 12, 31, 23, 58, 0), res(5)),
            ts(2009, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            round(ts(2008, 2, 29, 23, 55, 0), res(15)),
            ts(2008, 3, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_round_drops_seconds() {
        assert_eq!(round(ts(2008, 1, 1, 1, 2, 59), res(5)), at(1, 0));
        assert_eq!(round(ts(2008, 1, 1, 1, 10, 30), res(5)), at(1, 10));
    }

    #[test]
    fn test_rounded_minute_is_multiple_of_resolution() {
        for r in [1, 2, 3, 4, 5, 6, 10, 12, 15, 20, 30, 60] {
            for minute in 0..60 {
                let rounded = round(at(5, minute), res(r));
                assert_eq!(rounded.minute() % r as u32, 0, "r={r} minute={minute}");
                let diff = (rounded - at(5, minute)).num_minutes().abs();
                assert!(2 * diff <= r, "r={r} minute={minute}");
            }
        }
    }

    #[test]
    fn test_resolution_not_dividing_hour() {
        // 55 % 7 = 6 > 3.5, so up by one minute
        assert_eq!(round(at(1, 55), res(7)), at(1, 56));
        assert_eq!(round(at(1, 51), res(7)), at(1, 49));
    }

    #[test]
    fn test_round_series_keeps_every_sample() {
        let s = series(
            "cgm.csv",
            &[(at(1, 1), 100), (at(1, 2), 110), (at(1, 4), 120)],
        );
        let rounded = round_series(&s, res(5)).unwrap();
        assert_eq!(rounded.samples.len(), s.len());
        let times: Vec<_> = rounded.samples.iter().map(|x| x.timestamp).collect();
        assert_eq!(times, vec![at(1, 0), at(1, 0), at(1, 5)]);
    }

    #[test]
    fn test_sum_policy() {
        let s = series(
            "activity_small.csv",
            &[(at(1, 1), 5), (at(1, 2), 7), (at(1, 9), 1), (at(1, 11), 2)],
        );
        let agg = resample(&s, res(5)).unwrap();
        assert_eq!(
            agg.buckets,
            vec![
                Bucket { timestamp: at(1, 0), value: Reading::Int(12) },
                Bucket { timestamp: at(1, 10), value: Reading::Int(3) },
            ]
        );
    }

    #[test]
    fn test_mean_policy() {
        let s = series("hr_small.csv", &[(at(1, 1), 70), (at(1, 2), 75), (at(1, 20), 80)]);
        let agg = resample(&s, res(15)).unwrap();
        assert_eq!(agg.buckets[0].value, Reading::Real(72.5));
        // singleton mean is exact
        assert_eq!(agg.buckets[1].value, Reading::Real(80.0));
    }

    #[test]
    fn test_first_occurrence_order() {
        let s = series(
            "bolus.csv",
            &[(at(2, 0), 1), (at(1, 0), 2), (at(2, 1), 3), (at(0, 30), 4)],
        );
        let agg = resample(&s, res(5)).unwrap();
        let times: Vec<_> = agg.buckets.iter().map(|b| b.timestamp).collect();
        assert_eq!(times, vec![at(2, 0), at(1, 0), at(0, 30)]);
        assert_eq!(agg.buckets[0].value, Reading::Int(4));
    }

    #[test]
    fn test_bucket_timestamps_unique() {
        let samples: Vec<_> = (0..120).map(|i| (at(0, 0) + Duration::minutes(i), i)).collect();
        let agg = resample(&series("smbg.csv", &samples), res(15)).unwrap();
        let lookup = agg.lookup();
        assert_eq!(lookup.len(), agg.len());
        assert_eq!(agg.len(), 9);
    }

    #[test]
    fn test_unknown_type_is_error() {
        let s = series("weight.csv", &[(at(1, 0), 80)]);
        assert_eq!(
            resample(&s, res(5)),
            Err(ResampleError::UnknownSourceType { id: "weight.csv".into() })
        );
    }

    #[test]
    fn test_sum_overflow_is_error() {
        let s = series("meal.csv", &[(at(1, 0), i64::MAX), (at(1, 1), 1)]);
        assert!(matches!(resample(&s, res(5)), Err(ResampleError::SumOverflow { .. })));
    }

    #[test]
    fn test_round_beyond_max_date_is_error() {
        let rows = vec![
            RawRow::new("+262142-12-31 23:58", "1"),
            RawRow::new("1/1/2008 1:00", "2"),
        ];
        let s = parse_rows("cgm.csv", &rows);
        assert_eq!(s.len(), 2);
        assert!(matches!(
            resample(&s, Resolution::FIVE),
            Err(ResampleError::TimestampOutOfRange { resolution: 5, .. })
        ));
        assert!(round_timestamp(NaiveDateTime::MAX, Resolution::FIFTEEN).is_err());
        // rounding down at the edge still works
        assert!(round_timestamp(NaiveDateTime::MIN, Resolution::FIVE).is_ok());
    }

    #[test]
    fn test_empty_series() {
        let s = series("basal.csv", &[]);
        let agg = resample(&s, res(5)).unwrap();
        assert!(agg.is_empty());
    }
}

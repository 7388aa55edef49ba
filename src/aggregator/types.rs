//! Data types produced by the edge aggregation pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A (weekday, hour) time slice. Weekday 0 is Monday.
///
/// Serialized as `w{weekday}_h{hour}`, the key convention downstream readers
/// of the store rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BucketKey {
    weekday: u8,
    hour: u8,
}

impl BucketKey {
    /// Returns `None` unless `weekday` is in 0..=6 and `hour` in 0..=23.
    pub fn new(weekday: u8, hour: u8) -> Option<Self> {
        (weekday <= 6 && hour <= 23).then_some(Self { weekday, hour })
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}_h{}", self.weekday, self.hour)
    }
}

impl FromStr for BucketKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (weekday, hour) = s
            .strip_prefix('w')
            .and_then(|rest| rest.split_once("_h"))
            .ok_or_else(|| format!("malformed bucket key '{s}'"))?;

        let weekday: u8 = weekday
            .parse()
            .map_err(|_| format!("bad weekday in bucket key '{s}'"))?;
        let hour: u8 = hour
            .parse()
            .map_err(|_| format!("bad hour in bucket key '{s}'"))?;

        BucketKey::new(weekday, hour).ok_or_else(|| format!("bucket key '{s}' out of range"))
    }
}

impl From<BucketKey> for String {
    fn from(key: BucketKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for BucketKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Aggregated statistics for every observed trip of one directed station pair.
///
/// This is the persisted edge schema. `distance` and `anticipated_time` are
/// pair-level constants; only `bucket_counts` is stratified by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEdge {
    pub total: u64,
    pub avg_duration: f64,
    pub distance: f64,
    pub anticipated_time: f64,
    pub bucket_counts: BTreeMap<BucketKey, u64>,
}

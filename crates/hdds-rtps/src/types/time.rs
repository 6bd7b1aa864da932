// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS wire time (seconds + 2^-32 fractions since UNIX epoch).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// RTPS `Time_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    pub seconds: i32,
    pub fraction: u32,
}

pub const TIME_ZERO: Time = Time {
    seconds: 0,
    fraction: 0,
};
pub const TIME_INVALID: Time = Time {
    seconds: -1,
    fraction: 0xFFFF_FFFF,
};
pub const TIME_INFINITE: Time = Time {
    seconds: 0x7FFF_FFFF,
    fraction: 0xFFFF_FFFF,
};

impl Time {
    pub fn new(seconds: i32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    /// Current system time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| {
                log::debug!("[time] System time before UNIX epoch, using timestamp 0");
                Duration::ZERO
            });
        Self::from_duration(since_epoch)
    }

    /// Convert a duration since the UNIX epoch; seconds clamp at `i32::MAX`.
    pub fn from_duration(since_epoch: Duration) -> Self {
        let seconds = i32::try_from(since_epoch.as_secs()).unwrap_or(i32::MAX);
        let nanos = u64::from(since_epoch.subsec_nanos());
        let fraction = u32::try_from((nanos << 32) / 1_000_000_000).unwrap_or(u32::MAX);
        Self { seconds, fraction }
    }

    /// Duration since the UNIX epoch (`None` for negative/invalid times).
    pub fn to_duration(&self) -> Option<Duration> {
        if *self == TIME_INVALID || self.seconds < 0 {
            return None;
        }
        let nanos = (u64::from(self.fraction) * 1_000_000_000) >> 32;
        Some(Duration::new(self.seconds as u64, nanos as u32))
    }

    pub fn is_valid(&self) -> bool {
        *self != TIME_INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversion_is_close() {
        let d = Duration::new(1_700_000_000, 500_000_000);
        let t = Time::from_duration(d);
        assert_eq!(t.seconds, 1_700_000_000);
        assert_eq!(t.fraction, 1 << 31);

        let back = t.to_duration().expect("valid time");
        let drift = if back > d { back - d } else { d - back };
        assert!(drift < Duration::from_nanos(2));
    }

    #[test]
    fn test_invalid_time_has_no_duration() {
        assert!(!TIME_INVALID.is_valid());
        assert_eq!(TIME_INVALID.to_duration(), None);
        assert_eq!(TIME_ZERO.to_duration(), Some(Duration::ZERO));
    }
}

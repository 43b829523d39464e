//! Translation between the boot-relative clock used by captured events and
//! wall-clock time.
//!
//! The capture side stamps events with `CLOCK_BOOTTIME` because reading the
//! real-time clock there is expensive. A single offset is estimated at startup
//! and applied to every event afterwards; it is never re-sampled.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{AutotraceError, Result};

pub const ESTIMATION_ROUNDS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootClock {
    offset_ns: i64,
}

impl BootClock {
    /// Samples both clocks back to back while pinned to one CPU and keeps the
    /// offset from the round with the tightest bracket around the wall read.
    pub fn estimate() -> Result<Self> {
        let _pin = CpuPin::current();

        let mut best: Option<(i64, i64)> = None;
        for _ in 0..ESTIMATION_ROUNDS {
            let before = boot_clock_ns()?;
            let wall = wall_clock_ns()?;
            let after = boot_clock_ns()?;

            let skew = after.saturating_sub(before);
            let midpoint = before.saturating_add(skew / 2);
            let offset = wall.saturating_sub(midpoint);

            if best.is_none_or(|(min_skew, _)| skew < min_skew) {
                best = Some((skew, offset));
            }
        }

        best.map(|(_, offset_ns)| Self { offset_ns })
            .ok_or_else(|| AutotraceError::Clock("no clock samples taken".to_string()))
    }

    pub fn from_offset(offset_ns: i64) -> Self {
        Self { offset_ns }
    }

    pub fn offset_ns(&self) -> i64 {
        self.offset_ns
    }

    /// Wall-clock nanoseconds since the Unix epoch, saturating at the `i64`
    /// bounds.
    pub fn to_wall_ns(&self, boot_ns: u64) -> i64 {
        let boot = i64::try_from(boot_ns).unwrap_or(i64::MAX);
        self.offset_ns.saturating_add(boot)
    }

    pub fn to_datetime(&self, boot_ns: u64) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.to_wall_ns(boot_ns))
    }

    /// Inverse of [`BootClock::to_datetime`]. Times before boot clamp to zero.
    pub fn to_boot_ns(&self, wall: DateTime<Utc>) -> u64 {
        let wall_ns = wall.timestamp_nanos_opt().unwrap_or(if wall.timestamp() < 0 {
            i64::MIN
        } else {
            i64::MAX
        });
        let boot = wall_ns.saturating_sub(self.offset_ns);
        u64::try_from(boot).unwrap_or(0)
    }
}

fn wall_clock_ns() -> Result<i64> {
    Utc::now()
        .timestamp_nanos_opt()
        .ok_or_else(|| AutotraceError::Clock("wall clock outside representable range".to_string()))
}

#[cfg(target_os = "linux")]
fn boot_clock_ns() -> Result<i64> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
    if rc != 0 {
        return Err(AutotraceError::Clock(format!(
            "clock_gettime(CLOCK_BOOTTIME) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok((ts.tv_sec as i64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as i64))
}

#[cfg(not(target_os = "linux"))]
fn boot_clock_ns() -> Result<i64> {
    Err(AutotraceError::Clock(
        "CLOCK_BOOTTIME is only available on linux".to_string(),
    ))
}

/// Restricts the calling thread to the CPU it is running on and restores the
/// previous affinity mask on drop. Pinning is best effort.
struct CpuPin {
    #[cfg(target_os = "linux")]
    previous: Option<libc::cpu_set_t>,
}

impl CpuPin {
    #[cfg(target_os = "linux")]
    fn current() -> Self {
        unsafe {
            let cpu = libc::sched_getcpu();
            if cpu < 0 {
                return Self { previous: None };
            }

            let mut previous: libc::cpu_set_t = std::mem::zeroed();
            let size = std::mem::size_of::<libc::cpu_set_t>();
            if libc::sched_getaffinity(0, size, &mut previous) != 0 {
                return Self { previous: None };
            }

            let mut pinned: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut pinned);
            libc::CPU_SET(cpu as usize, &mut pinned);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &pinned) != 0 {
                return Self { previous: None };
            }

            Self {
                previous: Some(previous),
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn current() -> Self {
        Self {}
    }
}

impl Drop for CpuPin {
    #[cfg(target_os = "linux")]
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            unsafe {
                libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &previous);
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn drop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_with_offset() {
        let clock = BootClock::from_offset(1_700_000_000_000_000_000);
        assert_eq!(clock.to_wall_ns(42), 1_700_000_000_000_000_042);
        assert_eq!(
            clock.to_datetime(1_000_000_000).timestamp(),
            1_700_000_001
        );
    }

    #[test]
    fn round_trips_boot_offsets() {
        let clock = BootClock::from_offset(1_700_000_000_123_456_789);
        for x in [0u64, 1, 999, 1_000_000_007, 86_400_000_000_000, 3_000_000_000_000_000] {
            assert_eq!(clock.to_boot_ns(clock.to_datetime(x)), x);
        }
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let clock = BootClock::from_offset(i64::MAX - 10);
        assert_eq!(clock.to_wall_ns(100), i64::MAX);
        assert_eq!(clock.to_wall_ns(u64::MAX), i64::MAX);

        let clock = BootClock::from_offset(0);
        assert_eq!(clock.to_wall_ns(u64::MAX), i64::MAX);
    }

    #[test]
    fn times_before_boot_clamp_to_zero() {
        let clock = BootClock::from_offset(1_700_000_000_000_000_000);
        let early = Utc.timestamp_nanos(1_000);
        assert_eq!(clock.to_boot_ns(early), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn estimate_tracks_wall_clock() {
        let clock = BootClock::estimate().unwrap();
        let boot_now = boot_clock_ns().unwrap() as u64;
        let wall_now = Utc::now().timestamp_nanos_opt().unwrap();
        let diff = (clock.to_wall_ns(boot_now) - wall_now).abs();
        assert!(diff < 1_000_000_000, "offset drifted by {diff}ns");
    }
}

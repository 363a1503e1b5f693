use crate::error::{DeviceError, Error, Result};
use log::{trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
pub const MAXIMUM_RETRIES: u32 = 10;

/// Bounded retries with a randomized wait in `[interval/2, interval]`
/// between attempts.
pub struct Retry {
    interval: Duration,
    max_attempts: u32,
    rng: StdRng,
}

impl Retry {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self::with_rng(interval, max_attempts, StdRng::from_entropy())
    }

    pub fn seeded(interval: Duration, max_attempts: u32, seed: u64) -> Self {
        Self::with_rng(interval, max_attempts, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(interval: Duration, max_attempts: u32, rng: StdRng) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            rng,
        }
    }

    pub fn backoff(&mut self) -> Duration {
        let max = self.interval.as_micros() as u64;
        let min = max / 2;
        Duration::from_micros(self.rng.gen_range(min..=max))
    }

    /// Runs `operation` until it yields a value.
    ///
    /// `Ok(None)` from the device means nothing is attached and ends the call
    /// straight away with [`Error::NoDeviceAttached`]. A failure that lasts
    /// for every attempt ends with [`Error::DeviceUnreachable`].
    pub async fn call<T, F, Fut>(&mut self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, DeviceError>>,
    {
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(Some(value)) => {
                    trace!("{name} succeeded on attempt {attempt}");
                    return Ok(value);
                }
                Ok(None) => return Err(Error::NoDeviceAttached),
                Err(err) => {
                    warn!("{name} failed (attempt {attempt}/{}): {err}", self.max_attempts);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff()).await;
                    }
                }
            }
        }
        Err(Error::DeviceUnreachable {
            attempts: self.max_attempts,
        })
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL, MAXIMUM_RETRIES)
    }
}

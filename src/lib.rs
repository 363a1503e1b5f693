pub mod console;
pub mod device;
pub mod error;
pub mod event;
pub mod firmware;
pub mod poll;
pub mod protocol;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod settings;

pub mod prelude {
    pub use crate::device::{Device, HidDevice};
    pub use crate::error::{DeviceError, Error};
    pub use crate::event::{Event, Unavailable, Warning, WriteResult};
    pub use crate::firmware::{FirmwareVersion, VersionResolver};
    pub use crate::poll::PollingLoop;
    pub use crate::protocol::Configuration;
    pub use crate::retry::Retry;
    pub use crate::scheduler::Transmitter;
    pub use crate::session::SessionHandle;
    pub use crate::settings::{Filter, Gain, SampleRate, Settings};
    pub use crate::{console, device, event, firmware, poll, protocol, retry, scheduler, settings};

    use std::time::Duration;

    #[derive(Clone, Copy, Debug)]
    pub struct App {
        pub verbose: u8,
        pub retry_interval: Duration,
        pub retry_attempts: u32,
        pub seed: Option<u64>,
    }

    impl App {
        /// Each concurrent user of the device passes its own `stream` so seeded
        /// runs do not back off in lockstep.
        pub fn retry(&self, stream: u64) -> Retry {
            match self.seed {
                Some(seed) => Retry::seeded(
                    self.retry_interval,
                    self.retry_attempts,
                    seed.wrapping_add(stream),
                ),
                None => Retry::new(self.retry_interval, self.retry_attempts),
            }
        }

        pub fn log_level(&self) -> log::LevelFilter {
            match self.verbose {
                0 => log::LevelFilter::Warn,
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn app(seed: Option<u64>) -> App {
            App {
                verbose: 0,
                retry_interval: Duration::from_millis(100),
                retry_attempts: 10,
                seed,
            }
        }

        fn backoffs(mut retry: Retry) -> Vec<Duration> {
            (0..8).map(|_| retry.backoff()).collect()
        }

        #[test]
        fn test_seeded_streams_differ() {
            let conf = app(Some(u64::MAX));
            assert_ne!(backoffs(conf.retry(0)), backoffs(conf.retry(1)));
        }

        #[test]
        fn test_seeded_stream_is_reproducible() {
            let conf = app(Some(42));
            assert_eq!(backoffs(conf.retry(1)), backoffs(conf.retry(1)));
        }
    }
}

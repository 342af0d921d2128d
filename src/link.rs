//! Decides how long the device keeps serving the reader.
//!
//! Field and message callbacks renew the window, the measurement tick ages
//! it. Once the window runs out the main loop hands over to shutdown.

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// No field seen since boot, or the field dropped
    Idle,
    FieldPresent,
    /// At least one message arrived from the reader
    Communicating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    FieldOn,
    FieldOff,
    MessageAvailable,
    /// One measurement tick elapsed
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostLink {
    state: LinkState,
    ticks: u16,
    timeout: u16,
}

impl HostLink {
    /// Window for the first command after boot
    pub const fn boot(first_timeout: u16) -> Self {
        Self {
            state: LinkState::Idle,
            ticks: 0,
            timeout: first_timeout,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn ticks(&self) -> u16 {
        self.ticks
    }

    pub fn timeout(&self) -> u16 {
        self.timeout
    }

    /// The main loop keeps going while this holds
    pub fn alive(&self) -> bool {
        self.ticks < self.timeout
    }

    #[must_use]
    pub fn on(self, event: LinkEvent, config: &Config) -> Self {
        match event {
            LinkEvent::FieldOn => Self {
                state: match self.state {
                    LinkState::Communicating => LinkState::Communicating,
                    _ => LinkState::FieldPresent,
                },
                ticks: 0,
                timeout: config.host_timeout,
            },
            LinkEvent::FieldOff => Self {
                state: LinkState::Idle,
                ticks: 0,
                timeout: config.last_host_timeout,
            },
            LinkEvent::MessageAvailable => Self {
                state: LinkState::Communicating,
                ticks: 0,
                timeout: config.host_timeout,
            },
            LinkEvent::Tick => Self {
                ticks: self.ticks.saturating_add(1),
                ..self
            },
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn config(first: u16, steady: u16, last: u16) -> Config {
        Config {
            first_host_timeout: first,
            host_timeout: steady,
            last_host_timeout: last,
            ..Config::default()
        }
    }

    #[test]
    fn boot_window() {
        let conf = config(3, 10, 5);
        let mut link = HostLink::boot(conf.first_host_timeout);
        for _ in 0..3 {
            assert!(link.alive());
            link = link.on(LinkEvent::Tick, &conf);
        }
        assert!(!link.alive());
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn transitions() {
        let conf = config(3, 10, 5);
        let link = HostLink::boot(3).on(LinkEvent::FieldOn, &conf);
        assert_eq!((link.state(), link.timeout()), (LinkState::FieldPresent, 10));
        let link = link.on(LinkEvent::MessageAvailable, &conf);
        assert_eq!(link.state(), LinkState::Communicating);
        let link = link.on(LinkEvent::FieldOn, &conf);
        assert_eq!(link.state(), LinkState::Communicating);
        let link = link.on(LinkEvent::FieldOff, &conf);
        assert_eq!((link.state(), link.timeout()), (LinkState::Idle, 5));
    }

    #[test]
    fn exits_when_window_elapses() {
        let conf = config(7, 12, 4);
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..500 {
            let mut link = HostLink::boot(conf.first_host_timeout);
            let mut threshold = conf.first_host_timeout;
            let mut since = 0u16;
            let mut loops = 0;
            while link.alive() {
                let event = match rng.gen_range(0..20) {
                    0 => LinkEvent::FieldOn,
                    1 => LinkEvent::FieldOff,
                    2 => LinkEvent::MessageAvailable,
                    _ => LinkEvent::Tick,
                };
                link = link.on(event, &conf);
                match event {
                    LinkEvent::FieldOn | LinkEvent::MessageAvailable => {
                        threshold = conf.host_timeout;
                        since = 0;
                    }
                    LinkEvent::FieldOff => {
                        threshold = conf.last_host_timeout;
                        since = 0;
                    }
                    LinkEvent::Tick => since += 1,
                }
                assert_eq!(link.alive(), since < threshold);
                loops += 1;
                assert!(loops < 100_000);
            }
            assert_eq!(since, threshold);
        }
    }
}

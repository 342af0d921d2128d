//! The main loop and the power lifecycle around it.

use crate::config::{Config, PowerMode};
use crate::display::DisplayText;
use crate::exchange::{publish, HostCommand, Status};
use crate::font::Font;
use crate::interface::{Board, LedPort, NdefTag, PinMux, Power, Thermometer, Ticker, WakeReason};
use crate::link::{HostLink, LinkEvent};
use crate::music::Song;
use crate::scan::{Source, MATRIX_PINS};
use crate::semaphore::TagSemaphore;
use crate::settings::{Settings, Tag};
use crate::shared::{Panel, Shared};

/// Levels lit while blinking on an RTC wake-up
pub const BLINK_LEVELS: u16 = 0xE60;
/// Blink length in display timer ticks
pub const BLINK_TICKS: u32 = 100_000;
/// Pins driven low and as outputs right after reset, the SWD pins excluded
const BOOT_OUTPUTS: u16 = 0x3FF;

/// Every collaborator of one board
pub struct Peripherals<B: Board> {
    pub display_timer: B::DisplayTimer,
    pub tone_timer: B::ToneTimer,
    pub port: B::Port,
    pub pins: B::Pins,
    pub memory: B::Memory,
    pub tag: B::Tag,
    pub storage: B::Storage,
    pub ticker: B::Ticker,
    pub thermometer: B::Thermometer,
    pub power: B::Power,
}

/// How [`App::boot`] left the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Boot {
    /// Serve the reader with [`App::run`]
    Serve,
    /// Woken by the RTC only to blink, go back to sleep
    Blinked,
}

pub struct App<'s, B: Board> {
    shared: &'s Shared<B>,
    pins: B::Pins,
    memory: B::Memory,
    tag: B::Tag,
    settings: Settings<B::Storage>,
    ticker: B::Ticker,
    thermometer: B::Thermometer,
    power: B::Power,
    semaphore: TagSemaphore,
    text: DisplayText,
    song: Option<Song>,
    font: Font,
    /// Text scrolls instead of the spinner
    showing_text: bool,
    spinner_started: bool,
}

impl<'s, B: Board> App<'s, B> {
    /// Takes the peripherals and hands the display ones to `shared`
    pub fn new(shared: &'s Shared<B>, p: Peripherals<B>) -> Self {
        let period = shared.config.refresh_period.ticks();
        shared.install(Panel::new(p.display_timer, p.tone_timer, p.port, period));
        Self {
            shared,
            pins: p.pins,
            memory: p.memory,
            tag: p.tag,
            settings: Settings::new(p.storage),
            ticker: p.ticker,
            thermometer: p.thermometer,
            power: p.power,
            semaphore: TagSemaphore::firmware(),
            text: DisplayText::default(),
            song: None,
            font: Font::default(),
            showing_text: false,
            spinner_started: false,
        }
    }

    fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn font(&self) -> Font {
        self.font
    }

    pub fn text(&self) -> &DisplayText {
        &self.text
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    pub fn showing_text(&self) -> bool {
        self.showing_text
    }

    pub fn settings(&mut self) -> &mut Settings<B::Storage> {
        &mut self.settings
    }

    /// Brings the device up after reset.
    ///
    /// `idle` is called while waiting for the first temperature and for the
    /// wake-up blink, typically a wait for interrupt.
    pub fn boot(&mut self, mut idle: impl FnMut()) -> Boot {
        self.shared.reset_flags();
        self.thermometer.measure();
        while self.thermometer.busy() {
            idle();
        }
        // an empty message until the first status is published
        let initial = self
            .tag
            .begin_message()
            .and_then(|()| self.tag.commit_message());
        if initial.is_err() {
            warn!("Initial message not committed");
        }
        self.shared.with_panel(|panel| {
            panel.clear_leds();
            panel.port.set_direction(BOOT_OUTPUTS, true);
        });

        let wake = self.power.wake_reason();
        info!("Woke up, reason {}", wake);
        if wake == WakeReason::Rtc {
            self.shared.with_panel(|panel| {
                panel.start_timer();
                panel.blink(BLINK_LEVELS, BLINK_TICKS);
            });
            idle();
            return Boot::Blinked;
        }

        self.font = Font::default();
        if !self.settings.load_text(&mut self.text) {
            info!("No stored text, using the default");
            self.text.set_base(self.config().default_text.as_bytes());
        }
        self.song = self.settings.load_song();
        let link = HostLink::boot(self.config().first_host_timeout);
        self.shared.reset_link(link);
        self.ticker.start(1);
        self.shared.with_panel(|panel| panel.start_timer());
        Boot::Serve
    }

    /// Serves the reader until the host window closes
    pub fn run(&mut self, mut idle: impl FnMut()) {
        while self.shared.link().alive() {
            self.service();
            idle();
        }
        info!("Host window closed after {=u16} ticks", self.shared.link().ticks());
    }

    /// One pass of the main loop
    pub fn service(&mut self) {
        if self.shared.field_present() && !self.showing_text {
            self.start_display();
        }
        if !self.showing_text && !self.spinner_started {
            self.spinner_started = true;
            let speed = self.config().idle_speed;
            self.shared.with_panel(|panel| panel.show_spinner(speed));
        }
        if self.shared.take_font_toggle() {
            self.toggle_font();
        }
        if self.showing_text && self.shared.take_temperature() {
            self.text.show_with_temperature(self.shared.temperature());
            let (text, font) = (self.text.shown(), self.font);
            self.shared.with_panel(|panel| panel.rerender(text, font));
        }
        if self.shared.message_pending() && self.semaphore.acquire(&mut self.memory) {
            self.shared.take_message();
            self.receive();
            self.semaphore.release(&mut self.memory);
        }
        if self.showing_text
            && !self.shared.message_pending()
            && self.shared.publish_due()
            && self.semaphore.acquire(&mut self.memory)
        {
            self.shared.take_publish();
            self.publish_status();
            self.semaphore.release(&mut self.memory);
        }
        if self.ticker.expired() {
            if self.showing_text {
                self.thermometer.measure();
            }
            self.shared.link_event(LinkEvent::Tick);
            self.ticker.start(1);
        }
    }

    fn stored_speed(&mut self) -> u8 {
        match self.settings.load_speed() {
            Some(raw) => self.config().speed_from_raw(raw),
            None => self.config().default_speed,
        }
    }

    fn start_display(&mut self) {
        let speed = self.stored_speed();
        info!("Field present, scrolling at speed {=u8}", speed);
        self.shared.clear_display_flags();
        self.ticker.start(1);
        self.pins.matrix_mode();
        self.text.show_with_temperature(self.shared.temperature());
        self.show_text(Some(speed));
        if self.font == Font::Narrow {
            self.start_music();
        }
    }

    /// Restarts the scroll with the shown text
    fn show_text(&mut self, speed: Option<u8>) {
        let (text, font) = (self.text.shown(), self.font);
        self.shared.with_panel(|panel| {
            if let Some(speed) = speed {
                panel.scan.set_speed(speed);
            }
            panel.port.set_direction(MATRIX_PINS, true);
            panel.show_text(text, font);
        });
        self.showing_text = true;
    }

    fn start_music(&mut self) {
        let Some(song) = &self.song else {
            return;
        };
        self.pins.tone_output(true);
        self.shared.with_panel(|panel| panel.play(song));
    }

    fn music_playing(&self) -> bool {
        self.shared
            .with_panel(|panel| panel.music.is_playing())
            .unwrap_or(false)
    }

    fn stop_music(&mut self) {
        self.shared.with_panel(|panel| panel.stop_music());
    }

    fn toggle_font(&mut self) {
        self.font = self.font.toggled();
        debug!("Font switched to {}", self.font);
        if self.showing_text {
            self.show_text(None);
            match self.font {
                Font::Narrow => self.start_music(),
                Font::Wide if self.music_playing() => {
                    self.stop_music();
                    self.pins.tone_output(false);
                }
                Font::Wide => {}
            }
        } else {
            match self.font {
                Font::Narrow => {
                    self.stop_music();
                    self.pins.tone_output(true);
                }
                Font::Wide => self.pins.tone_output(false),
            }
        }
    }

    fn receive(&mut self) {
        if !self.tag.read_message() {
            debug!("Message callback without message");
            return;
        }
        while let Some(record) = self.tag.next_record() {
            if let Some(cmd) = HostCommand::decode(&record) {
                self.apply(cmd);
            }
        }
    }

    fn apply(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::Text(bytes) => {
                self.text.set_base(&bytes);
                info!("New text of {=usize} characters", self.text.base().len());
                if self.settings.store_text(self.text.base()).is_err() {
                    warn!("Text not stored");
                }
                self.text.show_with_temperature(self.shared.temperature());
                self.show_text(None);
            }
            HostCommand::Music(song) => {
                let stored = match &song {
                    Some(song) => self.settings.store_song(song),
                    None => self.settings.write_tag(Tag::Music, &[]),
                };
                if stored.is_err() {
                    warn!("Music not stored");
                }
                self.song = song;
                if self.music_playing() {
                    self.stop_music();
                    if self.song.is_some() {
                        self.start_music();
                    } else {
                        self.pins.tone_output(false);
                    }
                }
            }
            HostCommand::Speed(raw) => {
                let speed = self.config().speed_from_raw(raw);
                info!("Speed set to {=u8}", speed);
                self.shared.with_panel(|panel| panel.set_speed(speed));
                if self.settings.store_speed(raw).is_err() {
                    warn!("Speed not stored");
                }
            }
        }
    }

    fn publish_status(&mut self) {
        let Some(pos) = self.shared.with_panel(|panel| panel.scan.position()) else {
            return;
        };
        let config = self.config();
        let status = Status::new(pos, config.refresh_millis(), config.speed_offset, self.font);
        if publish(&mut self.tag, self.text.shown(), &status).is_err() {
            warn!("Status not published, retrying on the next refresh");
        }
    }

    /// Tears everything down ahead of power removal.
    ///
    /// Returns the sampled brown-out status.
    pub fn prepare_shutdown(&mut self) -> bool {
        self.tag.shutdown();
        self.shared.with_panel(|panel| panel.halt());
        let brownout = self.power.sample_brownout();
        self.ticker.start(2);
        brownout
    }

    /// Enters the configured power state, returns only if power stayed on
    pub fn power_down(&mut self) {
        let brownout = self.prepare_shutdown();
        info!("Powering down, brown-out {=bool}", brownout);
        match self.config().power_mode {
            PowerMode::DeepPowerDown => self.power.enter_deep_power_down(brownout),
            PowerMode::PowerOff => self.power.power_off(),
        }
    }

    pub fn shutdown(mut self) -> ! {
        self.power_down();
        // still powered through the debug pins
        error!("Power was not removed");
        loop {
            core::hint::spin_loop();
        }
    }

    /// Current scan source, mostly for diagnostics
    pub fn source(&self) -> Option<Source> {
        self.shared.source()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::exchange::MIME_TYPE;
    use crate::mock::{Inbound, MockBoard, MockEeprom, MockPower, MockTicker};
    use crate::scan::SWITCH_PIN;
    use crate::semaphore::{FIRMWARE_WORD, HOST_WORD, UNLOCKED};
    use crate::shared::REFRESH_CHANNEL;
    use std::vec;

    fn peripherals(storage: MockEeprom) -> Peripherals<MockBoard> {
        Peripherals {
            display_timer: Default::default(),
            tone_timer: Default::default(),
            port: Default::default(),
            pins: Default::default(),
            memory: Default::default(),
            tag: Default::default(),
            storage,
            ticker: Default::default(),
            thermometer: Default::default(),
            power: Default::default(),
        }
    }

    fn stored(text: &str, speed: Option<u8>, song: Option<&[u8]>) -> MockEeprom {
        let mut settings = Settings::new(MockEeprom::default());
        settings.store_text(text).unwrap();
        if let Some(raw) = speed {
            settings.store_speed(raw).unwrap();
        }
        if let Some(data) = song {
            settings.store_song(&Song::decode(data).unwrap()).unwrap();
        }
        settings.release()
    }

    fn refresh(shared: &Shared<MockBoard>, times: usize) {
        for _ in 0..times {
            shared.with_panel(|p| {
                let channel = REFRESH_CHANNEL as usize;
                p.timer.counter = p.timer.matches[channel];
                p.timer.pending[channel] = true;
            });
            shared.on_timer_interrupt();
        }
    }

    fn switch(shared: &Shared<MockBoard>, pressed: bool) {
        shared.with_panel(|p| p.port.input = if pressed { SWITCH_PIN } else { 0 });
        refresh(shared, 12);
    }

    #[test]
    fn field_starts_scroll_and_publishes_status() {
        let shared = Shared::new(Config::DEFAULT);
        let mut app = App::new(&shared, peripherals(stored("HELLO", Some(10), None)));
        app.thermometer.busy_for = 3;
        assert_eq!(app.boot(|| {}), Boot::Serve);
        assert_eq!(app.thermometer.busy_polls, 4);
        assert_eq!(app.text().base(), "HELLO");
        // boot leaves an empty message for the reader
        assert!(app.tag.committed_payloads().is_empty());

        app.service();
        assert_eq!(app.source(), Some(Source::Spinner));
        assert!(!app.showing_text());

        shared.on_field(true);
        app.service();
        assert!(app.showing_text());
        assert!(app.pins.matrix);
        assert_eq!(app.source(), Some(Source::Pattern));
        assert_eq!(shared.with_panel(|p| p.scan.position().speed), Some(15));

        refresh(&shared, 1);
        app.service();
        let payloads = app.tag.committed_payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], b"HELLO Temp is 0.0 F ");
        let status = &payloads[1];
        assert_eq!(status[0], 0x52);
        assert_eq!(status[7], 10);
        assert_eq!(status[8], Font::Wide.code());
        assert_eq!(app.memory.words[FIRMWARE_WORD], UNLOCKED);
    }

    #[test]
    fn defaults_without_stored_settings() {
        let shared = Shared::new(Config::DEFAULT);
        let mut app = App::new(&shared, peripherals(MockEeprom::default()));
        app.boot(|| {});
        assert_eq!(app.text().base(), Config::DEFAULT.default_text);
        assert_eq!(app.song(), None);
        shared.on_field(true);
        app.service();
        assert_eq!(
            shared.with_panel(|p| p.scan.position().speed),
            Some(Config::DEFAULT.default_speed)
        );
    }

    #[test]
    fn rtc_wake_only_blinks() {
        let shared = Shared::new(Config::DEFAULT);
        let mut p = peripherals(stored("HELLO", None, None));
        p.power = MockPower {
            wake: WakeReason::Rtc,
            ..Default::default()
        };
        let mut app = App::new(&shared, p);
        let mut idles = 0;
        assert_eq!(app.boot(|| idles += 1), Boot::Blinked);
        assert_eq!(idles, 1);
        assert_eq!(app.text().base(), "");
        assert_eq!(shared.with_panel(|p| p.port.levels), Some(BLINK_LEVELS));
        assert_eq!(shared.with_panel(|p| p.timer.interrupts[2]), Some(true));

        app.power_down();
        assert_eq!(app.power.deep_power_down, Some(false));
        assert_eq!(shared.with_panel(|p| (p.port.levels, p.timer.interrupts[2])), Some((0, false)));
    }

    #[test]
    fn text_command_replaces_and_persists() {
        let shared = Shared::new(Config::DEFAULT);
        let mut app = App::new(&shared, peripherals(stored("HELLO", None, None)));
        app.boot(|| {});
        shared.on_field(true);
        app.service();

        app.tag
            .inbox
            .push_back(vec![Inbound::Text("en".into(), b"WORLD\x01".to_vec())]);
        shared.on_message();
        app.service();
        assert!(!shared.message_pending());
        assert_eq!(app.text().base(), "WORLD?");
        assert!(app.text().shown().starts_with("WORLD? Temp is"));
        assert_eq!(app.memory.words[FIRMWARE_WORD], UNLOCKED);

        let mut text = DisplayText::default();
        assert!(app.settings().load_text(&mut text));
        assert_eq!(text.base(), "WORLD?");
    }

    #[test]
    fn host_lock_defers_message() {
        let shared = Shared::new(Config::DEFAULT);
        let mut app = App::new(&shared, peripherals(stored("HELLO", None, None)));
        app.boot(|| {});
        app.memory.words[HOST_WORD] = 0x0002_02FD;
        app.tag
            .inbox
            .push_back(vec![Inbound::Text("en".into(), b"LATER".to_vec())]);
        shared.on_message();
        app.service();
        assert!(shared.message_pending());
        assert_eq!(app.text().base(), "HELLO");

        app.memory.words[HOST_WORD] = UNLOCKED;
        app.service();
        assert!(!shared.message_pending());
        assert_eq!(app.text().base(), "LATER");
    }

    #[test]
    fn speed_and_music_commands() {
        let shared = Shared::new(Config::DEFAULT);
        let mut app = App::new(&shared, peripherals(stored("HELLO", None, None)));
        app.boot(|| {});
        shared.on_field(true);
        app.service();

        app.tag.inbox.push_back(vec![
            Inbound::Mime(MIME_TYPE.into(), vec![0x51, 12]),
            Inbound::Other(vec![0x51, 1]),
            Inbound::Mime(MIME_TYPE.into(), vec![0x53, 100, 0, 2, b'c', b'e', 1, 2]),
        ]);
        shared.on_message();
        app.service();
        assert_eq!(shared.with_panel(|p| p.scan.position().speed), Some(17));
        assert_eq!(app.settings().load_speed(), Some(12));
        let song = app.song().cloned().unwrap();
        assert_eq!(&song.notes[..], b"ce");
        assert_eq!(app.settings().load_song(), Some(song));
        // stored only, plays once the narrow font is selected
        assert_eq!(shared.with_panel(|p| p.music.is_playing()), Some(false));

        app.tag
            .inbox
            .push_back(vec![Inbound::Mime(MIME_TYPE.into(), vec![0x53, 0, 0, 0])]);
        shared.on_message();
        app.service();
        assert_eq!(app.song(), None);
        assert_eq!(app.settings().load_song(), None);
    }

    #[test]
    fn new_song_restarts_playback_and_speed_rearms_refresh() {
        let shared = Shared::new(Config::DEFAULT);
        let song = [50, 0, 2, b'c', b'B', 1, 1];
        let mut app = App::new(&shared, peripherals(stored("HI", None, Some(&song))));
        app.boot(|| {});
        shared.on_field(true);
        app.service();
        switch(&shared, true);
        app.service();
        let (steps, tone) = shared
            .with_panel(|p| (p.music.steps().to_vec(), p.tone.matches[0]))
            .unwrap();
        assert_eq!(steps[0].half_period, 1915);

        app.tag
            .inbox
            .push_back(vec![Inbound::Mime(MIME_TYPE.into(), vec![0x53, 100, 0, 1, b'x', 2])]);
        shared.on_message();
        app.service();
        let (playing, new_steps, new_tone) = shared
            .with_panel(|p| (p.music.is_playing(), p.music.steps().to_vec(), p.tone.matches[0]))
            .unwrap();
        assert!(playing);
        assert_ne!(new_steps, steps);
        assert_eq!(new_steps[0].half_period, 655);
        assert_ne!(new_tone, tone);
        assert!(app.pins.tone);

        shared.with_panel(|p| p.timer.counter = 12_345);
        app.tag
            .inbox
            .push_back(vec![Inbound::Mime(MIME_TYPE.into(), vec![0x51, 12])]);
        shared.on_message();
        app.service();
        let period = Config::DEFAULT.refresh_period.ticks();
        let channel = REFRESH_CHANNEL as usize;
        assert_eq!(
            shared.with_panel(|p| (p.timer.matches[channel], p.timer.interrupts[channel])),
            Some((12_345 + period, true))
        );
        assert_eq!(shared.with_panel(|p| p.scan.position().speed), Some(17));
    }

    #[test]
    fn invalid_song_while_playing_releases_tone_pin() {
        let shared = Shared::new(Config::DEFAULT);
        let song = [50, 0, 2, b'c', b'B', 1, 1];
        let mut app = App::new(&shared, peripherals(stored("HI", None, Some(&song))));
        app.boot(|| {});
        shared.on_field(true);
        app.service();
        switch(&shared, true);
        app.service();
        assert_eq!(shared.with_panel(|p| p.music.is_playing()), Some(true));

        app.tag
            .inbox
            .push_back(vec![Inbound::Mime(MIME_TYPE.into(), vec![0x53, 0, 0, 0])]);
        shared.on_message();
        app.service();
        assert_eq!(app.song(), None);
        assert_eq!(shared.with_panel(|p| p.music.is_playing()), Some(false));
        assert!(!app.pins.tone);
    }

    #[test]
    fn out_of_range_speed_falls_back() {
        let shared = Shared::new(Config::DEFAULT);
        let mut app = App::new(&shared, peripherals(stored("HELLO", Some(200), None)));
        app.boot(|| {});
        shared.on_field(true);
        app.service();
        assert_eq!(
            shared.with_panel(|p| p.scan.position().speed),
            Some(Config::DEFAULT.default_speed)
        );
    }

    #[test]
    fn switch_toggles_font_and_music() {
        let shared = Shared::new(Config::DEFAULT);
        let song = [50, 0, 2, b'c', b'B', 1, 1];
        let mut app = App::new(&shared, peripherals(stored("HI", None, Some(&song))));
        app.boot(|| {});
        shared.on_field(true);
        app.service();
        let wide = shared.with_panel(|p| p.pattern().to_vec()).unwrap();

        switch(&shared, true);
        app.service();
        assert_eq!(app.font(), Font::Narrow);
        assert!(app.pins.tone);
        assert_eq!(shared.with_panel(|p| p.music.is_playing()), Some(true));
        let narrow = shared.with_panel(|p| p.pattern().to_vec()).unwrap();
        assert_eq!(narrow.len(), wide.len());
        assert_ne!(narrow, wide);

        // holding the switch does not toggle again
        refresh(&shared, 20);
        app.service();
        assert_eq!(app.font(), Font::Narrow);

        switch(&shared, false);
        switch(&shared, true);
        app.service();
        assert_eq!(app.font(), Font::Wide);
        assert!(!app.pins.tone);
        assert_eq!(shared.with_panel(|p| p.music.is_playing()), Some(false));
    }

    #[test]
    fn window_closes_then_powers_down() {
        let shared = Shared::new(Config::DEFAULT);
        let mut p = peripherals(stored("HELLO", None, None));
        p.ticker = MockTicker {
            always: true,
            ..Default::default()
        };
        let mut app = App::new(&shared, p);
        app.boot(|| {});
        let mut passes = 0;
        app.run(|| passes += 1);
        assert_eq!(passes, Config::DEFAULT.first_host_timeout);
        assert!(!shared.link().alive());

        app.power_down();
        assert!(app.tag.shut_down);
        assert_eq!(app.power.deep_power_down, Some(false));
        assert_eq!(app.ticker.started, Some(2));
        assert_eq!(shared.with_panel(|p| p.timer.interrupts[0]), Some(false));
    }

    #[test]
    fn power_off_mode() {
        let shared = Shared::new(Config {
            power_mode: PowerMode::PowerOff,
            ..Config::DEFAULT
        });
        let mut app = App::new(&shared, peripherals(MockEeprom::default()));
        app.boot(|| {});
        app.power_down();
        assert!(app.power.powered_off);
        assert_eq!(app.power.deep_power_down, None);
    }
}

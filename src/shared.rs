//! State reached from both the interrupt handlers and the main loop.
//!
//! Everything the display interrupt touches lives in a [`Panel`] behind a
//! critical section. Callback flags are plain atomics, set by interrupts and
//! read-and-cleared by the main loop under a critical section.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use critical_section::Mutex;
use heapless::Vec;

use crate::config::{Config, MAX_PATTERN_LEN};
use crate::display::clamp_temperature;
use crate::font::{render, Font};
use crate::interface::{Board, LedPort, MatchTimer};
use crate::link::{HostLink, LinkEvent};
use crate::music::{Sequencer, Song, STEP_CHANNEL};
use crate::scan::{sample_switch, Debouncer, ScanEngine, Source, MATRIX_PINS};

/// Display timer channel pacing the matrix refresh
pub const REFRESH_CHANNEL: u8 = 0;
/// Display timer channel ending the wake-up blink
pub const BLINK_CHANNEL: u8 = 2;

/// What a refresh interrupt asks of the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Refresh {
    pub wrapped: bool,
    pub pressed: bool,
}

/// The matrix, its raster and both timers
pub struct Panel<B: Board> {
    pub timer: B::DisplayTimer,
    pub tone: B::ToneTimer,
    pub port: B::Port,
    pub scan: ScanEngine,
    pub music: Sequencer,
    debouncer: Debouncer,
    pattern: Vec<u8, MAX_PATTERN_LEN>,
    /// Timer ticks per refresh
    period: u32,
    refreshing: bool,
}

impl<B: Board> Panel<B> {
    pub fn new(timer: B::DisplayTimer, tone: B::ToneTimer, port: B::Port, period: u32) -> Self {
        Self {
            timer,
            tone,
            port,
            scan: ScanEngine::new(),
            music: Sequencer::new(),
            debouncer: Debouncer::new(),
            pattern: Vec::new(),
            period,
            refreshing: false,
        }
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Starts the display timer counting from zero
    pub fn start_timer(&mut self) {
        self.timer.set_prescale(1);
        self.timer.reset();
        self.timer.enable();
    }

    fn schedule_refresh(&mut self) {
        let next = self.timer.count().wrapping_add(self.period);
        self.timer.set_match(REFRESH_CHANNEL, next);
    }

    /// Schedules the next refresh and enables its interrupt
    pub fn arm_refresh(&mut self) {
        self.schedule_refresh();
        self.timer.set_reset_on_match(REFRESH_CHANNEL, false);
        self.timer.set_stop_on_match(REFRESH_CHANNEL, false);
        self.timer.enable_match_interrupt(REFRESH_CHANNEL);
        self.refreshing = true;
    }

    fn pause_refresh(&mut self) {
        self.timer.disable_match_interrupt(REFRESH_CHANNEL);
        self.refreshing = false;
    }

    pub fn clear_leds(&mut self) {
        self.port.write(MATRIX_PINS, 0);
    }

    /// Restarts scrolling with a freshly rendered `text`
    pub fn show_text(&mut self, text: &str, font: Font) {
        self.pause_refresh();
        self.clear_leds();
        render(text.as_bytes(), font, &mut self.pattern);
        self.scan.show_pattern(self.pattern.len());
        self.arm_refresh();
    }

    /// Swaps the raster without moving the scroll position
    pub fn rerender(&mut self, text: &str, font: Font) {
        render(text.as_bytes(), font, &mut self.pattern);
        self.scan.resize(self.pattern.len());
    }

    pub fn show_spinner(&mut self, speed: u8) {
        self.pause_refresh();
        self.clear_leds();
        self.scan.show_spinner(speed);
        self.arm_refresh();
    }

    pub fn set_speed(&mut self, speed: u8) {
        self.pause_refresh();
        self.scan.set_speed(speed);
        self.arm_refresh();
    }

    pub fn play(&mut self, song: &Song) {
        self.music.load(song);
        self.music.start(&mut self.timer, &mut self.tone);
    }

    pub fn stop_music(&mut self) {
        self.music.stop(&mut self.timer, &mut self.tone);
    }

    /// Lights `levels` until the blink channel fires after `ticks`
    pub fn blink(&mut self, levels: u16, ticks: u32) {
        self.port.write(MATRIX_PINS, levels);
        let end = self.timer.count().wrapping_add(ticks);
        self.timer.set_match(BLINK_CHANNEL, end);
        self.timer.set_reset_on_match(BLINK_CHANNEL, false);
        self.timer.set_stop_on_match(BLINK_CHANNEL, false);
        self.timer.enable_match_interrupt(BLINK_CHANNEL);
    }

    /// Stops every interrupt source and turns the matrix and buzzer off
    pub fn halt(&mut self) {
        self.pause_refresh();
        self.timer.disable_match_interrupt(BLINK_CHANNEL);
        self.stop_music();
        self.clear_leds();
    }

    /// One refresh tick: switch sample, next column, next deadline
    pub fn refresh(&mut self) -> Refresh {
        let high = sample_switch(&mut self.port);
        self.timer.clear_match(REFRESH_CHANNEL);
        self.schedule_refresh();
        let pressed = self.debouncer.sample(high);
        let tick = self.scan.tick(&self.pattern);
        self.port.write(MATRIX_PINS, tick.levels);
        Refresh {
            wrapped: tick.wrapped,
            pressed,
        }
    }

    /// Services whatever display timer channels are pending
    pub fn on_timer(&mut self) -> Option<Refresh> {
        let mut refresh = None;
        if self.timer.match_pending(REFRESH_CHANNEL) {
            if self.refreshing {
                refresh = Some(self.refresh());
            } else {
                self.timer.clear_match(REFRESH_CHANNEL);
            }
        }
        if self.timer.match_pending(STEP_CHANNEL) {
            self.music.on_step(&mut self.timer, &mut self.tone);
        }
        if self.timer.match_pending(BLINK_CHANNEL) {
            self.timer.clear_match(BLINK_CHANNEL);
            self.timer.disable_match_interrupt(BLINK_CHANNEL);
        }
        refresh
    }
}

pub struct Shared<B: Board> {
    pub config: Config,
    panel: Mutex<RefCell<Option<Panel<B>>>>,
    link: Mutex<Cell<HostLink>>,
    /// The reader wrote a message
    message_pending: AtomicBool,
    field: AtomicBool,
    publish_due: AtomicBool,
    temperature_due: AtomicBool,
    font_toggle: AtomicBool,
    /// Tenths of a degree Fahrenheit
    temperature: AtomicI32,
}

/// Reads and clears `flag`, thumbv6m has no atomic swap
fn take(flag: &AtomicBool) -> bool {
    critical_section::with(|_| {
        let set = flag.load(Ordering::Acquire);
        if set {
            flag.store(false, Ordering::Release);
        }
        set
    })
}

impl<B: Board> Shared<B> {
    pub const fn new(config: Config) -> Self {
        let first = config.first_host_timeout;
        Self {
            config,
            panel: Mutex::new(RefCell::new(None)),
            link: Mutex::new(Cell::new(HostLink::boot(first))),
            message_pending: AtomicBool::new(false),
            field: AtomicBool::new(false),
            publish_due: AtomicBool::new(false),
            temperature_due: AtomicBool::new(false),
            font_toggle: AtomicBool::new(false),
            temperature: AtomicI32::new(0),
        }
    }

    pub fn install(&self, panel: Panel<B>) {
        critical_section::with(|cs| self.panel.borrow_ref_mut(cs).replace(panel));
    }

    /// Runs `f` on the panel with interrupts masked, `None` before install
    pub fn with_panel<R>(&self, f: impl FnOnce(&mut Panel<B>) -> R) -> Option<R> {
        critical_section::with(|cs| self.panel.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Display timer interrupt
    pub fn on_timer_interrupt(&self) {
        let refresh = self.with_panel(|panel| panel.on_timer()).flatten();
        if let Some(refresh) = refresh {
            if refresh.wrapped {
                self.temperature_due.store(true, Ordering::Release);
            }
            if refresh.pressed {
                debug!("Switch pressed");
                self.font_toggle.store(true, Ordering::Release);
            }
            self.publish_due.store(true, Ordering::Release);
        }
    }

    /// Field status callback of the NFC controller
    pub fn on_field(&self, present: bool) {
        self.field.store(present, Ordering::Release);
        let event = if present {
            LinkEvent::FieldOn
        } else {
            LinkEvent::FieldOff
        };
        self.link_event(event);
    }

    /// Message callback of the NFC controller
    pub fn on_message(&self) {
        self.message_pending.store(true, Ordering::Release);
        self.link_event(LinkEvent::MessageAvailable);
    }

    /// Temperature sensor callback
    pub fn on_temperature(&self, tenths: i32) {
        self.temperature
            .store(clamp_temperature(tenths), Ordering::Release);
    }

    pub fn link_event(&self, event: LinkEvent) {
        critical_section::with(|cs| {
            let link = self.link.borrow(cs);
            link.set(link.get().on(event, &self.config));
        });
    }

    pub fn link(&self) -> HostLink {
        critical_section::with(|cs| self.link.borrow(cs).get())
    }

    pub fn reset_link(&self, link: HostLink) {
        critical_section::with(|cs| self.link.borrow(cs).set(link));
    }

    pub fn field_present(&self) -> bool {
        self.field.load(Ordering::Acquire)
    }

    pub fn temperature(&self) -> i32 {
        self.temperature.load(Ordering::Acquire)
    }

    pub fn message_pending(&self) -> bool {
        self.message_pending.load(Ordering::Acquire)
    }

    pub fn take_message(&self) -> bool {
        take(&self.message_pending)
    }

    pub fn take_publish(&self) -> bool {
        take(&self.publish_due)
    }

    pub fn take_temperature(&self) -> bool {
        take(&self.temperature_due)
    }

    pub fn take_font_toggle(&self) -> bool {
        take(&self.font_toggle)
    }

    pub fn publish_due(&self) -> bool {
        self.publish_due.load(Ordering::Acquire)
    }

    /// Drops refresh requests raised before the display started
    pub fn clear_display_flags(&self) {
        self.publish_due.store(false, Ordering::Release);
        self.temperature_due.store(false, Ordering::Release);
    }

    /// Clears every callback flag, as after reset
    pub fn reset_flags(&self) {
        self.clear_display_flags();
        self.message_pending.store(false, Ordering::Release);
        self.field.store(false, Ordering::Release);
        self.font_toggle.store(false, Ordering::Release);
    }

    pub fn source(&self) -> Option<Source> {
        self.with_panel(|panel| panel.scan.source())
    }
}

#![no_main]
#![no_std]

use core::ffi::c_int;

use cortex_m::peripheral::NVIC;
use cortex_m_rt::{entry, interrupt};
use defmt_rtt as _;
use panic_probe as _;

use ledtag::{App, Boot, Config, Shared};

mod board;
mod regs;
mod sdk;
mod vectors;

use board::Lpc8n04;
use vectors::{interrupt, Interrupt};

static SHARED: Shared<Lpc8n04> = Shared::new(Config::DEFAULT);

#[entry]
fn main() -> ! {
    let peripherals = defmt::unwrap!(board::init());
    let mut app = App::new(&SHARED, peripherals);
    // SAFETY: the handler only touches SHARED
    unsafe { NVIC::unmask(Interrupt::CT32B0) };

    let idle = cortex_m::asm::wfi;
    if app.boot(idle) == Boot::Serve {
        app.run(idle);
    }
    app.shutdown()
}

/// Display timer: matrix refresh, music steps and the wake-up blink
#[interrupt]
fn CT32B0() {
    SHARED.on_timer_interrupt();
}

#[no_mangle]
extern "C" fn NDEFT2T_FieldStatus_Cb(status: bool) {
    SHARED.on_field(status);
}

#[no_mangle]
extern "C" fn NDEFT2T_MsgAvailable_Cb() {
    SHARED.on_message();
}

#[no_mangle]
extern "C" fn App_TmeasCb(_resolution: c_int, _format: c_int, value: c_int, context: u32) {
    if context == 0 {
        SHARED.on_temperature(value);
    }
}

//! Places the linker scripts and links the vendor NFC and power routines.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    fs::write(out.join("memory.x"), include_bytes!("memory.x")).unwrap();
    fs::write(out.join("device.x"), include_bytes!("device.x")).unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    // static library built from the chip SDK: ndeft2t, tmeas, timer, eeprom, pmu
    println!("cargo:rerun-if-env-changed=LPC8N04_SDK_LIB");
    if let Some(dir) = env::var_os("LPC8N04_SDK_LIB") {
        println!("cargo:rustc-link-search={}", PathBuf::from(dir).display());
    }
    println!("cargo:rustc-link-lib=static=lpc8n04sdk");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=device.x");
    println!("cargo:rerun-if-changed=build.rs");
}

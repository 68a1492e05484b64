//! Blink demo: toggles an LED on an STM32F401 Nucleo board from one task
//! while a second task just logs a heartbeat, to exercise round-robin
//! scheduling between two equal-priority tasks.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use preemptrs::config::STACK_SMALL_WORDS;
use preemptrs::{kernel_init, kernel_start, task_create, task_delay};

#[cfg(feature = "pac")]
use stm32_metapac as pac;

#[cfg(feature = "pac")]
fn led_init() {
    pac::RCC.ahb1enr().modify(|w| w.set_gpioaen(true));
    pac::GPIOA
        .moder()
        .modify(|w| w.set_moder(5, pac::gpio::vals::Moder::OUTPUT));
    pac::GPIOA
        .otyper()
        .modify(|w| w.set_ot(5, pac::gpio::vals::Ot::PUSHPULL));
}

#[cfg(feature = "pac")]
fn led_on() {
    pac::GPIOA.bsrr().write(|w| w.set_bs(5, true));
}

#[cfg(feature = "pac")]
fn led_off() {
    pac::GPIOA.bsrr().write(|w| w.set_br(5, true));
}

#[cfg(not(feature = "pac"))]
fn led_init() {}
#[cfg(not(feature = "pac"))]
fn led_on() {}
#[cfg(not(feature = "pac"))]
fn led_off() {}

fn blink_task(_: *mut ()) -> ! {
    preemptrs::info!("blink task started");
    loop {
        led_on();
        preemptrs::info!("LED ON");
        let _ = task_delay(500);

        led_off();
        preemptrs::info!("LED OFF");
        let _ = task_delay(500);
    }
}

fn heartbeat_task(_: *mut ()) -> ! {
    preemptrs::info!("heartbeat task started");
    loop {
        preemptrs::info!("tick");
        let _ = task_delay(1000);
    }
}

#[entry]
fn main() -> ! {
    led_init();

    kernel_init().expect("kernel init failed");

    task_create("blink", blink_task, core::ptr::null_mut(), 5, STACK_SMALL_WORDS)
        .expect("blink task create failed");
    task_create(
        "heartbeat",
        heartbeat_task,
        core::ptr::null_mut(),
        5,
        STACK_SMALL_WORDS,
    )
    .expect("heartbeat task create failed");

    preemptrs::info!("starting kernel");
    kernel_start().expect("kernel start failed");

    loop {
        cortex_m::asm::nop();
    }
}

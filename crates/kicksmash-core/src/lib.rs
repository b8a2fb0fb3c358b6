//! kicksmash-core - Parallel NOR flash bus controller
//!
//! This crate drives a 16-bit (or stacked 32-bit) parallel NOR flash by
//! toggling its address, data and control lines directly. It implements the
//! AMD-style command protocol (unlock cycles, program, erase, autoselect),
//! toggle-bit completion polling, boot-block sector geometry, programming
//! with read-back verification, a pin connectivity self-test and a passive
//! bus snoop monitor. It is designed to be `no_std` compatible so it can run
//! in the Kicksmash firmware as well as against a simulated board on a host.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc` and serde
//!   derives for the configuration types)
//! - `alloc` - Enable heap allocation
//!
//! # Example
//!
//! ```ignore
//! use kicksmash_core::{BusWidthMode, FlashController};
//!
//! fn dump_id<B, C, M>(ctl: &mut FlashController<B, C, M>)
//! where
//!     B: kicksmash_core::bus::BusDriver,
//!     C: kicksmash_core::hal::Clock,
//!     M: kicksmash_core::hal::AccessMask,
//! {
//!     let id = ctl.identify();
//!     let info = kicksmash_core::chip::resolve_sector_map(id.part1);
//!     println!("{:08x} {}", id.part1, info.name);
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bus;
pub mod chip;
pub mod controller;
pub mod error;
pub mod hal;
pub mod mode;
pub mod ops;
pub mod poll;
pub mod protocol;
pub mod selftest;
pub mod snoop;
pub mod status;

#[cfg(test)]
mod mock;

pub use chip::{ChipBlockInfo, DeviceId, Sector};
pub use controller::{BusState, FlashController, DEVICE_WORDS};
pub use error::{Error, Result};
pub use mode::BusWidthMode;
pub use ops::EraseMode;
pub use poll::PollMode;
pub use selftest::{Fault, FaultList};
pub use snoop::CaptureBuffer;
pub use status::DeviceStatus;

//! kicksmash-sim - Simulated Kicksmash board
//!
//! Runs the real controller from `kicksmash-core` against a software model
//! of the board: STM32-style GPIO ports with pulls, one or two 16-bit NOR
//! flash chips on the data bus, a virtual 72 MHz clock and optionally a
//! host system driving the ROM socket. Faults (stuck or shorted lines,
//! weak or hanging chips) can be injected to exercise the error paths.
//!
//! # Example
//!
//! ```
//! use kicksmash_sim::{BoardConfig, SimBoard};
//!
//! let mut board = SimBoard::new(&BoardConfig::default()).unwrap();
//! let flash = board.flash();
//! flash.write(0x100, &[0x1234]).unwrap();
//! let mut buf = [0u32; 1];
//! flash.read(0x100, &mut buf).unwrap();
//! assert_eq!(buf[0], 0x1234);
//! ```

pub mod board;
pub mod chip;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod mask;
pub mod ports;

pub use board::{SimBoard, SimBus, SimController};
pub use chip::{ChipFaults, ChipStats, ChipTiming, NorChip};
pub use clock::SimClock;
pub use config::BoardConfig;
pub use error::{Result, SimError};
pub use host::{HostBus, HostCycle};
pub use mask::SimMask;
pub use ports::{BusStats, ChipSlot, SimPorts};

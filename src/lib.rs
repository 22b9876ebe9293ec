//! # Desktop Overlay
//!
//! **Desktop Overlay** captures the composited image of the primary display
//! into CPU memory with the DXGI Desktop Duplication API, and presents CPU
//! images through borderless, click-through, always-on-top overlay windows.
//!
//! ## Features
//!
//! - Only Copies A Frame When The Desktop Changed.
//! - Row Pitch Aware Transfers In Both Directions.
//! - Every Driver Object Released On Every Failure Path.
//! - C ABI Through The `desktop-overlay-ffi` Crate.
//!
//! ## Installation
//!
//! Add this library to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! desktop-overlay = "0.1.0"
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), desktop_overlay::Error> {
//! use desktop_overlay::capture::{CaptureSession, Frame};
//! use desktop_overlay::overlay::OverlaySurface;
//! use desktop_overlay::window::WindowClass;
//!
//! let _class = WindowClass::register()?;
//!
//! let mut session = CaptureSession::new()?;
//! let (width, height) = session.size();
//! let mut frame = vec![0; session.buffer_len()];
//!
//! // Show a quarter-size corner of the desktop in the top-left corner
//! let mut overlay = OverlaySurface::new(0, 0, width / 2, height / 2)?;
//!
//! loop {
//!     if let Frame::Delivered(_) = session.get_frame(&mut frame)? {
//!         // The overlay is narrower than a desktop row, so copy the corner out
//!         let row = (width / 2) as usize * 4;
//!         let corner: Vec<u8> =
//!             frame.chunks(width as usize * 4).take((height / 2) as usize).flat_map(|r| &r[..row]).copied().collect();
//!         overlay.upload(&corner, width / 2, height / 2, 4)?;
//!     }
//!     overlay.poll_events();
//! }
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::inconsistent_struct_constructor)]
#![warn(clippy::must_use_candidate)]
#![warn(clippy::ptr_as_ptr)]
#![warn(clippy::borrow_as_ptr)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]

pub mod capture;
pub mod chain;
#[cfg(windows)]
pub mod d3d11;
pub mod driver;
pub mod error;
pub mod overlay;
pub mod registry;
pub mod settings;
pub mod staging;
pub mod transfer;
#[cfg(windows)]
pub mod window;

pub use error::{Error, Status};

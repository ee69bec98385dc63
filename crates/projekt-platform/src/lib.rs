// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Host side: the native window and the event queue the loop drains each tick.

mod error;
mod events;
mod window;

pub use error::{Origin, PlatformError};
pub use events::{Event, EventQueue};
pub use window::{run_event_loop, translate, HostWindow};

pub use winit;

// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::panic::Location;

use thiserror::Error;
use winit::error::{EventLoopError, OsError};

/// `file:line` of the call that raised the error.
#[derive(Clone, Copy)]
pub struct Origin(&'static Location<'static>);

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.file(), self.0.line())
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("event loop: {source} (at {at})")]
    EventLoop {
        #[source]
        source: EventLoopError,
        at: Origin,
    },
    #[error("create window: {source} (at {at})")]
    CreateWindow {
        #[source]
        source: OsError,
        at: Origin,
    },
}

impl PlatformError {
    #[track_caller]
    pub fn event_loop(source: EventLoopError) -> Self {
        PlatformError::EventLoop {
            source,
            at: Origin(Location::caller()),
        }
    }

    #[track_caller]
    pub fn create_window(source: OsError) -> Self {
        PlatformError::CreateWindow {
            source,
            at: Origin(Location::caller()),
        }
    }
}

// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

use ash::vk;

/// Where an error was raised; printed as `file:line`.
#[derive(Clone, Copy)]
pub struct Site(&'static Location<'static>);

impl Site {
    #[track_caller]
    pub fn here() -> Self {
        Site(Location::caller())
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.file(), self.0.line())
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// SPIR-V is not built by cargo; `shaders/README.md` has the `glslc` lines.
pub const MISSING_SPIRV_HINT: &str =
    " (compile the GLSL in shaders/ with glslc, see shaders/README.md)";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A native object could not be created.
    #[error("{what} failed: {result:?} (at {at})")]
    Setup {
        what: &'static str,
        result: vk::Result,
        at: Site,
    },

    /// Acquisition, submission or presentation failed for a reason other than a stale surface.
    #[error("{what} failed: {result:?} (at {at})")]
    Device {
        what: &'static str,
        result: vk::Result,
        at: Site,
    },

    /// No memory type / adapter / surface format satisfies the request.
    #[error("no suitable {what}: {detail} (at {at})")]
    Unsupported {
        what: &'static str,
        detail: String,
        at: Site,
    },

    /// The windowing layer refused to hand out a surface or its handles.
    #[error("host window: {detail} (at {at})")]
    Host { detail: String, at: Site },

    #[error("shader {}: {source}{hint} (at {at})", path.display())]
    Shader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        /// Empty unless the file is missing.
        hint: &'static str,
        at: Site,
    },

    /// A part of the presentation stack is missing because an earlier rebuild failed.
    #[error("{what} is unavailable (at {at})")]
    Unavailable { what: &'static str, at: Site },

    /// A frame-driver call arrived in the wrong phase.
    #[error("{call} is not valid while the frame is {phase} (at {at})")]
    OutOfOrder {
        call: &'static str,
        phase: &'static str,
        at: Site,
    },
}

impl RenderError {
    #[track_caller]
    pub fn setup(what: &'static str, result: vk::Result) -> Self {
        RenderError::Setup {
            what,
            result,
            at: Site::here(),
        }
    }

    #[track_caller]
    pub fn device(what: &'static str, result: vk::Result) -> Self {
        RenderError::Device {
            what,
            result,
            at: Site::here(),
        }
    }

    #[track_caller]
    pub fn unsupported(what: &'static str, detail: impl Into<String>) -> Self {
        RenderError::Unsupported {
            what,
            detail: detail.into(),
            at: Site::here(),
        }
    }

    #[track_caller]
    pub fn host(detail: impl fmt::Display) -> Self {
        RenderError::Host {
            detail: detail.to_string(),
            at: Site::here(),
        }
    }

    #[track_caller]
    pub fn shader(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let hint = match source.kind() {
            std::io::ErrorKind::NotFound => MISSING_SPIRV_HINT,
            _ => "",
        };
        RenderError::Shader {
            path: path.into(),
            source,
            hint,
            at: Site::here(),
        }
    }

    #[track_caller]
    pub fn unavailable(what: &'static str) -> Self {
        RenderError::Unavailable {
            what,
            at: Site::here(),
        }
    }

    #[track_caller]
    pub fn out_of_order(call: &'static str, phase: &'static str) -> Self {
        RenderError::OutOfOrder {
            call,
            phase,
            at: Site::here(),
        }
    }

    /// True for the windowing-layer failures ("no display"), false for driver rejections.
    pub fn is_host(&self) -> bool {
        matches!(self, RenderError::Host { .. })
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

// SPDX-License-Identifier: CEPL-1.0
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tracing::info;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

use crate::error::PlatformError;
use crate::events::{Event, EventQueue};

/// Maps one winit window event onto queue events. Events the loop does not
/// care about map to nothing.
pub fn translate(event: &WindowEvent, scale_factor: f64) -> Vec<Event> {
    match event {
        WindowEvent::Resized(size) => {
            let logical: LogicalSize<u32> = size.to_logical(scale_factor);
            vec![
                Event::WindowResized {
                    width: logical.width,
                    height: logical.height,
                },
                Event::FramebufferResized {
                    width: size.width,
                    height: size.height,
                },
            ]
        }
        WindowEvent::Moved(pos) => vec![Event::WindowMoved { x: pos.x, y: pos.y }],
        WindowEvent::Focused(focused) => vec![Event::Focused(*focused)],
        WindowEvent::CloseRequested => vec![Event::CloseRequested],
        _ => Vec::new(),
    }
}

/// Creates the platform event loop and drives `app` on it until the loop exits.
pub fn run_event_loop<A: ApplicationHandler>(app: &mut A) -> Result<(), PlatformError> {
    let event_loop = match EventLoop::new() {
        Ok(el) => el,
        Err(e) => return Err(PlatformError::event_loop(e)),
    };
    match event_loop.run_app(app) {
        Ok(()) => Ok(()),
        Err(e) => Err(PlatformError::event_loop(e)),
    }
}

/// The one native window the engine draws into.
pub struct HostWindow {
    window: Window,
}

impl HostWindow {
    pub fn create(
        event_loop: &ActiveEventLoop,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, PlatformError> {
        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => return Err(PlatformError::create_window(e)),
        };
        let size = window.inner_size();
        info!(
            "window: '{title}' {}x{} (scale {:.2})",
            size.width,
            size.height,
            window.scale_factor()
        );
        Ok(Self { window })
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    /// Drawable size in physical pixels; zero while minimized on some platforms.
    pub fn framebuffer_size(&self) -> PhysicalSize<u32> {
        self.window.inner_size()
    }

    /// Queues the translated event if it belongs to this window.
    pub fn accept(&self, id: WindowId, event: &WindowEvent, queue: &mut EventQueue) {
        if id != self.window.id() {
            return;
        }
        queue.extend(translate(event, self.window.scale_factor()));
    }
}

impl HasWindowHandle for HostWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for HostWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn resize_reports_logical_and_framebuffer_sizes() {
        let events = translate(&WindowEvent::Resized(PhysicalSize::new(1600, 1200)), 2.0);
        assert_eq!(
            events,
            vec![
                Event::WindowResized {
                    width: 800,
                    height: 600
                },
                Event::FramebufferResized {
                    width: 1600,
                    height: 1200
                },
            ]
        );
    }

    #[test]
    fn minimized_resize_is_passed_through_as_zero() {
        let events = translate(&WindowEvent::Resized(PhysicalSize::new(0, 0)), 1.0);
        assert!(events.contains(&Event::FramebufferResized {
            width: 0,
            height: 0
        }));
    }

    #[test]
    fn moves_focus_and_close_map_one_to_one() {
        assert_eq!(
            translate(&WindowEvent::Moved(PhysicalPosition::new(-5, 40)), 1.0),
            vec![Event::WindowMoved { x: -5, y: 40 }]
        );
        assert_eq!(
            translate(&WindowEvent::Focused(false), 1.0),
            vec![Event::Focused(false)]
        );
        assert_eq!(
            translate(&WindowEvent::CloseRequested, 1.0),
            vec![Event::CloseRequested]
        );
    }

    #[test]
    fn unrelated_events_are_dropped() {
        assert!(translate(&WindowEvent::RedrawRequested, 1.0).is_empty());
        assert!(translate(&WindowEvent::Occluded(true), 1.0).is_empty());
    }
}

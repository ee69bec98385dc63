// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use projekt_core::{append_fatal, init_tracing, ShutdownSignal, ERROR_LOG_FILE};
use projekt_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow},
    window::WindowId,
};
use projekt_platform::{run_event_loop, Event, EventQueue, HostWindow};
use projekt_render::{FrameOutcome, RenderSize, Renderer};
use projekt_render_vk::VkRenderer;
use tracing::{debug, error, info};

mod config;
mod game;

use config::{AppCfg, DEFAULT_CONFIG_FILE};
use game::Game;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Overrides `window.width`
    #[arg(long)]
    width: Option<u32>,
    /// Overrides `window.height`
    #[arg(long)]
    height: Option<u32>,
}

struct App {
    cfg: AppCfg,
    window: Option<HostWindow>,
    renderer: Option<VkRenderer>,
    events: EventQueue,
    shutdown: ShutdownSignal,
    game: Game,

    last_tick: Instant,
    last_fps_instant: Instant,
    presented_at_last_report: u64,
    /// First error that ended the loop.
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        let now = Instant::now();
        App {
            cfg,
            window: None,
            renderer: None,
            events: EventQueue::new(),
            shutdown: ShutdownSignal::new(),
            game: Game::new(),
            last_tick: now,
            last_fps_instant: now,
            presented_at_last_report: 0,
            fatal: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let wcfg = &self.cfg.window;
        let window = HostWindow::create(event_loop, &wcfg.title, wcfg.width, wcfg.height)
            .context("creating the window")?;
        let size = window.framebuffer_size();
        let settings = self.cfg.render.to_settings();

        let renderer = VkRenderer::new(
            &window,
            &window,
            RenderSize::new(size.width, size.height),
            &settings,
        )
        .context("initialising the Vulkan renderer")?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.last_tick = Instant::now();
        self.last_fps_instant = self.last_tick;
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        self.shutdown.raise();
        event_loop.exit();
    }

    fn handle_events(&mut self) {
        for event in self.events.drain() {
            match event {
                Event::FramebufferResized { width, height } => {
                    if let Some(r) = self.renderer.as_mut() {
                        r.resize(RenderSize::new(width, height));
                    }
                }
                Event::WindowResized { width, height } => {
                    debug!("window resized to {width}x{height} (logical)");
                }
                Event::WindowMoved { x, y } => debug!("window moved to ({x}, {y})"),
                Event::Focused(focused) => info!("Focused({focused})"),
                Event::CloseRequested => {
                    info!("CloseRequested");
                    self.shutdown.raise();
                }
            }
        }
    }

    fn frame(&mut self) -> Result<()> {
        let now = Instant::now();
        self.game.tick(now.duration_since(self.last_tick));
        self.last_tick = now;

        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        let aspect = renderer.extent().aspect();
        let block = self.game.uniforms(aspect);
        if let FrameOutcome::Skipped = renderer.render(&block).context("rendering a frame")? {
            debug!("frame skipped");
        }

        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            let stats = renderer.stats();
            info!(
                "fps ~ {} (skipped={} rebuilds={} ticks={} t={:.1}s)",
                stats.frames_presented - self.presented_at_last_report,
                stats.frames_skipped,
                stats.rebuilds,
                self.game.ticks(),
                self.game.elapsed()
            );
            self.presented_at_last_report = stats.frames_presented;
            self.last_fps_instant = now;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // STRICT TEARDOWN ORDER: renderer (device, surface) before the window it draws into.
        let result = match self.renderer.take() {
            Some(r) => r.shutdown().context("shutting the renderer down"),
            None => Ok(()),
        };
        self.window = None;
        result
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            window.accept(window_id, &event, &mut self.events);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.handle_events();
        if self.shutdown.is_raised() {
            event_loop.exit();
            return;
        }
        if let Err(e) = self.frame() {
            self.fail(event_loop, e);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Err(e) = self.stop() {
            error!("{e:#}");
            if self.fatal.is_none() {
                self.fatal = Some(e);
            }
        }
    }
}

fn load_config(args: &Args) -> Result<AppCfg> {
    let mut cfg = AppCfg::load(&args.config)?;
    if let Some(w) = args.width {
        cfg.window.width = w;
    }
    if let Some(h) = args.height {
        cfg.window.height = h;
    }
    Ok(cfg)
}

fn run(args: &Args) -> Result<Option<anyhow::Error>> {
    let cfg = load_config(args).context("loading configuration")?;
    let mut app = App::new(cfg);
    run_event_loop(&mut app).context("running the event loop")?;
    Ok(app.fatal.take())
}

fn report(err: &anyhow::Error) -> ExitCode {
    error!("fatal: {err:#}");
    if let Err(io) = append_fatal(Path::new(ERROR_LOG_FILE), "run", err) {
        error!("could not write {ERROR_LOG_FILE}: {io}");
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(None) => {
            info!("clean exit");
            ExitCode::SUCCESS
        }
        Ok(Some(err)) | Err(err) => report(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_the_configured_size() {
        let args = Args::parse_from([
            "projekt",
            "--config",
            "/nonexistent/projekt.toml",
            "--width",
            "640",
        ]);
        let cfg = load_config(&args).unwrap();
        assert_eq!((cfg.window.width, cfg.window.height), (640, 720));
    }

    #[test]
    fn fatal_window_errors_carry_their_origin() {
        use projekt_core::format_fatal;
        use projekt_platform::winit::error::EventLoopError;
        use projekt_platform::PlatformError;

        let line = line!() + 1;
        let err = anyhow::Error::new(PlatformError::event_loop(EventLoopError::RecreationAttempt))
            .context("running the event loop");
        let text = format_fatal("run", &err);
        assert!(text.contains("running the event loop"));
        assert!(text.contains(&format!("{}:{line}", file!())));
    }

    #[test]
    fn config_path_defaults_to_the_working_directory() {
        let args = Args::parse_from(["projekt"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(args.width.is_none() && args.height.is_none());
    }
}

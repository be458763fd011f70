use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use slide_projector::app::{print_scene_summary, run_headless};
use slide_projector::{
    DrawList, InputEvent, KeyCode, MouseButton, NamedKey, ProjectorConfig, Renderer, SceneControl,
    SlideProjectorScene,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let config = options.load_config()?;

    if options.summary_only {
        return run_headless(&config);
    }
    match run_interactive(&config) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install a GPU driver to enable rendering)."
                );
                run_headless(&config)
            } else {
                Err(err)
            }
        }
    }
}

fn run_interactive(config: &ProjectorConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let mut app = ProjectorApp {
        config: config.clone(),
        session: None,
        last_error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated with error")?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct ProjectorApp {
    config: ProjectorConfig,
    session: Option<Session>,
    last_error: Option<anyhow::Error>,
}

struct Session {
    renderer: Renderer,
    scene: SlideProjectorScene,
    draws: DrawList,
}

impl ProjectorApp {
    fn start_session(&self, event_loop: &ActiveEventLoop) -> Result<Session> {
        let window_config = &self.config.window;
        let attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(LogicalSize::new(
                f64::from(window_config.width),
                f64::from(window_config.height),
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let mut renderer = block_on(Renderer::new(Arc::clone(&window)))
            .map_err(|err| WindowInitError::from_error("GPU renderer", format!("{err:#}")))?;
        println!("GPU: {}", renderer.adapter_summary());

        let mut scene = SlideProjectorScene::new(&self.config, &mut renderer)
            .context("failed to build the scene")?;
        renderer
            .load_program(scene.shader())
            .context("failed to create render pipelines")?;
        let size = renderer.size();
        scene.resize(size.width, size.height);

        let mut draws = DrawList::new();
        scene.record_frame(&mut draws);
        print_scene_summary(&scene.summary(), &draws);

        window.request_redraw();
        Ok(Session {
            renderer,
            scene,
            draws,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for ProjectorApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        match self.start_session(event_loop) {
            Ok(session) => self.session = Some(session),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(Session {
            renderer,
            scene,
            draws,
        }) = self.session.as_mut()
        else {
            return;
        };
        if window_id != renderer.window_id() {
            return;
        }

        let input = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                return;
            }
            WindowEvent::Resized(size) => {
                renderer.resize(size);
                Some(InputEvent::Resized {
                    width: size.width,
                    height: size.height,
                })
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.repeat {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                map_keycode(code).map(|key| match event.state {
                    ElementState::Pressed => InputEvent::KeyPressed(key),
                    ElementState::Released => InputEvent::KeyReleased(key),
                })
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = map_mouse_button(button);
                Some(match state {
                    ElementState::Pressed => InputEvent::MousePressed(button),
                    ElementState::Released => InputEvent::MouseReleased(button),
                })
            }
            WindowEvent::CursorMoved { position, .. } => Some(InputEvent::CursorMoved(Vec2::new(
                position.x as f32,
                position.y as f32,
            ))),
            WindowEvent::MouseWheel { delta, .. } => Some(InputEvent::Scrolled(match delta {
                MouseScrollDelta::LineDelta(_, y) => y,
                MouseScrollDelta::PixelDelta(position) => position.y as f32,
            })),
            WindowEvent::RedrawRequested => {
                scene.advance_frame(renderer);
                scene.record_frame(draws);
                match renderer.render(draws) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        renderer.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        self.last_error = Some(anyhow!("GPU is out of memory"));
                        event_loop.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        info!("Surface timeout; retrying next frame");
                    }
                    Err(other) => warn!("failed to acquire the next frame: {other}"),
                }
                return;
            }
            _ => None,
        };

        if let Some(input) = input {
            if scene.handle_event(renderer, input) == SceneControl::Exit {
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(session) = &self.session {
            session.renderer.window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut session) = self.session.take() {
            session.scene.release(&mut session.renderer);
            info!("released scene resources");
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    let index = match button {
        WinitMouseButton::Left => 0,
        WinitMouseButton::Right => 1,
        WinitMouseButton::Middle => 2,
        WinitMouseButton::Back => 3,
        WinitMouseButton::Forward => 4,
        WinitMouseButton::Other(value) => value.min(u16::from(u8::MAX)),
    };
    MouseButton::new(index as u8)
}

fn map_keycode(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    Some(match code {
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::Enter | Key::NumpadEnter => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Backspace => KeyCode::Named(NamedKey::Backspace),
        Key::Home => KeyCode::Named(NamedKey::Home),
        Key::End => KeyCode::Named(NamedKey::End),
        Key::PageUp => KeyCode::Named(NamedKey::PageUp),
        Key::PageDown => KeyCode::Named(NamedKey::PageDown),
        Key::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        Key::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        Key::ControlLeft => KeyCode::Named(NamedKey::LeftCtrl),
        Key::ControlRight => KeyCode::Named(NamedKey::RightCtrl),
        Key::AltLeft => KeyCode::Named(NamedKey::LeftAlt),
        Key::AltRight => KeyCode::Named(NamedKey::RightAlt),
        Key::Digit0 => KeyCode::Digit(0),
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::Digit6 => KeyCode::Digit(6),
        Key::Digit7 => KeyCode::Digit(7),
        Key::Digit8 => KeyCode::Digit(8),
        Key::Digit9 => KeyCode::Digit(9),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyB => KeyCode::Character('B'),
        Key::KeyC => KeyCode::Character('C'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyE => KeyCode::Character('E'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyH => KeyCode::Character('H'),
        Key::KeyI => KeyCode::Character('I'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyK => KeyCode::Character('K'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyN => KeyCode::Character('N'),
        Key::KeyO => KeyCode::Character('O'),
        Key::KeyP => KeyCode::Character('P'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyU => KeyCode::Character('U'),
        Key::KeyV => KeyCode::Character('V'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyY => KeyCode::Character('Y'),
        Key::KeyZ => KeyCode::Character('Z'),
        Key::F1 => KeyCode::Function(1),
        Key::F2 => KeyCode::Function(2),
        Key::F3 => KeyCode::Function(3),
        Key::F4 => KeyCode::Function(4),
        Key::F5 => KeyCode::Function(5),
        Key::F6 => KeyCode::Function(6),
        Key::F7 => KeyCode::Function(7),
        Key::F8 => KeyCode::Function(8),
        Key::F9 => KeyCode::Function(9),
        Key::F10 => KeyCode::Function(10),
        Key::F11 => KeyCode::Function(11),
        Key::F12 => KeyCode::Function(12),
        _ => return None,
    })
}

const USAGE: &str =
    "Usage: slide-projector [--image PATH] [--video PATH] [--config FILE] [--summary-only]";

struct CliOptions {
    image: Option<PathBuf>,
    video: Option<PathBuf>,
    config: Option<PathBuf>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut options = Self {
            image: None,
            video: None,
            config: None,
            summary_only: false,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--image" => options.image = Some(Self::value(&arg, args.next())?),
                "--video" => options.video = Some(Self::value(&arg, args.next())?),
                "--config" => options.config = Some(Self::value(&arg, args.next())?),
                "--summary-only" => options.summary_only = true,
                "--help" | "-h" => {
                    println!("{USAGE}");
                    std::process::exit(0);
                }
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }

    fn value(flag: &str, value: Option<String>) -> Result<PathBuf> {
        value
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("{flag} expects a path. {USAGE}"))
    }

    /// Loads the config file, if any, and applies the path overrides.
    fn load_config(&self) -> Result<ProjectorConfig> {
        let mut config = match &self.config {
            Some(path) => ProjectorConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ProjectorConfig::default(),
        };
        if let Some(image) = &self.image {
            config.slides.image = image.clone();
        }
        if let Some(video) = &self.video {
            config.slides.video = video.clone();
            if self.image.is_none() {
                config.slides.start_with_video = true;
            }
        }
        if config.slides.pixels_per_unit <= 0.0 {
            warn!("pixels_per_unit must be positive; using 100");
            config.slides.pixels_per_unit = 100.0;
        }
        Ok(config)
    }
}

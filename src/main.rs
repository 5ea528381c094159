//! Driftwm - a floating window-management core
//!
//! This is the entry point. It runs the compositor on the headless backend
//! with a single output until the quit binding stops it. The event loop
//! paces every connected output with its own frame timer.

use log::info;

use driftwm::backend::{EventLoop, HeadlessBackend, InputEvent, OutputEvent};
use driftwm::compositor::{CompositorState, OutputId, OutputMode, Transform};
use driftwm::config::Config;
use driftwm::input::{DeviceId, DeviceKind};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting driftwm");

    let config = Config::from_env()?;
    let mut state = CompositorState::new(config, HeadlessBackend::new());
    let mut event_loop = EventLoop::new()?;

    let sender = event_loop.sender();
    sender.send(
        OutputEvent::Connected {
            output: OutputId(1),
            name: "HEADLESS-1".to_string(),
            modes: vec![OutputMode {
                width: 1920,
                height: 1080,
                refresh: 60_000,
                preferred: true,
            }],
            scale: 1.0,
            transform: Transform::Normal,
        }
        .into(),
    )?;
    sender.send(
        InputEvent::DeviceAdded {
            device: DeviceId(1),
            kind: DeviceKind::Keyboard,
        }
        .into(),
    )?;
    sender.send(
        InputEvent::DeviceAdded {
            device: DeviceId(2),
            kind: DeviceKind::Pointer,
        }
        .into(),
    )?;

    event_loop.run(&mut state)?;

    info!("Driftwm exited");
    Ok(())
}

//! Event loop integration
//!
//! Drives the compositor state from calloop. The collaborator delivers its
//! events through a channel. Every output connected through the channel gets
//! a repeating frame timer at its refresh rate, removed again on disconnect.

use std::collections::HashMap;
use std::time::Duration;

use calloop::channel::{self, Channel, Event, Sender};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop as CalLoop, LoopHandle, LoopSignal, RegistrationToken};
use log::{debug, error, trace};

use crate::backend::{Backend, BackendEvent, OutputEvent};
use crate::compositor::{CompositorState, OutputId};

/// Driftwm event loop wrapper
pub struct EventLoop<B: Backend + 'static> {
    /// Calloop event loop
    event_loop: CalLoop<'static, CompositorState<B>>,
    /// Loop signal for waking/stopping
    signal: LoopSignal,
    /// Collaborator side of the event channel
    sender: Sender<BackendEvent>,
}

impl<B: Backend + 'static> EventLoop<B> {
    /// Create a new event loop
    pub fn new() -> anyhow::Result<Self> {
        let event_loop = CalLoop::try_new()?;
        let signal = event_loop.get_signal();

        let (sender, receiver): (Sender<BackendEvent>, Channel<BackendEvent>) = channel::channel();
        let handle = event_loop.handle();
        let mut frame_timers = HashMap::new();
        event_loop
            .handle()
            .insert_source(receiver, move |event, _, state: &mut CompositorState<B>| {
                let Event::Msg(event) = event else {
                    debug!("Backend event channel closed");
                    return;
                };
                let output = match &event {
                    BackendEvent::Output(OutputEvent::Connected { output, .. })
                    | BackendEvent::Output(OutputEvent::Disconnected { output }) => Some(*output),
                    _ => None,
                };
                state.handle_event(event);
                if let Some(output) = output {
                    sync_frame_timer(&handle, &mut frame_timers, state, output);
                }
            })
            .map_err(|e| e.error)?;

        Ok(Self {
            event_loop,
            signal,
            sender,
        })
    }

    /// Get a handle to register event sources
    pub fn handle(&self) -> LoopHandle<'static, CompositorState<B>> {
        self.event_loop.handle()
    }

    /// Sender the collaborator delivers its events through
    pub fn sender(&self) -> Sender<BackendEvent> {
        self.sender.clone()
    }

    /// Get the loop signal for waking
    pub fn signal(&self) -> LoopSignal {
        self.signal.clone()
    }

    /// Emit a frame event for `output` every `interval`
    pub fn insert_frame_timer(
        &self,
        output: OutputId,
        interval: Duration,
    ) -> anyhow::Result<RegistrationToken> {
        let token = insert_frame_timer(&self.event_loop.handle(), output, interval)?;
        Ok(token)
    }

    /// Run one iteration of the event loop
    pub fn dispatch(
        &mut self,
        timeout: Option<Duration>,
        state: &mut CompositorState<B>,
    ) -> anyhow::Result<()> {
        self.event_loop.dispatch(timeout, state)?;
        Ok(())
    }

    /// Run the event loop until the compositor stops
    pub fn run(&mut self, state: &mut CompositorState<B>) -> anyhow::Result<()> {
        debug!("Starting event loop");

        let signal = self.signal.clone();
        if let Err(e) = self.event_loop.run(None, state, |state| {
            if !state.is_running() {
                signal.stop();
            }
        }) {
            error!("Event loop error: {}", e);
            return Err(e.into());
        }

        debug!("Event loop stopped");
        Ok(())
    }

    /// Stop the event loop
    pub fn stop(&self) {
        self.signal.stop();
    }
}

fn insert_frame_timer<B: Backend + 'static>(
    handle: &LoopHandle<'static, CompositorState<B>>,
    output: OutputId,
    interval: Duration,
) -> Result<RegistrationToken, calloop::Error> {
    handle
        .insert_source(Timer::from_duration(interval), move |_, _, state| {
            trace!("Frame timer for {:?}", output);
            state.handle_event(OutputEvent::Frame { output }.into());
            TimeoutAction::ToDuration(interval)
        })
        .map_err(|e| e.error)
}

/// Give `output` a frame timer while it is in the layout, and none otherwise
fn sync_frame_timer<B: Backend + 'static>(
    handle: &LoopHandle<'static, CompositorState<B>>,
    timers: &mut HashMap<OutputId, RegistrationToken>,
    state: &CompositorState<B>,
    output: OutputId,
) {
    let interval = state
        .outputs
        .get(output)
        .and_then(|o| o.current_mode())
        .map(|mode| mode.frame_interval());

    match (interval, timers.contains_key(&output)) {
        (Some(interval), false) => match insert_frame_timer(handle, output, interval) {
            Ok(token) => {
                debug!("Frame timer for {:?} every {:?}", output, interval);
                timers.insert(output, token);
            }
            Err(err) => error!("Failed to add frame timer for {:?}: {}", output, err),
        },
        (None, true) => {
            if let Some(token) = timers.remove(&output) {
                handle.remove(token);
                debug!("Frame timer for {:?} removed", output);
            }
        }
        _ => {}
    }
}

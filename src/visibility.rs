//! Single owner of the "is the window on screen" flag.
//!
//! The hotkey thread, the tray thread and the UI all hold a
//! [`VisibilityController`] handle. Handles only enqueue commands; one
//! dedicated thread applies them in arrival order, so two presses racing
//! each other can never both see the window as hidden.

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::thread;

/// Platform side of the window. Calls are made from the owner thread only.
pub trait WindowSurface: Send + 'static {
    /// Make the window visible and bring it to the front.
    fn show(&mut self) -> Result<()>;
    fn center(&mut self) -> Result<()>;
    fn hide(&mut self) -> Result<()>;
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The window went from hidden to visible. Sent once per transition.
    Shown,
}

const EVENT_BACKLOG: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Show,
    Hide,
    Toggle,
    Query,
    Shutdown,
}

struct Request {
    command: Command,
    reply: Sender<bool>,
}

/// Cloneable handle to the visibility owner thread.
#[derive(Clone, Debug)]
pub struct VisibilityController {
    tx: Sender<Request>,
}

impl VisibilityController {
    /// Start the owner thread. The window is assumed hidden.
    pub fn spawn<S: WindowSurface>(surface: S) -> Result<(Self, Receiver<WindowEvent>)> {
        let (tx, rx) = crossbeam_channel::unbounded::<Request>();
        let (event_tx, event_rx) = bounded(EVENT_BACKLOG);
        let owner = Owner {
            surface,
            visible: false,
            events: event_tx,
        };
        thread::Builder::new()
            .name("visibility".to_string())
            .spawn(move || owner.run(rx))?;
        Ok((Self { tx }, event_rx))
    }

    /// Show if hidden, hide if visible. Returns the new state.
    pub fn toggle(&self) -> bool {
        self.request(Command::Toggle)
    }

    pub fn show(&self) -> bool {
        self.request(Command::Show)
    }

    pub fn hide(&self) -> bool {
        self.request(Command::Hide)
    }

    /// Current state, ordered after every command sent before it.
    pub fn is_visible(&self) -> bool {
        self.request(Command::Query)
    }

    /// Stop the owner thread. Later calls report `false`.
    pub fn shutdown(&self) {
        self.request(Command::Shutdown);
    }

    fn request(&self, command: Command) -> bool {
        let (reply, answer) = bounded(1);
        if self.tx.send(Request { command, reply }).is_err() {
            tracing::warn!("Visibility owner is gone; {:?} ignored", command);
            return false;
        }
        answer.recv().unwrap_or_else(|_| {
            tracing::warn!("Visibility owner exited before answering {:?}", command);
            false
        })
    }
}

struct Owner<S> {
    surface: S,
    visible: bool,
    events: Sender<WindowEvent>,
}

impl<S: WindowSurface> Owner<S> {
    fn run(mut self, rx: Receiver<Request>) {
        tracing::debug!("Visibility owner started");
        while let Ok(Request { command, reply }) = rx.recv() {
            let stop = command == Command::Shutdown;
            let state = self.apply(command);
            let _ = reply.send(state);
            if stop {
                break;
            }
        }
        tracing::debug!("Visibility owner stopped");
    }

    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Show => self.show(),
            Command::Hide => self.hide(),
            Command::Toggle if self.visible => self.hide(),
            Command::Toggle => self.show(),
            Command::Query | Command::Shutdown => {}
        }
        self.visible
    }

    // The flag only moves once the platform call went through.
    fn show(&mut self) {
        if let Err(e) = self.surface.show() {
            tracing::warn!("Failed to show window: {:#}", e);
            return;
        }
        if let Err(e) = self.surface.center() {
            tracing::warn!("Failed to center window: {:#}", e);
        }
        if self.visible {
            return;
        }
        self.visible = true;
        tracing::info!("Window shown");
        match self.events.try_send(WindowEvent::Shown) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("UI is not draining window events; dropped Shown")
            }
        }
    }

    fn hide(&mut self) {
        if !self.visible {
            return;
        }
        if let Err(e) = self.surface.hide() {
            tracing::warn!("Failed to hide window: {:#}", e);
            return;
        }
        self.visible = false;
        tracing::info!("Window hidden");
    }
}

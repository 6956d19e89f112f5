//! Loops that turn hotkey presses and tray clicks into controller calls.
//!
//! The platform code only has to push one message per physical press or
//! click; everything after that is shared and testable here.

use crate::visibility::VisibilityController;
use crossbeam_channel::Receiver;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrayAction {
    ToggleWindow,
    Quit,
}

/// Toggle once per received press. Returns when every sender is gone.
pub fn run_hotkey_loop(presses: Receiver<()>, controller: VisibilityController) {
    while let Ok(()) = presses.recv() {
        let visible = controller.toggle();
        tracing::debug!("Hotkey: window visible = {}", visible);
    }
    tracing::info!("Hotkey loop finished");
}

/// Dispatch tray actions. `Quit` skips the controller and ends the loop.
pub fn run_tray_loop<F>(actions: Receiver<TrayAction>, controller: VisibilityController, on_quit: F)
where
    F: FnOnce(),
{
    while let Ok(action) = actions.recv() {
        match action {
            TrayAction::ToggleWindow => {
                let visible = controller.toggle();
                tracing::debug!("Tray: window visible = {}", visible);
            }
            TrayAction::Quit => {
                tracing::info!("Quit action received");
                on_quit();
                return;
            }
        }
    }
    tracing::info!("Tray loop finished");
}

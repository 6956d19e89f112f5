use crate::config::{Config, ConfigStore};
use crate::translator::Translator;
use crate::visibility::VisibilityController;
use std::sync::{Arc, RwLock};

/// Write-only access to the system clipboard.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> anyhow::Result<()>;
}

/// Everything the window is allowed to call.
///
/// Cheap to clone; clones share the controller, the settings and the
/// HTTP client.
#[derive(Clone)]
pub struct App {
    controller: VisibilityController,
    translator: Translator,
    config: Arc<RwLock<Arc<Config>>>,
    store: ConfigStore,
    clipboard: Arc<dyn Clipboard>,
}

impl App {
    pub fn new(
        controller: VisibilityController,
        translator: Translator,
        config: Config,
        store: ConfigStore,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            controller,
            translator,
            config: Arc::new(RwLock::new(Arc::new(config))),
            store,
            clipboard,
        }
    }

    pub fn toggle(&self) -> bool {
        self.controller.toggle()
    }

    pub fn show(&self) -> bool {
        self.controller.show()
    }

    pub fn hide(&self) -> bool {
        self.controller.hide()
    }

    pub fn is_visible(&self) -> bool {
        self.controller.is_visible()
    }

    /// Snapshot of the settings in effect right now.
    pub fn config(&self) -> Arc<Config> {
        let guard = self.config.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Translate with whatever settings are current when the call starts.
    pub async fn translate(&self, text: &str) -> Vec<String> {
        tracing::info!("Translate request ({} chars)", text.chars().count());
        let cfg = self.config();
        self.translator.translate(text, &cfg).await
    }

    /// Swap in new settings and persist them. `false` means the file could
    /// not be written; the new values are still used for this session.
    pub fn save_settings(&self, api_key: &str, api_url: &str, model: &str, target_lang: &str) -> bool {
        let cfg = Arc::new(Config::new(api_key, api_url, model, target_lang));
        {
            let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::clone(&cfg);
        }
        match self.store.save(&cfg) {
            Ok(()) => {
                tracing::info!("Settings saved to {}", self.store.path().display());
                true
            }
            Err(e) => {
                tracing::error!("Failed to save settings: {:#}", e);
                false
            }
        }
    }

    pub fn copy_to_clipboard(&self, text: &str) -> bool {
        match self.clipboard.write_text(text) {
            Ok(()) => {
                tracing::info!("Copied {} chars to clipboard", text.chars().count());
                true
            }
            Err(e) => {
                tracing::warn!("Clipboard write failed: {:#}", e);
                false
            }
        }
    }

    /// Copy a picked candidate and get out of the way.
    pub fn copy_and_hide(&self, text: &str) -> bool {
        let copied = self.copy_to_clipboard(text);
        self.hide();
        copied
    }
}

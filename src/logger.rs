use once_cell::sync::OnceCell;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceCell<()> = OnceCell::new();

const FILTER_ENV: &str = "YUYI_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, appending to `<dir>/log.txt`.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init(dir: &Path) {
    INSTALLED.get_or_init(|| {
        let path = dir.join("log.txt");
        let file = std::fs::create_dir_all(dir).and_then(|_| {
            OpenOptions::new().create(true).append(true).open(&path)
        });
        match file {
            Ok(f) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter())
                    .with_ansi(false)
                    .with_writer(Mutex::new(f))
                    .try_init();
                tracing::info!("===== yuyi start =====");
                tracing::info!("Logging to {}", path.display());
            }
            Err(e) => {
                let _ = tracing_subscriber::fmt().with_env_filter(filter()).try_init();
                tracing::warn!("Cannot open {}: {}; logging to stderr", path.display(), e);
            }
        }
    });
}

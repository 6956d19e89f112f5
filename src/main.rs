#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use std::sync::Arc;
use std::thread;

use anyhow::Context as _;
use yuyi::{config, logger, Clipboard, ConfigStore, Translator, TrayAction};

mod ui;

#[cfg(windows)]
mod hotkey {
    use crossbeam_channel::Sender;
    use std::thread;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse as km;
    use windows::Win32::UI::WindowsAndMessaging as wm;

    pub const HOTKEY_ID: i32 = 1;

    /// Nothing to keep alive on Windows; the listener owns its thread.
    pub struct Registration;

    /// Ctrl+Space via `RegisterHotKey` on a thread with its own message loop.
    /// `MOD_NOREPEAT` keeps a held key from firing more than once.
    pub fn spawn_hotkey_listener(tx: Sender<()>) -> anyhow::Result<Registration> {
        thread::Builder::new()
            .name("hotkey".to_string())
            .spawn(move || unsafe {
                let modifiers = km::MOD_CONTROL | km::MOD_NOREPEAT;
                if km::RegisterHotKey(HWND(std::ptr::null_mut()), HOTKEY_ID, modifiers, km::VK_SPACE.0 as u32)
                    .is_err()
                {
                    tracing::error!("RegisterHotKey Ctrl+Space failed (already in use?)");
                    crate::toast("Ctrl+Space 热键注册失败，可能已被占用");
                    return;
                }
                tracing::info!("Global hotkey Ctrl+Space registered");
                loop {
                    let mut msg = wm::MSG::default();
                    let got = wm::GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0);
                    if got.0 == -1 || got.0 == 0 {
                        tracing::warn!("GetMessageW returned {}, leaving hotkey loop", got.0);
                        break;
                    }
                    if msg.message == wm::WM_HOTKEY && tx.send(()).is_err() {
                        break;
                    }
                    let _ = wm::TranslateMessage(&msg);
                    wm::DispatchMessageW(&msg);
                }
                let _ = km::UnregisterHotKey(HWND(std::ptr::null_mut()), HOTKEY_ID);
                tracing::info!("Global hotkey unregistered");
            })?;
        Ok(Registration)
    }
}

#[cfg(not(windows))]
mod hotkey {
    use crossbeam_channel::Sender;
    use global_hotkey::hotkey::{Code, HotKey, Modifiers};
    use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
    use std::thread;

    /// Dropping this unregisters the hotkey.
    pub struct Registration {
        _manager: GlobalHotKeyManager,
    }

    /// Ctrl+Space through `global-hotkey`. Only key-down is forwarded so a
    /// press and its release count once.
    pub fn spawn_hotkey_listener(tx: Sender<()>) -> anyhow::Result<Registration> {
        let manager = GlobalHotKeyManager::new()?;
        let hotkey = HotKey::new(Some(Modifiers::CONTROL), Code::Space);
        manager.register(hotkey)?;
        let id = hotkey.id();
        tracing::info!("Global hotkey Ctrl+Space registered");

        thread::Builder::new().name("hotkey".to_string()).spawn(move || {
            let rx = GlobalHotKeyEvent::receiver();
            while let Ok(event) = rx.recv() {
                if event.id == id && event.state == HotKeyState::Pressed && tx.send(()).is_err() {
                    break;
                }
            }
        })?;
        Ok(Registration { _manager: manager })
    }
}

mod tray {
    use crossbeam_channel::{select, Sender};
    use std::thread;
    use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem};
    use tray_icon::{ClickType, Icon, TrayIcon, TrayIconBuilder, TrayIconEvent};
    use yuyi::TrayAction;

    /// Keeps the icon on screen. Not `Send`: it stays on the thread that
    /// built it, and that thread must run the platform event loop.
    pub struct Tray {
        _icon: TrayIcon,
    }

    pub fn build(action_tx: Sender<TrayAction>) -> anyhow::Result<Tray> {
        let menu = Menu::new();
        let toggle = MenuItem::new("显示/隐藏", true, None);
        let quit = MenuItem::new("退出", true, None);
        let sep = PredefinedMenuItem::separator();
        menu.append_items(&[&toggle, &sep, &quit])?;

        // 16x16 solid dot
        let (icon_w, icon_h) = (16, 16);
        let mut rgba = vec![0u8; icon_w * icon_h * 4];
        for px in rgba.chunks_exact_mut(4) {
            px.copy_from_slice(&[0x1B, 0x8A, 0xD6, 0xFF]);
        }
        let icon = Icon::from_rgba(rgba, icon_w as u32, icon_h as u32)?;

        let tray = TrayIconBuilder::new()
            .with_tooltip("羽译 - 轻量级翻译工具")
            .with_menu(Box::new(menu))
            .with_icon(icon)
            .build()?;
        tracing::info!("Tray created");

        spawn_forwarder(toggle.id().clone(), quit.id().clone(), action_tx)?;
        Ok(Tray { _icon: tray })
    }

    /// Clicks arrive on process-wide channels, so any thread may read them.
    fn spawn_forwarder(toggle_id: MenuId, quit_id: MenuId, action_tx: Sender<TrayAction>) -> anyhow::Result<()> {
        let menu_rx = MenuEvent::receiver();
        let icon_rx = TrayIconEvent::receiver();
        thread::Builder::new().name("tray-events".to_string()).spawn(move || loop {
            let action = select! {
                recv(menu_rx) -> event => event.map(|event| {
                    if event.id == toggle_id {
                        Some(TrayAction::ToggleWindow)
                    } else if event.id == quit_id {
                        Some(TrayAction::Quit)
                    } else {
                        None
                    }
                }),
                // Double clicks also report a Left, so only Left is mapped.
                recv(icon_rx) -> event => event.map(|event| {
                    matches!(event.click_type, ClickType::Left).then_some(TrayAction::ToggleWindow)
                }),
            };
            match action {
                Ok(Some(action)) => {
                    tracing::debug!("Tray: {:?}", action);
                    if action_tx.send(action).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(_) => break,
            }
        })?;
        Ok(())
    }
}

pub(crate) struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> anyhow::Result<()> {
        #[cfg(windows)]
        {
            clipboard_win::set_clipboard_string(text)
                .map_err(|e| anyhow::anyhow!("clipboard: {}", e))
        }
        #[cfg(not(windows))]
        {
            arboard::Clipboard::new()?.set_text(text.to_string())?;
            Ok(())
        }
    }
}

fn toast(body: &str) {
    #[cfg(windows)]
    {
        let _ = winrt_notification::Toast::new(winrt_notification::Toast::POWERSHELL_APP_ID)
            .title("羽译")
            .text1(body)
            .show();
    }
    #[cfg(not(windows))]
    {
        tracing::info!("Notice: {}", body);
    }
}

/// Windows: the icon lives on its own thread, which pumps the Win32 queue
/// that delivers tray clicks.
#[cfg(windows)]
fn spawn_tray(action_tx: crossbeam_channel::Sender<TrayAction>) {
    let spawned = thread::Builder::new().name("tray".to_string()).spawn(move || {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging as wm;

        let _tray = match tray::build(action_tx) {
            Ok(tray) => tray,
            Err(e) => {
                tracing::error!("Tray failed: {:#}", e);
                toast(&format!("托盘初始化失败: {}", e));
                return;
            }
        };
        unsafe {
            let mut msg = wm::MSG::default();
            while wm::GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0).0 > 0 {
                let _ = wm::TranslateMessage(&msg);
                wm::DispatchMessageW(&msg);
            }
        }
        tracing::info!("Tray message loop ended");
    });
    if let Err(e) = spawned {
        tracing::error!("Cannot start tray thread: {}", e);
    }
}

/// Linux: tray-icon draws through GTK, which needs its own initialised
/// thread running the GTK main loop.
#[cfg(target_os = "linux")]
fn spawn_tray(action_tx: crossbeam_channel::Sender<TrayAction>) {
    let spawned = thread::Builder::new().name("tray".to_string()).spawn(move || {
        if let Err(e) = gtk::init() {
            tracing::error!("GTK init failed, no tray icon: {}", e);
            return;
        }
        let _tray = match tray::build(action_tx) {
            Ok(tray) => tray,
            Err(e) => {
                tracing::error!("Tray failed: {:#}", e);
                return;
            }
        };
        gtk::main();
    });
    if let Err(e) = spawned {
        tracing::error!("Cannot start tray thread: {}", e);
    }
}

/// Elsewhere (macOS) status items belong to the main thread, so the UI
/// builds the tray inside its event loop instead.
#[cfg(not(any(windows, target_os = "linux")))]
fn spawn_tray(_action_tx: crossbeam_channel::Sender<TrayAction>) {}

/// Whether [`spawn_tray`] already owns the icon.
pub(crate) const TRAY_ON_OWN_THREAD: bool = cfg!(any(windows, target_os = "linux"));

fn main() -> anyhow::Result<()> {
    logger::init(&config::app_dir());
    tracing::info!("App starting");

    let store = ConfigStore::default();
    let mut cfg = store.load();
    cfg.apply_env_overrides();
    if cfg.api_key.is_empty() {
        toast("请先在设置中配置 API Key");
    } else {
        toast("已就绪，按 Ctrl+Space 唤醒/隐藏窗口");
    }

    // Translations run here, away from the hotkey and tray threads.
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let translator = Translator::new().context("building HTTP client")?;

    let (hotkey_tx, hotkey_rx) = crossbeam_channel::unbounded::<()>();
    let (tray_tx, tray_rx) = crossbeam_channel::unbounded::<TrayAction>();

    let _hotkey = match hotkey::spawn_hotkey_listener(hotkey_tx) {
        Ok(registration) => Some(registration),
        Err(e) => {
            tracing::error!("Global hotkey unavailable: {:#}", e);
            toast("Ctrl+Space 热键注册失败，可能已被占用");
            None
        }
    };
    spawn_tray(tray_tx.clone());

    ui::run_ui_main_thread(ui::Setup {
        config: cfg,
        store,
        translator,
        clipboard: Arc::new(SystemClipboard),
        runtime: runtime.handle().clone(),
        hotkey_rx,
        tray_tx,
        tray_rx,
    })?;

    tracing::info!("App exiting");
    Ok(())
}

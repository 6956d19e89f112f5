use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use yuyi::drivers::{run_hotkey_loop, run_tray_loop};
use yuyi::{App, Clipboard, Config, ConfigStore, Translator, TrayAction, VisibilityController, WindowEvent, WindowSurface};

const TITLE: &str = "羽译";

/// How long Quit waits for the event loop to close the window on its own.
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Everything `main` prepares before the event loop takes over.
pub struct Setup {
    pub config: Config,
    pub store: ConfigStore,
    pub translator: Translator,
    pub clipboard: Arc<dyn Clipboard>,
    pub runtime: Handle,
    pub hotkey_rx: Receiver<()>,
    pub tray_tx: Sender<TrayAction>,
    pub tray_rx: Receiver<TrayAction>,
}

/// The egui viewport seen from the visibility owner thread.
struct EguiSurface {
    ctx: egui::Context,
}

impl WindowSurface for EguiSurface {
    fn show(&mut self) -> anyhow::Result<()> {
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        self.ctx.request_repaint();
        Ok(())
    }

    fn center(&mut self) -> anyhow::Result<()> {
        let (monitor, outer) = self
            .ctx
            .input(|i| (i.viewport().monitor_size, i.viewport().outer_rect));
        let (Some(monitor), Some(outer)) = (monitor, outer) else {
            anyhow::bail!("monitor size not known yet");
        };
        let pos = ((monitor - outer.size()) / 2.0).max(egui::Vec2::ZERO);
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::OuterPosition(pos.to_pos2()));
        Ok(())
    }

    fn hide(&mut self) -> anyhow::Result<()> {
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
        self.ctx.request_repaint();
        Ok(())
    }
}

struct SettingsForm {
    api_key: String,
    api_url: String,
    model: String,
    target_lang: String,
}

impl SettingsForm {
    fn from_config(cfg: &Config) -> Self {
        Self {
            api_key: cfg.api_key.clone(),
            api_url: cfg.api_url.clone(),
            model: cfg.model.clone(),
            target_lang: cfg.target_lang.clone(),
        }
    }
}

struct TranslatorApp {
    app: App,
    events: Receiver<WindowEvent>,
    runtime: Handle,
    results_tx: Sender<Vec<String>>,
    results_rx: Receiver<Vec<String>>,
    quitting: Arc<AtomicBool>,
    input: String,
    results: Vec<String>,
    pending: bool,
    focus_input: bool,
    settings: Option<SettingsForm>,
    status: Option<String>,
    _tray: Option<crate::tray::Tray>,
}

impl TranslatorApp {
    fn start_translation(&mut self, ctx: &egui::Context) {
        if self.input.trim().is_empty() || self.pending {
            return;
        }
        let text = self.input.clone();
        self.pending = true;
        self.status = None;
        let app = self.app.clone();
        let tx = self.results_tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let results = app.translate(&text).await;
            let _ = tx.send(results);
            ctx.request_repaint();
        });
    }

    fn settings_panel(&mut self, ui: &mut egui::Ui) {
        let Some(form) = self.settings.as_mut() else {
            return;
        };
        let mut close = false;
        egui::Grid::new("settings").num_columns(2).show(ui, |ui| {
            ui.label("API Key");
            ui.add(egui::TextEdit::singleline(&mut form.api_key).password(true));
            ui.end_row();
            ui.label("API URL");
            ui.text_edit_singleline(&mut form.api_url);
            ui.end_row();
            ui.label("模型");
            ui.text_edit_singleline(&mut form.model);
            ui.end_row();
            ui.label("目标语言");
            ui.text_edit_singleline(&mut form.target_lang);
            ui.end_row();
        });
        ui.horizontal(|ui| {
            if ui.button("保存").clicked() {
                let saved = self.app.save_settings(&form.api_key, &form.api_url, &form.model, &form.target_lang);
                self.status = Some(if saved { "设置已保存" } else { "保存失败，仅本次生效" }.to_string());
                close = saved;
            }
            if ui.button("取消").clicked() {
                close = true;
            }
        });
        if close {
            self.settings = None;
            self.focus_input = true;
        }
    }

    fn translate_panel(&mut self, ui: &mut egui::Ui) {
        let input = ui.add(
            egui::TextEdit::singleline(&mut self.input)
                .hint_text("输入要翻译的文本，回车翻译")
                .desired_width(f32::INFINITY),
        );
        if self.focus_input {
            self.focus_input = false;
            input.request_focus();
        }
        if input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.start_translation(ui.ctx());
        }

        ui.add_space(6.0);
        if self.pending {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("翻译中…");
            });
            return;
        }

        let mut picked = None;
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            for candidate in &self.results {
                let card = egui::Button::new(format!("{}  {}", egui_phosphor::regular::COPY, candidate))
                    .wrap(true)
                    .min_size(egui::vec2(ui.available_width(), 28.0));
                if ui.add(card).on_hover_text("复制并隐藏").clicked() {
                    picked = Some(candidate.clone());
                }
            }
        });
        if let Some(text) = picked {
            if !self.app.copy_and_hide(&text) {
                self.status = Some("复制失败".to_string());
            }
        }
    }
}

impl eframe::App for TranslatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Wake up periodically so the channels get polled without input.
        ctx.request_repaint_after(Duration::from_millis(120));

        while let Ok(WindowEvent::Shown) = self.events.try_recv() {
            self.focus_input = true;
        }
        while let Ok(results) = self.results_rx.try_recv() {
            self.results = results;
            self.pending = false;
        }

        // Closing only hides; the tray "退出" item is the way out.
        if ctx.input(|i| i.viewport().close_requested()) && !self.quitting.load(Ordering::SeqCst) {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.app.hide();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.app.hide();
        }

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(TITLE);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button(egui_phosphor::regular::X).on_hover_text("隐藏").clicked() {
                        self.app.hide();
                    }
                    if ui.button(egui_phosphor::regular::GEAR).on_hover_text("设置").clicked() {
                        self.settings = match self.settings.take() {
                            Some(_) => None,
                            None => Some(SettingsForm::from_config(&self.app.config())),
                        };
                    }
                });
            });
        });

        if let Some(status) = &self.status {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.small(status.as_str());
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.settings.is_some() {
                self.settings_panel(ui);
            } else {
                self.translate_panel(ui);
            }
        });
    }
}

fn install_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();
    egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);

    let candidates = [
        r"C:\Windows\Fonts\msyh.ttc",
        r"C:\Windows\Fonts\simsun.ttc",
        "/System/Library/Fonts/PingFang.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    ];
    match candidates.iter().find_map(|path| fs::read(path).ok().map(|b| (path, b))) {
        Some((path, bytes)) => {
            fonts.font_data.insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
            for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
                fonts.families.entry(family).or_default().insert(0, "cjk".to_owned());
            }
            tracing::info!("Loaded CJK font: {}", path);
        }
        None => tracing::warn!("No CJK font found; Chinese text may render as squares"),
    }
    ctx.set_fonts(fonts);
}

/// Run the window on the main thread; returns when the app quits.
pub fn run_ui_main_thread(setup: Setup) -> anyhow::Result<()> {
    let Setup {
        config,
        store,
        translator,
        clipboard,
        runtime,
        hotkey_rx,
        tray_tx,
        tray_rx,
    } = setup;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(TITLE)
            .with_inner_size([500.0, 300.0])
            .with_min_inner_size([400.0, 200.0])
            .with_decorations(false)
            .with_always_on_top()
            .with_visible(false),
        ..Default::default()
    };

    tracing::info!("Main UI: starting event loop");
    eframe::run_native(
        TITLE,
        native_options,
        Box::new(move |cc| {
            install_fonts(&cc.egui_ctx);

            let tray = if crate::TRAY_ON_OWN_THREAD {
                None
            } else {
                crate::tray::build(tray_tx)
                    .map_err(|e| tracing::error!("Tray failed: {:#}", e))
                    .ok()
            };

            let surface = EguiSurface { ctx: cc.egui_ctx.clone() };
            let (controller, events) = match VisibilityController::spawn(surface) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!("Cannot start visibility owner: {:#}", e);
                    std::process::exit(1);
                }
            };
            let app = App::new(controller.clone(), translator, config, store, clipboard);

            {
                let controller = controller.clone();
                let _ = thread::Builder::new()
                    .name("hotkey-dispatch".to_string())
                    .spawn(move || run_hotkey_loop(hotkey_rx, controller));
            }

            let quitting = Arc::new(AtomicBool::new(false));
            {
                let quitting = quitting.clone();
                let ctx = cc.egui_ctx.clone();
                let _ = thread::Builder::new()
                    .name("tray-dispatch".to_string())
                    .spawn(move || {
                        run_tray_loop(tray_rx, controller, move || {
                            quitting.store(true, Ordering::SeqCst);
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                            ctx.request_repaint();
                            // A hidden viewport may never get another frame.
                            thread::sleep(QUIT_GRACE);
                            tracing::info!("Event loop did not close, exiting");
                            std::process::exit(0);
                        })
                    });
            }

            let (results_tx, results_rx) = crossbeam_channel::unbounded();
            Box::new(TranslatorApp {
                app,
                events,
                runtime,
                results_tx,
                results_rx,
                quitting,
                input: String::new(),
                results: Vec::new(),
                pending: false,
                focus_input: true,
                settings: None,
                status: None,
                _tray: tray,
            })
        }),
    )
    .map_err(|e| anyhow::anyhow!("UI error: {}", e))?;

    tracing::info!("Main UI: event loop exited");
    Ok(())
}

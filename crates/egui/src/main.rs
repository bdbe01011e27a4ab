mod config;
mod page;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use eframe::egui;
use hook_core::{
    AutoplayPolicy, Event, EngineBackend, FileStore, GestureKind, MemoryStore, Orchestrator,
    PageHost, Persistence,
};

use config::Config;
use page::{Overlay, ShellPage};

const PAGES: [(&str, &str); 3] = [("/", "Home"), ("/services", "Services"), ("/about", "About")];

type PageAudio = Orchestrator<EngineBackend, ShellPage>;

#[derive(Parser)]
#[command(name = "hook")]
#[command(about = "Site shell with background audio")]
struct Args {
    /// Page to open first
    #[arg(long, default_value = "/")]
    page: String,

    /// Override the configured autoplay policy
    #[arg(long, value_enum)]
    autoplay: Option<AutoplayArg>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AutoplayArg {
    /// Play requests start without user interaction
    Allowed,
    /// Play requests are refused until the first user gesture
    Gesture,
}

impl From<AutoplayArg> for AutoplayPolicy {
    fn from(arg: AutoplayArg) -> Self {
        match arg {
            AutoplayArg::Allowed => AutoplayPolicy::Allowed,
            AutoplayArg::Gesture => AutoplayPolicy::RequireGesture,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if let Some(policy) = args.autoplay {
        config.audio.autoplay = policy.into();
    }

    let durable: Box<dyn hook_core::KeyValueStore> = match config.storage_path() {
        Some(path) => {
            let store = FileStore::open(path);
            tracing::info!(path = %store.path().display(), "durable storage opened");
            Box::new(store)
        }
        None => Box::new(MemoryStore::new()),
    };
    // one run of the shell is one browsing session
    let persistence = Persistence::new(durable, Box::new(MemoryStore::new()));

    let backend = EngineBackend::start(config.audio.asset_root.clone(), config.audio.autoplay)?;
    tracing::info!(sample_rate = backend.sample_rate(), "shell starting");

    let app = ShellApp::new(config, backend, persistence, &args.page);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native("Hook", options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|err| anyhow::anyhow!("{err}"))
}

struct ShellApp {
    config: Config,
    /// Taken only for the duration of a navigation.
    audio: Option<PageAudio>,
}

impl ShellApp {
    fn new(config: Config, backend: EngineBackend, persistence: Persistence, path: &str) -> Self {
        let page = Self::open_page(&config, path);
        let mut audio = Orchestrator::new(backend, page, persistence, config.audio.clone());
        audio.init();
        Self {
            config,
            audio: Some(audio),
        }
    }

    fn open_page(config: &Config, path: &str) -> ShellPage {
        let overlay = config
            .intro()
            .filter(|_| config.audio.is_home_path(path))
            .map(|hold| Overlay::new(Instant::now(), hold));
        ShellPage::new(path, overlay)
    }

    fn navigate(&mut self, path: &str) {
        let Some(audio) = self.audio.take() else {
            return;
        };
        tracing::info!(from = audio.page().path(), to = path, "navigating");

        let mut parts = audio.unload();
        parts.backend.reset();
        let page = Self::open_page(&self.config, path);
        let audio_config = self.config.audio.clone();
        let mut next = Orchestrator::new(parts.backend, page, parts.persistence, audio_config);
        next.init();
        self.audio = Some(next);
    }

    fn gestures(ctx: &egui::Context) -> Vec<GestureKind> {
        ctx.input(|i| {
            let mut kinds = Vec::new();
            if i.pointer.any_pressed() {
                kinds.push(GestureKind::PointerDown);
            }
            if i.events.iter().any(|e| {
                matches!(
                    e,
                    egui::Event::Touch {
                        phase: egui::TouchPhase::Start,
                        ..
                    }
                )
            }) {
                kinds.push(GestureKind::TouchStart);
            }
            if i.pointer.any_click() {
                kinds.push(GestureKind::Click);
            }
            if i
                .events
                .iter()
                .any(|e| matches!(e, egui::Event::Key { pressed: true, .. }))
            {
                kinds.push(GestureKind::KeyDown);
            }
            kinds
        })
    }

    fn pump(audio: &mut PageAudio, ctx: &egui::Context) {
        let gestures = Self::gestures(ctx);
        if !gestures.is_empty() {
            audio.backend_mut().note_user_activation();
        }

        let mut events: Vec<Event> = gestures
            .into_iter()
            .filter_map(|kind| audio.page().gesture(kind))
            .collect();
        events.extend(audio.page_mut().tick(Instant::now()));
        events.extend(audio.backend_mut().poll());

        for event in events {
            audio.handle(event);
        }
    }
}

impl eframe::App for ShellApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let Some(audio) = self.audio.as_mut() else {
            return;
        };
        Self::pump(audio, ctx);

        let mut navigate_to = None;
        let mut ui_events = Vec::new();
        let current = audio.page().path().to_string();

        egui::TopBottomPanel::top("nav").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for (path, label) in PAGES {
                    if ui.selectable_label(current == path, label).clicked() && current != path {
                        navigate_to = Some(path);
                    }
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let title = PAGES
                .iter()
                .find(|(path, _)| *path == current)
                .map_or(current.as_str(), |(_, label)| *label);
            ui.heading(title);

            if self.config.audio.is_home_path(&current) {
                ui.add_space(12.0);
                if ui.button("▶ Play the jingle").clicked() {
                    ui_events.push(Event::CallToAction);
                }
            }

            if audio.is_waiting_for_gesture() {
                ui.add_space(12.0);
                ui.weak("Click anywhere to start the sound.");
            }
        });

        if let Some(button) = audio.page().mute_button().filter(|b| b.visible) {
            egui::Area::new(egui::Id::new("mute_button"))
                .order(egui::Order::Foreground)
                .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(16.0, -16.0))
                .show(ctx, |ui| {
                    ui.multiply_opacity(button.style.opacity);
                    let fill = if button.style.grayscale {
                        egui::Color32::from_gray(110)
                    } else {
                        egui::Color32::from_rgb(40, 140, 200)
                    };
                    let icon = if audio.muted() { "🔇" } else { "🔊" };
                    let response = ui.add_sized(
                        [44.0, 44.0],
                        egui::Button::new(egui::RichText::new(icon).size(20.0))
                            .fill(fill)
                            .corner_radius(egui::CornerRadius::same(22)),
                    );
                    if response.clicked() {
                        ui_events.push(Event::MuteClicked);
                    }
                });
        }

        if let Some(overlay) = audio.page().overlay() {
            let opacity = overlay.opacity(Instant::now());
            egui::Area::new(egui::Id::new("intro_overlay"))
                .order(egui::Order::Foreground)
                .fixed_pos(egui::Pos2::ZERO)
                .show(ctx, |ui| {
                    let rect = ctx.screen_rect();
                    ui.painter().rect_filled(
                        rect,
                        egui::CornerRadius::ZERO,
                        egui::Color32::from_black_alpha((opacity * 255.0) as u8),
                    );
                    ui.painter().text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Hook",
                        egui::FontId::proportional(48.0),
                        egui::Color32::WHITE.gamma_multiply(opacity),
                    );
                });
        }

        for event in ui_events {
            audio.handle(event);
        }

        // keep polling the engine even without input
        ctx.request_repaint_after(Duration::from_millis(50));

        if let Some(path) = navigate_to {
            self.navigate(path);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(audio) = self.audio.take() {
            audio.unload();
        }
    }
}

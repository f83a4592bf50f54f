use super::panels::{CredentialsDialog, ListingPanel, Toolbar};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use eframe::egui;
use s3_browser::backend::HttpBackend;
use s3_browser::browser::NoticeLevel;
use s3_browser::config::Config;
use s3_browser::{Action, Browser, Change, Driver, Notice};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;

const NOTICE_HISTORY: usize = 5;

pub struct S3BrowserApp {
    browser: Browser,
    driver: Driver,
    changes: UnboundedReceiver<Change>,
    // Backend calls run here; dropping it would cancel them.
    _runtime: Arc<Runtime>,
    toolbar: Toolbar,
    credentials_dialog: CredentialsDialog,
    listing_panel: ListingPanel,
    notices: VecDeque<(DateTime<Local>, Notice)>,
}

impl S3BrowserApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config) -> Result<Self> {
        let runtime = Arc::new(Runtime::new().context("Failed to create Tokio runtime")?);
        let backend = HttpBackend::new(&config.backend.url, config.backend.timeout())
            .context("Failed to create API client")?;

        let repaint_ctx = cc.egui_ctx.clone();
        let mut driver = Driver::new(Arc::new(backend), runtime.handle().clone())
            .with_reply_hook(Arc::new(move || repaint_ctx.request_repaint()));

        let mut browser = Browser::new(config.credentials.clone());
        let changes = browser.subscribe();
        driver.dispatch(&mut browser, Action::Start);

        Ok(Self {
            browser,
            driver,
            changes,
            _runtime: runtime,
            toolbar: Toolbar::default(),
            credentials_dialog: CredentialsDialog::default(),
            listing_panel: ListingPanel::default(),
            notices: VecDeque::with_capacity(NOTICE_HISTORY),
        })
    }

    fn observe(&mut self, change: Change) {
        match change {
            Change::PromptOpened(prompt) => self.credentials_dialog.fill(&prompt),
            Change::Notice(notice) => {
                if self.notices.len() == NOTICE_HISTORY {
                    self.notices.pop_front();
                }
                self.notices.push_back((Local::now(), notice));
            }
            Change::ListingReplaced { .. } | Change::ListingCleared => {
                self.listing_panel.scroll_to_top();
            }
            _ => {}
        }
    }
}

impl eframe::App for S3BrowserApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.driver.pump(&mut self.browser);
        while let Ok(change) = self.changes.try_recv() {
            self.observe(change);
        }

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            self.toolbar.show(ui, &self.browser, &mut actions);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| match self.notices.back() {
                Some((at, notice)) => {
                    let color = match notice.level {
                        NoticeLevel::Error => egui::Color32::RED,
                        NoticeLevel::Success => egui::Color32::GREEN,
                        NoticeLevel::Info => ui.visuals().text_color(),
                    };
                    ui.label(at.format("%H:%M:%S").to_string());
                    ui.colored_label(color, &notice.message);
                }
                None => {
                    ui.label("Status: Ready");
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.listing_panel.show(ui, &self.browser, &mut actions);
        });

        if let Some(prompt) = self.browser.prompt() {
            self.credentials_dialog.show(ctx, prompt, &mut actions);
        }

        for action in actions {
            self.driver.dispatch(&mut self.browser, action);
        }

        if !self.driver.is_idle() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

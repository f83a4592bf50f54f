use eframe::egui;
use s3_browser::listing::{format_size, EntryKind, ObjectEntry};
use s3_browser::{Action, Browser};

#[derive(Default)]
pub struct ListingPanel {
    scroll_to_top: bool,
}

impl ListingPanel {
    pub fn scroll_to_top(&mut self) {
        self.scroll_to_top = true;
    }

    pub fn show(&mut self, ui: &mut egui::Ui, browser: &Browser, actions: &mut Vec<Action>) {
        let Some(bucket) = browser.bucket() else {
            if browser.connection().is_connected() {
                ui.colored_label(egui::Color32::YELLOW, "⚠️ Select a bucket to browse");
            } else {
                ui.colored_label(egui::Color32::YELLOW, "⚠️ Not connected");
            }
            return;
        };

        ui.horizontal(|ui| {
            ui.heading(format!("{}:{}", bucket, browser.listing_folder()));
            ui.separator();
            if browser.is_loading() {
                ui.spinner();
                ui.label("Loading...");
            } else if ui.button("🔄 Refresh").clicked() {
                actions.push(Action::Refresh);
            }
        });

        ui.label(format!(
            "Total entries: {}",
            browser.rows().iter().filter(|row| !row.is_parent_link()).count()
        ));
        ui.separator();

        if browser.rows().is_empty() {
            if browser.is_listing_loaded() {
                ui.label("This folder is empty");
            }
            return;
        }

        let mut scroll = egui::ScrollArea::vertical().auto_shrink([false, false]);
        if std::mem::take(&mut self.scroll_to_top) {
            scroll = scroll.vertical_scroll_offset(0.0);
        }

        scroll.show(ui, |ui| {
            egui::Grid::new("listing_grid")
                .striped(true)
                .num_columns(3)
                .spacing([40.0, 4.0])
                .min_col_width(120.0)
                .show(ui, |ui| {
                    ui.strong("Key");
                    ui.strong("Size");
                    ui.strong("Last modified");
                    ui.end_row();

                    for entry in browser.rows() {
                        key_cell(ui, entry, actions);
                        size_cell(ui, browser, entry, actions);
                        match entry.last_modified {
                            Some(modified) => {
                                ui.label(modified.format("%Y-%m-%d %H:%M:%S").to_string());
                            }
                            None => {
                                ui.label("");
                            }
                        }
                        ui.end_row();
                    }
                });
        });
    }
}

fn key_cell(ui: &mut egui::Ui, entry: &ObjectEntry, actions: &mut Vec<Action>) {
    match entry.kind {
        EntryKind::ParentLink => {
            if ui.link("⬆ ..").clicked() {
                actions.push(Action::OpenRow(entry.key.clone()));
            }
        }
        EntryKind::Folder => {
            if ui.link(format!("📁 {}", entry.key)).clicked() {
                actions.push(Action::OpenRow(entry.key.clone()));
            }
        }
        EntryKind::File => {
            ui.label(format!("📄 {}", entry.key));
        }
    }
}

fn size_cell(ui: &mut egui::Ui, browser: &Browser, entry: &ObjectEntry, actions: &mut Vec<Action>) {
    match (entry.kind, entry.size) {
        (EntryKind::ParentLink, _) => {
            ui.label("");
        }
        (_, Some(size)) => {
            ui.label(format_size(size)).on_hover_text(format!("{} bytes", size));
        }
        (EntryKind::Folder, None) if browser.is_size_pending(&entry.key) => {
            ui.spinner();
        }
        (EntryKind::Folder, None) => {
            if ui.small_button("Σ size").on_hover_text("Compute folder size").clicked() {
                actions.push(Action::RequestFolderSize(entry.key.clone()));
            }
        }
        (EntryKind::File, None) => {
            ui.label("?");
        }
    }
}

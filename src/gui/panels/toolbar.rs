use eframe::egui;
use s3_browser::{Action, Browser};

#[derive(Default)]
pub struct Toolbar;

impl Toolbar {
    pub fn show(&mut self, ui: &mut egui::Ui, browser: &Browser, actions: &mut Vec<Action>) {
        ui.horizontal(|ui| {
            ui.heading("🗄️ S3 Browser");
            ui.separator();

            let connection = browser.connection();
            if connection.is_connected() {
                ui.colored_label(egui::Color32::GREEN, "● Connected");
            } else if connection.is_connecting() {
                ui.spinner();
                ui.label("Connecting...");
            } else {
                ui.colored_label(egui::Color32::RED, "● Disconnected");
            }

            ui.separator();

            let selected = browser.selected_bucket().unwrap_or("Select a bucket");
            ui.add_enabled_ui(connection.is_connected(), |ui| {
                egui::ComboBox::from_label("Bucket")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for bucket in browser.buckets() {
                            let is_selected = browser.selected_bucket() == Some(bucket.as_str());
                            if ui.selectable_label(is_selected, bucket).clicked() && !is_selected {
                                actions.push(Action::SelectBucket(bucket.clone()));
                            }
                        }
                    });

                if ui.button("🔄").on_hover_text("Refresh bucket list").clicked() {
                    actions.push(Action::RefreshBuckets);
                }
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("🔌 Connect...").clicked() {
                    actions.push(Action::Reconnect);
                }
                if let Some(credentials) = browser.credentials() {
                    ui.label(&credentials.endpoint);
                }
            });
        });
    }
}

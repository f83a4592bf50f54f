use eframe::egui;
use s3_browser::config::Config;
use s3_browser::connection::Prompt;
use s3_browser::Action;

/// Modal form shown while the browser waits for credentials.
///
/// Closing the window only dismisses it; the browser re-opens it until
/// the user connects or cancels.
#[derive(Default)]
pub struct CredentialsDialog {
    endpoint: String,
    access_key: String,
    secret_key: String,
    show_secret: bool,
    load_error: Option<String>,
}

impl CredentialsDialog {
    pub fn fill(&mut self, prompt: &Prompt) {
        self.endpoint = prompt.prefill.endpoint.clone();
        self.access_key = prompt.prefill.access_key.clone();
        self.secret_key = prompt.prefill.secret_key.clone();
        self.load_error = None;
    }

    pub fn show(&mut self, ctx: &egui::Context, prompt: &Prompt, actions: &mut Vec<Action>) {
        let mut open = true;

        egui::Window::new("Connect to S3")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .open(&mut open)
            .show(ctx, |ui| {
                if let Some(error) = &prompt.error {
                    ui.colored_label(egui::Color32::RED, error);
                    ui.add_space(5.0);
                }

                egui::Grid::new("credentials_grid")
                    .num_columns(2)
                    .spacing([40.0, 4.0])
                    .show(ui, |ui| {
                        ui.label("Endpoint:");
                        ui.text_edit_singleline(&mut self.endpoint);
                        ui.end_row();

                        ui.label("Access Key:");
                        ui.text_edit_singleline(&mut self.access_key);
                        ui.end_row();

                        ui.label("Secret Key:");
                        ui.horizontal(|ui| {
                            ui.add(
                                egui::TextEdit::singleline(&mut self.secret_key)
                                    .password(!self.show_secret),
                            );
                            if ui.button(if self.show_secret { "👁" } else { "👁‍🗨" }).clicked() {
                                self.show_secret = !self.show_secret;
                            }
                        });
                        ui.end_row();
                    });

                if let Some(error) = &self.load_error {
                    ui.colored_label(egui::Color32::YELLOW, error);
                }

                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    if ui.button("Connect").clicked() {
                        actions.push(Action::SubmitCredentials {
                            endpoint: self.endpoint.clone(),
                            access_key: self.access_key.clone(),
                            secret_key: self.secret_key.clone(),
                        });
                    }
                    if ui.button("Cancel").clicked() {
                        actions.push(Action::CancelPrompt);
                    }
                    if ui.button("📂 Load from file...").clicked() {
                        self.load_from_file();
                    }
                });
            });

        if !open {
            actions.push(Action::DismissPrompt);
        }
    }

    fn load_from_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        else {
            return;
        };

        match Config::from_file(&path) {
            Ok(Config {
                credentials: Some(credentials),
                ..
            }) => {
                self.endpoint = credentials.endpoint;
                self.access_key = credentials.access_key;
                self.secret_key = credentials.secret_key;
                self.load_error = None;
            }
            Ok(_) => {
                self.load_error = Some(format!("No credentials in {}", path.display()));
            }
            Err(e) => {
                self.load_error = Some(e.to_string());
            }
        }
    }
}

mod credentials_dialog;
mod listing_panel;
mod toolbar;

pub use credentials_dialog::CredentialsDialog;
pub use listing_panel::ListingPanel;
pub use toolbar::Toolbar;

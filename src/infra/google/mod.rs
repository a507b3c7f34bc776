// =============================================================================
// GOOGLE MODULE
// =============================================================================
//
// External I/O against Google: service account auth, the Sheets API, and
// plain HTTP fetches for Drive-hosted images. The core layer only sees the
// `SheetSource` and `ImageHost` traits.

pub mod drive_image_host;
pub mod service_account;
pub mod sheets_client;

pub use drive_image_host::HttpImageHost;
pub use service_account::{CredentialsSource, ServiceAccountAuth};
pub use sheets_client::GoogleSheetsClient;

pub mod telnyx;

pub use telnyx::TelnyxClient;

pub mod onboarding;
pub mod service;

pub use onboarding::{initialize_opt_ins, log_normalization};
pub use service::{spawn_notify, DispatchOutcome, NotificationService, NotifySummary};

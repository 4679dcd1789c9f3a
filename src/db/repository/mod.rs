pub mod email_history;
pub mod record;

pub mod messaging;
pub mod notifications;
pub mod payments;

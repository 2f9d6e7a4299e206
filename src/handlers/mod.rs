pub mod admin;
pub mod auth;
pub mod bookings;
pub mod cars;
pub mod checkout;
pub mod contact;
pub mod sms;
pub mod webhooks;

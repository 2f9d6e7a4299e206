pub mod booking_key;
pub mod jwt;
pub mod price;

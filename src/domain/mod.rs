pub mod booking;
pub mod chat;
pub mod product;
pub mod qr_token;
pub mod review;
pub mod user;

pub use booking::*;
pub use chat::*;
pub use product::*;
pub use qr_token::*;
pub use review::*;
pub use user::*;

pub mod authenticate;
pub mod cancel_feed;
pub mod create_invoice;
pub mod echo;
pub mod select_feed;

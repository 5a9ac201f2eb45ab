pub mod auth;
pub mod challenges;
pub mod clock;
pub mod lifecycle;

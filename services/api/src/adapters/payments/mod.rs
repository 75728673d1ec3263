pub mod stripe;
pub mod toss;

pub use stripe::StripeCheckoutAdapter;
pub use toss::TossConfirmAdapter;

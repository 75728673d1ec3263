pub mod card_image;
pub mod db;
pub mod interpreter_llm;
pub mod local;
pub mod payments;

pub use card_image::OpenAiImageAdapter;
pub use db::PgProfileStore;
pub use interpreter_llm::{OpenAiInterpreterAdapter, RetryPolicy};
pub use local::JsonFileStore;
pub use payments::{StripeCheckoutAdapter, TossConfirmAdapter};

pub mod errors;
pub mod resolver;
pub mod spam;

pub use errors::AssetError;
pub use resolver::{TokenHints, TokenResolver};
pub use spam::is_spam_token;

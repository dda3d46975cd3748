mod auth;
mod dropbox;
mod photo;
mod scrapbook;

pub use auth::*;
pub use dropbox::*;
pub use photo::*;
pub use scrapbook::*;

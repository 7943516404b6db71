pub mod content;
pub mod password;
pub mod slug;
pub mod token;

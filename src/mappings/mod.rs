mod key_names;

pub use key_names::{key_code, key_name};

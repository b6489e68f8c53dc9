pub mod javascript;
pub mod strings;

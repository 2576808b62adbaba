pub mod info;
pub mod music;

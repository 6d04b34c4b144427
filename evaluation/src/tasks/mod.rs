pub mod flores;
pub mod nllb;
pub mod sample;
pub mod translate_file;

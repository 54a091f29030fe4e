// crates/mediaplex-engine/src/helpers/mod.rs

pub mod seek;

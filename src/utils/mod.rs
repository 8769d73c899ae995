pub mod timezone;

pub use timezone::PlantClock;

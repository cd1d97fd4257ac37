pub mod procedures;

pub use procedures::Procedures;

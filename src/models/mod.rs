pub mod image;
pub mod person;
pub mod procedures;

pub use image::ImageInput;
pub use person::{FieldValue, PersonRecord, NOT_FOUND};
pub use procedures::{
    AnalyzeImageInput, EchoInput, EchoOutput, ImagesInput, MorningBriefOutput, PeopleOutput,
    ProcedureOutput,
};

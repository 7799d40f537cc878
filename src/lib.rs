pub mod filter;
pub mod geometry;
pub mod layout;
pub mod pipeline;
pub mod reader;
pub mod renderer;
pub mod schema;
pub mod track;

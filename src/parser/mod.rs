/// Semiring formula splitting, glyph repair, and formula CSV ingestion.
pub mod formula;
/// psql aligned-table parsing with a CSV fallback, and the inverse renderer.
pub mod table;
/// Small text helpers shared by the composer and the parsers.
pub mod text;

/// Query templates per backend dialect, with placeholder diagnostics for missing parameters.
pub mod composer;
/// Backend selector, intent variants, and their parameters.
pub mod mode;

/// Writes the request outcome as JSON and markdown into its workspace.
pub mod formatter;
/// Builds a markdown report from a request outcome.
pub mod report;
/// Per-request artifact directories.
pub mod workspace;

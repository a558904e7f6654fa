//! Configuration surface. This crate never reads its own config from a
//! file; an embedding driver (out of scope here) constructs these
//! programmatically.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// When a file mixes `;` and newline statement terminators, warn based
    /// on the first terminator seen in that file. Exposed as a flag per
    /// the reference implementation's own documented caveat about this
    /// behavior.
    pub warn_on_terminator_mismatch: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            warn_on_terminator_mismatch: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub parse: ParseOptions,
    /// Ordered list of directories searched for `import "name"` targets.
    pub import_search_paths: Vec<PathBuf>,
    /// When true, `Unwrap` does not insert a runtime null assertion in the
    /// generated code. This crate does not generate code; the flag is
    /// recorded as AST metadata for the downstream code generator.
    pub unchecked: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.import_search_paths.push(path.into());
        self
    }

    pub fn with_unchecked(mut self, unchecked: bool) -> Self {
        self.unchecked = unchecked;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parse_options_warn_on_mismatch() {
        assert!(ParseOptions::default().warn_on_terminator_mismatch);
    }

    #[test]
    fn builder_accumulates_search_paths() {
        let options = CompileOptions::new()
            .with_search_path("/usr/include")
            .with_search_path("./lib");
        assert_eq!(options.import_search_paths.len(), 2);
    }
}

pub mod arena;
pub mod diagnostic;
pub mod intern;
pub mod span;
pub mod style;

pub use arena::Arena;
pub use diagnostic::{Diagnostic, DiagnosticBag, Severity};
pub use intern::{Interner, Symbol, SymbolEq};
pub use span::{SourceLocation, SourceMap, Span};
pub use style::Style;

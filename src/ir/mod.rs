pub mod diagnostic;
pub mod presyntax;
pub mod semantics;
pub mod source;
pub mod syntax;

pub mod builtin;
pub mod elaborate;
pub mod evaluate;
pub mod meta;
pub mod parse;
pub mod resolve;
pub mod subtype;
pub mod unevaluate;
pub mod unparse;

pub use elaborate::elaborate;

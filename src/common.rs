use std::rc::Rc;

use lasso::Spur;

pub type Name = Spur;

// de Bruijn index: zero is the newest bound variable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Index(pub usize);

// de Bruijn level: zero is the oldest bound variable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Level(pub usize);

impl Index {
	pub fn to_level(self, size: Level) -> Level { Level(size.0 - 1 - self.0) }
}

impl Level {
	/// Returns `None` when the variable is not bound in a context of the given size.
	pub fn to_index(self, size: Level) -> Option<Index> { size.0.checked_sub(self.0 + 1).map(Index) }
}

impl std::ops::Add<usize> for Level {
	type Output = Self;
	fn add(self, rhs: usize) -> Self::Output {
		let Self(level) = self;
		Self(level + rhs)
	}
}

impl std::ops::AddAssign<usize> for Level {
	fn add_assign(&mut self, rhs: usize) { self.0 += rhs; }
}

/// The evaluation phase of a term.
///
/// Compile-time terms must reduce completely, while runtime terms may stay symbolic.
/// `World` precedes `Const`, so a name bound at `World` and used at `Const` is used at a later phase.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Phase {
	World,
	Const,
}

/// A byte range into a source string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Range {
	pub start: usize,
	pub end: usize,
}

impl Range {
	pub fn new(start: usize, end: usize) -> Self { Self { start, end } }

	pub fn contains(self, position: usize) -> bool { self.start <= position && position <= self.end }

	pub fn overlaps(self, other: Self) -> bool { self.start <= other.end && other.start <= self.end }
}

/// The location of a global definition: its module path and its name.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Location {
	pub module: Rc<[Name]>,
	pub name: Name,
}

impl Location {
	pub fn new(module: Rc<[Name]>, name: Name) -> Self { Self { module, name } }
}

/// Runtime representation tags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Repr {
	End,
	Byte,
	Short,
	Int,
	Long,
	Float,
	Double,
	String,
	ByteArray,
	IntArray,
	LongArray,
	List,
	Compound,
}

impl Repr {
	pub fn name(self) -> &'static str {
		match self {
			Self::End => "end",
			Self::Byte => "byte",
			Self::Short => "short",
			Self::Int => "int",
			Self::Long => "long",
			Self::Float => "float",
			Self::Double => "double",
			Self::String => "string",
			Self::ByteArray => "byte_array",
			Self::IntArray => "int_array",
			Self::LongArray => "long_array",
			Self::List => "list",
			Self::Compound => "compound",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Some(match name {
			"end" => Self::End,
			"byte" => Self::Byte,
			"short" => Self::Short,
			"int" => Self::Int,
			"long" => Self::Long,
			"float" => Self::Float,
			"double" => Self::Double,
			"string" => Self::String,
			"byte_array" => Self::ByteArray,
			"int_array" => Self::IntArray,
			"long_array" => Self::LongArray,
			"list" => Self::List,
			"compound" => Self::Compound,
			_ => return None,
		})
	}
}

/// Built-in operations reduced by the evaluator at the compile-time phase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Builtin {
	IntAdd,
	IntSub,
	IntMul,
	IntDiv,
	IntMod,
	IntEq,
	IntLt,
	BoolNot,
	StringConcat,
}

impl Builtin {
	pub fn from_name(name: &str) -> Option<Self> {
		Some(match name {
			"int_add" => Self::IntAdd,
			"int_sub" => Self::IntSub,
			"int_mul" => Self::IntMul,
			"int_div" => Self::IntDiv,
			"int_mod" => Self::IntMod,
			"int_eq" => Self::IntEq,
			"int_lt" => Self::IntLt,
			"bool_not" => Self::BoolNot,
			"string_concat" => Self::StringConcat,
			_ => return None,
		})
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Modifier {
	Builtin(Builtin),
	Export,
	Const,
	Test,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Annotation {
	Deprecated,
	Unstable,
	Delicate,
}

impl Annotation {
	pub fn from_name(name: &str) -> Option<Self> {
		Some(match name {
			"deprecated" => Self::Deprecated,
			"unstable" => Self::Unstable,
			"delicate" => Self::Delicate,
			_ => return None,
		})
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Projection {
	Index(usize),
	Field(Name),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn levels_and_indices_convert() {
		assert_eq!(Index(0).to_level(Level(3)), Level(2));
		assert_eq!(Level(2).to_index(Level(3)), Some(Index(0)));
		assert_eq!(Level(0).to_index(Level(3)), Some(Index(2)));
		assert_eq!(Level(3).to_index(Level(3)), None);
	}
}

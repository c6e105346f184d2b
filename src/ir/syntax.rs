use std::rc::Rc;

use crate::common::{Annotation, Builtin, Index, Location, Modifier, Name, Phase, Projection, Range, Repr};

#[derive(Clone, PartialEq, Debug)]
pub struct Module {
	pub location: Rc<[Name]>,
	pub definitions: Vec<Rc<Definition>>,
}

impl Module {
	pub fn get(&self, name: Name) -> Option<&Rc<Definition>> {
		self.definitions.iter().find(|definition| definition.location.name == name)
	}
}

#[derive(Clone, PartialEq, Debug)]
pub struct Definition {
	pub location: Location,
	pub annotations: Vec<Annotation>,
	pub modifiers: Vec<Modifier>,
	pub phase: Phase,
	pub ty: Term,
	pub body: Option<Term>,
}

impl Definition {
	pub fn builtin(&self) -> Option<Builtin> {
		self.modifiers.iter().find_map(|modifier| match modifier {
			Modifier::Builtin(builtin) => Some(*builtin),
			_ => None,
		})
	}

	pub fn is_annotated(&self, annotation: Annotation) -> bool { self.annotations.contains(&annotation) }
}

/// A core term.
///
/// Type formers have a canonical type and carry none; every other non-atomic term carries the type it was
/// checked against, relative to the context it occurs in.
#[derive(Clone, PartialEq, Debug)]
pub enum Term {
	// Representation tags and universes.
	Tag,
	TagOf(Repr),
	Type(Rc<Self>),

	// Primitives.
	Unit,
	UnitOf,
	Bool,
	BoolOf(bool),
	Byte,
	ByteOf(i8),
	Short,
	ShortOf(i16),
	Int,
	IntOf(i32),
	Long,
	LongOf(i64),
	Float,
	FloatOf(f32),
	Double,
	DoubleOf(f64),
	String,
	StringOf(Rc<str>),

	// Arrays.
	ByteArray,
	ByteArrayOf(Vec<Self>),
	IntArray,
	IntArrayOf(Vec<Self>),
	LongArray,
	LongArrayOf(Vec<Self>),

	// Lists and compounds.
	List(Rc<Self>),
	ListOf {
		elements: Vec<Self>,
		ty: Rc<Self>,
	},
	Compound(Vec<(Name, Self)>),
	CompoundOf {
		elements: Vec<(Name, Self)>,
		ty: Rc<Self>,
	},

	// Singletons and unions.
	Point {
		element: Rc<Self>,
		ty: Rc<Self>,
	},
	Union {
		elements: Vec<Self>,
		ty: Rc<Self>,
	},

	// Functions.
	Func {
		open: bool,
		params: Vec<(Pattern, Self)>,
		result: Rc<Self>,
	},
	FuncOf {
		open: bool,
		params: Vec<Pattern>,
		result: Rc<Self>,
		ty: Rc<Self>,
	},
	Apply {
		open: bool,
		func: Rc<Self>,
		args: Vec<Self>,
		ty: Rc<Self>,
	},

	// Quoted programs.
	Code(Rc<Self>),
	CodeOf {
		element: Rc<Self>,
		ty: Rc<Self>,
	},
	Splice {
		element: Rc<Self>,
		ty: Rc<Self>,
	},

	// References.
	Path(Rc<Self>),
	PathOf {
		element: Rc<Self>,
		ty: Rc<Self>,
	},
	Get {
		element: Rc<Self>,
		ty: Rc<Self>,
	},

	Command {
		element: Rc<str>,
		ty: Rc<Self>,
	},

	// Binding and matching.
	Let {
		binder: Rc<Pattern>,
		init: Rc<Self>,
		body: Rc<Self>,
		ty: Rc<Self>,
	},
	If {
		scrutinee: Rc<Self>,
		branches: Vec<(Pattern, Self)>,
		ty: Rc<Self>,
	},
	Project {
		target: Rc<Self>,
		projection: Projection,
		ty: Rc<Self>,
	},

	// References to bindings.
	Var {
		name: Name,
		index: Index,
		ty: Rc<Self>,
	},
	Def {
		definition: Rc<Definition>,
		ty: Rc<Self>,
	},
	Meta {
		index: usize,
		source: Range,
		ty: Rc<Self>,
	},

	Hole,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Pattern {
	UnitOf,
	BoolOf(bool),
	ByteOf(i8),
	ShortOf(i16),
	IntOf(i32),
	LongOf(i64),
	FloatOf(f32),
	DoubleOf(f64),
	StringOf(Rc<str>),
	ByteArrayOf(Vec<Self>),
	IntArrayOf(Vec<Self>),
	LongArrayOf(Vec<Self>),
	ListOf(Vec<Self>, Term),
	CompoundOf(Vec<(Name, Self)>, Term),
	Var { name: Name, ty: Term },
	Drop(Term),
	Hole,
}

impl Pattern {
	/// Counts the variables bound by this pattern.
	pub fn binders(&self) -> usize {
		match self {
			Self::ByteArrayOf(elements)
			| Self::IntArrayOf(elements)
			| Self::LongArrayOf(elements)
			| Self::ListOf(elements, _) => elements.iter().map(Self::binders).sum(),
			Self::CompoundOf(elements, _) => elements.iter().map(|(_, element)| element.binders()).sum(),
			Self::Var { .. } => 1,
			Self::UnitOf
			| Self::BoolOf(_)
			| Self::ByteOf(_)
			| Self::ShortOf(_)
			| Self::IntOf(_)
			| Self::LongOf(_)
			| Self::FloatOf(_)
			| Self::DoubleOf(_)
			| Self::StringOf(_)
			| Self::Drop(_)
			| Self::Hole => 0,
		}
	}

	/// Whether this pattern matches every value of its type.
	pub fn is_irrefutable(&self) -> bool { matches!(self, Self::Var { .. } | Self::Drop(_)) }
}

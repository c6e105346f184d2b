use std::{
	cell::{Cell, OnceCell},
	fmt,
	rc::Rc,
};

use super::syntax::{Definition, Pattern, Term};
use crate::common::{Index, Level, Name, Projection, Range, Repr};

/// A memoized, single-threaded deferred value.
#[derive(Clone)]
pub struct Lazy(Rc<Thunk>);

struct Thunk {
	value: OnceCell<Value>,
	pending: Cell<Option<Box<dyn FnOnce() -> Value>>>,
}

impl Lazy {
	pub fn new(f: impl FnOnce() -> Value + 'static) -> Self {
		Self(Rc::new(Thunk { value: OnceCell::new(), pending: Cell::new(Some(Box::new(f))) }))
	}

	pub fn ready(value: Value) -> Self {
		Self(Rc::new(Thunk { value: OnceCell::from(value), pending: Cell::new(None) }))
	}

	pub fn force(&self) -> &Value {
		self.0.value.get_or_init(|| match self.0.pending.take() {
			Some(f) => f(),
			None => unreachable!("lazy value forced while being forced"),
		})
	}
}

impl From<Value> for Lazy {
	fn from(value: Value) -> Self { Self::ready(value) }
}

impl fmt::Debug for Lazy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0.value.get() {
			Some(value) => value.fmt(f),
			None => write!(f, "<lazy>"),
		}
	}
}

/// A persistent sequence of values; its length is the current de Bruijn level.
#[derive(Clone, Default, Debug)]
pub struct Environment(im_rc::Vector<Lazy>);

impl Environment {
	pub fn new() -> Self { Self::default() }

	pub fn level(&self) -> Level { Level(self.0.len()) }

	pub fn lookup(&self, Index(index): Index) -> &Lazy { &self.0[self.0.len() - 1 - index] }

	pub fn push(&mut self, value: Lazy) { self.0.push_back(value); }

	pub fn truncate(&mut self, Level(level): Level) { self.0.truncate(level); }

	#[must_use]
	pub fn extend(&self, values: impl IntoIterator<Item = Lazy>) -> Self {
		let mut environment = self.clone();
		for value in values {
			environment.push(value);
		}
		environment
	}
}

/// A body awaiting the values of its binders.
#[derive(Clone, Debug)]
pub struct Closure {
	pub environment: Environment,
	pub binders: Rc<[Pattern]>,
	pub body: Rc<Term>,
}

impl Closure {
	pub fn new(environment: Environment, binders: impl Into<Rc<[Pattern]>>, body: impl Into<Rc<Term>>) -> Self {
		Self { environment, binders: binders.into(), body: body.into() }
	}

	pub fn binder_count(&self) -> usize { self.binders.iter().map(Pattern::binders).sum() }
}

#[derive(Clone, Debug)]
pub enum Value {
	// Representation tags and universes.
	Tag,
	TagOf(Repr),
	Type(Lazy),

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
	ByteArrayOf(Rc<[Lazy]>),
	IntArray,
	IntArrayOf(Rc<[Lazy]>),
	LongArray,
	LongArrayOf(Rc<[Lazy]>),

	// Lists and compounds.
	List(Lazy),
	ListOf(Rc<[Lazy]>, Lazy),
	Compound(Rc<[(Name, Lazy)]>),
	CompoundOf(Rc<[(Name, Lazy)]>, Lazy),

	// Singletons and unions.
	Point(Lazy, Lazy),
	Union(Rc<[Lazy]>, Lazy),

	// Functions.
	// NOTE: The type of parameter `i` is a term under the closure's environment extended with the binders of the
	// parameters before it.
	Func {
		open: bool,
		params: Rc<[Term]>,
		result: Closure,
	},
	FuncOf {
		open: bool,
		result: Closure,
		ty: Lazy,
	},
	Apply {
		open: bool,
		func: Rc<Self>,
		args: Rc<[Lazy]>,
		ty: Lazy,
	},

	// Quoted programs.
	Code(Lazy),
	CodeOf(Lazy, Lazy),
	Splice(Rc<Self>, Lazy),

	// References.
	Path(Lazy),
	PathOf(Lazy, Lazy),
	Get(Rc<Self>, Lazy),

	Command(Rc<str>, Lazy),

	// Stuck eliminators.
	Project(Rc<Self>, Projection, Lazy),
	If {
		scrutinee: Rc<Self>,
		branches: Rc<[Closure]>,
		ty: Lazy,
	},

	// Free variables and references.
	Var {
		name: Name,
		level: Level,
		ty: Lazy,
	},
	Def {
		definition: Rc<Definition>,
		ty: Lazy,
	},
	Meta {
		index: usize,
		source: Range,
		ty: Lazy,
	},

	Hole,
}

impl Value {
	pub fn ty(value: Self) -> Self { Self::Type(value.into()) }

	pub fn tag(repr: Repr) -> Self { Self::ty(Self::TagOf(repr)) }

	/// Whether this value is a stuck computation that cannot be scrutinized.
	pub fn is_neutral(&self) -> bool {
		matches!(
			self,
			Self::Apply { .. }
				| Self::Splice(..)
				| Self::Get(..)
				| Self::Command(..)
				| Self::Project(..)
				| Self::If { .. }
				| Self::Var { .. }
				| Self::Def { .. }
				| Self::Meta { .. }
				| Self::Hole
		)
	}
}

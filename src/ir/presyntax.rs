use std::rc::Rc;

use crate::common::{Annotation, Index, Location, Modifier, Name, Projection, Range, Repr};

/// A surface module as parsed, with every name still a raw identifier.
#[derive(Debug, Clone)]
pub struct ParsedModule {
	pub imports: Vec<(Range, Vec<Name>)>,
	pub definitions: Vec<ParsedDefinition>,
}

#[derive(Debug, Clone)]
pub struct ParsedDefinition {
	pub range: Range,
	pub name: Name,
	pub annotations: Vec<Annotation>,
	pub modifiers: Vec<ParsedModifier>,
	pub ty: Expression<Name>,
	pub body: Option<Expression<Name>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedModifier {
	Builtin,
	Export,
	Const,
	Test,
}

/// A surface module after name resolution.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
	pub location: Rc<[Name]>,
	pub imports: Vec<(Range, Location)>,
	pub definitions: Vec<ResolvedDefinition>,
}

#[derive(Debug, Clone)]
pub struct ResolvedDefinition {
	pub range: Range,
	pub location: Location,
	pub annotations: Vec<Annotation>,
	pub modifiers: Vec<Modifier>,
	pub ty: Expression<Reference>,
	pub body: Option<Expression<Reference>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
	Local(Name, Index),
	Global(Location),
}

#[derive(Debug, Clone)]
pub struct Expression<V> {
	pub range: Range,
	pub preterm: Preterm<V>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
	Unit,
	Bool(bool),
	Byte(i8),
	Short(i16),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	String(Rc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Former {
	Tag,
	Unit,
	Bool,
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
	Byte,
	Int,
	Long,
}

#[derive(Debug, Clone)]
pub enum Preterm<V> {
	Variable(V),
	Literal(Literal),

	// Types.
	Former(Former),
	TagOf(Repr),
	Type(Box<Expression<V>>),
	List(Box<Expression<V>>),
	Compound(Vec<(Name, Expression<V>)>),
	Point(Box<Expression<V>>),
	Union(Vec<Expression<V>>),
	Func { open: bool, params: Vec<(Pattern<V>, Expression<V>)>, result: Box<Expression<V>> },
	Code(Box<Expression<V>>),
	Path(Box<Expression<V>>),

	// Values.
	ArrayOf(ArrayKind, Vec<Expression<V>>),
	ListOf(Vec<Expression<V>>),
	CompoundOf(Vec<(Name, Expression<V>)>),
	FuncOf { open: bool, params: Vec<Pattern<V>>, result: Box<Expression<V>> },
	CodeOf(Box<Expression<V>>),
	PathOf(Box<Expression<V>>),
	Command { element: Rc<str>, ty: Box<Expression<V>> },

	// Eliminators.
	Apply { func: Box<Expression<V>>, args: Vec<Expression<V>> },
	Splice(Box<Expression<V>>),
	Get(Box<Expression<V>>),
	Project(Box<Expression<V>>, Projection),
	Let { binder: Pattern<V>, init: Box<Expression<V>>, body: Box<Expression<V>> },
	If { scrutinee: Box<Expression<V>>, branches: Vec<(Pattern<V>, Expression<V>)> },

	As(Box<Expression<V>>, Box<Expression<V>>),
	Meta,
}

impl<V> Preterm<V> {
	pub fn at(self, range: Range) -> Expression<V> { Expression { range, preterm: self } }
}

#[derive(Debug, Clone)]
pub struct Pattern<V> {
	pub range: Range,
	pub kind: PatternKind<V>,
}

#[derive(Debug, Clone)]
pub enum PatternKind<V> {
	Literal(Literal),
	ArrayOf(ArrayKind, Vec<Pattern<V>>),
	ListOf(Vec<Pattern<V>>),
	CompoundOf(Vec<(Name, Pattern<V>)>),
	Var(Name),
	Drop,
	Anno(Box<Pattern<V>>, Box<Expression<V>>),
}

impl<V> PatternKind<V> {
	pub fn at(self, range: Range) -> Pattern<V> { Pattern { range, kind: self } }
}

impl<V> Pattern<V> {
	/// Collects the names this pattern binds, in binding order.
	pub fn names(&self, names: &mut Vec<Name>) {
		match &self.kind {
			PatternKind::Var(name) => names.push(*name),
			PatternKind::ArrayOf(_, patterns) | PatternKind::ListOf(patterns) =>
				patterns.iter().for_each(|pattern| pattern.names(names)),
			PatternKind::CompoundOf(patterns) => patterns.iter().for_each(|(_, pattern)| pattern.names(names)),
			PatternKind::Anno(pattern, _) => pattern.names(names),
			PatternKind::Literal(_) | PatternKind::Drop => (),
		}
	}
}

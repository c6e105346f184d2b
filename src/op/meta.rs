use std::{collections::BTreeMap, rc::Rc};

use crate::{
	common::{Level, Name, Phase, Range},
	ir::{
		diagnostic::{Diagnostic, DiagnosticKind},
		semantics::{Closure, Lazy, Value},
		syntax::{Pattern, Term},
	},
	op::{
		evaluate::{Evaluate, Telescope},
		unevaluate::Unevaluate,
	},
	utility::rc,
};

/// The solutions of the metavariables of one elaboration run.
#[derive(Default)]
pub struct Metacontext {
	entries: Vec<Entry>,
}

struct Entry {
	// The size of the context the metavariable was created in; its solution may only mention variables below it.
	level: Level,
	solution: Option<Value>,
}

impl Metacontext {
	pub fn new() -> Self { Self::default() }

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	pub fn fresh_value(&mut self, level: Level, source: Range, ty: Value) -> Value {
		let index = self.entries.len();
		self.entries.push(Entry { level, solution: None });
		Value::Meta { index, source, ty: ty.into() }
	}

	/// Allocates a universe whose representation tag is unknown.
	pub fn fresh_type(&mut self, level: Level, source: Range) -> Value {
		let tag = self.fresh_value(level, source, Value::Tag);
		Value::ty(tag)
	}

	/// Allocates an unknown type.
	pub fn fresh_type_value(&mut self, level: Level, source: Range) -> Value {
		let universe = self.fresh_type(level, source);
		self.fresh_value(level, source, universe)
	}

	pub fn solution(&self, index: usize) -> Option<&Value> { self.entries.get(index)?.solution.as_ref() }

	// Solutions that escape the scope of their metavariable are refused, which surfaces as a mismatch.
	fn assign(&mut self, level: Level, index: usize, value: Value) -> bool {
		let scope = self.entries[index].level;
		if !self.scoped(scope, level, &value) {
			return false;
		}
		let entry = &mut self.entries[index];
		if entry.solution.is_some() {
			unreachable!("metavariable ?{index} solved twice");
		}
		entry.solution = Some(value);
		true
	}

	/// Follows solved metavariables until reaching a concrete head or an unsolved metavariable.
	pub fn force(&self, value: &Value) -> Value {
		let mut value = value.clone();
		while let Value::Meta { index, .. } = value {
			match self.solution(index) {
				Some(solution) => value = solution.clone(),
				None => break,
			}
		}
		value
	}

	pub fn unify(&mut self, level: Level, left: &Value, right: &Value) -> bool {
		use Value::*;
		let left = self.force(left);
		let right = self.force(right);
		match (&left, &right) {
			// Metavariables.
			(Meta { index: l, .. }, Meta { index: r, .. }) if l == r => true,
			(Meta { index, .. }, _) => self.assign(level, *index, right.clone()),
			(_, Meta { index, .. }) => self.assign(level, *index, left.clone()),

			// Holes stand in for anything, so errors do not cascade.
			(Hole, _) | (_, Hole) => true,

			// Atoms.
			(Tag, Tag)
			| (Unit, Unit)
			| (UnitOf, UnitOf)
			| (Bool, Bool)
			| (Byte, Byte)
			| (Short, Short)
			| (Int, Int)
			| (Long, Long)
			| (Float, Float)
			| (Double, Double)
			| (String, String)
			| (ByteArray, ByteArray)
			| (IntArray, IntArray)
			| (LongArray, LongArray) => true,
			(TagOf(l), TagOf(r)) => l == r,
			(BoolOf(l), BoolOf(r)) => l == r,
			(ByteOf(l), ByteOf(r)) => l == r,
			(ShortOf(l), ShortOf(r)) => l == r,
			(IntOf(l), IntOf(r)) => l == r,
			(LongOf(l), LongOf(r)) => l == r,
			(FloatOf(l), FloatOf(r)) => l.to_bits() == r.to_bits(),
			(DoubleOf(l), DoubleOf(r)) => l.to_bits() == r.to_bits(),
			(StringOf(l), StringOf(r)) => l == r,
			(Command(l, _), Command(r, _)) => l == r,

			// Single components.
			(Type(l), Type(r))
			| (List(l), List(r))
			| (Point(l, _), Point(r, _))
			| (Code(l), Code(r))
			| (CodeOf(l, _), CodeOf(r, _))
			| (Path(l), Path(r))
			| (PathOf(l, _), PathOf(r, _)) => self.unify(level, l.force(), r.force()),
			(Splice(l, _), Splice(r, _)) | (Get(l, _), Get(r, _)) => self.unify(level, l, r),

			// Sequences.
			(ByteArrayOf(l), ByteArrayOf(r))
			| (IntArrayOf(l), IntArrayOf(r))
			| (LongArrayOf(l), LongArrayOf(r))
			| (ListOf(l, _), ListOf(r, _))
			| (Union(l, _), Union(r, _)) => self.unify_all(level, l, r),
			(Compound(l), Compound(r)) | (CompoundOf(l, _), CompoundOf(r, _)) => self.unify_fields(level, l, r),

			// Functions.
			(Func { open: lo, params: lp, result: lr }, Func { open: ro, params: rp, result: rr }) =>
				lo == ro
					&& lp.len() == rp.len()
					&& self.unify_telescopes(level, Telescope::new(lp, lr), Telescope::new(rp, rr)),
			(FuncOf { open: lo, result: lr, .. }, FuncOf { open: ro, result: rr, .. }) =>
				lo == ro && self.unify_closures(level, lr, rr),
			(Apply { open: lo, func: lf, args: la, .. }, Apply { open: ro, func: rf, args: ra, .. }) =>
				lo == ro && self.unify(level, lf, rf) && self.unify_all(level, la, ra),

			// Stuck eliminators.
			(Project(l, lp, _), Project(r, rp, _)) => lp == rp && self.unify(level, l, r),
			(If { scrutinee: ls, branches: lb, .. }, If { scrutinee: rs, branches: rb, .. }) =>
				lb.len() == rb.len()
					&& self.unify(level, ls, rs)
					&& lb.iter().zip(rb.iter()).all(|(l, r)| self.unify_closures(level, l, r)),

			// Variables and references.
			(Var { level: l, .. }, Var { level: r, .. }) => l == r,
			(Def { definition: l, .. }, Def { definition: r, .. }) => l.location == r.location,

			// Inconvertible.
			_ => false,
		}
	}

	fn unify_all(&mut self, level: Level, left: &[Lazy], right: &[Lazy]) -> bool {
		left.len() == right.len() && left.iter().zip(right).all(|(l, r)| self.unify(level, l.force(), r.force()))
	}

	fn unify_fields(&mut self, level: Level, left: &[(Name, Lazy)], right: &[(Name, Lazy)]) -> bool {
		left.len() == right.len()
			&& left.iter().all(|(name, l)| match right.iter().find(|(key, _)| key == name) {
				Some((_, r)) => self.unify(level, l.force(), r.force()),
				None => false,
			})
	}

	pub fn unify_closures(&mut self, level: Level, left: &Closure, right: &Closure) -> bool {
		if left.binders.len() != right.binders.len()
			|| left.binders.iter().zip(right.binders.iter()).any(|(l, r)| l.binders() != r.binders())
		{
			return false;
		}
		let (left_environment, inner) = left.open(level);
		let (right_environment, _) = right.open(level);
		let left = left.body.evaluate_in(&left_environment, Phase::Const);
		let right = right.body.evaluate_in(&right_environment, Phase::Const);
		self.unify(inner, &left, &right)
	}

	fn unify_telescopes(&mut self, level: Level, mut left: Telescope, mut right: Telescope) -> bool {
		let mut level = level;
		while let (Some(l), Some(r)) = (left.next_type(), right.next_type()) {
			let binders = |telescope: &Telescope| telescope.binder().map(Pattern::binders);
			if binders(&left) != binders(&right) || !self.unify(level, &l, &r) {
				return false;
			}
			let mut right_level = level;
			right.open(&mut right_level);
			left.open(&mut level);
		}
		self.unify(level, &left.result(), &right.result())
	}

	/// Whether a value at `level` mentions no variable in `scope..level`.
	fn scoped(&self, scope: Level, level: Level, value: &Value) -> bool {
		use Value::*;
		let lazy = |value: &Lazy| self.scoped(scope, level, value.force());
		match self.force(value) {
			Var { level: variable, .. } => variable < scope || variable >= level,

			Tag
			| TagOf(_)
			| Unit
			| UnitOf
			| Bool
			| BoolOf(_)
			| Byte
			| ByteOf(_)
			| Short
			| ShortOf(_)
			| Int
			| IntOf(_)
			| Long
			| LongOf(_)
			| Float
			| FloatOf(_)
			| Double
			| DoubleOf(_)
			| String
			| StringOf(_)
			| ByteArray
			| IntArray
			| LongArray
			| Def { .. }
			| Meta { .. }
			| Hole => true,

			Type(element) | List(element) | Code(element) | Path(element) | Command(_, element) => lazy(&element),
			Point(element, ty) | CodeOf(element, ty) | PathOf(element, ty) => lazy(&element) && lazy(&ty),
			ByteArrayOf(elements) | IntArrayOf(elements) | LongArrayOf(elements) => elements.iter().all(lazy),
			ListOf(elements, ty) | Union(elements, ty) => elements.iter().all(lazy) && lazy(&ty),
			Compound(fields) => fields.iter().all(|(_, field)| lazy(field)),
			CompoundOf(fields, ty) => fields.iter().all(|(_, field)| lazy(field)) && lazy(&ty),

			Func { params, result, .. } => {
				let mut telescope = Telescope::new(&params, &result);
				let mut inner = level;
				for _ in 0..telescope.len() {
					match telescope.next_type() {
						Some(ty) if self.scoped(scope, inner, &ty) => telescope.open(&mut inner),
						_ => return false,
					}
				}
				self.scoped(scope, inner, &telescope.result())
			}
			FuncOf { result, ty, .. } => self.scoped_closure(scope, level, &result) && lazy(&ty),
			Apply { func, args, ty, .. } => self.scoped(scope, level, &func) && args.iter().all(lazy) && lazy(&ty),
			Splice(element, ty) | Get(element, ty) | Project(element, _, ty) =>
				self.scoped(scope, level, &element) && lazy(&ty),
			If { scrutinee, branches, ty } =>
				self.scoped(scope, level, &scrutinee)
					&& branches.iter().all(|branch| self.scoped_closure(scope, level, branch))
					&& lazy(&ty),
		}
	}

	fn scoped_closure(&self, scope: Level, level: Level, closure: &Closure) -> bool {
		let (environment, inner) = closure.open(level);
		self.scoped(scope, inner, &closure.body.evaluate_in(&environment, Phase::Const))
	}

	/// Inlines solved metavariables, recording unsolved ones with their sources.
	pub fn zonk(&self, level: Level, term: &Term, unsolved: &mut BTreeMap<usize, Range>) -> Term {
		Zonker { metacontext: self, unsolved }.term(level, term)
	}

	/// Zonks the type and body of a definition, reporting each unsolved metavariable once.
	pub fn check_solved<const N: usize>(&self, diagnostics: &mut Vec<Diagnostic>, terms: [&Term; N]) -> [Term; N] {
		let mut unsolved = BTreeMap::new();
		let zonked = terms.map(|term| self.zonk(Level(0), term, &mut unsolved));
		for (index, source) in unsolved {
			diagnostics.push(DiagnosticKind::UnsolvedMeta(index).at(source));
		}
		zonked
	}
}

struct Zonker<'m, 'u> {
	metacontext: &'m Metacontext,
	unsolved: &'u mut BTreeMap<usize, Range>,
}

impl Zonker<'_, '_> {
	fn rc(&mut self, level: Level, term: &Rc<Term>) -> Rc<Term> { rc!(self.term(level, term)) }

	fn all(&mut self, level: Level, terms: &[Term]) -> Vec<Term> {
		terms.iter().map(|term| self.term(level, term)).collect()
	}

	fn fields(&mut self, level: Level, fields: &[(Name, Term)]) -> Vec<(Name, Term)> {
		fields.iter().map(|(name, term)| (*name, self.term(level, term))).collect()
	}

	fn term(&mut self, level: Level, term: &Term) -> Term {
		match term {
			Term::Tag
			| Term::TagOf(_)
			| Term::Unit
			| Term::UnitOf
			| Term::Bool
			| Term::BoolOf(_)
			| Term::Byte
			| Term::ByteOf(_)
			| Term::Short
			| Term::ShortOf(_)
			| Term::Int
			| Term::IntOf(_)
			| Term::Long
			| Term::LongOf(_)
			| Term::Float
			| Term::FloatOf(_)
			| Term::Double
			| Term::DoubleOf(_)
			| Term::String
			| Term::StringOf(_)
			| Term::ByteArray
			| Term::IntArray
			| Term::LongArray
			| Term::Hole => term.clone(),
			Term::Type(tag) => Term::Type(self.rc(level, tag)),

			Term::ByteArrayOf(elements) => Term::ByteArrayOf(self.all(level, elements)),
			Term::IntArrayOf(elements) => Term::IntArrayOf(self.all(level, elements)),
			Term::LongArrayOf(elements) => Term::LongArrayOf(self.all(level, elements)),

			Term::List(element) => Term::List(self.rc(level, element)),
			Term::ListOf { elements, ty } =>
				Term::ListOf { elements: self.all(level, elements), ty: self.rc(level, ty) },
			Term::Compound(elements) => Term::Compound(self.fields(level, elements)),
			Term::CompoundOf { elements, ty } =>
				Term::CompoundOf { elements: self.fields(level, elements), ty: self.rc(level, ty) },

			Term::Point { element, ty } => Term::Point { element: self.rc(level, element), ty: self.rc(level, ty) },
			Term::Union { elements, ty } => Term::Union { elements: self.all(level, elements), ty: self.rc(level, ty) },

			Term::Func { open, params, result } => {
				let mut inner = level;
				let params = params
					.iter()
					.map(|(binder, ty)| {
						let ty = self.term(inner, ty);
						let binder = self.pattern(inner, binder);
						inner += binder.binders();
						(binder, ty)
					})
					.collect();
				Term::Func { open: *open, params, result: self.rc(inner, result) }
			}
			Term::FuncOf { open, params, result, ty } => {
				let mut inner = level;
				let params = params
					.iter()
					.map(|binder| {
						let binder = self.pattern(inner, binder);
						inner += binder.binders();
						binder
					})
					.collect();
				Term::FuncOf { open: *open, params, result: self.rc(inner, result), ty: self.rc(level, ty) }
			}
			Term::Apply { open, func, args, ty } => Term::Apply {
				open: *open,
				func: self.rc(level, func),
				args: self.all(level, args),
				ty: self.rc(level, ty),
			},

			Term::Code(element) => Term::Code(self.rc(level, element)),
			Term::CodeOf { element, ty } => Term::CodeOf { element: self.rc(level, element), ty: self.rc(level, ty) },
			Term::Splice { element, ty } => Term::Splice { element: self.rc(level, element), ty: self.rc(level, ty) },
			Term::Path(element) => Term::Path(self.rc(level, element)),
			Term::PathOf { element, ty } => Term::PathOf { element: self.rc(level, element), ty: self.rc(level, ty) },
			Term::Get { element, ty } => Term::Get { element: self.rc(level, element), ty: self.rc(level, ty) },
			Term::Command { element, ty } => Term::Command { element: element.clone(), ty: self.rc(level, ty) },

			Term::Let { binder, init, body, ty } => {
				let binder = self.pattern(level, binder);
				let inner = level + binder.binders();
				Term::Let {
					init: self.rc(level, init),
					body: self.rc(inner, body),
					ty: self.rc(level, ty),
					binder: rc!(binder),
				}
			}
			Term::If { scrutinee, branches, ty } => Term::If {
				scrutinee: self.rc(level, scrutinee),
				branches: branches
					.iter()
					.map(|(binder, body)| {
						let binder = self.pattern(level, binder);
						let body = self.term(level + binder.binders(), body);
						(binder, body)
					})
					.collect(),
				ty: self.rc(level, ty),
			},
			Term::Project { target, projection, ty } =>
				Term::Project { target: self.rc(level, target), projection: *projection, ty: self.rc(level, ty) },

			Term::Var { name, index, ty } => Term::Var { name: *name, index: *index, ty: self.rc(level, ty) },
			Term::Def { definition, ty } => Term::Def { definition: definition.clone(), ty: self.rc(level, ty) },
			Term::Meta { index, source, ty } => match self.metacontext.solution(*index) {
				Some(solution) => {
					let solution = solution.unevaluate_in(level, Phase::Const);
					self.term(level, &solution)
				}
				None => {
					self.unsolved.entry(*index).or_insert(*source);
					Term::Meta { index: *index, source: *source, ty: ty.clone() }
				}
			},
		}
	}

	fn pattern(&mut self, level: Level, pattern: &Pattern) -> Pattern {
		let mut all = |patterns: &Vec<Pattern>| -> Vec<Pattern> {
			patterns.iter().map(|pattern| self.pattern(level, pattern)).collect()
		};
		match pattern {
			Pattern::ByteArrayOf(patterns) => Pattern::ByteArrayOf(all(patterns)),
			Pattern::IntArrayOf(patterns) => Pattern::IntArrayOf(all(patterns)),
			Pattern::LongArrayOf(patterns) => Pattern::LongArrayOf(all(patterns)),
			Pattern::ListOf(patterns, ty) => {
				let patterns = all(patterns);
				Pattern::ListOf(patterns, self.term(level, ty))
			}
			Pattern::CompoundOf(patterns, ty) => Pattern::CompoundOf(
				patterns.iter().map(|(name, pattern)| (*name, self.pattern(level, pattern))).collect(),
				self.term(level, ty),
			),
			Pattern::Var { name, ty } => Pattern::Var { name: *name, ty: self.term(level, ty) },
			Pattern::Drop(ty) => Pattern::Drop(self.term(level, ty)),
			Pattern::UnitOf
			| Pattern::BoolOf(_)
			| Pattern::ByteOf(_)
			| Pattern::ShortOf(_)
			| Pattern::IntOf(_)
			| Pattern::LongOf(_)
			| Pattern::FloatOf(_)
			| Pattern::DoubleOf(_)
			| Pattern::StringOf(_)
			| Pattern::Hole => pattern.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use lasso::Rodeo;

	use super::*;

	#[test]
	fn solutions_stay_within_the_scope_of_their_metavariable() {
		let mut interner = Rodeo::new();
		let x = interner.get_or_intern("x");
		let variable = Value::Var { name: x, level: Level(0), ty: Value::Int.into() };

		let mut metas = Metacontext::new();
		let outer = metas.fresh_type_value(Level(0), Range::default());
		let inner = metas.fresh_type_value(Level(1), Range::default());
		assert!(!metas.unify(Level(1), &outer, &variable));
		assert!(matches!(metas.force(&outer), Value::Meta { .. }));
		assert!(metas.unify(Level(1), &inner, &variable));
		assert!(matches!(metas.force(&inner), Value::Var { level: Level(0), .. }));
	}

	#[test]
	fn zonking_replaces_solved_metavariables() {
		let mut metas = Metacontext::new();
		let meta = metas.fresh_type_value(Level(0), Range::new(3, 4));
		let term = Term::List(meta.unevaluate(Phase::Const).into());
		let mut unsolved = BTreeMap::new();
		assert!(metas.unify(Level(0), &meta, &Value::Int));
		assert_eq!(metas.zonk(Level(0), &term, &mut unsolved), Term::List(Term::Int.into()));
		assert!(unsolved.is_empty());
	}
}

use std::rc::Rc;

use crate::{
	common::{Level, Phase},
	ir::{
		semantics::{Closure, Environment, Lazy, Value},
		syntax::{Pattern, Term},
	},
	op::evaluate::{open_binder, Evaluate},
	utility::rc,
};

pub trait Unevaluate {
	type Term;
	/// Transforms a value into a core term.
	fn unevaluate(&self, phase: Phase) -> Self::Term { self.unevaluate_in(Level(0), phase) }

	fn unevaluate_in(&self, level: Level, phase: Phase) -> Self::Term;
}

impl Unevaluate for Lazy {
	type Term = Term;
	fn unevaluate_in(&self, level: Level, phase: Phase) -> Self::Term { self.force().unevaluate_in(level, phase) }
}

impl Unevaluate for Value {
	type Term = Term;
	fn unevaluate_in(&self, level: Level, phase: Phase) -> Self::Term {
		use Value as V;
		let ty = |ty: &Lazy| -> Rc<Term> { rc!(ty.unevaluate_in(level, Phase::Const)) };
		let all = |elements: &Rc<[Lazy]>, phase: Phase| -> Vec<Term> {
			elements.iter().map(|element| element.unevaluate_in(level, phase)).collect()
		};
		match self {
			// Representation tags and universes.
			V::Tag => Term::Tag,
			V::TagOf(repr) => Term::TagOf(*repr),
			V::Type(tag) => Term::Type(ty(tag)),

			// Primitives.
			V::Unit => Term::Unit,
			V::UnitOf => Term::UnitOf,
			V::Bool => Term::Bool,
			V::BoolOf(b) => Term::BoolOf(*b),
			V::Byte => Term::Byte,
			V::ByteOf(n) => Term::ByteOf(*n),
			V::Short => Term::Short,
			V::ShortOf(n) => Term::ShortOf(*n),
			V::Int => Term::Int,
			V::IntOf(n) => Term::IntOf(*n),
			V::Long => Term::Long,
			V::LongOf(n) => Term::LongOf(*n),
			V::Float => Term::Float,
			V::FloatOf(n) => Term::FloatOf(*n),
			V::Double => Term::Double,
			V::DoubleOf(n) => Term::DoubleOf(*n),
			V::String => Term::String,
			V::StringOf(s) => Term::StringOf(s.clone()),

			// Arrays.
			V::ByteArray => Term::ByteArray,
			V::ByteArrayOf(elements) => Term::ByteArrayOf(all(elements, phase)),
			V::IntArray => Term::IntArray,
			V::IntArrayOf(elements) => Term::IntArrayOf(all(elements, phase)),
			V::LongArray => Term::LongArray,
			V::LongArrayOf(elements) => Term::LongArrayOf(all(elements, phase)),

			// Lists and compounds.
			V::List(element) => Term::List(ty(element)),
			V::ListOf(elements, list_ty) => Term::ListOf { elements: all(elements, phase), ty: ty(list_ty) },
			V::Compound(elements) => Term::Compound(
				elements.iter().map(|(name, element)| (*name, element.unevaluate_in(level, Phase::Const))).collect(),
			),
			V::CompoundOf(elements, compound_ty) => Term::CompoundOf {
				elements: elements.iter().map(|(name, element)| (*name, element.unevaluate_in(level, phase))).collect(),
				ty: ty(compound_ty),
			},

			// Singletons and unions.
			V::Point(element, element_ty) => Term::Point { element: ty(element), ty: ty(element_ty) },
			V::Union(elements, union_ty) => Term::Union { elements: all(elements, Phase::Const), ty: ty(union_ty) },

			// Functions.
			V::Func { open, params, result } => {
				let (binders, params, result) = unevaluate_closure(result, Some(params), level, Phase::Const);
				Term::Func { open: *open, params: binders.into_iter().zip(params).collect(), result: rc!(result) }
			}
			V::FuncOf { open, result, ty: func_ty } => {
				let (binders, _, result) = unevaluate_closure(result, None, level, phase);
				Term::FuncOf { open: *open, params: binders, result: rc!(result), ty: ty(func_ty) }
			}
			V::Apply { open, func, args, ty: result_ty } => Term::Apply {
				open: *open,
				func: rc!(func.unevaluate_in(level, phase)),
				args: all(args, phase),
				ty: ty(result_ty),
			},

			// Quoted programs.
			V::Code(element) => Term::Code(ty(element)),
			V::CodeOf(element, code_ty) =>
				Term::CodeOf { element: rc!(element.unevaluate_in(level, Phase::World)), ty: ty(code_ty) },
			V::Splice(element, element_ty) =>
				Term::Splice { element: rc!(element.unevaluate_in(level, Phase::Const)), ty: ty(element_ty) },

			// References.
			V::Path(element) => Term::Path(ty(element)),
			V::PathOf(element, path_ty) =>
				Term::PathOf { element: rc!(element.unevaluate_in(level, phase)), ty: ty(path_ty) },
			V::Get(element, element_ty) =>
				Term::Get { element: rc!(element.unevaluate_in(level, phase)), ty: ty(element_ty) },

			V::Command(element, command_ty) => Term::Command { element: element.clone(), ty: ty(command_ty) },

			// Stuck eliminators.
			V::Project(target, projection, element_ty) => Term::Project {
				target: rc!(target.unevaluate_in(level, phase)),
				projection: *projection,
				ty: ty(element_ty),
			},
			V::If { scrutinee, branches, ty: if_ty } => Term::If {
				scrutinee: rc!(scrutinee.unevaluate_in(level, phase)),
				branches: branches
					.iter()
					.map(|branch| {
						let (mut binders, _, body) = unevaluate_closure(branch, None, level, phase);
						(binders.pop().unwrap_or(Pattern::Hole), body)
					})
					.collect(),
				ty: ty(if_ty),
			},

			// Free variables and references.
			V::Var { name, level: variable, ty: variable_ty } => match variable.to_index(level) {
				Some(index) => Term::Var { name: *name, index, ty: ty(variable_ty) },
				None => Term::Hole,
			},
			V::Def { definition, ty: definition_ty } =>
				Term::Def { definition: definition.clone(), ty: ty(definition_ty) },
			V::Meta { index, source, ty: meta_ty } => Term::Meta { index: *index, source: *source, ty: ty(meta_ty) },

			V::Hole => Term::Hole,
		}
	}
}

/// Opens a closure with fresh variables, returning its binders and parameter types retyped at `level` along with
/// its quoted body.
fn unevaluate_closure(
	closure: &Closure,
	params: Option<&Rc<[Term]>>,
	level: Level,
	phase: Phase,
) -> (Vec<Pattern>, Vec<Term>, Term) {
	let mut environment = closure.environment.clone();
	let mut inner = level;
	let mut binders = Vec::with_capacity(closure.binders.len());
	let mut types = Vec::new();
	for (position, binder) in closure.binders.iter().enumerate() {
		if let Some(ty) = params.and_then(|params| params.get(position)) {
			types.push(ty.evaluate_in(&environment, Phase::Const).unevaluate_in(inner, Phase::Const));
		}
		binders.push(unevaluate_pattern(binder, &environment, inner));
		open_binder(&mut environment, &mut inner, binder);
	}
	let body = closure.body.evaluate_in(&environment, phase).unevaluate_in(inner, phase);
	(binders, types, body)
}

/// Re-expresses the types within a pattern, relative to `environment`, as terms at `level`.
pub fn unevaluate_pattern(pattern: &Pattern, environment: &Environment, level: Level) -> Pattern {
	let retype = |ty: &Term| ty.evaluate_in(environment, Phase::Const).unevaluate_in(level, Phase::Const);
	let all = |patterns: &Vec<Pattern>| -> Vec<Pattern> {
		patterns.iter().map(|pattern| unevaluate_pattern(pattern, environment, level)).collect()
	};
	match pattern {
		Pattern::ByteArrayOf(patterns) => Pattern::ByteArrayOf(all(patterns)),
		Pattern::IntArrayOf(patterns) => Pattern::IntArrayOf(all(patterns)),
		Pattern::LongArrayOf(patterns) => Pattern::LongArrayOf(all(patterns)),
		Pattern::ListOf(patterns, ty) => Pattern::ListOf(all(patterns), retype(ty)),
		Pattern::CompoundOf(patterns, ty) => Pattern::CompoundOf(
			patterns.iter().map(|(name, pattern)| (*name, unevaluate_pattern(pattern, environment, level))).collect(),
			retype(ty),
		),
		Pattern::Var { name, ty } => Pattern::Var { name: *name, ty: retype(ty) },
		Pattern::Drop(ty) => Pattern::Drop(retype(ty)),
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

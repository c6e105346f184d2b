use std::rc::Rc;

use crate::{
	common::{Level, Name, Phase, Projection},
	ir::{
		semantics::{Closure, Environment, Lazy, Value},
		syntax::{Pattern, Term},
	},
	op::builtin,
	utility::rc,
};

pub trait Evaluate {
	type Value;

	fn evaluate(&self, phase: Phase) -> Self::Value { self.evaluate_in(&Environment::new(), phase) }

	fn evaluate_in(&self, environment: &Environment, phase: Phase) -> Self::Value;
}

impl Evaluate for Term {
	type Value = Value;

	fn evaluate_in(&self, environment: &Environment, phase: Phase) -> Self::Value {
		match self {
			// Representation tags and universes.
			Self::Tag => Value::Tag,
			Self::TagOf(repr) => Value::TagOf(*repr),
			Self::Type(tag) => Value::Type(defer(tag, environment, Phase::Const)),

			// Primitives.
			Self::Unit => Value::Unit,
			Self::UnitOf => Value::UnitOf,
			Self::Bool => Value::Bool,
			Self::BoolOf(b) => Value::BoolOf(*b),
			Self::Byte => Value::Byte,
			Self::ByteOf(n) => Value::ByteOf(*n),
			Self::Short => Value::Short,
			Self::ShortOf(n) => Value::ShortOf(*n),
			Self::Int => Value::Int,
			Self::IntOf(n) => Value::IntOf(*n),
			Self::Long => Value::Long,
			Self::LongOf(n) => Value::LongOf(*n),
			Self::Float => Value::Float,
			Self::FloatOf(n) => Value::FloatOf(*n),
			Self::Double => Value::Double,
			Self::DoubleOf(n) => Value::DoubleOf(*n),
			Self::String => Value::String,
			Self::StringOf(s) => Value::StringOf(s.clone()),

			// Arrays.
			Self::ByteArray => Value::ByteArray,
			Self::ByteArrayOf(elements) => Value::ByteArrayOf(defer_all(elements, environment, phase)),
			Self::IntArray => Value::IntArray,
			Self::IntArrayOf(elements) => Value::IntArrayOf(defer_all(elements, environment, phase)),
			Self::LongArray => Value::LongArray,
			Self::LongArrayOf(elements) => Value::LongArrayOf(defer_all(elements, environment, phase)),

			// Lists and compounds.
			Self::List(element) => Value::List(defer(element, environment, Phase::Const)),
			Self::ListOf { elements, ty } =>
				Value::ListOf(defer_all(elements, environment, phase), defer(ty, environment, Phase::Const)),
			Self::Compound(elements) => Value::Compound(defer_fields(elements, environment, Phase::Const)),
			Self::CompoundOf { elements, ty } =>
				Value::CompoundOf(defer_fields(elements, environment, phase), defer(ty, environment, Phase::Const)),

			// Singletons and unions.
			Self::Point { element, ty } =>
				Value::Point(defer(element, environment, Phase::Const), defer(ty, environment, Phase::Const)),
			Self::Union { elements, ty } => Value::Union(
				defer_all(elements, environment, Phase::Const),
				defer(ty, environment, Phase::Const),
			),

			// Functions.
			Self::Func { open, params, result } => Value::Func {
				open: *open,
				params: params.iter().map(|(_, ty)| ty.clone()).collect(),
				result: Closure::new(
					environment.clone(),
					params.iter().map(|(binder, _)| binder.clone()).collect::<Vec<_>>(),
					result.clone(),
				),
			},
			Self::FuncOf { open, params, result, ty } => Value::FuncOf {
				open: *open,
				result: Closure::new(environment.clone(), params.clone(), result.clone()),
				ty: defer(ty, environment, Phase::Const),
			},
			Self::Apply { open, func, args, ty } => apply(
				func.evaluate_in(environment, phase),
				defer_all(args, environment, phase),
				*open,
				defer(ty, environment, Phase::Const),
				phase,
			),

			// Quoted programs.
			Self::Code(element) => Value::Code(defer(element, environment, Phase::Const)),
			Self::CodeOf { element, ty } =>
				Value::CodeOf(defer(element, environment, Phase::World), defer(ty, environment, Phase::Const)),
			Self::Splice { element, ty } => match element.evaluate_in(environment, Phase::Const) {
				Value::CodeOf(element, _) => element.force().clone(),
				element => Value::Splice(rc!(element), defer(ty, environment, Phase::Const)),
			},

			// References.
			Self::Path(element) => Value::Path(defer(element, environment, Phase::Const)),
			Self::PathOf { element, ty } =>
				Value::PathOf(defer(element, environment, phase), defer(ty, environment, Phase::Const)),
			Self::Get { element, ty } => match (phase, element.evaluate_in(environment, phase)) {
				(Phase::Const, Value::PathOf(element, _)) => element.force().clone(),
				(_, element) => Value::Get(rc!(element), defer(ty, environment, Phase::Const)),
			},

			Self::Command { element, ty } => Value::Command(element.clone(), defer(ty, environment, Phase::Const)),

			// Binding and matching.
			Self::Let { binder, init, body, .. } => {
				let init = defer(init, environment, phase);
				body.evaluate_in(&environment.extend(bind(environment, binder, init)), phase)
			}
			Self::If { scrutinee, branches, ty } => {
				let scrutinee = scrutinee.evaluate_in(environment, phase);
				if phase == Phase::Const {
					for (binder, body) in branches {
						match matches(binder, &scrutinee) {
							Some(true) => {
								let values = bind(environment, binder, scrutinee.clone().into());
								return body.evaluate_in(&environment.extend(values), phase);
							}
							Some(false) => continue,
							None => break,
						}
					}
				}
				Value::If {
					scrutinee: rc!(scrutinee),
					branches: branches
						.iter()
						.map(|(binder, body)| Closure::new(environment.clone(), [binder.clone()], body.clone()))
						.collect(),
					ty: defer(ty, environment, Phase::Const),
				}
			}
			Self::Project { target, projection, ty } =>
				project(target.evaluate_in(environment, phase), *projection, defer(ty, environment, Phase::Const)),

			// References to bindings.
			Self::Var { index, .. } => environment.lookup(*index).force().clone(),
			Self::Def { definition, ty } => match (&definition.body, phase, definition.phase) {
				(Some(body), Phase::Const, Phase::Const) if definition.builtin().is_none() =>
					body.evaluate(Phase::Const),
				_ => Value::Def { definition: definition.clone(), ty: defer(ty, environment, Phase::Const) },
			},
			Self::Meta { index, source, ty } =>
				Value::Meta { index: *index, source: *source, ty: defer(ty, environment, Phase::Const) },

			Self::Hole => Value::Hole,
		}
	}
}

fn defer(term: &Rc<Term>, environment: &Environment, phase: Phase) -> Lazy {
	let term = term.clone();
	let environment = environment.clone();
	Lazy::new(move || term.evaluate_in(&environment, phase))
}

fn defer_all(terms: &[Term], environment: &Environment, phase: Phase) -> Rc<[Lazy]> {
	terms.iter().map(|term| defer(&rc!(term.clone()), environment, phase)).collect()
}

fn defer_fields(
	fields: &[(Name, Term)],
	environment: &Environment,
	phase: Phase,
) -> Rc<[(Name, Lazy)]> {
	fields.iter().map(|(name, term)| (*name, defer(&rc!(term.clone()), environment, phase))).collect()
}

/// Applies a function value, reducing at the compile-time phase when the head is known.
pub fn apply(func: Value, args: Rc<[Lazy]>, open: bool, ty: Lazy, phase: Phase) -> Value {
	if phase == Phase::Const {
		match &func {
			Value::FuncOf { result, .. } => return result.apply(args.iter().cloned(), phase),
			Value::Def { definition, .. } =>
				if let Some(value) = definition.builtin().and_then(|builtin| builtin::reduce(builtin, &args)) {
					return value;
				},
			_ => (),
		}
	}
	Value::Apply { open, func: rc!(func), args, ty }
}

/// Projects out of a value, leaving the projection stuck when the target is not a literal.
pub fn project(target: Value, projection: Projection, ty: Lazy) -> Value {
	match (&target, projection) {
		(
			Value::ByteArrayOf(elements)
			| Value::IntArrayOf(elements)
			| Value::LongArrayOf(elements)
			| Value::ListOf(elements, _),
			Projection::Index(index),
		) if index < elements.len() => elements[index].force().clone(),
		(Value::CompoundOf(elements, _), Projection::Field(name)) =>
			match elements.iter().find(|(key, _)| *key == name) {
				Some((_, element)) => element.force().clone(),
				None => Value::Project(rc!(target), projection, ty),
			},
		_ => Value::Project(rc!(target), projection, ty),
	}
}

/// Decides whether a pattern matches a value, or returns `None` if the value is not concrete enough.
pub fn matches(pattern: &Pattern, value: &Value) -> Option<bool> {
	match (pattern, value) {
		(Pattern::Var { .. } | Pattern::Drop(_), _) => Some(true),
		(Pattern::Hole, _) => None,
		(_, value) if value.is_neutral() => None,

		(Pattern::UnitOf, Value::UnitOf) => Some(true),
		(Pattern::BoolOf(p), Value::BoolOf(v)) => Some(p == v),
		(Pattern::ByteOf(p), Value::ByteOf(v)) => Some(p == v),
		(Pattern::ShortOf(p), Value::ShortOf(v)) => Some(p == v),
		(Pattern::IntOf(p), Value::IntOf(v)) => Some(p == v),
		(Pattern::LongOf(p), Value::LongOf(v)) => Some(p == v),
		(Pattern::FloatOf(p), Value::FloatOf(v)) => Some(p == v),
		(Pattern::DoubleOf(p), Value::DoubleOf(v)) => Some(p == v),
		(Pattern::StringOf(p), Value::StringOf(v)) => Some(p == v),

		(Pattern::ByteArrayOf(patterns), Value::ByteArrayOf(elements))
		| (Pattern::IntArrayOf(patterns), Value::IntArrayOf(elements))
		| (Pattern::LongArrayOf(patterns), Value::LongArrayOf(elements))
		| (Pattern::ListOf(patterns, _), Value::ListOf(elements, _)) => {
			if patterns.len() != elements.len() {
				return Some(false);
			}
			conjoin(patterns.iter().zip(elements.iter()).map(|(pattern, element)| matches(pattern, element.force())))
		}
		(Pattern::CompoundOf(patterns, _), Value::CompoundOf(elements, _)) => {
			let mut outcomes = Vec::with_capacity(patterns.len());
			for (name, pattern) in patterns {
				match elements.iter().find(|(key, _)| key == name) {
					Some((_, element)) => outcomes.push(matches(pattern, element.force())),
					None => return Some(false),
				}
			}
			conjoin(outcomes)
		}

		// Mismatched shapes.
		_ => Some(false),
	}
}

// A definite mismatch anywhere decides the match even when other components are undecided.
fn conjoin(outcomes: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
	let mut decided = true;
	for outcome in outcomes {
		match outcome {
			Some(false) => return Some(false),
			Some(true) => (),
			None => decided = false,
		}
	}
	decided.then_some(true)
}

/// Destructures a value against a pattern, producing the values of its binders in order.
pub fn bind(environment: &Environment, pattern: &Pattern, value: Lazy) -> Vec<Lazy> {
	let mut values = Vec::with_capacity(pattern.binders());
	bind_into(environment, pattern, value, &mut values);
	values
}

fn bind_into(environment: &Environment, pattern: &Pattern, value: Lazy, values: &mut Vec<Lazy>) {
	match pattern {
		Pattern::Var { .. } => values.push(value),
		Pattern::ByteArrayOf(patterns)
		| Pattern::IntArrayOf(patterns)
		| Pattern::LongArrayOf(patterns)
		| Pattern::ListOf(patterns, _) =>
			for (index, pattern) in patterns.iter().enumerate() {
				if pattern.binders() > 0 {
					let element = projected(environment, &value, Projection::Index(index), pattern);
					bind_into(environment, pattern, element, values);
				}
			},
		Pattern::CompoundOf(patterns, _) =>
			for (name, pattern) in patterns {
				if pattern.binders() > 0 {
					let element = projected(environment, &value, Projection::Field(*name), pattern);
					bind_into(environment, pattern, element, values);
				}
			},
		Pattern::UnitOf
		| Pattern::BoolOf(_)
		| Pattern::ByteOf(_)
		| Pattern::ShortOf(_)
		| Pattern::IntOf(_)
		| Pattern::LongOf(_)
		| Pattern::FloatOf(_)
		| Pattern::DoubleOf(_)
		| Pattern::StringOf(_)
		| Pattern::Drop(_)
		| Pattern::Hole => (),
	}
}

fn projected(environment: &Environment, target: &Lazy, projection: Projection, pattern: &Pattern) -> Lazy {
	let target = target.clone();
	let ty = pattern_type(environment, pattern);
	Lazy::new(move || project(target.force().clone(), projection, ty))
}

/// The type of the values a pattern matches.
pub fn pattern_type(environment: &Environment, pattern: &Pattern) -> Lazy {
	match pattern {
		Pattern::Var { ty, .. } | Pattern::Drop(ty) | Pattern::ListOf(_, ty) | Pattern::CompoundOf(_, ty) =>
			defer(&rc!(ty.clone()), environment, Phase::Const),
		Pattern::UnitOf => Value::Unit.into(),
		Pattern::BoolOf(_) => Value::Bool.into(),
		Pattern::ByteOf(_) => Value::Byte.into(),
		Pattern::ShortOf(_) => Value::Short.into(),
		Pattern::IntOf(_) => Value::Int.into(),
		Pattern::LongOf(_) => Value::Long.into(),
		Pattern::FloatOf(_) => Value::Float.into(),
		Pattern::DoubleOf(_) => Value::Double.into(),
		Pattern::StringOf(_) => Value::String.into(),
		Pattern::ByteArrayOf(_) => Value::ByteArray.into(),
		Pattern::IntArrayOf(_) => Value::IntArray.into(),
		Pattern::LongArrayOf(_) => Value::LongArray.into(),
		Pattern::Hole => Value::Hole.into(),
	}
}

/// Binds the variables of a pattern to fresh free variables starting at `level`.
pub fn open_binder(environment: &mut Environment, level: &mut Level, binder: &Pattern) {
	fn variables<'p>(pattern: &'p Pattern, out: &mut Vec<(Name, &'p Term)>) {
		match pattern {
			Pattern::Var { name, ty } => out.push((*name, ty)),
			Pattern::ByteArrayOf(patterns)
			| Pattern::IntArrayOf(patterns)
			| Pattern::LongArrayOf(patterns)
			| Pattern::ListOf(patterns, _) => patterns.iter().for_each(|pattern| variables(pattern, out)),
			Pattern::CompoundOf(patterns, _) => patterns.iter().for_each(|(_, pattern)| variables(pattern, out)),
			_ => (),
		}
	}

	let base = environment.clone();
	let mut binders = Vec::new();
	variables(binder, &mut binders);
	for (name, ty) in binders {
		let ty = defer(&rc!(ty.clone()), &base, Phase::Const);
		environment.push(Value::Var { name, level: *level, ty }.into());
		*level += 1;
	}
}

impl Closure {
	/// Evaluates the body with the binders destructuring the given arguments.
	pub fn apply(&self, arguments: impl IntoIterator<Item = Lazy>, phase: Phase) -> Value {
		let mut environment = self.environment.clone();
		for (binder, argument) in self.binders.iter().zip(arguments) {
			let values = bind(&environment, binder, argument);
			environment = environment.extend(values);
		}
		self.body.evaluate_in(&environment, phase)
	}

	/// Binds every binder to fresh free variables starting at `level`.
	pub fn open(&self, level: Level) -> (Environment, Level) {
		let mut environment = self.environment.clone();
		let mut level = level;
		for binder in self.binders.iter() {
			open_binder(&mut environment, &mut level, binder);
		}
		(environment, level)
	}
}

/// The parameters of a function type, instantiated one at a time.
pub struct Telescope {
	environment: Environment,
	binders: Rc<[Pattern]>,
	params: Rc<[Term]>,
	body: Rc<Term>,
	position: usize,
}

impl Telescope {
	pub fn new(params: &Rc<[Term]>, result: &Closure) -> Self {
		Self {
			environment: result.environment.clone(),
			binders: result.binders.clone(),
			params: params.clone(),
			body: result.body.clone(),
			position: 0,
		}
	}

	pub fn len(&self) -> usize { self.params.len() }

	pub fn is_empty(&self) -> bool { self.params.is_empty() }

	pub fn environment(&self) -> &Environment { &self.environment }

	pub fn binder(&self) -> Option<&Pattern> { self.binders.get(self.position) }

	/// The type of the next parameter.
	pub fn next_type(&self) -> Option<Value> {
		self.params.get(self.position).map(|ty| ty.evaluate_in(&self.environment, Phase::Const))
	}

	/// Instantiates the next parameter with an argument.
	pub fn bind(&mut self, argument: Lazy) {
		if let Some(binder) = self.binders.get(self.position) {
			let values = bind(&self.environment, binder, argument);
			self.environment = self.environment.extend(values);
			self.position += 1;
		}
	}

	/// Instantiates the variables of the next parameter's binder directly.
	pub fn assume(&mut self, values: impl IntoIterator<Item = Lazy>) {
		self.environment = self.environment.extend(values);
		self.position += 1;
	}

	/// Instantiates the next parameter with fresh free variables starting at `level`.
	pub fn open(&mut self, level: &mut Level) {
		if let Some(binder) = self.binders.get(self.position) {
			open_binder(&mut self.environment, level, binder);
			self.position += 1;
		}
	}

	pub fn result(&self) -> Value { self.body.evaluate_in(&self.environment, Phase::Const) }
}

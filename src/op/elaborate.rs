use std::{
	collections::{BTreeMap, HashMap, HashSet},
	ops::{Deref, DerefMut},
	rc::Rc,
};

use lasso::Resolver;

use crate::{
	common::{Annotation, Index, Level, Location, Modifier, Name, Phase, Projection, Range, Repr},
	ir::{
		diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity},
		presyntax::{
			ArrayKind, Expression, Former, Literal, Pattern as Prepattern, PatternKind, Preterm, Reference,
			ResolvedDefinition, ResolvedModule,
		},
		semantics::{Environment, Lazy, Value},
		syntax::{Definition, Module, Pattern, Term},
	},
	op::{
		evaluate::{bind, matches, Evaluate, Telescope},
		meta::Metacontext,
		unevaluate::Unevaluate,
		unparse::pretty_print,
	},
	utility::rc,
};

/// An editor request answered during elaboration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instruction {
	/// Report the type of the innermost expression around a byte offset.
	Hover(usize),
	/// Report the implicit quotes and splices inserted within a byte range.
	Inlay(Range),
}

#[derive(Clone, Debug)]
pub struct Hover {
	pub range: Range,
	pub ty: Term,
}

impl Hover {
	pub fn markdown(&self, interner: &impl Resolver) -> String {
		format!("```mcx\n{}\n```", pretty_print(&self.ty, interner))
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InlayHint {
	pub position: usize,
	pub label: &'static str,
}

pub struct Elaborated {
	pub module: Module,
	pub diagnostics: Diagnostics,
	pub hover: Option<Hover>,
	pub inlay_hints: Vec<InlayHint>,
	pub failed: HashSet<Location>,
}

#[derive(Default)]
struct Globals {
	definitions: HashMap<Location, Rc<Definition>>,
	failed: HashSet<Location>,
}

/// Elaborates a resolved module against the already elaborated modules it may import.
///
/// Each definition is elaborated in order with a fresh metacontext. A definition with errors, or one that refers to
/// such a definition, is recorded as failed but still made available to the definitions after it.
pub fn elaborate(module: ResolvedModule, dependencies: &[Module], instruction: Option<Instruction>) -> Elaborated {
	let mut globals = Globals::default();
	for definition in dependencies.iter().flat_map(|dependency| &dependency.definitions) {
		globals.definitions.insert(definition.location.clone(), definition.clone());
	}

	let mut diagnostics = Diagnostics::new();
	for (range, import) in &module.imports {
		if !globals.definitions.contains_key(import) {
			diagnostics.push(None, DiagnosticKind::UnknownImport(import.clone()).at(*range));
		}
	}

	let mut hover = None;
	let mut inlay_hints = Vec::new();
	let mut definitions = Vec::with_capacity(module.definitions.len());
	for definition in module.definitions {
		let location = definition.location.clone();
		let delicate = definition.annotations.contains(&Annotation::Delicate);
		let (definition, metas, found, depends_on_failed, found_hover, found_hints) = {
			let mut context = Context::new(&globals, instruction, delicate);
			let definition = context.definition(definition);
			let Context { metas, diagnostics, depends_on_failed, hover, inlay_hints, .. } = context;
			(definition, metas, diagnostics, depends_on_failed, hover, inlay_hints)
		};

		if depends_on_failed || found.iter().any(|diagnostic| diagnostic.severity == Severity::Error) {
			globals.failed.insert(location.clone());
		}
		diagnostics.extend(Some(location.clone()), found);
		if hover.is_none() {
			hover = found_hover
				.map(|(level, found)| Hover { ty: metas.zonk(level, &found.ty, &mut BTreeMap::new()), ..found });
		}
		inlay_hints.extend(found_hints);

		let definition = rc!(definition);
		globals.definitions.insert(location, definition.clone());
		definitions.push(definition);
	}

	Elaborated {
		module: Module { location: module.location, definitions },
		diagnostics,
		hover,
		inlay_hints,
		failed: globals.failed,
	}
}

struct Entry {
	phase: Phase,
	ty: Value,
	used: bool,
}

struct Context<'g> {
	globals: &'g Globals,
	instruction: Option<Instruction>,
	delicate: bool,
	metas: Metacontext,
	diagnostics: Vec<Diagnostic>,
	environment: Environment,
	entries: Vec<Entry>,
	depends_on_failed: bool,
	hover: Option<(Level, Hover)>,
	inlay_hints: Vec<InlayHint>,
}

/// A context whose local bindings are discarded when it goes out of scope.
struct ExtendedContext<'c, 'g> {
	context: &'c mut Context<'g>,
	level: Level,
}

impl<'c, 'g> Deref for ExtendedContext<'c, 'g> {
	type Target = Context<'g>;

	fn deref(&self) -> &Self::Target { self.context }
}

impl<'c, 'g> DerefMut for ExtendedContext<'c, 'g> {
	fn deref_mut(&mut self) -> &mut Self::Target { self.context }
}

impl<'c, 'g> Drop for ExtendedContext<'c, 'g> {
	fn drop(&mut self) {
		self.context.environment.truncate(self.level);
		self.context.entries.truncate(self.level.0);
	}
}

impl<'g> Context<'g> {
	fn new(globals: &'g Globals, instruction: Option<Instruction>, delicate: bool) -> Self {
		Self {
			globals,
			instruction,
			delicate,
			metas: Metacontext::new(),
			diagnostics: Vec::new(),
			environment: Environment::new(),
			entries: Vec::new(),
			depends_on_failed: false,
			hover: None,
			inlay_hints: Vec::new(),
		}
	}

	fn level(&self) -> Level { self.environment.level() }

	fn extend(&mut self) -> ExtendedContext<'_, 'g> {
		let level = self.level();
		ExtendedContext { context: self, level }
	}

	fn quote(&self, value: &Value) -> Term { self.metas.force(value).unevaluate_in(self.level(), Phase::Const) }

	fn evaluate(&self, term: &Term, phase: Phase) -> Value { term.evaluate_in(&self.environment, phase) }

	fn defer(&self, term: &Term, phase: Phase) -> Lazy {
		let term = term.clone();
		let environment = self.environment.clone();
		Lazy::new(move || term.evaluate_in(&environment, phase))
	}

	fn fresh_value(&mut self, range: Range, ty: Value) -> Value {
		let level = self.level();
		self.metas.fresh_value(level, range, ty)
	}

	fn fresh_type(&mut self, range: Range) -> Value {
		let level = self.level();
		self.metas.fresh_type(level, range)
	}

	fn fresh_type_value(&mut self, range: Range) -> Value {
		let level = self.level();
		self.metas.fresh_type_value(level, range)
	}

	fn sub(&mut self, left: &Value, right: &Value) -> bool { self.metas.sub(self.level(), left, right) }

	fn unify(&mut self, left: &Value, right: &Value) -> bool { self.metas.unify(self.level(), left, right) }

	fn report(&mut self, range: Range, kind: DiagnosticKind) { self.diagnostics.push(kind.at(range)); }

	fn mismatch(&mut self, range: Range, found: &Value, expected: &Value) -> (Term, Value) {
		let kind = DiagnosticKind::TypeMismatch { found: self.quote(found), expected: self.quote(expected) };
		self.report(range, kind);
		(Term::Hole, Value::Hole)
	}

	fn push(&mut self, phase: Phase, ty: Value, value: Lazy) {
		self.entries.push(Entry { phase, ty, used: false });
		self.environment.push(value);
	}

	/// Binds the variables of an elaborated pattern to the parts of a value.
	fn push_values(&mut self, binder: &Pattern, names: Vec<(Name, Value)>, value: Lazy, phase: Phase) {
		let values = bind(&self.environment, binder, value);
		for ((_, ty), value) in names.into_iter().zip(values) {
			self.push(phase, ty, value);
		}
	}

	/// Binds the variables of an elaborated pattern to fresh free variables.
	fn push_variables(&mut self, names: Vec<(Name, Value)>, phase: Phase) -> Vec<Lazy> {
		names
			.into_iter()
			.map(|(name, ty)| {
				let variable = Lazy::from(Value::Var { name, level: self.level(), ty: ty.clone().into() });
				self.push(phase, ty, variable.clone());
				variable
			})
			.collect()
	}

	fn hint(&mut self, position: usize, label: &'static str) {
		if let Some(Instruction::Inlay(range)) = self.instruction {
			if range.contains(position) {
				self.inlay_hints.push(InlayHint { position, label });
			}
		}
	}

	// Children are elaborated first, so the first expression recorded is the innermost one.
	fn record_hover(&mut self, range: Range, ty: &Value) {
		if let (Some(Instruction::Hover(position)), None) = (self.instruction, &self.hover) {
			if range.contains(position) {
				let hover = Hover { range, ty: self.quote(ty) };
				self.hover = Some((self.level(), hover));
			}
		}
	}

	fn definition(&mut self, definition: ResolvedDefinition) -> Definition {
		let ResolvedDefinition { location, annotations, modifiers, ty, body, .. } = definition;
		let phase = if modifiers.contains(&Modifier::Const) { Phase::Const } else { Phase::World };
		let (ty, ty_value) = self.elaborate_type(ty);
		let body = body.map(|body| self.check_term(body, phase, &ty_value).0);
		let [ty, zonked] = self.metas.check_solved(&mut self.diagnostics, [&ty, body.as_ref().unwrap_or(&Term::Hole)]);
		Definition { location, annotations, modifiers, phase, ty, body: body.map(|_| zonked) }
	}

	/// Elaborates a compile-time expression that must denote a type.
	fn elaborate_type(&mut self, expression: Expression<Reference>) -> (Term, Value) {
		let universe = self.fresh_type(expression.range);
		let (term, _) = self.check_term(expression, Phase::Const, &universe);
		let value = self.evaluate(&term, Phase::Const);
		(term, value)
	}

	fn synthesize_term(&mut self, expression: Expression<Reference>, phase: Phase) -> (Term, Value) {
		self.elaborate_term(expression, phase, None)
	}

	fn check_term(&mut self, expression: Expression<Reference>, phase: Phase, expected: &Value) -> (Term, Value) {
		self.elaborate_term(expression, phase, Some(expected))
	}

	fn elaborate_term(
		&mut self,
		expression: Expression<Reference>,
		phase: Phase,
		expected: Option<&Value>,
	) -> (Term, Value) {
		let range = expression.range;
		let (term, ty) = match expected {
			Some(expected) => {
				let expected = self.metas.force(expected);
				self.check(expression, phase, expected)
			}
			None => self.synthesize(expression, phase),
		};
		self.record_hover(range, &ty);
		(term, ty)
	}

	fn check(&mut self, expression: Expression<Reference>, phase: Phase, expected: Value) -> (Term, Value) {
		use Preterm as P;
		use Value as V;
		let range = expression.range;
		match (expression.preterm, expected) {
			(P::FuncOf { open, params, result }, V::Func { open: expected_open, params: param_types, result: result_ty })
				if open == expected_open =>
			{
				if params.len() != param_types.len() {
					self.report(range, DiagnosticKind::ArityMismatch { found: params.len(), expected: param_types.len() });
					return (Term::Hole, V::Hole);
				}
				let mut telescope = Telescope::new(&param_types, &result_ty);
				let mut context = self.extend();
				let mut binders = Vec::with_capacity(params.len());
				for param in params {
					let param_ty = telescope.next_type().unwrap_or(V::Hole);
					let (binder, names) = context.elaborate_pattern(param, &param_ty);
					let variables = context.push_variables(names, phase);
					// Only a variable stands for the whole argument; other binders are rebuilt from their parts.
					if matches!((telescope.binder(), &binder), (Some(Pattern::Var { .. }), Pattern::Var { .. })) {
						telescope.assume(variables);
					} else {
						telescope.bind(reconstruct(&binder, &mut variables.into_iter()).into());
					}
					binders.push(binder);
				}
				let (body, _) = context.check_term(*result, phase, &telescope.result());
				drop(context);
				let expected = V::Func { open, params: param_types, result: result_ty };
				let ty = rc!(self.quote(&expected));
				(Term::FuncOf { open, params: binders, result: rc!(body), ty }, expected)
			}
			(P::ListOf(elements), V::List(element_ty)) => {
				let elements = elements
					.into_iter()
					.map(|element| self.check_term(element, phase, element_ty.force()).0)
					.collect();
				let expected = V::List(element_ty);
				let ty = rc!(self.quote(&expected));
				(Term::ListOf { elements, ty }, expected)
			}
			(P::CompoundOf(fields), V::Compound(field_types)) => {
				let mut elements = Vec::with_capacity(fields.len());
				let mut found = Vec::with_capacity(fields.len());
				for (name, element) in fields {
					let (element, ty) = match field_types.iter().find(|(key, _)| *key == name) {
						Some((_, ty)) => self.check_term(element, phase, ty.force()),
						None => self.synthesize_term(element, phase),
					};
					elements.push((name, element));
					found.push((name, Lazy::from(ty)));
				}
				let expected = V::Compound(field_types);
				if let V::Compound(field_types) = &expected {
					if field_types.iter().any(|(key, _)| !found.iter().any(|(name, _)| name == key)) {
						return self.mismatch(range, &V::Compound(found.into()), &expected);
					}
				}
				let ty = rc!(self.quote(&expected));
				(Term::CompoundOf { elements, ty }, expected)
			}
			(P::CodeOf(element), V::Code(element_ty)) if phase == Phase::Const => {
				let (element, _) = self.check_term(*element, Phase::World, element_ty.force());
				let expected = V::Code(element_ty);
				let ty = rc!(self.quote(&expected));
				(Term::CodeOf { element: rc!(element), ty }, expected)
			}
			(P::PathOf(element), V::Path(element_ty)) => {
				let (element, _) = self.check_term(*element, phase, element_ty.force());
				let expected = V::Path(element_ty);
				let ty = rc!(self.quote(&expected));
				(Term::PathOf { element: rc!(element), ty }, expected)
			}
			(P::Splice(element), expected) if phase == Phase::World => {
				let code = V::Code(expected.clone().into());
				let (element, _) = self.check_term(*element, Phase::Const, &code);
				let ty = rc!(self.quote(&expected));
				(Term::Splice { element: rc!(element), ty }, expected)
			}
			(P::Let { binder, init, body }, expected) => self.elaborate_let(binder, *init, *body, phase, Some(expected)),
			(P::If { scrutinee, branches }, expected) =>
				self.elaborate_if(range, *scrutinee, branches, phase, Some(expected)),
			(P::Meta, expected) => {
				let meta = self.fresh_value(range, expected.clone());
				(self.quote(&meta), expected)
			}
			(preterm, expected) => self.coerce(preterm.at(range), phase, expected),
		}
	}

	// Falls back to synthesis, inserting an implicit splice or quote when the phases call for one.
	fn coerce(&mut self, expression: Expression<Reference>, phase: Phase, expected: Value) -> (Term, Value) {
		use Value as V;
		let range = expression.range;
		let (term, ty) = self.synthesize(expression, phase);
		if self.sub(&ty, &expected) {
			return (term, expected);
		}

		if self.admits(&term, &ty, &expected) {
			return (term, expected);
		}

		if phase == Phase::World {
			if let V::Code(inner) = self.metas.force(&ty) {
				if self.sub(inner.force(), &expected) {
					self.hint(range.start, "$");
					let ty = rc!(self.quote(&expected));
					return (Term::Splice { element: rc!(term), ty }, expected);
				}
			}
		}

		if let (Phase::Const, V::Code(inner)) = (phase, &expected) {
			if self.sub(&ty, inner.force()) {
				self.hint(range.start, "`");
				let ty = rc!(self.quote(&expected));
				return (Term::CodeOf { element: rc!(term), ty }, expected);
			}
		}

		self.mismatch(range, &ty, &expected)
	}

	// Singleton types are decided by the compile-time value of the term, which subtyping alone cannot see.
	fn admits(&mut self, term: &Term, ty: &Value, expected: &Value) -> bool {
		match self.metas.force(expected) {
			Value::Point(element, element_ty) =>
				self.sub(ty, element_ty.force()) && {
					let value = self.evaluate(term, Phase::Const);
					self.unify(&value, element.force())
				},
			Value::Union(members, _) => members.iter().any(|member| self.admits(term, ty, member.force())),
			_ => false,
		}
	}

	fn synthesize(&mut self, expression: Expression<Reference>, phase: Phase) -> (Term, Value) {
		use Preterm as P;
		use Value as V;
		let range = expression.range;
		match expression.preterm {
			P::Variable(Reference::Local(name, index)) => self.variable(range, name, index, phase),
			P::Variable(Reference::Global(location)) => self.global(range, location, phase),
			P::Literal(literal) => {
				let (term, _, ty) = elaborate_literal(literal);
				(term, ty)
			}

			P::Former(former) => {
				let (term, repr) = elaborate_former(former);
				(term, V::tag(repr))
			}
			P::TagOf(repr) => (Term::TagOf(repr), V::Tag),
			P::Type(tag) => {
				let (tag, _) = self.check_term(*tag, Phase::Const, &V::Tag);
				(Term::Type(rc!(tag)), V::tag(Repr::End))
			}
			P::List(element) => {
				let (element, _) = self.elaborate_type(*element);
				(Term::List(rc!(element)), V::tag(Repr::List))
			}
			P::Compound(fields) => {
				let fields = fields.into_iter().map(|(name, ty)| (name, self.elaborate_type(ty).0)).collect();
				(Term::Compound(fields), V::tag(Repr::Compound))
			}
			P::Point(element) => {
				let (element, element_ty) = self.synthesize_term(*element, Phase::Const);
				let universe = self.universe_of(&element_ty);
				let ty = rc!(self.quote(&element_ty));
				(Term::Point { element: rc!(element), ty }, universe)
			}
			// The members of a union share one representation.
			P::Union(elements) => {
				let universe = if elements.is_empty() { V::tag(Repr::End) } else { self.fresh_type(range) };
				let elements =
					elements.into_iter().map(|element| self.check_term(element, Phase::Const, &universe).0).collect();
				let ty = rc!(self.quote(&universe));
				(Term::Union { elements, ty }, universe)
			}
			P::Func { open, params, result } => {
				let mut context = self.extend();
				let mut elaborated = Vec::with_capacity(params.len());
				for (binder, ty) in params {
					let (ty, ty_value) = context.elaborate_type(ty);
					let (binder, names) = context.elaborate_pattern(binder, &ty_value);
					context.push_variables(names, Phase::Const);
					elaborated.push((binder, ty));
				}
				let (result, _) = context.elaborate_type(*result);
				drop(context);
				let repr = if open { Repr::Compound } else { Repr::End };
				(Term::Func { open, params: elaborated, result: rc!(result) }, V::tag(repr))
			}
			P::Code(element) => {
				let (element, _) = self.elaborate_type(*element);
				(Term::Code(rc!(element)), V::tag(Repr::End))
			}
			P::Path(element) => {
				let (element, _) = self.elaborate_type(*element);
				(Term::Path(rc!(element)), V::tag(Repr::End))
			}

			P::ArrayOf(kind, elements) => {
				let (array_ty, element_ty) = array_types(kind);
				let elements =
					elements.into_iter().map(|element| self.check_term(element, phase, &element_ty).0).collect();
				let term = match kind {
					ArrayKind::Byte => Term::ByteArrayOf(elements),
					ArrayKind::Int => Term::IntArrayOf(elements),
					ArrayKind::Long => Term::LongArrayOf(elements),
				};
				(term, array_ty)
			}
			P::ListOf(elements) => {
				let mut terms = Vec::with_capacity(elements.len());
				let mut types = Vec::with_capacity(elements.len());
				for element in elements {
					let (term, ty) = self.synthesize_term(element, phase);
					terms.push(term);
					types.push(ty);
				}
				let list_ty = V::List(self.join(range, types).into());
				let ty = rc!(self.quote(&list_ty));
				(Term::ListOf { elements: terms, ty }, list_ty)
			}
			P::CompoundOf(fields) => {
				let mut elements = Vec::with_capacity(fields.len());
				let mut types = Vec::with_capacity(fields.len());
				for (name, element) in fields {
					let (element, ty) = self.synthesize_term(element, phase);
					elements.push((name, element));
					types.push((name, Lazy::from(ty)));
				}
				let compound_ty = V::Compound(types.into());
				let ty = rc!(self.quote(&compound_ty));
				(Term::CompoundOf { elements, ty }, compound_ty)
			}
			P::FuncOf { open, params, result } => {
				let mut context = self.extend();
				let mut binders = Vec::with_capacity(params.len());
				let mut param_types = Vec::with_capacity(params.len());
				for param in params {
					let param_ty = context.fresh_type_value(param.range);
					let (binder, names) = context.elaborate_pattern(param, &param_ty);
					param_types.push(context.quote(&param_ty));
					context.push_variables(names, phase);
					binders.push(binder);
				}
				let (body, body_ty) = context.synthesize_term(*result, phase);
				let result_ty = context.quote(&body_ty);
				drop(context);
				let func_ty = Term::Func {
					open,
					params: binders.iter().cloned().zip(param_types).collect(),
					result: rc!(result_ty),
				};
				let ty = self.evaluate(&func_ty, Phase::Const);
				(Term::FuncOf { open, params: binders, result: rc!(body), ty: rc!(func_ty) }, ty)
			}
			P::CodeOf(element) => {
				if phase != Phase::Const {
					self.report(range, DiagnosticKind::MisplacedQuote);
					return (Term::Hole, V::Hole);
				}
				let (element, element_ty) = self.synthesize_term(*element, Phase::World);
				let code_ty = V::Code(element_ty.into());
				let ty = rc!(self.quote(&code_ty));
				(Term::CodeOf { element: rc!(element), ty }, code_ty)
			}
			P::PathOf(element) => {
				let (element, element_ty) = self.synthesize_term(*element, phase);
				let path_ty = V::Path(element_ty.into());
				let ty = rc!(self.quote(&path_ty));
				(Term::PathOf { element: rc!(element), ty }, path_ty)
			}
			P::Command { element, ty } => {
				let (ty, ty_value) = self.elaborate_type(*ty);
				(Term::Command { element, ty: rc!(ty) }, ty_value)
			}

			P::Apply { func, args } => {
				let (func, func_ty) = self.synthesize_term(*func, phase);
				let (open, params, result) = match self.metas.force(&func_ty) {
					V::Func { open, params, result } => (open, params, result),
					V::Hole => return (Term::Hole, V::Hole),
					_ => {
						self.report(range, DiagnosticKind::CannotSynthesize);
						return (Term::Hole, V::Hole);
					}
				};
				if args.len() != params.len() {
					self.report(range, DiagnosticKind::ArityMismatch { found: args.len(), expected: params.len() });
					return (Term::Hole, V::Hole);
				}
				let mut telescope = Telescope::new(&params, &result);
				let mut elaborated = Vec::with_capacity(args.len());
				for arg in args {
					let param_ty = telescope.next_type().unwrap_or(V::Hole);
					let (arg, _) = self.check_term(arg, phase, &param_ty);
					telescope.bind(self.defer(&arg, Phase::Const));
					elaborated.push(arg);
				}
				let result_ty = telescope.result();
				let ty = rc!(self.quote(&result_ty));
				(Term::Apply { open, func: rc!(func), args: elaborated, ty }, result_ty)
			}
			P::Splice(element) => {
				if phase != Phase::World {
					self.report(range, DiagnosticKind::MisplacedSplice);
					return (Term::Hole, V::Hole);
				}
				let (element, code_ty) = self.synthesize_term(*element, Phase::Const);
				let inner = match self.metas.force(&code_ty) {
					V::Code(inner) => inner.force().clone(),
					V::Hole => return (Term::Hole, V::Hole),
					code_ty @ V::Meta { .. } => {
						let inner = self.fresh_type_value(range);
						self.unify(&code_ty, &V::Code(inner.clone().into()));
						inner
					}
					code_ty => return self.mismatch(range, &code_ty, &V::Code(V::Hole.into())),
				};
				let ty = rc!(self.quote(&inner));
				(Term::Splice { element: rc!(element), ty }, inner)
			}
			P::Get(element) => {
				let (element, path_ty) = self.synthesize_term(*element, phase);
				let inner = match self.metas.force(&path_ty) {
					V::Path(inner) => inner.force().clone(),
					V::Hole => return (Term::Hole, V::Hole),
					path_ty => return self.mismatch(range, &path_ty, &V::Path(V::Hole.into())),
				};
				let ty = rc!(self.quote(&inner));
				(Term::Get { element: rc!(element), ty }, inner)
			}
			P::Project(target, projection) => {
				let (target, target_ty) = self.synthesize_term(*target, phase);
				let ty = match (self.metas.force(&target_ty), projection) {
					(V::List(element), Projection::Index(_)) => element.force().clone(),
					(V::ByteArray, Projection::Index(_)) => V::Byte,
					(V::IntArray, Projection::Index(_)) => V::Int,
					(V::LongArray, Projection::Index(_)) => V::Long,
					(V::Compound(fields), Projection::Field(name)) =>
						match fields.iter().find(|(key, _)| *key == name) {
							Some((_, ty)) => ty.force().clone(),
							None => {
								self.report(range, DiagnosticKind::UnknownKey(name));
								return (Term::Hole, V::Hole);
							}
						},
					(V::Hole, _) => return (Term::Hole, V::Hole),
					_ => {
						self.report(range, DiagnosticKind::CannotSynthesize);
						return (Term::Hole, V::Hole);
					}
				};
				let ty_term = rc!(self.quote(&ty));
				(Term::Project { target: rc!(target), projection, ty: ty_term }, ty)
			}
			P::Let { binder, init, body } => self.elaborate_let(binder, *init, *body, phase, None),
			P::If { scrutinee, branches } => self.elaborate_if(range, *scrutinee, branches, phase, None),

			P::As(element, ty) => {
				let (_, ty) = self.elaborate_type(*ty);
				self.check_term(*element, phase, &ty)
			}
			P::Meta => {
				let ty = self.fresh_type_value(range);
				let meta = self.fresh_value(range, ty.clone());
				(self.quote(&meta), ty)
			}
		}
	}

	fn variable(&mut self, range: Range, name: Name, index: Index, phase: Phase) -> (Term, Value) {
		let level = index.to_level(self.level());
		let entry = &self.entries[level.0];
		let (bound, ty, used) = (entry.phase, entry.ty.clone(), entry.used);
		if let Value::Path(_) = self.metas.force(&ty) {
			if used {
				self.report(range, DiagnosticKind::AlreadyUsed(name));
				return (Term::Hole, Value::Hole);
			}
			self.entries[level.0].used = true;
		}
		let term = Term::Var { name, index, ty: rc!(self.quote(&ty)) };
		self.stage(range, term, ty, bound, phase)
	}

	fn global(&mut self, range: Range, location: Location, phase: Phase) -> (Term, Value) {
		let Some(definition) = self.globals.definitions.get(&location).cloned() else {
			self.depends_on_failed = true;
			return (Term::Hole, Value::Hole);
		};
		if self.globals.failed.contains(&location) {
			self.depends_on_failed = true;
		}
		if definition.is_annotated(Annotation::Deprecated) {
			self.report(range, DiagnosticKind::Deprecated(location.clone()));
		}
		if definition.is_annotated(Annotation::Unstable) {
			self.report(range, DiagnosticKind::Unstable(location.clone()));
		}
		if definition.is_annotated(Annotation::Delicate) && !self.delicate {
			self.report(range, DiagnosticKind::Delicate(location));
		}

		let ty = definition.ty.evaluate(Phase::Const);
		let builtin = definition.builtin().is_some();
		let bound = definition.phase;
		let term = Term::Def { ty: rc!(definition.ty.clone()), definition };
		// Builtins are available at every phase.
		if builtin {
			(term, ty)
		} else {
			self.stage(range, term, ty, bound, phase)
		}
	}

	/// Adapts a reference bound at one phase to a use at another.
	fn stage(&mut self, range: Range, term: Term, ty: Value, bound: Phase, phase: Phase) -> (Term, Value) {
		use std::cmp::Ordering;
		match bound.cmp(&phase) {
			Ordering::Equal => (term, ty),
			Ordering::Less => {
				self.hint(range.start, "`");
				let code_ty = Value::Code(ty.into());
				let ty = rc!(self.quote(&code_ty));
				(Term::CodeOf { element: rc!(term), ty }, code_ty)
			}
			Ordering::Greater => match self.metas.force(&ty) {
				Value::Code(inner) => {
					self.hint(range.start, "$");
					let inner = inner.force().clone();
					let ty = rc!(self.quote(&inner));
					(Term::Splice { element: rc!(term), ty }, inner)
				}
				_ => {
					self.report(range, DiagnosticKind::PhaseMismatch { found: bound, expected: phase });
					(Term::Hole, Value::Hole)
				}
			},
		}
	}

	fn elaborate_let(
		&mut self,
		binder: Prepattern<Reference>,
		init: Expression<Reference>,
		body: Expression<Reference>,
		phase: Phase,
		expected: Option<Value>,
	) -> (Term, Value) {
		let (init, init_ty) = self.synthesize_term(init, phase);
		let (binder, names) = self.elaborate_pattern(binder, &init_ty);
		let value = self.defer(&init, phase);
		let mut context = self.extend();
		context.push_values(&binder, names, value, phase);
		let (body, body_ty) = context.elaborate_term(body, phase, expected.as_ref());
		drop(context);
		let ty = rc!(self.quote(&body_ty));
		(Term::Let { binder: rc!(binder), init: rc!(init), body: rc!(body), ty }, body_ty)
	}

	/// Elaborates a pattern match.
	///
	/// At the compile-time phase, branches are decided statically for as long as the scrutinee allows: the first
	/// branch that certainly matches replaces the whole match, and branches that certainly fail are skipped.
	fn elaborate_if(
		&mut self,
		range: Range,
		scrutinee: Expression<Reference>,
		branches: Vec<(Prepattern<Reference>, Expression<Reference>)>,
		phase: Phase,
		expected: Option<Value>,
	) -> (Term, Value) {
		let (scrutinee, scrutinee_ty) = self.synthesize_term(scrutinee, phase);
		let value = self.defer(&scrutinee, phase);
		let mut deciding = phase == Phase::Const;
		let branches: Vec<_> = branches
			.into_iter()
			.map(|(binder, body)| {
				let (binder, names) = self.elaborate_pattern(binder, &scrutinee_ty);
				(binder, names, body)
			})
			.collect();
		if !branches.iter().any(|(binder, ..)| binder.is_irrefutable()) {
			self.report(range, DiagnosticKind::NotExhaustive);
			return (Term::Hole, Value::Hole);
		}

		let mut elaborated = Vec::with_capacity(branches.len());
		let mut types = Vec::with_capacity(branches.len());
		for (binder, names, body) in branches {
			let decision = if deciding { matches(&binder, value.force()) } else { None };
			if decision == Some(false) {
				continue;
			}
			deciding = deciding && decision.is_some();

			let mut context = self.extend();
			context.push_values(&binder, names, value.clone(), phase);
			let (body, body_ty) = context.elaborate_term(body, phase, expected.as_ref());
			drop(context);

			if decision == Some(true) {
				let ty = rc!(self.quote(&body_ty));
				return (Term::Let { binder: rc!(binder), init: rc!(scrutinee), body: rc!(body), ty }, body_ty);
			}
			elaborated.push((binder, body));
			types.push(body_ty);
		}

		let ty = match expected {
			Some(expected) => expected,
			None => self.join(range, types),
		};
		let ty_term = rc!(self.quote(&ty));
		(Term::If { scrutinee: rc!(scrutinee), branches: elaborated, ty: ty_term }, ty)
	}

	/// The least type of a list of synthesized types, as far as it is known without backtracking.
	fn join(&mut self, range: Range, types: Vec<Value>) -> Value {
		let mut members: Vec<Value> = Vec::with_capacity(types.len());
		for ty in types {
			if !members.iter().any(|member| self.sub(&ty, member)) {
				members.push(ty);
			}
		}
		match members.len() {
			0 => self.fresh_type_value(range),
			1 => members.swap_remove(0),
			_ => {
				let universe = self.universe_of(&members[0]);
				Value::Union(members.into_iter().map(Lazy::from).collect(), universe.into())
			}
		}
	}

	/// The universe a type value lives in.
	fn universe_of(&self, ty: &Value) -> Value {
		use Value as V;
		match self.metas.force(ty) {
			V::Tag | V::Type(_) | V::Code(_) | V::Path(_) => V::tag(Repr::End),
			V::Unit | V::Bool | V::Byte => V::tag(Repr::Byte),
			V::Short => V::tag(Repr::Short),
			V::Int => V::tag(Repr::Int),
			V::Long => V::tag(Repr::Long),
			V::Float => V::tag(Repr::Float),
			V::Double => V::tag(Repr::Double),
			V::String => V::tag(Repr::String),
			V::ByteArray => V::tag(Repr::ByteArray),
			V::IntArray => V::tag(Repr::IntArray),
			V::LongArray => V::tag(Repr::LongArray),
			V::List(_) => V::tag(Repr::List),
			V::Compound(_) => V::tag(Repr::Compound),
			V::Func { open: true, .. } => V::tag(Repr::Compound),
			V::Func { open: false, .. } => V::tag(Repr::End),
			V::Point(_, element_ty) => self.universe_of(element_ty.force()),
			V::Union(_, universe) => universe.force().clone(),
			V::Apply { ty, .. }
			| V::Splice(_, ty)
			| V::Get(_, ty)
			| V::Command(_, ty)
			| V::Project(_, _, ty)
			| V::If { ty, .. }
			| V::Var { ty, .. }
			| V::Def { ty, .. }
			| V::Meta { ty, .. } => ty.force().clone(),
			V::TagOf(_)
			| V::UnitOf
			| V::BoolOf(_)
			| V::ByteOf(_)
			| V::ShortOf(_)
			| V::IntOf(_)
			| V::LongOf(_)
			| V::FloatOf(_)
			| V::DoubleOf(_)
			| V::StringOf(_)
			| V::ByteArrayOf(_)
			| V::IntArrayOf(_)
			| V::LongArrayOf(_)
			| V::ListOf(..)
			| V::CompoundOf(..)
			| V::FuncOf { .. }
			| V::CodeOf(..)
			| V::PathOf(..)
			| V::Hole => V::Hole,
		}
	}

	/// Elaborates a pattern against the type of the values it matches.
	///
	/// Returns the names it binds with their types, in binding order. Ascriptions inside the pattern are elaborated
	/// in the context before the pattern, so nothing is pushed here.
	fn elaborate_pattern(&mut self, pattern: Prepattern<Reference>, ty: &Value) -> (Pattern, Vec<(Name, Value)>) {
		let mut names = Vec::new();
		let pattern = self.pattern(pattern, ty, &mut names);
		(pattern, names)
	}

	// Errors still elaborate every subpattern, keeping the binders in step with name resolution.
	fn pattern(&mut self, pattern: Prepattern<Reference>, ty: &Value, names: &mut Vec<(Name, Value)>) -> Pattern {
		use Value as V;
		let range = pattern.range;
		let ty = self.metas.force(ty);
		match pattern.kind {
			PatternKind::Var(name) => {
				let ty_term = self.quote(&ty);
				names.push((name, ty));
				Pattern::Var { name, ty: ty_term }
			}
			PatternKind::Drop => Pattern::Drop(self.quote(&ty)),
			PatternKind::Anno(inner, annotation) => {
				let (_, annotation) = self.elaborate_type(*annotation);
				if self.sub(&ty, &annotation) {
					self.pattern(*inner, &annotation, names)
				} else {
					self.mismatch(range, &ty, &annotation);
					self.pattern(*inner, &V::Hole, names)
				}
			}
			PatternKind::Literal(literal) => {
				let (_, pattern, literal_ty) = elaborate_literal(literal);
				if self.sub(&literal_ty, &ty) {
					pattern
				} else {
					self.mismatch(range, &literal_ty, &ty);
					Pattern::Hole
				}
			}
			PatternKind::ArrayOf(kind, patterns) => {
				let (array_ty, element_ty) = array_types(kind);
				if !self.sub(&array_ty, &ty) {
					self.mismatch(range, &array_ty, &ty);
				}
				let patterns = patterns.into_iter().map(|pattern| self.pattern(pattern, &element_ty, names)).collect();
				match kind {
					ArrayKind::Byte => Pattern::ByteArrayOf(patterns),
					ArrayKind::Int => Pattern::IntArrayOf(patterns),
					ArrayKind::Long => Pattern::LongArrayOf(patterns),
				}
			}
			PatternKind::ListOf(patterns) => {
				let element_ty = match &ty {
					V::List(element_ty) => element_ty.force().clone(),
					V::Meta { .. } => {
						let element_ty = self.fresh_type_value(range);
						self.unify(&ty, &V::List(element_ty.clone().into()));
						element_ty
					}
					V::Hole => V::Hole,
					_ => {
						self.mismatch(range, &V::List(V::Hole.into()), &ty);
						V::Hole
					}
				};
				let patterns = patterns.into_iter().map(|pattern| self.pattern(pattern, &element_ty, names)).collect();
				Pattern::ListOf(patterns, self.quote(&ty))
			}
			PatternKind::CompoundOf(fields) => {
				let field_types = match &ty {
					V::Compound(field_types) => Some(field_types.clone()),
					V::Hole => None,
					_ => {
						self.mismatch(range, &V::Compound([].into()), &ty);
						None
					}
				};
				let fields = fields
					.into_iter()
					.map(|(name, pattern)| {
						let field_ty = match &field_types {
							Some(field_types) => match field_types.iter().find(|(key, _)| *key == name) {
								Some((_, field_ty)) => field_ty.force().clone(),
								None => {
									self.report(pattern.range, DiagnosticKind::UnknownKey(name));
									V::Hole
								}
							},
							None => V::Hole,
						};
						(name, self.pattern(pattern, &field_ty, names))
					})
					.collect();
				Pattern::CompoundOf(fields, self.quote(&ty))
			}
		}
	}
}

/// Rebuilds the value a pattern destructures from the variables it bound.
fn reconstruct(pattern: &Pattern, variables: &mut dyn Iterator<Item = Lazy>) -> Value {
	use Value as V;
	fn all(patterns: &[Pattern], variables: &mut dyn Iterator<Item = Lazy>) -> Rc<[Lazy]> {
		patterns.iter().map(|pattern| Lazy::from(reconstruct(pattern, variables))).collect()
	}
	match pattern {
		Pattern::Var { .. } => variables.next().map_or(V::Hole, |variable| variable.force().clone()),
		Pattern::UnitOf => V::UnitOf,
		Pattern::BoolOf(b) => V::BoolOf(*b),
		Pattern::ByteOf(n) => V::ByteOf(*n),
		Pattern::ShortOf(n) => V::ShortOf(*n),
		Pattern::IntOf(n) => V::IntOf(*n),
		Pattern::LongOf(n) => V::LongOf(*n),
		Pattern::FloatOf(n) => V::FloatOf(*n),
		Pattern::DoubleOf(n) => V::DoubleOf(*n),
		Pattern::StringOf(s) => V::StringOf(s.clone()),
		Pattern::ByteArrayOf(patterns) => V::ByteArrayOf(all(patterns, variables)),
		Pattern::IntArrayOf(patterns) => V::IntArrayOf(all(patterns, variables)),
		Pattern::LongArrayOf(patterns) => V::LongArrayOf(all(patterns, variables)),
		Pattern::ListOf(patterns, _) => V::ListOf(all(patterns, variables), V::Hole.into()),
		Pattern::CompoundOf(fields, _) => V::CompoundOf(
			fields.iter().map(|(name, pattern)| (*name, Lazy::from(reconstruct(pattern, variables)))).collect(),
			V::Hole.into(),
		),
		Pattern::Drop(_) | Pattern::Hole => V::Hole,
	}
}

fn elaborate_literal(literal: Literal) -> (Term, Pattern, Value) {
	use Value as V;
	match literal {
		Literal::Unit => (Term::UnitOf, Pattern::UnitOf, V::Unit),
		Literal::Bool(b) => (Term::BoolOf(b), Pattern::BoolOf(b), V::Bool),
		Literal::Byte(n) => (Term::ByteOf(n), Pattern::ByteOf(n), V::Byte),
		Literal::Short(n) => (Term::ShortOf(n), Pattern::ShortOf(n), V::Short),
		Literal::Int(n) => (Term::IntOf(n), Pattern::IntOf(n), V::Int),
		Literal::Long(n) => (Term::LongOf(n), Pattern::LongOf(n), V::Long),
		Literal::Float(n) => (Term::FloatOf(n), Pattern::FloatOf(n), V::Float),
		Literal::Double(n) => (Term::DoubleOf(n), Pattern::DoubleOf(n), V::Double),
		Literal::String(s) => (Term::StringOf(s.clone()), Pattern::StringOf(s), V::String),
	}
}

fn elaborate_former(former: Former) -> (Term, Repr) {
	match former {
		Former::Tag => (Term::Tag, Repr::End),
		Former::Unit => (Term::Unit, Repr::Byte),
		Former::Bool => (Term::Bool, Repr::Byte),
		Former::Byte => (Term::Byte, Repr::Byte),
		Former::Short => (Term::Short, Repr::Short),
		Former::Int => (Term::Int, Repr::Int),
		Former::Long => (Term::Long, Repr::Long),
		Former::Float => (Term::Float, Repr::Float),
		Former::Double => (Term::Double, Repr::Double),
		Former::String => (Term::String, Repr::String),
		Former::ByteArray => (Term::ByteArray, Repr::ByteArray),
		Former::IntArray => (Term::IntArray, Repr::IntArray),
		Former::LongArray => (Term::LongArray, Repr::LongArray),
	}
}

fn array_types(kind: ArrayKind) -> (Value, Value) {
	match kind {
		ArrayKind::Byte => (Value::ByteArray, Value::Byte),
		ArrayKind::Int => (Value::IntArray, Value::Int),
		ArrayKind::Long => (Value::LongArray, Value::Long),
	}
}

#[cfg(test)]
mod tests {
	use lasso::Rodeo;

	use super::*;
	use crate::{
		ir::source::LexedSource,
		op::{parse::parse, resolve::resolve},
	};

	fn elaborate_str(source: &str, instruction: Option<Instruction>) -> (Elaborated, Rodeo) {
		let Ok(lexed) = LexedSource::new(source) else { panic!("failed to lex") };
		let (module, mut interner) = parse(source, &lexed, Rodeo::new()).unwrap();
		let location: Rc<[Name]> = [interner.get_or_intern("test")].into();
		let module = resolve(module, location, &interner).unwrap();
		(elaborate(module, &[], instruction), interner)
	}

	fn errors(elaborated: &Elaborated) -> Vec<&DiagnosticKind> {
		elaborated
			.diagnostics
			.iter()
			.filter(|(_, diagnostic)| diagnostic.severity == Severity::Error)
			.map(|(_, diagnostic)| &diagnostic.kind)
			.collect()
	}

	#[test]
	fn literals_synthesize_their_types() {
		let (elaborated, _) = elaborate_str("def x : _ = 42;", None);
		assert!(errors(&elaborated).is_empty());
		assert_eq!(elaborated.module.definitions[0].ty, Term::Int);
	}

	#[test]
	fn static_matches_pick_the_matching_branch() {
		let (elaborated, _) = elaborate_str("const def x : Int = if 0 is 0 then 1 else 2;", None);
		assert!(errors(&elaborated).is_empty());
		let Some(body) = &elaborated.module.definitions[0].body else { panic!("expected a body") };
		assert!(matches!(body, Term::Let { body, .. } if **body == Term::IntOf(1)));
	}

	#[test]
	fn arity_mismatches_are_reported_once() {
		let (elaborated, _) = elaborate_str(
			"def f : func(a : Int, b : Int) -> Int = func(a, b) => a;\ndef x : Int = f(1, 2, 3);",
			None,
		);
		assert!(matches!(
			errors(&elaborated)[..],
			[DiagnosticKind::ArityMismatch { found: 3, expected: 2 }]
		));
		assert_eq!(elaborated.module.definitions[1].body, Some(Term::Hole));
	}

	#[test]
	fn paths_are_used_at_most_once() {
		let (elaborated, _) =
			elaborate_str("def f : func(p : Path(Int)) -> List(Int) = func(p) => [*p, *p];", None);
		assert!(matches!(errors(&elaborated)[..], [DiagnosticKind::AlreadyUsed(_)]));
	}

	#[test]
	fn unsolved_metavariables_are_reported_once() {
		let (elaborated, _) = elaborate_str("def x : List(_) = [];", None);
		assert!(matches!(errors(&elaborated)[..], [DiagnosticKind::UnsolvedMeta(_)]));
	}

	#[test]
	fn failures_propagate_to_dependents() {
		let (elaborated, interner) = elaborate_str("def a : Int = \"no\";\ndef b : Int = a;", None);
		assert_eq!(errors(&elaborated).len(), 1);
		let b = interner.get("b").unwrap();
		assert!(elaborated.failed.iter().any(|location| location.name == b));
	}

	#[test]
	fn hover_reports_the_innermost_type() {
		let source = "def x : List(Int) = [1, 2];";
		let (elaborated, _) = elaborate_str(source, Some(Instruction::Hover(21)));
		let Some(hover) = elaborated.hover else { panic!("expected a hover") };
		assert_eq!(hover.range, Range::new(21, 22));
		assert_eq!(hover.ty, Term::Int);
	}

	#[test]
	fn implicit_quotes_produce_inlay_hints() {
		let source = "def x : Int = 1;\nconst def y : Code(Int) = x;";
		let (elaborated, _) = elaborate_str(source, Some(Instruction::Inlay(Range::new(0, source.len()))));
		assert!(errors(&elaborated).is_empty());
		assert_eq!(elaborated.inlay_hints, [InlayHint { position: source.len() - 2, label: "`" }]);
	}

	#[test]
	fn function_literal_arity_mismatches_are_reported() {
		let (elaborated, _) = elaborate_str("def f : func(a : Int, b : Int, c : Int) -> Int = func(a, b) => a;", None);
		assert!(matches!(
			errors(&elaborated)[..],
			[DiagnosticKind::ArityMismatch { found: 2, expected: 3 }]
		));
	}

	#[test]
	fn sibling_errors_are_all_reported() {
		let (elaborated, _) = elaborate_str("def xs : List(Int) = [\"a\", true, \"c\"];", None);
		let errors = errors(&elaborated);
		assert_eq!(errors.len(), 3);
		assert!(errors.iter().all(|kind| matches!(kind, DiagnosticKind::TypeMismatch { .. })));
	}

	#[test]
	fn implicit_splices_produce_inlay_hints() {
		let source = "const def q : Code(Int) = `1;\ndef x : Int = q;";
		let (elaborated, _) = elaborate_str(source, Some(Instruction::Inlay(Range::new(0, source.len()))));
		assert!(errors(&elaborated).is_empty());
		assert_eq!(elaborated.inlay_hints, [InlayHint { position: source.len() - 2, label: "$" }]);
	}

	#[test]
	fn destructuring_parameters_rebuild_the_argument() {
		let (elaborated, _) = elaborate_str(
			"const def f : func(p : Compound { x : Type(#int) }, y : p.x) -> Int = func({ x: a }, y) => let z = (y : a); 0;",
			None,
		);
		assert!(errors(&elaborated).is_empty());
	}

	#[test]
	fn solutions_cannot_escape_their_scope() {
		let (elaborated, _) =
			elaborate_str("const def f : _ = let z = _; let g = func(t : Type(#int)) => (z : t); z;", None);
		assert!(errors(&elaborated).iter().any(|kind| matches!(kind, DiagnosticKind::TypeMismatch { .. })));
	}

	#[test]
	fn staging_operators_are_checked_against_the_phase() {
		let (elaborated, _) = elaborate_str("def x : Code(Int) = `1;\nconst def y : Int = $x;", None);
		assert!(matches!(
			errors(&elaborated)[..],
			[DiagnosticKind::MisplacedQuote, DiagnosticKind::MisplacedSplice]
		));
	}

	#[test]
	fn static_matches_are_still_checked_for_exhaustiveness() {
		let (elaborated, _) = elaborate_str("const def x : Int = match 0 { 0 => 1 };", None);
		assert!(matches!(errors(&elaborated)[..], [DiagnosticKind::NotExhaustive]));
	}

	#[test]
	fn non_exhaustive_matches_are_rejected() {
		let (elaborated, _) = elaborate_str("def f : func(n : Int) -> Int = func(n) => match n { 0 => 1 };", None);
		assert!(matches!(errors(&elaborated)[..], [DiagnosticKind::NotExhaustive]));
	}
}

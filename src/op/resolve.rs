use std::{collections::HashMap, rc::Rc};

use lasso::Rodeo;

use crate::{
	common::{Builtin, Index, Location, Modifier, Name, Range},
	ir::presyntax::{
		Expression, ParsedDefinition, ParsedModifier, ParsedModule, Pattern, PatternKind, Preterm, Reference,
		ResolvedDefinition, ResolvedModule,
	},
};

#[derive(Debug)]
pub struct ResolveError {
	pub range: Range,
	pub kind: ResolveErrorKind,
}

#[derive(Debug)]
pub enum ResolveErrorKind {
	UnboundName(Name),
	UnknownBuiltin(Name),
	DuplicateDefinition(Name),
}

impl ResolveErrorKind {
	fn at(self, range: Range) -> ResolveError { ResolveError { range, kind: self } }
}

/// Rewrites every name in a parsed module to a de Bruijn index or a definition location.
///
/// A definition may refer to imports and to the definitions before it.
pub fn resolve(module: ParsedModule, location: Rc<[Name]>, interner: &Rodeo) -> Result<ResolvedModule, ResolveError> {
	let mut scope = Scope { globals: HashMap::new(), locals: Vec::new() };
	let imports = module
		.imports
		.into_iter()
		.filter_map(|(range, mut path)| {
			let name = path.pop()?;
			let location = Location::new(path.into(), name);
			scope.globals.insert(name, location.clone());
			Some((range, location))
		})
		.collect();

	let mut definitions: Vec<ResolvedDefinition> = Vec::with_capacity(module.definitions.len());
	for ParsedDefinition { range, name, annotations, modifiers, ty, body } in module.definitions {
		if definitions.iter().any(|definition| definition.location.name == name) {
			return Err(ResolveErrorKind::DuplicateDefinition(name).at(range));
		}
		let modifiers = modifiers
			.into_iter()
			.map(|modifier| match modifier {
				ParsedModifier::Builtin => Builtin::from_name(interner.resolve(&name))
					.map(Modifier::Builtin)
					.ok_or(ResolveErrorKind::UnknownBuiltin(name).at(range)),
				ParsedModifier::Export => Ok(Modifier::Export),
				ParsedModifier::Const => Ok(Modifier::Const),
				ParsedModifier::Test => Ok(Modifier::Test),
			})
			.collect::<Result<_, _>>()?;
		let ty = scope.expression(ty)?;
		let body = body.map(|body| scope.expression(body)).transpose()?;
		let location = Location::new(location.clone(), name);
		definitions.push(ResolvedDefinition { range, location: location.clone(), annotations, modifiers, ty, body });
		scope.globals.insert(name, location);
	}

	Ok(ResolvedModule { location, imports, definitions })
}

struct Scope {
	globals: HashMap<Name, Location>,
	locals: Vec<Name>,
}

impl Scope {
	fn lookup(&self, name: Name, range: Range) -> Result<Reference, ResolveError> {
		if let Some(index) = self.locals.iter().rev().position(|local| *local == name) {
			return Ok(Reference::Local(name, Index(index)));
		}
		match self.globals.get(&name) {
			Some(location) => Ok(Reference::Global(location.clone())),
			None => Err(ResolveErrorKind::UnboundName(name).at(range)),
		}
	}

	fn bind(&mut self, pattern: &Pattern<Reference>) { pattern.names(&mut self.locals); }

	fn all(&mut self, expressions: Vec<Expression<Name>>) -> Result<Vec<Expression<Reference>>, ResolveError> {
		expressions.into_iter().map(|expression| self.expression(expression)).collect()
	}

	fn boxed(&mut self, expression: Expression<Name>) -> Result<Box<Expression<Reference>>, ResolveError> {
		self.expression(expression).map(Box::new)
	}

	fn fields(
		&mut self,
		fields: Vec<(Name, Expression<Name>)>,
	) -> Result<Vec<(Name, Expression<Reference>)>, ResolveError> {
		fields.into_iter().map(|(name, expression)| Ok((name, self.expression(expression)?))).collect()
	}

	fn expression(&mut self, expression: Expression<Name>) -> Result<Expression<Reference>, ResolveError> {
		use Preterm as P;
		let range = expression.range;
		let preterm = match expression.preterm {
			P::Variable(name) => P::Variable(self.lookup(name, range)?),
			P::Literal(literal) => P::Literal(literal),

			P::Former(former) => P::Former(former),
			P::TagOf(repr) => P::TagOf(repr),
			P::Type(tag) => P::Type(self.boxed(*tag)?),
			P::List(element) => P::List(self.boxed(*element)?),
			P::Compound(fields) => P::Compound(self.fields(fields)?),
			P::Point(element) => P::Point(self.boxed(*element)?),
			P::Union(elements) => P::Union(self.all(elements)?),
			P::Func { open, params, result } => {
				let length = self.locals.len();
				let mut resolved = Vec::with_capacity(params.len());
				for (binder, ty) in params {
					let ty = self.expression(ty)?;
					let binder = self.pattern(binder)?;
					self.bind(&binder);
					resolved.push((binder, ty));
				}
				let result = self.boxed(*result);
				self.locals.truncate(length);
				P::Func { open, params: resolved, result: result? }
			}
			P::Code(element) => P::Code(self.boxed(*element)?),
			P::Path(element) => P::Path(self.boxed(*element)?),

			P::ArrayOf(kind, elements) => P::ArrayOf(kind, self.all(elements)?),
			P::ListOf(elements) => P::ListOf(self.all(elements)?),
			P::CompoundOf(fields) => P::CompoundOf(self.fields(fields)?),
			P::FuncOf { open, params, result } => {
				let length = self.locals.len();
				let mut resolved = Vec::with_capacity(params.len());
				for binder in params {
					let binder = self.pattern(binder)?;
					self.bind(&binder);
					resolved.push(binder);
				}
				let result = self.boxed(*result);
				self.locals.truncate(length);
				P::FuncOf { open, params: resolved, result: result? }
			}
			P::CodeOf(element) => P::CodeOf(self.boxed(*element)?),
			P::PathOf(element) => P::PathOf(self.boxed(*element)?),
			P::Command { element, ty } => P::Command { element, ty: self.boxed(*ty)? },

			P::Apply { func, args } => P::Apply { func: self.boxed(*func)?, args: self.all(args)? },
			P::Splice(element) => P::Splice(self.boxed(*element)?),
			P::Get(element) => P::Get(self.boxed(*element)?),
			P::Project(target, projection) => P::Project(self.boxed(*target)?, projection),
			P::Let { binder, init, body } => {
				let init = self.boxed(*init)?;
				let binder = self.pattern(binder)?;
				let length = self.locals.len();
				self.bind(&binder);
				let body = self.boxed(*body);
				self.locals.truncate(length);
				P::Let { binder, init, body: body? }
			}
			P::If { scrutinee, branches } => {
				let scrutinee = self.boxed(*scrutinee)?;
				let branches = branches
					.into_iter()
					.map(|(binder, body)| {
						let binder = self.pattern(binder)?;
						let length = self.locals.len();
						self.bind(&binder);
						let body = self.expression(body);
						self.locals.truncate(length);
						Ok((binder, body?))
					})
					.collect::<Result<_, _>>()?;
				P::If { scrutinee, branches }
			}

			P::As(element, ty) => P::As(self.boxed(*element)?, self.boxed(*ty)?),
			P::Meta => P::Meta,
		};
		Ok(preterm.at(range))
	}

	// Ascriptions inside a pattern see only the names bound before the pattern.
	fn pattern(&mut self, pattern: Pattern<Name>) -> Result<Pattern<Reference>, ResolveError> {
		let kind = match pattern.kind {
			PatternKind::Literal(literal) => PatternKind::Literal(literal),
			PatternKind::ArrayOf(kind, patterns) => PatternKind::ArrayOf(kind, self.patterns(patterns)?),
			PatternKind::ListOf(patterns) => PatternKind::ListOf(self.patterns(patterns)?),
			PatternKind::CompoundOf(fields) => PatternKind::CompoundOf(
				fields
					.into_iter()
					.map(|(name, pattern)| Ok((name, self.pattern(pattern)?)))
					.collect::<Result<_, _>>()?,
			),
			PatternKind::Var(name) => PatternKind::Var(name),
			PatternKind::Drop => PatternKind::Drop,
			PatternKind::Anno(pattern, ty) => PatternKind::Anno(self.pattern(*pattern)?.into(), self.boxed(*ty)?),
		};
		Ok(kind.at(pattern.range))
	}

	fn patterns(&mut self, patterns: Vec<Pattern<Name>>) -> Result<Vec<Pattern<Reference>>, ResolveError> {
		patterns.into_iter().map(|pattern| self.pattern(pattern)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ir::source::LexedSource, op::parse::parse};

	fn resolve_str(source: &str) -> (Result<ResolvedModule, ResolveError>, Rodeo) {
		let Ok(lexed) = LexedSource::new(source) else { panic!("failed to lex") };
		let (module, mut interner) = parse(source, &lexed, Rodeo::new()).unwrap();
		let location: Rc<[Name]> = [interner.get_or_intern("main")].into();
		(resolve(module, location, &interner), interner)
	}

	#[test]
	fn locals_become_indices() {
		let (module, _) = resolve_str("def k : func(a : Int, b : Int) -> Int = func(a, b) => a;");
		let Ok(module) = module else { panic!("failed to resolve") };
		let Some(Preterm::FuncOf { result, .. }) = module.definitions[0].body.as_ref().map(|body| &body.preterm) else {
			panic!("expected a function")
		};
		assert!(matches!(result.preterm, Preterm::Variable(Reference::Local(_, Index(1)))));
	}

	#[test]
	fn definitions_see_earlier_definitions() {
		let (module, _) = resolve_str("def a : Int = 1;\ndef b : Int = a;");
		let Ok(module) = module else { panic!("failed to resolve") };
		assert!(matches!(
			module.definitions[1].body.as_ref().map(|body| &body.preterm),
			Some(Preterm::Variable(Reference::Global(_)))
		));
	}

	#[test]
	fn rejects_unbound_names_and_unknown_builtins() {
		assert!(matches!(resolve_str("def a : Int = b;").0, Err(ResolveError { kind: ResolveErrorKind::UnboundName(_), .. })));
		assert!(matches!(
			resolve_str("builtin def frobnicate : Int;").0,
			Err(ResolveError { kind: ResolveErrorKind::UnknownBuiltin(_), .. })
		));
	}
}

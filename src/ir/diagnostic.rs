use lasso::Resolver;

use crate::{
	common::{Location, Name, Phase, Range},
	ir::syntax::Term,
	op::unparse::{pretty_print, print_location},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
	Error,
	Warning,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
	pub range: Range,
	pub severity: Severity,
	pub kind: DiagnosticKind,
}

#[derive(Clone, Debug)]
pub enum DiagnosticKind {
	TypeMismatch { found: Term, expected: Term },
	ArityMismatch { found: usize, expected: usize },
	PhaseMismatch { found: Phase, expected: Phase },
	MisplacedQuote,
	MisplacedSplice,
	CannotSynthesize,
	NotExhaustive,
	AlreadyUsed(Name),
	UnknownKey(Name),
	UnsolvedMeta(usize),
	UnknownImport(Location),

	// Advisories.
	Deprecated(Location),
	Unstable(Location),
	Delicate(Location),
}

impl DiagnosticKind {
	pub fn severity(&self) -> Severity {
		match self {
			Self::Deprecated(_) | Self::Unstable(_) | Self::Delicate(_) => Severity::Warning,
			_ => Severity::Error,
		}
	}

	pub fn at(self, range: Range) -> Diagnostic { Diagnostic { range, severity: self.severity(), kind: self } }
}

impl Diagnostic {
	pub fn message(&self, interner: &impl Resolver) -> String {
		let location = |location: &Location| {
			let mut string = String::new();
			let _ = print_location(location, &mut string, interner);
			string
		};
		let phase = |phase: &Phase| match phase {
			Phase::World => "runtime",
			Phase::Const => "compile-time",
		};
		match &self.kind {
			DiagnosticKind::TypeMismatch { found, expected } => format!(
				"type mismatch\nexpected: {}\nfound: {}",
				pretty_print(expected, interner),
				pretty_print(found, interner)
			),
			DiagnosticKind::ArityMismatch { found, expected } =>
				format!("arity mismatch: expected {expected} parameter(s), found {found}"),
			DiagnosticKind::PhaseMismatch { found, expected } =>
				format!("phase mismatch: bound at {} phase, used at {} phase", phase(found), phase(expected)),
			DiagnosticKind::MisplacedQuote => "a quote can only be written at the compile-time phase".to_owned(),
			DiagnosticKind::MisplacedSplice => "a splice can only be written at the runtime phase".to_owned(),
			DiagnosticKind::CannotSynthesize => "cannot synthesize a type; add an annotation".to_owned(),
			DiagnosticKind::NotExhaustive => "not exhaustive: add a variable or `_` branch".to_owned(),
			DiagnosticKind::AlreadyUsed(name) => format!("`{}` is already used", interner.resolve(name)),
			DiagnosticKind::UnknownKey(name) => format!("unknown key `{}`", interner.resolve(name)),
			DiagnosticKind::UnsolvedMeta(index) => format!("unsolved metavariable ?{index}"),
			DiagnosticKind::UnknownImport(target) => format!("unknown import `{}`", location(target)),
			DiagnosticKind::Deprecated(target) => format!("`{}` is deprecated", location(target)),
			DiagnosticKind::Unstable(target) => format!("`{}` is unstable", location(target)),
			DiagnosticKind::Delicate(target) =>
				format!("`{}` is delicate; mark the caller `@delicate` to use it", location(target)),
		}
	}
}

/// Diagnostics keyed by the definition they were found in; `None` holds module-level diagnostics.
///
/// Buckets keep the order in which they were first written to.
#[derive(Clone, Default, Debug)]
pub struct Diagnostics(Vec<(Option<Location>, Vec<Diagnostic>)>);

impl Diagnostics {
	pub fn new() -> Self { Self::default() }

	fn bucket(&mut self, location: Option<Location>) -> &mut Vec<Diagnostic> {
		let position = match self.0.iter().position(|(key, _)| *key == location) {
			Some(position) => position,
			None => {
				self.0.push((location, Vec::new()));
				self.0.len() - 1
			}
		};
		&mut self.0[position].1
	}

	pub fn push(&mut self, location: Option<Location>, diagnostic: Diagnostic) { self.bucket(location).push(diagnostic); }

	pub fn extend(&mut self, location: Option<Location>, diagnostics: impl IntoIterator<Item = Diagnostic>) {
		self.bucket(location).extend(diagnostics);
	}

	pub fn get(&self, location: Option<&Location>) -> &[Diagnostic] {
		self.0
			.iter()
			.find(|(key, _)| key.as_ref() == location)
			.map(|(_, diagnostics)| diagnostics.as_slice())
			.unwrap_or_default()
	}

	pub fn has_errors(&self, location: Option<&Location>) -> bool {
		self.get(location).iter().any(|diagnostic| diagnostic.severity == Severity::Error)
	}

	pub fn iter(&self) -> impl Iterator<Item = (Option<&Location>, &Diagnostic)> {
		self.0.iter().flat_map(|(location, diagnostics)| {
			diagnostics.iter().map(move |diagnostic| (location.as_ref(), diagnostic))
		})
	}

	pub fn is_empty(&self) -> bool { self.0.iter().all(|(_, diagnostics)| diagnostics.is_empty()) }
}

#[cfg(test)]
mod tests {
	use std::rc::Rc;

	use lasso::Rodeo;

	use super::*;

	#[test]
	fn buckets_keep_their_first_write_order() {
		let mut interner = Rodeo::new();
		let module: Rc<[Name]> = [interner.get_or_intern("main")].into();
		let [b, a] = ["b", "a"].map(|name| Location::new(module.clone(), interner.get_or_intern(name)));
		let mut diagnostics = Diagnostics::new();
		diagnostics.push(Some(b.clone()), DiagnosticKind::NotExhaustive.at(Range::new(0, 1)));
		diagnostics.push(Some(a.clone()), DiagnosticKind::CannotSynthesize.at(Range::new(2, 3)));
		diagnostics.push(None, DiagnosticKind::NotExhaustive.at(Range::new(4, 5)));
		diagnostics.push(Some(b.clone()), DiagnosticKind::CannotSynthesize.at(Range::new(6, 7)));

		let order: Vec<_> = diagnostics.iter().map(|(_, diagnostic)| diagnostic.range.start).collect();
		assert_eq!(order, [0, 6, 2, 4]);
		assert_eq!(diagnostics.get(Some(&a)).len(), 1);
		assert!(diagnostics.has_errors(None));
	}
}

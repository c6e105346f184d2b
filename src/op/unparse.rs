use std::fmt::Write;

use lasso::Resolver;

use crate::{
	common::{Location, Modifier, Name, Projection},
	ir::syntax::{Definition, Pattern, Term},
};

/// Pretty-prints a core term to a string.
pub fn pretty_print(term: &Term, interner: &impl Resolver) -> String {
	let mut string = String::new();
	// Writing to a string never fails.
	let _ = print(term, &mut string, interner);
	string
}

pub fn print_location(location: &Location, f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	for segment in location.module.iter() {
		write!(f, "{}/", interner.resolve(segment))?;
	}
	write!(f, "{}", interner.resolve(&location.name))
}

/// Prints a definition in surface syntax, modifiers and all.
pub fn print_definition(definition: &Definition, f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	for modifier in &definition.modifiers {
		match modifier {
			Modifier::Builtin(_) => write!(f, "builtin ")?,
			Modifier::Export => write!(f, "export ")?,
			Modifier::Const => write!(f, "const ")?,
			Modifier::Test => write!(f, "test ")?,
		}
	}
	write!(f, "def {} : ", interner.resolve(&definition.location.name))?;
	print(&definition.ty, f, interner)?;
	if let Some(body) = &definition.body {
		write!(f, " = ")?;
		print(body, f, interner)?;
	}
	write!(f, ";")
}

pub fn print(term: &Term, f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	match term {
		Term::Func { open, params, result } => {
			write!(f, "{}(", if *open { "func" } else { "proc" })?;
			let mut first = true;
			for (binder, ty) in params {
				if !first {
					write!(f, ", ")?;
				}
				first = false;
				if !matches!(binder, Pattern::Drop(_)) {
					print_pattern(binder, f, interner)?;
					write!(f, " : ")?;
				}
				print(ty, f, interner)?;
			}
			write!(f, ") -> ")?;
			print(result, f, interner)
		}
		Term::FuncOf { open, params, result, .. } => {
			write!(f, "{}(", if *open { "func" } else { "proc" })?;
			print_separated(params, f, interner, print_pattern)?;
			write!(f, ") => ")?;
			print(result, f, interner)
		}
		Term::Let { binder, init, body, .. } => {
			write!(f, "let ")?;
			print_pattern(binder, f, interner)?;
			write!(f, " = ")?;
			print(init, f, interner)?;
			write!(f, "; ")?;
			print(body, f, interner)
		}
		Term::If { scrutinee, branches, .. } => {
			write!(f, "match ")?;
			print(scrutinee, f, interner)?;
			write!(f, " {{")?;
			let mut first = true;
			for (binder, body) in branches {
				write!(f, "{}", if first { " " } else { ", " })?;
				first = false;
				print_pattern(binder, f, interner)?;
				write!(f, " => ")?;
				print(body, f, interner)?;
			}
			write!(f, " }}")
		}
		Term::Union { elements, .. } if elements.len() > 1 => {
			let mut first = true;
			for element in elements {
				if !first {
					write!(f, " | ")?;
				}
				first = false;
				print_prefix(element, f, interner)?;
			}
			Ok(())
		}
		_ => print_prefix(term, f, interner),
	}
}

fn print_prefix(term: &Term, f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	match term {
		Term::CodeOf { element, .. } => {
			write!(f, "`")?;
			print_prefix(element, f, interner)
		}
		Term::Splice { element, .. } => {
			write!(f, "$")?;
			print_prefix(element, f, interner)
		}
		Term::PathOf { element, .. } => {
			write!(f, "&")?;
			print_prefix(element, f, interner)
		}
		Term::Get { element, .. } => {
			write!(f, "*")?;
			print_prefix(element, f, interner)
		}
		_ => print_spine(term, f, interner),
	}
}

fn print_spine(term: &Term, f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	match term {
		Term::Apply { func, args, .. } => {
			print_spine(func, f, interner)?;
			write!(f, "(")?;
			print_separated(args, f, interner, print)?;
			write!(f, ")")
		}
		Term::Project { target, projection, .. } => {
			print_spine(target, f, interner)?;
			match projection {
				Projection::Index(index) => write!(f, ".{index}"),
				Projection::Field(name) => write!(f, ".{}", interner.resolve(name)),
			}
		}
		_ => print_atom(term, f, interner),
	}
}

fn print_atom(term: &Term, f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	match term {
		// Representation tags and universes.
		Term::Tag => write!(f, "Tag"),
		Term::TagOf(repr) => write!(f, "#{}", repr.name()),
		Term::Type(tag) => print_former("Type", [tag.as_ref()], f, interner),

		// Primitives.
		Term::Unit => write!(f, "Unit"),
		Term::UnitOf => write!(f, "()"),
		Term::Bool => write!(f, "Bool"),
		Term::BoolOf(b) => write!(f, "{b}"),
		Term::Byte => write!(f, "Byte"),
		Term::ByteOf(n) => write!(f, "{n}b"),
		Term::Short => write!(f, "Short"),
		Term::ShortOf(n) => write!(f, "{n}s"),
		Term::Int => write!(f, "Int"),
		Term::IntOf(n) => write!(f, "{n}"),
		Term::Long => write!(f, "Long"),
		Term::LongOf(n) => write!(f, "{n}l"),
		Term::Float => write!(f, "Float"),
		Term::FloatOf(n) => write!(f, "{n:?}f"),
		Term::Double => write!(f, "Double"),
		Term::DoubleOf(n) => write!(f, "{n:?}"),
		Term::String => write!(f, "String"),
		Term::StringOf(s) => write!(f, "{:?}", s.as_ref()),

		// Arrays.
		Term::ByteArray => write!(f, "ByteArray"),
		Term::ByteArrayOf(elements) => print_array("bytes", elements, f, interner),
		Term::IntArray => write!(f, "IntArray"),
		Term::IntArrayOf(elements) => print_array("ints", elements, f, interner),
		Term::LongArray => write!(f, "LongArray"),
		Term::LongArrayOf(elements) => print_array("longs", elements, f, interner),

		// Lists and compounds.
		Term::List(element) => print_former("List", [element.as_ref()], f, interner),
		Term::ListOf { elements, .. } => print_array("", elements, f, interner),
		Term::Compound(elements) => {
			write!(f, "Compound")?;
			print_fields(elements, f, interner)
		}
		Term::CompoundOf { elements, .. } => print_fields(elements, f, interner),

		// Singletons and unions.
		Term::Point { element, .. } => print_former("Point", [element.as_ref()], f, interner),
		Term::Union { elements, .. } => print_former("Union", elements, f, interner),

		// Quoted programs and references.
		Term::Code(element) => print_former("Code", [element.as_ref()], f, interner),
		Term::Path(element) => print_former("Path", [element.as_ref()], f, interner),
		Term::Command { element, ty } => {
			write!(f, "command({:?}, ", element.as_ref())?;
			print(ty, f, interner)?;
			write!(f, ")")
		}

		// References to bindings.
		Term::Var { name, .. } => write!(f, "{}", interner.resolve(name)),
		Term::Def { definition, .. } => print_location(&definition.location, f, interner),
		Term::Meta { index, .. } => write!(f, "?{index}"),
		Term::Hole => write!(f, "??"),

		_ => {
			write!(f, "(")?;
			print(term, f, interner)?;
			write!(f, ")")
		}
	}
}

fn print_former<'t, R: Resolver, W: Write>(
	former: &str,
	arguments: impl IntoIterator<Item = &'t Term>,
	f: &mut W,
	interner: &R,
) -> std::fmt::Result {
	write!(f, "{former}(")?;
	let mut first = true;
	for argument in arguments {
		if !first {
			write!(f, ", ")?;
		}
		first = false;
		print(argument, f, interner)?;
	}
	write!(f, ")")
}

fn print_array<R: Resolver, W: Write>(prefix: &str, elements: &[Term], f: &mut W, interner: &R) -> std::fmt::Result {
	write!(f, "{prefix}[")?;
	print_separated(elements, f, interner, print)?;
	write!(f, "]")
}

fn print_fields<R: Resolver, W: Write>(
	elements: &[(Name, Term)],
	f: &mut W,
	interner: &R,
) -> std::fmt::Result {
	write!(f, "{{")?;
	let mut first = true;
	for (name, element) in elements {
		if !first {
			write!(f, ", ")?;
		}
		first = false;
		write!(f, "{}: ", interner.resolve(name))?;
		print(element, f, interner)?;
	}
	write!(f, "}}")
}

fn print_separated<T, R: Resolver, W: Write>(
	items: &[T],
	f: &mut W,
	interner: &R,
	print_item: fn(&T, &mut W, &R) -> std::fmt::Result,
) -> std::fmt::Result {
	let mut first = true;
	for item in items {
		if !first {
			write!(f, ", ")?;
		}
		first = false;
		print_item(item, f, interner)?;
	}
	Ok(())
}

pub fn print_pattern(pattern: &Pattern, f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	match pattern {
		Pattern::UnitOf => write!(f, "()"),
		Pattern::BoolOf(b) => write!(f, "{b}"),
		Pattern::ByteOf(n) => write!(f, "{n}b"),
		Pattern::ShortOf(n) => write!(f, "{n}s"),
		Pattern::IntOf(n) => write!(f, "{n}"),
		Pattern::LongOf(n) => write!(f, "{n}l"),
		Pattern::FloatOf(n) => write!(f, "{n:?}f"),
		Pattern::DoubleOf(n) => write!(f, "{n:?}"),
		Pattern::StringOf(s) => write!(f, "{:?}", s.as_ref()),
		Pattern::ByteArrayOf(patterns) => print_patterns("bytes", patterns, f, interner),
		Pattern::IntArrayOf(patterns) => print_patterns("ints", patterns, f, interner),
		Pattern::LongArrayOf(patterns) => print_patterns("longs", patterns, f, interner),
		Pattern::ListOf(patterns, _) => print_patterns("", patterns, f, interner),
		Pattern::CompoundOf(patterns, _) => {
			write!(f, "{{")?;
			let mut first = true;
			for (name, pattern) in patterns {
				if !first {
					write!(f, ", ")?;
				}
				first = false;
				write!(f, "{}: ", interner.resolve(name))?;
				print_pattern(pattern, f, interner)?;
			}
			write!(f, "}}")
		}
		Pattern::Var { name, .. } => write!(f, "{}", interner.resolve(name)),
		Pattern::Drop(_) => write!(f, "_"),
		Pattern::Hole => write!(f, "??"),
	}
}

fn print_patterns(prefix: &str, patterns: &[Pattern], f: &mut impl Write, interner: &impl Resolver) -> std::fmt::Result {
	write!(f, "{prefix}[")?;
	let mut first = true;
	for pattern in patterns {
		if !first {
			write!(f, ", ")?;
		}
		first = false;
		print_pattern(pattern, f, interner)?;
	}
	write!(f, "]")
}

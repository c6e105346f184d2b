use std::rc::Rc;

use lasso::Rodeo;
use peg::error::ParseError;

use crate::{
	common::{Name, Projection, Range},
	ir::{
		presyntax::{
			ArrayKind, Expression, Former, Literal, ParsedDefinition, ParsedModifier, ParsedModule, Pattern,
			PatternKind, Preterm,
		},
		source::{Keyword, LexedSource, Token},
	},
};

/// Parses a surface module from a lexed source string, interning every name into `interner`.
pub fn parse(source: &str, lexed_source: &LexedSource, interner: Rodeo) -> Result<(ParsedModule, Rodeo), ParseError<usize>> {
	let mut parser = Parser { source, interner, ranges: lexed_source.ranges.clone() };
	let module = module_parse::module(&lexed_source.tokens, &mut parser)?;
	Ok((module, parser.interner))
}

pub struct Parser<'s> {
	source: &'s str,
	pub interner: Rodeo,
	ranges: Box<[(usize, usize)]>,
}

impl<'s> Parser<'s> {
	fn span(&self, token_index: usize) -> &'s str {
		let range = self.ranges[token_index];
		&self.source[range.0..range.1]
	}

	/// Converts a range of token indices to a range of byte offsets.
	fn range(&self, init: usize, fini: usize) -> Range {
		if fini > init {
			Range::new(self.ranges[init].0, self.ranges[fini - 1].1)
		} else {
			let position = self.ranges.get(init).map_or(self.source.len(), |range| range.0);
			Range::new(position, position)
		}
	}

	fn identifier(&mut self, token_index: usize) -> Name {
		let span = self.span(token_index);
		self.interner.get_or_intern(span)
	}

	fn index(&self, token_index: usize) -> Option<usize> { self.span(token_index).parse().ok() }

	fn number(&self, token_index: usize) -> Option<Literal> {
		let span = self.span(token_index);
		let (digits, suffix) = match span.char_indices().last() {
			Some((position, suffix @ ('b' | 's' | 'l' | 'f' | 'd'))) => (&span[..position], Some(suffix)),
			_ => (span, None),
		};
		Some(match suffix {
			Some('b') => Literal::Byte(digits.parse().ok()?),
			Some('s') => Literal::Short(digits.parse().ok()?),
			Some('l') => Literal::Long(digits.parse().ok()?),
			Some('f') => Literal::Float(digits.parse().ok()?),
			Some('d') => Literal::Double(digits.parse().ok()?),
			_ if digits.contains('.') => Literal::Double(digits.parse().ok()?),
			_ => Literal::Int(digits.parse().ok()?),
		})
	}

	fn string(&self, token_index: usize) -> Rc<str> {
		let span = self.span(token_index);
		let mut string = String::with_capacity(span.len());
		let mut chars = span[1..span.len() - 1].chars();
		while let Some(c) = chars.next() {
			string.push(if c == '\\' {
				match chars.next() {
					Some('n') => '\n',
					Some('t') => '\t',
					Some(escaped) => escaped,
					None => break,
				}
			} else {
				c
			});
		}
		string.into()
	}
}

peg::parser! {
  grammar module_parse(parser: &mut Parser) for [Token] {
		rule _ = [Token::Whitespace]*

		rule identifier() -> Name
			= pos:position!() [Token::Identifier] {parser.identifier(pos)}

		rule index() -> usize
			= pos:position!() [Token::Number] {? parser.index(pos).ok_or("projection index")}

		rule string() -> Rc<str>
			= pos:position!() [Token::String] {parser.string(pos)}

		rule literal() -> Literal
			= pos:position!() [Token::Number] {? parser.number(pos).ok_or("number literal")}
			/ string:string() {Literal::String(string)}
			/ [Token::Keyword(Keyword::True)] {Literal::Bool(true)}
			/ [Token::Keyword(Keyword::False)] {Literal::Bool(false)}
			/ [Token::ParenL] _ [Token::ParenR] {Literal::Unit}

		rule array_kind() -> ArrayKind
			= [Token::Keyword(Keyword::Bytes)] {ArrayKind::Byte}
			/ [Token::Keyword(Keyword::Ints)] {ArrayKind::Int}
			/ [Token::Keyword(Keyword::Longs)] {ArrayKind::Long}

		rule former() -> Former
			= [Token::Keyword(Keyword::Tag)] {Former::Tag}
			/ [Token::Keyword(Keyword::Unit)] {Former::Unit}
			/ [Token::Keyword(Keyword::Bool)] {Former::Bool}
			/ [Token::Keyword(Keyword::Byte)] {Former::Byte}
			/ [Token::Keyword(Keyword::Short)] {Former::Short}
			/ [Token::Keyword(Keyword::Int)] {Former::Int}
			/ [Token::Keyword(Keyword::Long)] {Former::Long}
			/ [Token::Keyword(Keyword::Float)] {Former::Float}
			/ [Token::Keyword(Keyword::Double)] {Former::Double}
			/ [Token::Keyword(Keyword::String)] {Former::String}
			/ [Token::Keyword(Keyword::ByteArray)] {Former::ByteArray}
			/ [Token::Keyword(Keyword::IntArray)] {Former::IntArray}
			/ [Token::Keyword(Keyword::LongArray)] {Former::LongArray}

		rule openness() -> bool
			= [Token::Keyword(Keyword::Func)] {true}
			/ [Token::Keyword(Keyword::Proc)] {false}

		rule comma() = _ [Token::Comma] _

		// Patterns.
		rule pattern_atom() -> Pattern<Name>
			= [Token::ParenL] _ pattern:pattern() _ [Token::ParenR] {pattern}
			/ init:position!() kind:(
				  [Token::LowDash] {PatternKind::Drop}
				/ name:identifier() {PatternKind::Var(name)}
				/ literal:literal() {PatternKind::Literal(literal)}
				/ kind:array_kind() _ [Token::SquareL] _ patterns:patterns() _ [Token::SquareR] {PatternKind::ArrayOf(kind, patterns)}
				/ [Token::SquareL] _ patterns:patterns() _ [Token::SquareR] {PatternKind::ListOf(patterns)}
				/ [Token::CurlyL] _ fields:(key:identifier() _ [Token::Colon] _ pattern:pattern() {(key, pattern)}) ** comma() _ [Token::CurlyR]
					{PatternKind::CompoundOf(fields)}
			) fini:position!() {kind.at(parser.range(init, fini))}

		rule pattern() -> Pattern<Name>
			= init:position!() pattern:pattern_atom() _ [Token::Colon] _ ty:term() fini:position!()
				{PatternKind::Anno(pattern.into(), ty.into()).at(parser.range(init, fini))}
			/ pattern_atom()

		rule patterns() -> Vec<Pattern<Name>>
			= patterns:pattern() ** comma() {patterns}

		rule parameter() -> (Pattern<Name>, Expression<Name>)
			= binder:pattern_atom() _ [Token::Colon] _ ty:term() {(binder, ty)}
			/ init:position!() ty:term() fini:position!() {(PatternKind::Drop.at(parser.range(init, fini)), ty)}

		// Terms.
		rule terms() -> Vec<Expression<Name>>
			= terms:term() ** comma() {terms}

		rule fields() -> Vec<(Name, Expression<Name>)>
			= fields:(key:identifier() _ [Token::Colon] _ value:term() {(key, value)}) ** comma() {fields}

		rule atom() -> Expression<Name>
			= [Token::ParenL] _ term:term() _ [Token::ParenR] {term}
			/ init:position!() preterm:(
				  literal:literal() {Preterm::Literal(literal)}
				/ [Token::LowDash] {Preterm::Meta}
				/ [Token::Tag(repr)] {Preterm::TagOf(repr)}
				/ [Token::Keyword(Keyword::Type)] _ [Token::ParenL] _ tag:term() _ [Token::ParenR] {Preterm::Type(tag.into())}
				/ [Token::Keyword(Keyword::List)] _ [Token::ParenL] _ element:term() _ [Token::ParenR] {Preterm::List(element.into())}
				/ [Token::Keyword(Keyword::Point)] _ [Token::ParenL] _ element:term() _ [Token::ParenR] {Preterm::Point(element.into())}
				/ [Token::Keyword(Keyword::Code)] _ [Token::ParenL] _ element:term() _ [Token::ParenR] {Preterm::Code(element.into())}
				/ [Token::Keyword(Keyword::Path)] _ [Token::ParenL] _ element:term() _ [Token::ParenR] {Preterm::Path(element.into())}
				/ [Token::Keyword(Keyword::Union)] _ [Token::ParenL] _ elements:terms() _ [Token::ParenR] {Preterm::Union(elements)}
				/ [Token::Keyword(Keyword::Compound)] _ [Token::CurlyL] _ fields:fields() _ [Token::CurlyR] {Preterm::Compound(fields)}
				/ former:former() {Preterm::Former(former)}
				/ kind:array_kind() _ [Token::SquareL] _ elements:terms() _ [Token::SquareR] {Preterm::ArrayOf(kind, elements)}
				/ [Token::SquareL] _ elements:terms() _ [Token::SquareR] {Preterm::ListOf(elements)}
				/ [Token::CurlyL] _ fields:fields() _ [Token::CurlyR] {Preterm::CompoundOf(fields)}
				/ [Token::Keyword(Keyword::Command)] _ [Token::ParenL] _ element:string() comma() ty:term() _ [Token::ParenR]
					{Preterm::Command { element, ty: ty.into() }}
				/ name:identifier() {Preterm::Variable(name)}
			) fini:position!() {preterm.at(parser.range(init, fini))}

		// Applications and projections.
		#[cache_left_rec]
		rule postfix() -> Expression<Name>
			= init:position!() preterm:(
				  func:postfix() _ [Token::ParenL] _ args:terms() _ [Token::ParenR] {Preterm::Apply { func: func.into(), args }}
				/ target:postfix() _ [Token::Period] _ projection:(index:index() {Projection::Index(index)} / name:identifier() {Projection::Field(name)})
					{Preterm::Project(target.into(), projection)}
			) fini:position!() {preterm.at(parser.range(init, fini))}
			/ atom()

		rule prefix() -> Expression<Name>
			= init:position!() preterm:(
				  [Token::Tick] _ element:prefix() {Preterm::CodeOf(element.into())}
				/ [Token::Dollar] _ element:prefix() {Preterm::Splice(element.into())}
				/ [Token::Amp] _ element:prefix() {Preterm::PathOf(element.into())}
				/ [Token::Ast] _ element:prefix() {Preterm::Get(element.into())}
			) fini:position!() {preterm.at(parser.range(init, fini))}
			/ postfix()

		#[cache]
		rule union() -> Expression<Name>
			= init:position!() first:prefix() rest:(_ [Token::Pipe] _ element:prefix() {element})+ fini:position!() {
				let mut elements = vec![first];
				elements.extend(rest);
				Preterm::Union(elements).at(parser.range(init, fini))
			}
			/ prefix()

		rule branch() -> (Pattern<Name>, Expression<Name>)
			= pattern:pattern() _ [Token::FatArrow] _ body:term() {(pattern, body)}

		#[cache]
		rule term() -> Expression<Name>
			= init:position!() preterm:(
				  [Token::Keyword(Keyword::Let)] _ binder:pattern() _ [Token::Equal] _ value:term() _ [Token::Semi] _ body:term()
					{Preterm::Let { binder, init: value.into(), body: body.into() }}
				/ [Token::Keyword(Keyword::If)] _ scrutinee:union() _ [Token::Keyword(Keyword::Is)] _ pattern:pattern()
					_ [Token::Keyword(Keyword::Then)] _ then:term()
					_ otherwise_init:position!() [Token::Keyword(Keyword::Else)] otherwise_fini:position!() _ otherwise:term()
					{
						let drop = PatternKind::Drop.at(parser.range(otherwise_init, otherwise_fini));
						Preterm::If { scrutinee: scrutinee.into(), branches: vec![(pattern, then), (drop, otherwise)] }
					}
				/ [Token::Keyword(Keyword::Match)] _ scrutinee:union() _ [Token::CurlyL] _ branches:branch() ** comma() _ ([Token::Comma] _)? [Token::CurlyR]
					{Preterm::If { scrutinee: scrutinee.into(), branches }}
				/ open:openness() _ [Token::ParenL] _ params:patterns() _ [Token::ParenR] _ [Token::FatArrow] _ result:term()
					{Preterm::FuncOf { open, params, result: result.into() }}
				/ open:openness() _ [Token::ParenL] _ params:parameter() ** comma() _ [Token::ParenR] _ [Token::Arrow] _ result:term()
					{Preterm::Func { open, params, result: result.into() }}
				/ element:union() _ [Token::Colon] _ ty:term() {Preterm::As(element.into(), ty.into())}
			) fini:position!() {preterm.at(parser.range(init, fini))}
			/ union()

		// Modules.
		rule modifier() -> ParsedModifier
			= [Token::Keyword(Keyword::Builtin)] {ParsedModifier::Builtin}
			/ [Token::Keyword(Keyword::Export)] {ParsedModifier::Export}
			/ [Token::Keyword(Keyword::Const)] {ParsedModifier::Const}
			/ [Token::Keyword(Keyword::Test)] {ParsedModifier::Test}

		rule definition() -> ParsedDefinition
			= init:position!() annotations:([Token::Annotation(annotation)] _ {annotation})* modifiers:(modifier:modifier() _ {modifier})*
				[Token::Keyword(Keyword::Def)] _ name:identifier() _ [Token::Colon] _ ty:term() _ body:([Token::Equal] _ body:term() _ {body})?
				[Token::Semi] fini:position!()
				{ParsedDefinition { range: parser.range(init, fini), name, annotations, modifiers, ty, body }}

		rule import() -> (Range, Vec<Name>)
			= init:position!() [Token::Keyword(Keyword::Import)] _ path:identifier() ++ (_ [Token::Slash] _) _ [Token::Semi] fini:position!()
				{(parser.range(init, fini), path)}

		pub rule module() -> ParsedModule
			= _ imports:(import:import() _ {import})* definitions:(definition:definition() _ {definition})*
				{ParsedModule { imports, definitions }}
  }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse_str(source: &str) -> (ParsedModule, Rodeo) {
		let Ok(lexed) = LexedSource::new(source) else { panic!("failed to lex") };
		parse(source, &lexed, Rodeo::new()).unwrap()
	}

	#[test]
	fn parses_definitions_with_modifiers() {
		let (module, interner) = parse_str("@deprecated const def answer : Int = 42;\nbuiltin def int_add : func(Int, Int) -> Int;");
		assert_eq!(module.definitions.len(), 2);
		assert_eq!(interner.resolve(&module.definitions[0].name), "answer");
		assert_eq!(module.definitions[0].modifiers, [ParsedModifier::Const]);
		assert!(matches!(module.definitions[0].body.as_ref().map(|body| &body.preterm), Some(Preterm::Literal(Literal::Int(42)))));
		assert!(module.definitions[1].body.is_none());
		assert!(matches!(&module.definitions[1].ty.preterm, Preterm::Func { open: true, params, .. } if params.len() == 2));
	}

	#[test]
	fn distinguishes_function_literals_from_function_types() {
		let (module, _) = parse_str("def id : func(x : Int) -> Int = func(x) => x;");
		let definition = &module.definitions[0];
		assert!(matches!(definition.ty.preterm, Preterm::Func { .. }));
		assert!(matches!(definition.body.as_ref().map(|body| &body.preterm), Some(Preterm::FuncOf { .. })));
	}

	#[test]
	fn if_desugars_to_a_trailing_wildcard_branch() {
		let (module, _) = parse_str("def x : Int = if 0 is 0 then 1 else 2;");
		let Some(Preterm::If { branches, .. }) = module.definitions[0].body.as_ref().map(|body| &body.preterm) else {
			panic!("expected an if")
		};
		assert!(matches!(branches[1].0.kind, PatternKind::Drop));
	}

	#[test]
	fn ranges_are_byte_offsets() {
		let (module, _) = parse_str("def x : Int = 42;");
		let Some(body) = &module.definitions[0].body else { panic!("expected a body") };
		assert_eq!(body.range, Range::new(14, 16));
	}
}

use std::str::Chars;

use crate::common::{Annotation, Repr};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Token {
	Whitespace,
	Keyword(Keyword),
	Annotation(Annotation),
	Tag(Repr),
	Identifier,
	Number,
	String,
	LowDash,
	Amp,
	Dollar,
	Pipe,
	Colon,
	Semi,
	Period,
	Comma,
	Equal,
	Slash,
	ParenL,
	ParenR,
	SquareL,
	SquareR,
	CurlyL,
	CurlyR,
	Ast,
	Tick,
	Arrow,
	FatArrow,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Keyword {
	Import,
	Def,
	Builtin,
	Export,
	Const,
	Test,

	Let,
	If,
	Is,
	Then,
	Else,
	Match,
	Func,
	Proc,
	Command,

	True,
	False,
	Bytes,
	Ints,
	Longs,

	// Type formers.
	Tag,
	Type,
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
	List,
	Compound,
	Point,
	Union,
	Code,
	Path,
}

pub struct LexError(pub usize, pub LexErrorKind);

pub enum LexErrorKind {
	UnrecognizedLexemePrefix,
	UnexpectedCharacter(&'static [char]),
	UnexpectedEnd(&'static [char]),
	InvalidAnnotation,
	InvalidTag,
}

struct Scanner<'s> {
	len: usize,
	chars: Chars<'s>,
}

impl<'s> Scanner<'s> {
	pub fn new(source: &'s str) -> Self { Self { len: source.len(), chars: source.chars() } }

	pub fn position(&self) -> usize { self.len - self.chars.as_str().len() }

	pub fn next(&mut self) -> Option<(char, usize)> {
		let position = self.position();
		Some((self.chars.next()?, position))
	}

	pub fn pop(&mut self) -> Option<char> { self.chars.next() }

	pub fn peek(&self) -> Option<char> { self.chars.clone().next() }

	pub fn peek_second(&self) -> Option<char> {
		let mut chars = self.chars.clone();
		chars.next();
		chars.next()
	}

	fn skip_while(&mut self, predicate: impl Fn(char) -> bool) {
		while self.peek().is_some_and(&predicate) {
			self.pop();
		}
	}
}

pub struct LexedSource {
	pub tokens: Box<[Token]>,
	pub ranges: Box<[(usize, usize)]>,
}

impl LexedSource {
	fn keyword_or_identifier(string: &str) -> Token {
		use self::Keyword::*;
		Token::Keyword(match string {
			"import" => Import,
			"def" => Def,
			"builtin" => Builtin,
			"export" => Export,
			"const" => Const,
			"test" => Test,

			"let" => Let,
			"if" => If,
			"is" => Is,
			"then" => Then,
			"else" => Else,
			"match" => Match,
			"func" => Func,
			"proc" => Proc,
			"command" => Command,

			"true" => True,
			"false" => False,
			"bytes" => Bytes,
			"ints" => Ints,
			"longs" => Longs,

			"Tag" => Tag,
			"Type" => Type,
			"Unit" => Unit,
			"Bool" => Bool,
			"Byte" => Byte,
			"Short" => Short,
			"Int" => Int,
			"Long" => Long,
			"Float" => Float,
			"Double" => Double,
			"String" => String,
			"ByteArray" => ByteArray,
			"IntArray" => IntArray,
			"LongArray" => LongArray,
			"List" => List,
			"Compound" => Compound,
			"Point" => Point,
			"Union" => Union,
			"Code" => Code,
			"Path" => Path,

			_ => return Token::Identifier,
		})
	}

	pub fn new(source: &str) -> Result<Self, LexError> {
		use LexErrorKind::*;
		use Token::*;
		let mut scanner = Scanner::new(source);
		let mut tokens = Vec::new();
		let mut ranges = Vec::new();
		while let Some((initial, start)) = scanner.next() {
			let token = match initial {
				' ' | '\n' | '\r' | '\t' => {
					scanner.skip_while(|c| matches!(c, ' ' | '\n' | '\r' | '\t'));
					Whitespace
				}
				'%' => {
					while let Some(c) = scanner.pop() {
						if c == '\n' {
							break;
						}
					}
					Whitespace
				}
				'a'..='z' | 'A'..='Z' => {
					scanner.skip_while(|c| c.is_ascii_alphanumeric() || c == '_');
					Self::keyword_or_identifier(&source[start..scanner.position()])
				}
				'0'..='9' => Self::number(&mut scanner, tokens.last() == Some(&Period)),
				'-' => match scanner.peek() {
					Some('>') => {
						scanner.pop();
						Arrow
					}
					Some('0'..='9') => Self::number(&mut scanner, false),
					Some(_) => return Err(LexError(scanner.position(), UnexpectedCharacter(&['>']))),
					None => return Err(LexError(scanner.position(), UnexpectedEnd(&['>']))),
				},
				'"' => loop {
					match scanner.pop() {
						Some('"') => break String,
						Some('\\') => {
							const EXPECTED: [char; 4] = ['"', '\\', 'n', 't'];
							match scanner.pop() {
								Some('"' | '\\' | 'n' | 't') => (),
								Some(_) =>
									return Err(LexError(scanner.position() - 1, UnexpectedCharacter(&EXPECTED))),
								None => return Err(LexError(scanner.position(), UnexpectedEnd(&EXPECTED))),
							}
						}
						Some(_) => (),
						None => return Err(LexError(scanner.position(), UnexpectedEnd(&['"']))),
					}
				},
				'@' => {
					scanner.skip_while(|c| c.is_ascii_alphabetic());
					crate::common::Annotation::from_name(&source[start + 1..scanner.position()])
						.map(Token::Annotation)
						.ok_or(LexError(start, InvalidAnnotation))?
				}
				'#' => {
					scanner.skip_while(|c| c.is_ascii_alphabetic() || c == '_');
					Repr::from_name(&source[start + 1..scanner.position()]).map(Tag).ok_or(LexError(start, InvalidTag))?
				}
				'=' =>
					if let Some('>') = scanner.peek() {
						scanner.pop();
						FatArrow
					} else {
						Equal
					},
				'_' => LowDash,
				'&' => Amp,
				'$' => Dollar,
				'|' => Pipe,
				':' => Colon,
				';' => Semi,
				'.' => Period,
				',' => Comma,
				'/' => Slash,
				'(' => ParenL,
				')' => ParenR,
				'[' => SquareL,
				']' => SquareR,
				'{' => CurlyL,
				'}' => CurlyR,
				'*' => Ast,
				'`' => Tick,
				_ => return Err(LexError(start, UnrecognizedLexemePrefix)),
			};
			tokens.push(token);
			ranges.push((start, scanner.position()));
		}

		debug_assert!(tokens.len() == ranges.len());
		Ok(Self { tokens: tokens.into_boxed_slice(), ranges: ranges.into_boxed_slice() })
	}

	// Numbers directly after a period are projection indices and never take a fractional part.
	fn number(scanner: &mut Scanner, is_index: bool) -> Token {
		scanner.skip_while(|c| c.is_ascii_digit());
		if !is_index && scanner.peek() == Some('.') && scanner.peek_second().is_some_and(|c| c.is_ascii_digit()) {
			scanner.pop();
			scanner.skip_while(|c| c.is_ascii_digit());
		}
		if let Some('b' | 's' | 'l' | 'f' | 'd') = scanner.peek() {
			scanner.pop();
		}
		Token::Number
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lex(source: &str) -> Vec<Token> {
		let Ok(lexed) = LexedSource::new(source) else { panic!("failed to lex {source:?}") };
		lexed.tokens.iter().copied().filter(|token| *token != Token::Whitespace).collect()
	}

	#[test]
	fn lexes_numbers_with_suffixes() {
		assert_eq!(lex("1b -2 3.5f 4l"), [Token::Number; 4]);
	}

	#[test]
	fn projection_indices_are_not_fractions() {
		assert_eq!(lex("x.0.1"), [Token::Identifier, Token::Period, Token::Number, Token::Period, Token::Number]);
	}

	#[test]
	fn lexes_tags_and_annotations() {
		assert_eq!(lex("@deprecated #int"), [Token::Annotation(Annotation::Deprecated), Token::Tag(Repr::Int)]);
		assert!(LexedSource::new("#nope").is_err());
	}

	#[test]
	fn rejects_unterminated_strings() {
		assert!(matches!(LexedSource::new("\"abc"), Err(LexError(4, LexErrorKind::UnexpectedEnd(_)))));
	}
}

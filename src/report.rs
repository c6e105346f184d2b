use lasso::Resolver;
use peg::error::ParseError;

use crate::{
	common::Range,
	ir::{
		diagnostic::{Diagnostic, Severity},
		source::{LexError, LexErrorKind, LexedSource},
	},
	op::resolve::{ResolveError, ResolveErrorKind},
};

pub fn report_lex_error(source: &str, error: LexError) {
	let LexError(location, _) = error;
	report_line_error(source, "error", Range::new(location, location + 1), &format_lex_error(source, error))
}

pub fn report_parse_error(source: &str, lexed_source: &LexedSource, error: ParseError<usize>) {
	let (start, end) = lexed_source.ranges.get(error.location).copied().unwrap_or((source.len(), source.len() + 1));
	report_line_error(
		source,
		"error",
		Range::new(start, end),
		&format!("parse error: expected one of: {:?}", error.expected.tokens().collect::<Vec<_>>()),
	);
}

pub fn report_resolve_error(source: &str, interner: &impl Resolver, ResolveError { range, kind }: ResolveError) {
	let message = match kind {
		ResolveErrorKind::UnboundName(name) => format!("unbound name `{}`", interner.resolve(&name)),
		ResolveErrorKind::UnknownBuiltin(name) => format!("unknown builtin `{}`", interner.resolve(&name)),
		ResolveErrorKind::DuplicateDefinition(name) => format!("duplicate definition `{}`", interner.resolve(&name)),
	};
	report_line_error(source, "error", range, &message);
}

pub fn report_diagnostic(source: &str, interner: &impl Resolver, diagnostic: &Diagnostic) {
	let severity = match diagnostic.severity {
		Severity::Error => "error",
		Severity::Warning => "warning",
	};
	report_line_error(source, severity, diagnostic.range, &diagnostic.message(interner));
}

fn report_line_error(source: &str, severity: &str, range: Range, message: &str) {
	const TAB_WIDTH: usize = 3;
	// SAFETY: Repeated spaces form a valid string.
	const TAB_REPLACEMENT: &str = unsafe { std::str::from_utf8_unchecked(&[b' '; TAB_WIDTH]) };

	let mut lines = source.split_inclusive('\n');
	let mut line_number: usize = 0;
	let mut bytes_left = range.start;
	let (line, bytes_left, width) = loop {
		if let Some(line) = lines.next() {
			line_number += 1;
			if line.len() <= bytes_left {
				bytes_left -= line.len();
			} else {
				// Ranges spanning several lines are underlined up to the end of their first line.
				let width = (range.end - range.start).min(line.trim_end().len().saturating_sub(bytes_left)).max(1);
				break (line, bytes_left, width);
			}
		} else {
			let (i, last) = source.split('\n').enumerate().last().unwrap_or((0, ""));
			line_number = i + 1;
			break (last, last.len(), 1);
		}
	};

	print!("[{}:{}] ", line_number, bytes_left);
	println!("{severity}: {message}");

	let visual_line = line.replace('\t', TAB_REPLACEMENT).trim_end().to_owned();
	let visual_offset: usize = unicode_width::UnicodeWidthStr::width(
		line.get(0..bytes_left).unwrap_or(line).replace('\t', TAB_REPLACEMENT).as_str(),
	);

	let displayed_line_number = line_number.to_string();
	let dummy_line_number = " ".repeat(displayed_line_number.len());
	println!("{} |", dummy_line_number);
	println!("{} | {}", displayed_line_number, visual_line);
	println!("{} | {}{}", dummy_line_number, " ".repeat(visual_offset), "^".repeat(width));
}

fn format_lex_error(source: &str, LexError(location, kind): LexError) -> String {
	fn char_list_string(chars: &[char]) -> String {
		chars.iter().map(|c| format!("`{c}`")).collect::<Vec<_>>().join(", ")
	}

	let found = match source.get(location..).and_then(|rest| rest.chars().next()) {
		Some(c) => format!("`{}`", c.escape_default()),
		None => "end of input".to_owned(),
	};
	match kind {
		LexErrorKind::UnrecognizedLexemePrefix => format!("lex error: unrecognized lexeme prefix {found}"),
		LexErrorKind::UnexpectedCharacter(expected) =>
			format!("lex error: expected one of {}; found {found}", char_list_string(expected)),
		LexErrorKind::UnexpectedEnd(expected) =>
			format!("lex error: expected one of {}; found end of input", char_list_string(expected)),
		LexErrorKind::InvalidAnnotation => "lex error: unknown annotation".to_owned(),
		LexErrorKind::InvalidTag => "lex error: unknown representation tag".to_owned(),
	}
}

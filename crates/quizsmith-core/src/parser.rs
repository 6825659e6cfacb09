//! Model response parser.
//!
//! Turns the free-form text a model returns into numbered question bodies,
//! per-question options and an answer key aligned to the requested count.
//!
//! Only the absence of the answer key marker is fatal. Everything else
//! degrades: a question without four options is kept but marked invalid,
//! and an ordinal without an answer line gets an unknown key entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QuizError;
use crate::model::{AnswerKey, OptionLabel, Question};

/// Separates the question segment from the answer segment.
pub const ANSWER_KEY_MARKER: &str = "Answer Key:";

/// A numbered question block before option extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQuestion {
    pub number: u32,
    pub body: String,
}

/// Structure recovered from a response, before reconciliation.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    /// Question blocks in order of appearance.
    pub questions: Vec<RawQuestion>,
    /// Ordinal to correct label. Later lines override earlier ones.
    pub answers: BTreeMap<u32, OptionLabel>,
}

/// Questions and key reconciled to exactly the requested count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedQuiz {
    pub questions: Vec<Question>,
    pub answer_key: AnswerKey,
}

/// Parse `raw` and reconcile it to `expected` questions.
///
/// The result always has `expected` questions and `expected` key entries.
pub fn parse_quiz(raw: &str, expected: usize) -> Result<ParsedQuiz, QuizError> {
    let parsed = parse_response(raw)?;

    let questions = reconcile_questions(expected, &parsed.questions);
    let answer_key = reconcile_answer_key(expected, &parsed.answers);

    let invalid = questions.iter().filter(|q| !q.is_valid()).count();
    if invalid > 0 || !answer_key.is_complete() {
        tracing::warn!(
            expected,
            parsed_questions = parsed.questions.len(),
            parsed_answers = parsed.answers.len(),
            invalid_questions = invalid,
            unknown_answers = answer_key.unknown_count(),
            "model response only partially matched the quiz layout"
        );
    }

    Ok(ParsedQuiz {
        questions,
        answer_key,
    })
}

/// Split a response into question blocks and an answer map.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, QuizError> {
    let Some((question_part, answer_part)) = raw.split_once(ANSWER_KEY_MARKER) else {
        return Err(QuizError::MalformedResponse(format!(
            "missing '{ANSWER_KEY_MARKER}' marker"
        )));
    };

    let questions = split_questions(question_part);
    let answers = parse_answer_key(answer_part);
    tracing::debug!(
        questions = questions.len(),
        answers = answers.len(),
        "split model response"
    );

    Ok(ParsedResponse { questions, answers })
}

// ---------------------------------------------------------------------------
// Question segment
// ---------------------------------------------------------------------------

enum ScanState<'a> {
    SeekingQuestion,
    InQuestion { number: u32, lines: Vec<&'a str> },
}

/// Split the question segment at lines starting with `Q<n>.` or `<n>.`.
///
/// Text before the first numbered line is ignored. Bodies are kept even
/// when their options are malformed.
pub fn split_questions(segment: &str) -> Vec<RawQuestion> {
    let mut blocks = Vec::new();
    let mut state = ScanState::SeekingQuestion;

    for line in segment.lines() {
        if let Some((number, rest)) = question_header(line) {
            if let ScanState::InQuestion { number, lines } = state {
                blocks.push(finish_block(number, &lines));
            }
            state = ScanState::InQuestion {
                number,
                lines: vec![rest],
            };
            continue;
        }

        match &mut state {
            ScanState::InQuestion { lines, .. } => lines.push(line),
            ScanState::SeekingQuestion => {
                if !line.trim().is_empty() {
                    tracing::trace!(line, "skipping text before first question");
                }
            }
        }
    }

    if let ScanState::InQuestion { number, lines } = state {
        blocks.push(finish_block(number, &lines));
    }

    blocks
}

fn finish_block(number: u32, lines: &[&str]) -> RawQuestion {
    RawQuestion {
        number,
        body: lines.join("\n").trim().to_string(),
    }
}

/// Recognise `Q3. text` or `3. text`, returning the ordinal and the rest.
///
/// A digit right after the period ("3.5 billion") is not a header.
fn question_header(line: &str) -> Option<(u32, &str)> {
    let s = line.trim_start();
    let s = s.strip_prefix(['Q', 'q']).unwrap_or(s);
    let (number, rest) = leading_number(s)?;
    let rest = rest.strip_prefix('.')?;
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((number, rest))
}

fn leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let number = s[..end].parse().ok()?;
    Some((number, &s[end..]))
}

// ---------------------------------------------------------------------------
// Answer segment
// ---------------------------------------------------------------------------

/// Collect `<n>. <letter>` lines from the answer segment.
///
/// Accepts an optional `Q` prefix, an optional period and any spacing
/// before a single letter a-d in either case. Duplicate ordinals: the
/// last line wins.
pub fn parse_answer_key(segment: &str) -> BTreeMap<u32, OptionLabel> {
    let mut answers = BTreeMap::new();
    for line in segment.lines() {
        let Some((number, label)) = answer_line(line) else {
            continue;
        };
        if let Some(previous) = answers.insert(number, label) {
            tracing::debug!(number, %previous, %label, "answer repeated, keeping the last");
        }
    }
    answers
}

fn answer_line(line: &str) -> Option<(u32, OptionLabel)> {
    let s = line.trim_start();
    let s = s.strip_prefix(['Q', 'q']).unwrap_or(s);
    let (number, rest) = leading_number(s)?;
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    let rest = rest.trim_start_matches([' ', '\t']);

    let mut chars = rest.chars();
    let label = OptionLabel::from_char(chars.next()?)?;
    if chars.next().is_some_and(|c| c.is_alphanumeric()) {
        // "1. apple" names a word, not a label
        return None;
    }
    Some((number, label))
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Question text and options recovered from one body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedOptions {
    pub text: String,
    pub options: BTreeMap<OptionLabel, String>,
}

/// Extract the `a)`..`d)` options from a question body.
///
/// The primary scan finds labels anywhere in the body; options may span
/// lines. If it finds nothing, a line-by-line scan is tried instead.
///
/// Every line the line scan accepts also opens a primary mark, so the
/// second pass is a safety net: it never changes the result on its own.
pub fn extract_options(body: &str) -> ExtractedOptions {
    let extracted = extract_inline_options(body);
    if !extracted.options.is_empty() {
        return extracted;
    }

    let options = extract_options_by_line(body);
    if options.is_empty() {
        return ExtractedOptions {
            text: body.trim().to_string(),
            options,
        };
    }

    let text = body
        .lines()
        .take_while(|line| line_option(line).is_none())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    ExtractedOptions { text, options }
}

#[derive(Debug, Clone, Copy)]
struct LabelMark {
    label: OptionLabel,
    /// Byte offset where the label (including an opening paren) starts.
    start: usize,
    /// Byte offset where the option text starts.
    text_start: usize,
    at_line_start: bool,
}

fn extract_inline_options(body: &str) -> ExtractedOptions {
    let marks = find_label_marks(body);

    // Prefer labels that open a line when they cover all four options;
    // this keeps "(see part a)" in a question from being read as an option.
    let line_marks: Vec<LabelMark> = marks.iter().copied().filter(|m| m.at_line_start).collect();
    let chosen = if distinct_labels(&line_marks) == OptionLabel::ALL.len() {
        first_per_label(&line_marks)
    } else {
        first_per_label(&marks)
    };

    let Some(first) = chosen.first() else {
        return ExtractedOptions::default();
    };

    let mut options = BTreeMap::new();
    for (i, mark) in chosen.iter().enumerate() {
        let end = chosen.get(i + 1).map(|m| m.start).unwrap_or(body.len());
        options.insert(mark.label, body[mark.text_start..end].trim().to_string());
    }

    ExtractedOptions {
        text: body[..first.start].trim().to_string(),
        options,
    }
}

fn find_label_marks(body: &str) -> Vec<LabelMark> {
    let bytes = body.as_bytes();
    let mut marks = Vec::new();

    for (i, c) in body.char_indices() {
        let Some(label) = OptionLabel::from_char(c) else {
            continue;
        };
        if bytes.get(i + 1) != Some(&b')') {
            continue;
        }

        let prefix = &body[..i];
        let prev = prefix.chars().next_back();
        let start = match prev {
            None => i,
            Some(p) if p.is_whitespace() => i,
            Some('(') => i - 1,
            Some(_) => continue,
        };
        let before_label = prefix[..start].trim_end_matches([' ', '\t']);
        let at_line_start = before_label.is_empty() || before_label.ends_with('\n');

        marks.push(LabelMark {
            label,
            start,
            text_start: i + 2,
            at_line_start,
        });
    }

    marks
}

fn distinct_labels(marks: &[LabelMark]) -> usize {
    let mut seen: Vec<OptionLabel> = marks.iter().map(|m| m.label).collect();
    seen.sort();
    seen.dedup();
    seen.len()
}

/// Keep the first mark for each label, in body order.
fn first_per_label(marks: &[LabelMark]) -> Vec<LabelMark> {
    let mut kept: Vec<LabelMark> = Vec::new();
    for mark in marks {
        if !kept.iter().any(|k| k.label == mark.label) {
            kept.push(*mark);
        }
    }
    kept
}

/// Line-by-line scan for lines beginning with exactly `a)`, `b)`, `c)` or `d)`.
pub fn extract_options_by_line(body: &str) -> BTreeMap<OptionLabel, String> {
    let mut options = BTreeMap::new();
    for line in body.lines() {
        if let Some((label, text)) = line_option(line) {
            options.entry(label).or_insert_with(|| text.to_string());
        }
    }
    options
}

fn line_option(line: &str) -> Option<(OptionLabel, &str)> {
    let label = match line.get(..2)? {
        "a)" => OptionLabel::A,
        "b)" => OptionLabel::B,
        "c)" => OptionLabel::C,
        "d)" => OptionLabel::D,
        _ => return None,
    };
    Some((label, line[2..].trim()))
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Align answers to ordinals `1..=expected`, marking gaps as unknown.
///
/// The key is always exactly `expected` long. Ordinals outside the range
/// are dropped.
pub fn reconcile_answer_key(expected: usize, answers: &BTreeMap<u32, OptionLabel>) -> AnswerKey {
    let out_of_range = answers
        .keys()
        .filter(|n| **n == 0 || **n as usize > expected)
        .count();
    if out_of_range > 0 {
        tracing::warn!(out_of_range, expected, "dropping answers outside the requested range");
    }

    let entries = (1..=expected)
        .map(|n| answers.get(&(n as u32)).copied())
        .collect();
    AnswerKey::new(entries)
}

/// Align question blocks to ordinals `1..=expected`.
///
/// The first block carrying an ordinal wins. Ordinals with no block become
/// empty invalid questions so later ordinals never shift.
pub fn reconcile_questions(expected: usize, raw: &[RawQuestion]) -> Vec<Question> {
    let mut by_number: BTreeMap<u32, &RawQuestion> = BTreeMap::new();
    let mut dropped = 0usize;
    for block in raw {
        if block.number == 0 || block.number as usize > expected {
            dropped += 1;
            continue;
        }
        if by_number.contains_key(&block.number) {
            tracing::debug!(number = block.number, "duplicate question ordinal, keeping the first");
            continue;
        }
        by_number.insert(block.number, block);
    }
    if dropped > 0 {
        tracing::warn!(dropped, expected, "truncating questions beyond the requested count");
    }

    (1..=expected as u32)
        .map(|n| match by_number.get(&n) {
            Some(block) => {
                let extracted = extract_options(&block.body);
                Question {
                    number: n,
                    text: extracted.text,
                    options: extracted.options,
                }
            }
            None => Question::missing(n),
        })
        .collect()
}

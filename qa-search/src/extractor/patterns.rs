//! Line-oriented Q/A marker recognition.
//!
//! Each [`PatternKind`] is a pure function from text to pairs. The kinds are
//! tried in [`PRIORITY`] order and the first one that yields anything wins, so
//! a document written with `Q1:`/`A1:` is never re-read as `Q:`/`A:`.
//!
//! Within one kind a question marker opens a pair, plain lines continue
//! whichever side is open, and the next question marker closes it. Once an
//! answer is open, answer-like lines (`a. SAML`, `b. OIDC`) are part of it. A
//! question that never receives an answer is dropped.

use crate::record::ExtractionPattern;
use lazy_static::lazy_static;
use regex::Regex;

/// A matched question/answer pair before it is tied to a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPair {
    pub question: String,
    pub answer: String,
    pub pattern: ExtractionPattern,
}

/// Statically declared marker families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    NumberedMarker,
    ColonMarker,
    JapaneseBracket,
    JapaneseColon,
}

/// Order in which marker families are attempted.
pub const PRIORITY: [PatternKind; 4] = [
    PatternKind::NumberedMarker,
    PatternKind::ColonMarker,
    PatternKind::JapaneseBracket,
    PatternKind::JapaneseColon,
];

/// Minimum paragraph length (chars) for the paragraph fallback.
const PARAGRAPH_MIN_CHARS: usize = 50;

struct MarkerSet {
    /// Question marker at line start; group 1 is the remaining text
    question: Regex,
    /// Answer marker at line start; group 1 is the remaining text
    answer: Regex,
    /// Answer marker embedded in a question line ("Q: x A: y")
    inline_answer: Regex,
}

impl MarkerSet {
    fn new(question: &str, answer: &str, inline_answer: &str) -> Self {
        Self {
            question: Regex::new(question).expect("valid question marker regex"),
            answer: Regex::new(answer).expect("valid answer marker regex"),
            inline_answer: Regex::new(inline_answer).expect("valid inline answer regex"),
        }
    }

    /// Whether the next marker line in `rest` is an answer marker.
    fn answer_follows(&self, rest: &[&str]) -> bool {
        rest.iter()
            .find(|line| self.question.is_match(line) || self.answer.is_match(line))
            .is_some_and(|line| !self.question.is_match(line))
    }
}

lazy_static! {
    static ref NUMBERED: MarkerSet = MarkerSet::new(
        r"^\s*[QqＱｑ]\s*[0-9０-９]+\s*[.:：．]\s*(.*)$",
        r"^\s*[AaＡａ]\s*[0-9０-９]+\s*[.:：．]\s*(.*)$",
        r"\s[AaＡａ]\s*[0-9０-９]+\s*[:：]\s*",
    );
    static ref COLON: MarkerSet = MarkerSet::new(
        r"^\s*[QqＱｑ]\s*[.:：．]\s*(.*)$",
        r"^\s*[AaＡａ]\s*[.:：．]\s*(.*)$",
        r"\s[AaＡａ][:：]\s*",
    );
    static ref BRACKET: MarkerSet = MarkerSet::new(
        r"^\s*【質問】\s*(.*)$",
        r"^\s*【回答】\s*(.*)$",
        r"【回答】\s*",
    );
    static ref JAPANESE_COLON: MarkerSet = MarkerSet::new(
        r"^\s*質問\s*[:：]\s*(.*)$",
        r"^\s*回答\s*[:：]\s*(.*)$",
        r"\s回答\s*[:：]\s*",
    );
}

impl PatternKind {
    pub fn extraction_pattern(&self) -> ExtractionPattern {
        match self {
            PatternKind::NumberedMarker => ExtractionPattern::NumberedMarker,
            PatternKind::ColonMarker => ExtractionPattern::ColonMarker,
            PatternKind::JapaneseBracket => ExtractionPattern::JapaneseBracket,
            PatternKind::JapaneseColon => ExtractionPattern::JapaneseColon,
        }
    }

    fn markers(&self) -> &'static MarkerSet {
        match self {
            PatternKind::NumberedMarker => &NUMBERED,
            PatternKind::ColonMarker => &COLON,
            PatternKind::JapaneseBracket => &BRACKET,
            PatternKind::JapaneseColon => &JAPANESE_COLON,
        }
    }

    /// Scan `text` for this marker family only.
    pub fn extract(&self, text: &str) -> Vec<ExtractedPair> {
        let markers = self.markers();
        let mut scan = PairScan::new(self.extraction_pattern());
        let lines: Vec<&str> = text.lines().collect();

        for (i, line) in lines.iter().copied().enumerate() {
            if let Some(caps) = markers.question.captures(line) {
                let rest = caps.get(1).map_or("", |m| m.as_str());
                // "Q: plan A: or B?" followed by its own answer line is one question
                let inline = markers
                    .inline_answer
                    .find(rest)
                    .filter(|_| !markers.answer_follows(&lines[i + 1..]));
                match inline {
                    Some(m) => scan.open_answered(&rest[..m.start()], &rest[m.end()..]),
                    None => scan.open_question(rest),
                }
            } else if let Some(caps) = markers.answer.captures(line) {
                scan.open_answer(caps.get(1).map_or("", |m| m.as_str()), line);
            } else {
                scan.continue_with(line);
            }
        }

        scan.finish()
    }
}

enum ScanState {
    Idle,
    Question(String),
    Answer { question: String, answer: String },
}

struct PairScan {
    pattern: ExtractionPattern,
    state: ScanState,
    pairs: Vec<ExtractedPair>,
}

impl PairScan {
    fn new(pattern: ExtractionPattern) -> Self {
        Self {
            pattern,
            state: ScanState::Idle,
            pairs: Vec::new(),
        }
    }

    fn open_question(&mut self, text: &str) {
        self.close();
        self.state = ScanState::Question(text.to_string());
    }

    fn open_answered(&mut self, question: &str, answer: &str) {
        self.close();
        self.state = ScanState::Answer {
            question: question.to_string(),
            answer: answer.to_string(),
        };
    }

    /// `text` is the marker's remainder, `line` the whole line.
    fn open_answer(&mut self, text: &str, line: &str) {
        match std::mem::replace(&mut self.state, ScanState::Idle) {
            ScanState::Question(question) => {
                self.state = ScanState::Answer {
                    question,
                    answer: text.to_string(),
                };
            }
            ScanState::Answer { question, mut answer } => {
                // Only a question marker ends an answer; lettered list items stay in it
                push_line(&mut answer, line);
                self.state = ScanState::Answer { question, answer };
            }
            ScanState::Idle => {
                tracing::debug!("ignoring answer marker without a preceding question");
            }
        }
    }

    fn continue_with(&mut self, line: &str) {
        match &mut self.state {
            ScanState::Idle => {}
            ScanState::Question(question) => push_line(question, line),
            ScanState::Answer { answer, .. } => push_line(answer, line),
        }
    }

    fn close(&mut self) {
        match std::mem::replace(&mut self.state, ScanState::Idle) {
            ScanState::Idle => {}
            ScanState::Question(question) => {
                tracing::debug!(
                    question = %question.trim(),
                    "dropping question without an answer"
                );
            }
            ScanState::Answer { question, answer } => {
                let question = question.trim();
                let answer = answer.trim();
                if question.is_empty() || answer.is_empty() {
                    tracing::debug!("dropping pair with an empty side");
                    return;
                }
                self.pairs.push(ExtractedPair {
                    question: question.to_string(),
                    answer: answer.to_string(),
                    pattern: self.pattern,
                });
            }
        }
    }

    fn finish(mut self) -> Vec<ExtractedPair> {
        self.close();
        self.pairs
    }
}

fn push_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line.trim_end());
}

/// Try every marker family in priority order; the first non-empty result wins.
pub fn extract_pairs(text: &str) -> Vec<ExtractedPair> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    for kind in PRIORITY {
        let pairs = kind.extract(text);
        if !pairs.is_empty() {
            tracing::debug!(pattern = %kind.extraction_pattern(), count = pairs.len(), "markers matched");
            return pairs;
        }
    }
    Vec::new()
}

/// Fallback for marker-free text: every long paragraph becomes a pair whose
/// question is a synthetic `"<label> - section N"` title.
pub fn paragraph_pairs(text: &str, label: &str) -> Vec<ExtractedPair> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| p.chars().count() > PARAGRAPH_MIN_CHARS)
        .enumerate()
        .map(|(i, paragraph)| ExtractedPair {
            question: format!("{} - section {}", label, i + 1),
            answer: paragraph.to_string(),
            pattern: ExtractionPattern::Paragraph,
        })
        .collect()
}

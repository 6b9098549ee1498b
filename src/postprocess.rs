//! String-level cleanup of merged page text.
//!
//! Rules run in a fixed order: border runs, pipe spacing, configured
//! substitutions, whitespace, quotes and ellipses, number/unit spacing,
//! dates, numeric separators and finally the optional table markup. With no
//! substitutions configured the whole pass is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::PostprocessConfig;

static BORDER_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\-_=]*[─━═][─━═\-_=]*|[\-_=]{3,}").expect("border run regex is valid")
});
static VERTICAL_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[│┃║]").expect("vertical rule regex is valid"));
static PIPE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|{2,}").expect("pipe run regex is valid"));
static PIPE_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\|[ \t]*").expect("pipe spacing regex is valid"));
static INLINE_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{00A0}\u{3000}\u{000B}\u{000C}]+").expect("inline space regex is valid"));
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("blank run regex is valid"));
static UNIT_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d) +(%|㎡|㎏|㎝|㎜|℃)").expect("unit symbol regex is valid"));
static UNIT_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d) +(원|개|명|회|층|번|세|건|배|점|권|장|cm|mm|km|kg|ml)\b").expect("unit word regex is valid")
});
static KOREAN_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}) *년 *(\d{1,2}) *월 *(\d{1,2}) *일").expect("date regex is valid")
});
static DECIMAL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d) ?\. ?(\d)").expect("decimal regex is valid"));
static THOUSANDS_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}) ?, ?(\d{3})\b").expect("thousands regex is valid"));

/// Look-alike and full-width forms commonly produced by Korean OCR models.
/// Literal replacements: they also rewrite legitimate text containing these
/// characters, which is why they are opt-in.
pub const KOREAN_OCR_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("ㅡㅡ", "--"),
    ("ㆍ", "·"),
    ("ᆞ", "·"),
    ("〃", "\""),
    ("，", ","),
    ("．", "."),
    ("：", ":"),
    ("；", ";"),
    ("（", "("),
    ("）", ")"),
    ("％", "%"),
    ("０", "0"),
    ("１", "1"),
];

impl PostprocessConfig {
    pub fn with_korean_corrections() -> Self {
        Self {
            substitutions: KOREAN_OCR_SUBSTITUTIONS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TextPostprocessor {
    pub cfg: PostprocessConfig,
}

impl TextPostprocessor {
    pub fn new(cfg: PostprocessConfig) -> Self {
        Self { cfg }
    }

    pub fn process(&self, text: &str) -> String {
        let text = normalize_borders(text);
        let text = PIPE_SPACING.replace_all(&text, " | ").into_owned();
        let text = self.apply_substitutions(text);
        let text = normalize_whitespace(&text);
        let text = normalize_quotes(&text);
        let text = attach_units(&text);
        let text = KOREAN_DATE.replace_all(&text, "${1}년 ${2}월 ${3}일").into_owned();
        let text = close_numeric_gaps(text);

        if self.cfg.markdown_tables {
            // Dropped rule lines can leave blank runs and empty cells.
            normalize_whitespace(&to_markdown_tables(&text))
        } else {
            text
        }
    }

    fn apply_substitutions(&self, mut text: String) -> String {
        for (from, to) in &self.cfg.substitutions {
            if !from.is_empty() && text.contains(from.as_str()) {
                text = text.replace(from.as_str(), to);
            }
        }
        text
    }
}

fn normalize_borders(text: &str) -> String {
    let text = BORDER_RUN.replace_all(text, "---");
    let text = VERTICAL_RULE.replace_all(&text, "|");
    PIPE_RUN.replace_all(&text, "|").into_owned()
}

fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = INLINE_SPACE.replace_all(&text, " ");
    let lines: Vec<&str> = text.split('\n').map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}

fn normalize_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => out.push('"'),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{2026}' | '\u{22EF}' => out.push_str("..."),
            _ => out.push(ch),
        }
    }
    out
}

fn attach_units(text: &str) -> String {
    let text = UNIT_SYMBOL.replace_all(text, "${1}${2}");
    UNIT_WORD.replace_all(&text, "${1}${2}").into_owned()
}

/// Repeats until stable so chains like `1 . 2 . 3` close completely.
fn close_numeric_gaps(mut text: String) -> String {
    loop {
        let next = DECIMAL_GAP.replace_all(&text, "${1}.${2}");
        let next = THOUSANDS_GAP.replace_all(&next, "${1},${2}").into_owned();
        if next == text {
            return text;
        }
        text = next;
    }
}

/// Rewrites pipe rows as markdown table rows when the text carries both
/// horizontal rules (`---` lines) and pipe-delimited rows. The rules are
/// dropped and a header separator follows the first row of each table.
fn to_markdown_tables(text: &str) -> String {
    let has_rule = text.lines().any(|l| l.trim() == "---");
    let has_pipes = text.lines().any(|l| l.contains('|'));
    if !has_rule || !has_pipes {
        return text.to_string();
    }

    let mut out: Vec<String> = Vec::new();
    let mut in_table = false;
    for line in text.lines() {
        if line.trim() == "---" {
            continue;
        }
        if !line.contains('|') {
            in_table = false;
            out.push(line.to_string());
            continue;
        }

        let cells: Vec<&str> = line
            .trim()
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        out.push(format!("| {} |", cells.join(" | ")));
        if !in_table {
            let separator = vec!["---"; cells.len()].join(" | ");
            out.push(format!("| {separator} |"));
            in_table = true;
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use quickcheck::{quickcheck, Arbitrary, Gen};

    use super::*;

    fn default_pp() -> TextPostprocessor {
        TextPostprocessor::default()
    }

    #[test]
    fn test_border_runs_and_pipes() {
        let pp = default_pp();
        assert_eq!(pp.process("━━━━━━\n이름│나이"), "---\n이름 | 나이");
        assert_eq!(pp.process("a ||b"), "a | b");
        assert_eq!(pp.process("____"), "---");
    }

    #[test]
    fn test_whitespace_collapse() {
        let pp = default_pp();
        assert_eq!(pp.process("  가   나\t다 \r\n\n\n\n라  "), "가 나 다\n\n라");
        assert_eq!(pp.process("전각\u{3000}공백"), "전각 공백");
    }

    #[test]
    fn test_quotes_and_ellipsis() {
        assert_eq!(default_pp().process("“인용” ‘작은’ 끝…"), "\"인용\" '작은' 끝...");
    }

    #[test]
    fn test_units_attach_to_numbers() {
        let pp = default_pp();
        assert_eq!(pp.process("50 % 증가, 3 개, 1200 원"), "50% 증가, 3개, 1200원");
        assert_eq!(pp.process("20 ㎡ 와 5 kg"), "20㎡ 와 5kg");
        // Not a unit when the syllable starts a longer word.
        assert_eq!(pp.process("3 원화"), "3 원화");
    }

    #[test]
    fn test_date_normalization() {
        assert_eq!(default_pp().process("2024년3월 5 일 시행"), "2024년 3월 5일 시행");
    }

    #[test]
    fn test_numeric_separators() {
        let pp = default_pp();
        assert_eq!(pp.process("3 . 14 와 1 , 000"), "3.14 와 1,000");
        assert_eq!(pp.process("1 . 2 . 3"), "1.2.3");
    }

    #[test]
    fn test_substitutions_not_applied_by_default() {
        let input = "（주）１０％ 할인";
        assert_eq!(default_pp().process(input), input);

        let corrected = TextPostprocessor::new(PostprocessConfig::with_korean_corrections());
        assert_eq!(corrected.process(input), "(주)10% 할인");
    }

    #[test]
    fn test_substitutions_apply_in_order() {
        let cfg = PostprocessConfig {
            substitutions: vec![("ab".into(), "x".into()), ("xc".into(), "y".into())],
            markdown_tables: false,
        };
        assert_eq!(TextPostprocessor::new(cfg).process("abc"), "y");
    }

    #[test]
    fn test_markdown_tables_opt_in() {
        let raw = "제목\n─────\n이름 | 나이\n홍길동 | 30\n─────\n끝";
        assert_eq!(default_pp().process(raw), "제목\n---\n이름 | 나이\n홍길동 | 30\n---\n끝");

        let cfg = PostprocessConfig {
            markdown_tables: true,
            ..PostprocessConfig::default()
        };
        let pp = TextPostprocessor::new(cfg);
        let md = pp.process(raw);
        assert_eq!(md, "제목\n| 이름 | 나이 |\n| --- | --- |\n| 홍길동 | 30 |\n끝");
        assert_eq!(pp.process(&md), md);
    }

    #[test]
    fn test_markdown_needs_rules_and_pipes() {
        let cfg = PostprocessConfig {
            markdown_tables: true,
            ..PostprocessConfig::default()
        };
        assert_eq!(TextPostprocessor::new(cfg).process("a | b\nc | d"), "a | b\nc | d");
    }

    /// Text assembled from fragments that exercise every rule.
    #[derive(Clone, Debug)]
    struct NoisyText(String);

    impl Arbitrary for NoisyText {
        fn arbitrary(g: &mut Gen) -> Self {
            const PIECES: &[&str] = &[
                "한국어", "문서", "abc", "12", "2024", "3", " ", "  ", "\t", "\n", "\n\n\n", "|", "||", "│",
                "━━", "---", "___", "==", "-", "%", "원", "개", "kg", "년", "월", "일", ".", ",", " . ",
                " , ", "“", "”", "‘", "…", "\u{3000}", "\u{00A0}", "원화", "000", "1,2",
            ];
            let len = usize::arbitrary(g) % 24;
            let text = (0..len).filter_map(|_| g.choose(PIECES).copied()).collect::<String>();
            NoisyText(text)
        }
    }

    quickcheck! {
        fn prop_process_is_idempotent(input: NoisyText) -> bool {
            let pp = TextPostprocessor::default();
            let once = pp.process(&input.0);
            pp.process(&once) == once
        }

        fn prop_process_is_idempotent_with_markdown(input: NoisyText) -> bool {
            let pp = TextPostprocessor::new(PostprocessConfig { markdown_tables: true, ..PostprocessConfig::default() });
            let once = pp.process(&input.0);
            pp.process(&once) == once
        }
    }

    #[test]
    fn test_idempotent_on_normalized_corpus() {
        let pp = default_pp();
        let corpus = [
            "2024년 3월 5일 시행",
            "이름 | 나이\n홍길동 | 30",
            "---\n표 제목\n---",
            "가격은 1,000원이며 3.5% 할인",
            "\"인용\" 그리고 '작은 인용'...",
            "첫 문단\n\n둘째 문단",
            "",
        ];
        for text in corpus {
            let once = pp.process(text);
            assert_eq!(once, text);
            assert_eq!(pp.process(&once), once);
        }
    }
}

//! Splits tutor text into what is spoken aloud and what is shown on screen.
//!
//! The tutor is instructed to put translations and pronunciation hints inside
//! `[square brackets]`. Those asides are shown to the learner but never synthesized.

/// One piece of the display channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text outside any bracket span.
    Plain(String),
    /// A bracket span, delimiters included.
    Annotation(String),
}

impl Segment {
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Plain(text) | Segment::Annotation(text) => text,
        }
    }
}

/// Result of splitting one tutor utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedText {
    /// Text for the synthesizer, asides removed.
    pub spoken: String,
    /// Alternating plain/annotated segments covering the whole input.
    pub segments: Vec<Segment>,
}

impl AnnotatedText {
    /// Splits `text`. Brackets do not nest: a span runs from `[` to the first `]`
    /// after it. A `[` without a closing `]` and any stray `]` stay literal.
    pub fn split(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = text;

        while let Some(open) = rest.find('[') {
            let Some(close) = rest[open..].find(']').map(|offset| open + offset) else {
                break;
            };
            if open > 0 {
                segments.push(Segment::Plain(rest[..open].to_string()));
            }
            segments.push(Segment::Annotation(rest[open..=close].to_string()));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Plain(rest.to_string()));
        }

        let has_annotations = segments
            .iter()
            .any(|segment| matches!(segment, Segment::Annotation(_)));
        let spoken = if has_annotations {
            segments
                .iter()
                .filter_map(|segment| match segment {
                    Segment::Plain(text) => Some(text.as_str()),
                    Segment::Annotation(_) => None,
                })
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            text.to_string()
        };

        Self { spoken, segments }
    }

    /// The full text as displayed, asides included.
    pub fn display(&self) -> String {
        self.segments.iter().map(Segment::as_str).collect()
    }

    pub fn annotations(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Annotation(text) => Some(text.as_str()),
            Segment::Plain(_) => None,
        })
    }

    /// True when nothing is left to synthesize, e.g. a turn made only of a translation.
    pub fn is_silent(&self) -> bool {
        self.spoken.trim().is_empty()
    }
}

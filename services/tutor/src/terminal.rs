//! Terminal output for the learner.

use console::style;
use talko_core::{
    annotation::{AnnotatedText, Segment},
    speech::SessionObserver,
};

/// Renders a tutor turn with its bracketed asides highlighted.
pub fn render_annotated(text: &AnnotatedText) -> String {
    text.segments
        .iter()
        .map(|segment| match segment {
            Segment::Plain(text) => text.clone(),
            Segment::Annotation(text) => style(text).magenta().to_string(),
        })
        .collect()
}

pub fn ready_prompt() {
    println!(
        "\n{}",
        style("Press Enter to record your response (or Ctrl+C to finish early):").green()
    );
}

pub fn recording_started() {
    println!("{}", style("Recording... Press Enter or Ctrl+C to stop.").green());
}

pub fn recording_finished(seconds: f32) {
    println!("{}", style(format!("Recording finished ({seconds:.1}s).")).dim());
}

pub fn notice(message: &str) {
    println!("{}", style(message).cyan());
}

pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red(), style(message).red());
}

/// Prints session events to the terminal.
pub struct ConsolePresenter {
    speaker: &'static str,
    session: &'static str,
}

impl ConsolePresenter {
    pub fn for_diagnostic() -> Self {
        Self {
            speaker: "Evaluator",
            session: "Test",
        }
    }

    pub fn for_lesson() -> Self {
        Self {
            speaker: "Tutor",
            session: "Lesson",
        }
    }
}

impl SessionObserver for ConsolePresenter {
    fn inspiration_words(&self, words: &[String; 2]) {
        println!(
            "{}",
            style(format!("Inspiration words: {}, {}", words[0], words[1])).yellow()
        );
    }

    fn topic_reasoning(&self, reasoning: &str) {
        println!("{}", style("Topic generation process:").green());
        println!("{reasoning}");
    }

    fn topic_selected(&self, topic: &str) {
        println!("\n{}", style(format!("Selected topic: {topic}")).green());
    }

    fn tutor_turn(&self, turn: usize, text: &AnnotatedText) {
        println!("\n{}", style(format!("Turn {turn} - {}:", self.speaker)).cyan());
        println!("{}", render_annotated(text));
    }

    fn learner_turn(&self, transcript: &str) {
        println!("\n{} {transcript}", style("You said:").yellow());
    }

    fn session_cancelled(&self) {
        println!(
            "\n{}",
            style(format!("{} terminated early by user.", self.session)).red()
        );
    }

    fn finalizing(&self) {
        println!(
            "\n{}",
            style("Writing lesson summary and updating progress...").cyan()
        );
    }
}

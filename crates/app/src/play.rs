use std::sync::Arc;

use quiz_core::model::OptionId;
use services::{AccessDemand, CurrentEntryView, QuizServiceError, QuizSessionService, SessionContext};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Select(Vec<OptionId>),
    Submit,
    Next,
    Previous,
    Favorite,
    Stats,
    Help,
    Quit,
    End,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let input = match trimmed.to_ascii_lowercase().as_str() {
            // Single letters are option labels, so commands need a full word.
            "submit" => Input::Submit,
            "next" => Input::Next,
            "prev" | "previous" => Input::Previous,
            "fav" | "favorite" => Input::Favorite,
            "stats" => Input::Stats,
            "?" | "help" => Input::Help,
            "quit" => Input::Quit,
            "end" => Input::End,
            _ => parse_selection(trimmed).map_or_else(|| Input::Unknown(trimmed.to_owned()), Input::Select),
        };
        Some(input)
    }
}

/// `"a c"` or `"A,C"` into option ids; `None` unless every token is one letter.
fn parse_selection(raw: &str) -> Option<Vec<OptionId>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            if token.chars().count() == 1 && token.chars().all(|c| c.is_ascii_alphabetic()) {
                token.parse::<OptionId>().ok()
            } else {
                None
            }
        })
        .collect()
}

fn print_help() {
    println!("Commands: <letters> select | submit | next | prev | fav");
    println!("          stats | help | quit (keep session) | end (finish session)");
}

fn render(quiz: &QuizSessionService, view: &CurrentEntryView) {
    let progress = view.progress;
    println!();
    if progress.queued > 0 {
        println!(
            "Question {}/{} ({} ready)",
            progress.position, progress.total, progress.queued
        );
    } else {
        println!("Question {}/{}", progress.position, progress.total);
    }
    let star = if quiz.is_favorite() == Some(true) { " *" } else { "" };
    println!("{}{star}", view.question.prompt());
    for option in view.question.options() {
        let marker = if view.selected_option_ids.contains(&option.id) {
            "[x]"
        } else {
            "[ ]"
        };
        println!("  {marker} {}. {}", option.id, option.text);
    }
    if view.has_submitted {
        render_verdict(view);
    }
}

fn render_verdict(view: &CurrentEntryView) {
    let correct: Vec<String> = view
        .question
        .correct_option_ids()
        .iter()
        .map(ToString::to_string)
        .collect();
    let verdict = if view.is_correct() { "Correct" } else { "Incorrect" };
    println!("{verdict}. Answer: {}", correct.join(", "));
    if let Some(explanation) = view.question.explanation() {
        println!("{explanation}");
    }
}

fn report(err: &QuizServiceError) {
    match err {
        QuizServiceError::AccessDenied(AccessDemand::MoreQuestions) => {
            println!("You reached the free question limit. Sign in to keep practicing.");
        }
        QuizServiceError::AccessDenied(AccessDemand::UpgradePro) => {
            println!("You reached your plan's quota. Upgrade to Pro to keep practicing.");
        }
        other => println!("{other}"),
    }
}

/// Interactive loop over stdin. Returns when the learner quits or input ends.
pub async fn run(
    quiz: Arc<QuizSessionService>,
    context: Option<SessionContext>,
) -> Result<(), Box<dyn std::error::Error>> {
    let view = match context {
        Some(context) => quiz.start(context).await?,
        None => quiz.resume().await?.ok_or(
            "no stored session to resume; pass --session, --subject and --subcategory",
        )?,
    };
    render(&quiz, &view);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(input) = Input::parse(&line) else {
            continue;
        };
        let result = match input {
            Input::Select(selected) => quiz.select_options(selected).await.map(|view| render(&quiz, &view)),
            Input::Submit => quiz.submit().await.map(|outcome| render(&quiz, &outcome.view)),
            Input::Next => quiz.next().await.map(|view| render(&quiz, &view)),
            Input::Previous => quiz.previous().await.map(|view| render(&quiz, &view)),
            Input::Favorite => quiz.toggle_favorite().await.map(|flag| match flag {
                Some(true) => println!("Saved to favorites."),
                Some(false) => println!("Removed from favorites."),
                None => {}
            }),
            Input::Stats => show_stats(&quiz).await,
            Input::Help => {
                print_help();
                Ok(())
            }
            Input::Quit => return Ok(()),
            Input::End => {
                show_stats(&quiz).await.ok();
                quiz.end().await;
                println!("Session finished.");
                return Ok(());
            }
            Input::Unknown(raw) => {
                println!("unknown command: {raw}");
                Ok(())
            }
        };
        if let Err(err) = result {
            report(&err);
        }
    }
    Ok(())
}

async fn show_stats(quiz: &QuizSessionService) -> Result<(), QuizServiceError> {
    let accuracy = quiz.accuracy().await?;
    match accuracy.percent() {
        Some(percent) => println!(
            "{} of {} correct ({percent}%)",
            accuracy.correct_count, accuracy.submitted_count
        ),
        None => println!("No answers submitted yet."),
    }
    if let Some(record) = quiz.session_record() {
        println!("Difficulty: {}", record.difficulty());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_selections() {
        assert_eq!(Input::parse("   "), None);
        assert_eq!(Input::parse("Submit"), Some(Input::Submit));
        assert_eq!(Input::parse("next"), Some(Input::Next));
        assert_eq!(Input::parse("?"), Some(Input::Help));
        assert_eq!(
            Input::parse("a, c"),
            Some(Input::Select(vec![OptionId::new("A"), OptionId::new("C")]))
        );
        assert_eq!(Input::parse("b"), Some(Input::Select(vec![OptionId::new("B")])));
        assert_eq!(Input::parse("ab"), Some(Input::Unknown("ab".into())));
    }

    #[test]
    fn every_letter_selects_an_option() {
        for label in ["f", "h", "n", "p", "q", "S"] {
            assert_eq!(
                Input::parse(label),
                Some(Input::Select(vec![OptionId::new(label.to_ascii_uppercase())]))
            );
        }
    }
}

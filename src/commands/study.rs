//! Interactive terminal study loop
//!
//! Drives a `StudySession` from line-based input. Each word goes through
//! recall (k/f/d) and then spelling. `q` or end of input leaves early.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::engine::models::SelfEvaluation;
use crate::engine::scheduler::level_name;
use crate::engine::session::{SessionError, SessionReport, StudySession};
use crate::storage::WordStore;

/// How the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    Completed,
    Quit,
}

/// Spelling answer that counts as a miss without typing anything
const GIVE_UP: &str = "?";

/// Read one trimmed line; `None` on end of input
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, text: &str) -> Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;
    Ok(read_line(input)?.filter(|answer| !answer.eq_ignore_ascii_case("q")))
}

fn spelled_right(answer: &str, word: &str) -> bool {
    answer.trim().to_lowercase() == word.trim().to_lowercase()
}

/// Run the session until the queue is exhausted or the learner quits
pub fn run_loop<S, R, W>(session: &mut StudySession<S>, mut input: R, mut out: W) -> Result<LoopEnd>
where
    S: WordStore,
    R: BufRead,
    W: Write,
{
    while let Some(item) = session.get_current_item() {
        writeln!(out)?;
        writeln!(
            out,
            "[{}/{}] {}{}",
            item.progress,
            item.total,
            item.word.text,
            if item.is_relapse { "  (again)" } else { "" }
        )?;
        if let Some(phonetic) = &item.word.phonetic {
            writeln!(out, "      {}", phonetic)?;
        }
        if let Some(state) = &item.state {
            writeln!(out, "      level: {}", level_name(state.level))?;
        }

        loop {
            let Some(answer) = prompt(&mut input, &mut out, "Do you know it? [k]now / [f]uzzy / [d]on't know: ")? else {
                return Ok(LoopEnd::Quit);
            };
            let Some(eval) = SelfEvaluation::from_label(&answer) else {
                writeln!(out, "Please answer k, f or d (q to quit)")?;
                continue;
            };
            match session.handle_recall(eval) {
                Ok(_) => break,
                Err(SessionError::Store(e)) => {
                    writeln!(out, "⚠️  Could not read progress: {}. Answer again to retry.", e)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        writeln!(out, "Meaning: {}", item.word.meaning)?;

        let feedback = loop {
            let Some(answer) = prompt(&mut input, &mut out, "Spell it (? to give up): ")? else {
                return Ok(LoopEnd::Quit);
            };
            if answer.is_empty() {
                continue;
            }
            let correct = answer != GIVE_UP && spelled_right(&answer, &item.word.text);
            // A failed save leaves the session on the spelling step
            match session.handle_spell(correct) {
                Ok(feedback) => break feedback,
                Err(SessionError::Store(e)) => {
                    writeln!(out, "⚠️  Could not save progress: {}. Answer again to retry.", e)?;
                }
                Err(e) => return Err(e.into()),
            }
        };

        if feedback.correct {
            writeln!(out, "✅ Correct")?;
        } else {
            writeln!(out, "❌ Correct spelling: {}", feedback.correct_answer)?;
        }
        if feedback.old_level != feedback.new_level {
            writeln!(
                out,
                "   {} → {}",
                level_name(feedback.old_level),
                level_name(feedback.new_level)
            )?;
        }
        if feedback.relapsed {
            writeln!(
                out,
                "   Coming back later this session ({} waiting)",
                session.pending_relapses()
            )?;
        }

        // Copy practice only; the verdict is already recorded
        if !feedback.correct {
            loop {
                let Some(answer) = prompt(&mut input, &mut out, "Type it once more: ")? else {
                    return Ok(LoopEnd::Quit);
                };
                if spelled_right(&answer, &item.word.text) {
                    break;
                }
                writeln!(out, "   Not quite: {}", feedback.correct_answer)?;
            }
        }

        session.advance()?;
    }

    Ok(LoopEnd::Completed)
}

pub fn print_report<W: Write>(out: &mut W, report: &SessionReport) -> Result<()> {
    let stats = &report.stats;
    writeln!(out)?;
    writeln!(out, "Session Report")?;
    writeln!(out, "==============")?;
    writeln!(out, "Mode: {}", report.mode)?;
    writeln!(
        out,
        "Words: {} ({} new, {} review)",
        stats.total_words, stats.new_words, stats.review_words
    )?;
    writeln!(
        out,
        "Spelling: {} correct, {} wrong ({}%)",
        stats.spelling_correct, stats.spelling_wrong, report.spelling_accuracy
    )?;
    writeln!(
        out,
        "Recall: {} know, {} fuzzy, {} don't know",
        stats.self_eval.know, stats.self_eval.fuzzy, stats.self_eval.dont_know
    )?;
    if report.relapse_count > 0 {
        writeln!(out, "Relapses: {}", report.relapse_count)?;
    }
    if report.mastered_new > 0 {
        writeln!(out, "Newly mastered: {}", report.mastered_new)?;
    }
    if let Some(word) = &stats.hardest_word {
        writeln!(out, "Hardest word: {} ({} misses)", word, stats.hardest_word_errors)?;
    }
    writeln!(out, "Duration: {}m {}s", report.duration_secs / 60, report.duration_secs % 60)?;
    Ok(())
}

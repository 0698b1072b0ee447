//! Plain-text blackboard rendering of a lesson.

use crate::domain::model::{BoardContent, BoardKind, Lesson};
use std::fmt::Write;

const DEFAULT_CODE_LANGUAGE: &str = "javascript";

/// 依板書類型排版，接著列出步驟、重點與範例
pub fn render(lesson: &Lesson, show_steps: bool, show_examples: bool) -> String {
    let mut out = String::new();

    if let Some(board) = &lesson.board_content {
        render_board(&mut out, board);
    }

    if show_steps && !lesson.steps.is_empty() {
        section(&mut out, "📝 Steps to Follow:");
        for (i, step) in lesson.steps.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, step);
        }
    }

    if !lesson.key_points.is_empty() {
        section(&mut out, "💡 Key Points:");
        for point in &lesson.key_points {
            let _ = writeln!(out, "  • {}", point);
        }
    }

    if show_examples && !lesson.examples.is_empty() {
        section(&mut out, "🎯 Examples:");
        for (i, example) in lesson.examples.iter().enumerate() {
            let _ = writeln!(out, "  Example {}: {}", i + 1, example);
        }
    }

    out
}

fn render_board(out: &mut String, board: &BoardContent) {
    let content = board.content.as_deref().filter(|c| !c.trim().is_empty());

    match board.kind {
        BoardKind::Formula => {
            if let Some(formula) = board.formula.as_deref().filter(|f| !f.trim().is_empty()) {
                let _ = writeln!(out, "    {}", formula);
            }
        }
        BoardKind::Code => {
            if let Some(code) = content {
                let language = board.language.as_deref().unwrap_or(DEFAULT_CODE_LANGUAGE);
                let _ = writeln!(out, "[{}]", language);
                for line in code.lines() {
                    let _ = writeln!(out, "  {}", line);
                }
            }
        }
        BoardKind::Diagram => {
            if let Some(diagram) = board.diagram.as_deref().filter(|d| !d.trim().is_empty()) {
                let _ = writeln!(out, "📊 Diagram");
                let _ = writeln!(out, "{}", diagram);
            }
        }
        BoardKind::Text => {
            if let Some(text) = content {
                let _ = writeln!(out, "{}", text);
            }
        }
        BoardKind::List => {
            if let Some(items) = content {
                for (i, item) in items.lines().filter(|l| !l.trim().is_empty()).enumerate() {
                    let _ = writeln!(out, "  {}. {}", i + 1, item.trim());
                }
            }
        }
    }
}

fn section(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(title);
    out.push('\n');
}

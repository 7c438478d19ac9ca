mod common;

use anyhow::Result;
use common::{ScriptedSource, WAIT, press, started, type_text};
use crossterm::event::KeyCode;
use pipescope::bus::{Message, ViewId};
use pipescope::coordinator::Coordinator;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;

fn buffer_to_string(buffer: &Buffer) -> String {
    let mut output = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            if let Some(cell) = buffer.cell((x, y)) {
                output.push_str(cell.symbol());
            }
        }
        output.push('\n');
    }
    output
}

fn render(coordinator: &Coordinator) -> Result<String> {
    let mut terminal = Terminal::new(TestBackend::new(100, 20))?;
    terminal.draw(|f| coordinator.draw(f))?;
    Ok(buffer_to_string(terminal.backend().buffer()))
}

#[test]
fn test_listing_renders_rows_status_and_help() -> Result<()> {
    let coordinator = started(ScriptedSource::new());
    let screen = render(&coordinator)?;

    assert!(screen.contains("Pipelines (4/4)"));
    assert!(screen.contains("demo-pipeline"));
    assert!(screen.contains("prod-api"));
    assert!(screen.contains("alice"));
    assert!(screen.contains("CodeBuild"));
    assert!(screen.contains("Path: /pipelines"));
    assert!(screen.contains("quit"));
    Ok(())
}

#[test]
fn test_search_narrows_listing() -> Result<()> {
    let mut coordinator = started(ScriptedSource::new());
    coordinator.handle_key(press(KeyCode::Char('/')));
    type_text(&mut coordinator, "prod");
    assert!(render(&coordinator)?.contains("/prod"));
    coordinator.handle_key(press(KeyCode::Enter));

    let screen = render(&coordinator)?;
    assert!(screen.contains("Pipelines (1/4) [/prod]"));
    assert!(screen.contains("prod-api"));
    assert!(!screen.contains("demo-pipeline"));

    // An empty search clears it
    coordinator.handle_key(press(KeyCode::Char('/')));
    coordinator.handle_key(press(KeyCode::Enter));
    assert!(render(&coordinator)?.contains("Pipelines (4/4)"));
    Ok(())
}

#[test]
fn test_pipeline_view_shows_stages_and_transitions() -> Result<()> {
    let mut coordinator = started(ScriptedSource::new());
    coordinator.handle_key(press(KeyCode::End));
    coordinator.handle_key(press(KeyCode::Enter));
    assert_eq!(coordinator.pump(WAIT), Some("viewUpdate"));

    let screen = render(&coordinator)?;
    assert!(screen.contains("prod-api"));
    assert!(screen.contains("Integration"));
    assert!(screen.contains("-- Transition"));
    assert!(screen.contains("Failed"));
    assert!(screen.contains("Path: /pipelines/prod-api"));
    Ok(())
}

#[test]
fn test_error_banner_replaces_path() -> Result<()> {
    let mut coordinator = started(ScriptedSource::new());
    coordinator.dispatch(Message::error(ViewId::Pipelines, "boom"));

    let screen = render(&coordinator)?;
    assert!(screen.contains("ERROR: boom (press any key to continue)"));
    assert!(!screen.contains("Path: /"));

    coordinator.handle_key(press(KeyCode::Char('j')));
    assert!(render(&coordinator)?.contains("Path: /pipelines"));
    Ok(())
}

#[test]
fn test_full_help_toggle_lists_more_lines() -> Result<()> {
    let mut coordinator = started(ScriptedSource::new());
    let short = render(&coordinator)?;
    coordinator.handle_key(press(KeyCode::Char('?')));
    let full = render(&coordinator)?;

    // Full help wraps the bindings over several lines
    let help_rows = |screen: &str| screen.lines().filter(|l| l.contains(" • ")).count();
    assert_eq!(help_rows(&short), 1);
    assert!(help_rows(&full) > 1);
    Ok(())
}

use crate::core::session::Tab;
use crate::core::view::ResultView;
use crate::display::TableDisplay;
use crate::error::AppError;

/// Interactive full-screen viewer: RAW mode + alternate screen, key-driven
/// page navigation and tab switching over a `ResultView`.
pub struct InteractiveView {
    page_size: usize,
}

impl InteractiveView {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    pub async fn run(
        &self,
        view: &mut ResultView,
        display: &TableDisplay,
    ) -> Result<(), AppError> {
        use crossterm::{
            cursor, event,
            event::{Event, KeyCode, KeyEvent, KeyModifiers},
            execute,
            style::{Color, Print, ResetColor, SetForegroundColor},
            terminal::{
                Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
                enable_raw_mode, size,
            },
        };
        use std::io::{self, Write};

        // RAII cleanup structures
        struct RawModeCleanup;
        impl Drop for RawModeCleanup {
            fn drop(&mut self) {
                let _ = disable_raw_mode();
            }
        }

        struct ScreenCleanup;
        impl Drop for ScreenCleanup {
            fn drop(&mut self) {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
            }
        }

        if enable_raw_mode().is_err() {
            // Fallback when RAW mode fails
            println!("Warning: Could not enable full-screen mode, falling back to simple output");
            println!("{}", display.render_page_strip(view.session()));
            let preview = view.preview_url().await;
            println!("{}", display.render_preview(preview.as_deref()));
            println!("{}", display.render_panel(&view.panel())?);
            return Ok(());
        }

        let _cleanup = RawModeCleanup;
        execute!(io::stdout(), EnterAlternateScreen).ok();
        let _screen_cleanup = ScreenCleanup;

        let (_terminal_width, terminal_height) = size().unwrap_or((80, 24));
        // Reserve 7 lines: header space (4 lines) + prompt space (3 lines)
        let available_height = terminal_height.saturating_sub(7) as usize;
        let available_height = available_height.min(self.page_size.max(1));

        let mut scroll_offset = 0usize;
        let mut status_message: Option<String> = None;
        // Tracks which page the preview URL belongs to; presigned links are
        // re-requested whenever the selection changes, never cached.
        let mut preview_for: Option<usize> = None;
        let mut preview: Option<String> = None;

        loop {
            if preview_for != view.session().selected_index() {
                preview = view.preview_url().await;
                preview_for = view.session().selected_index();
            }

            let panel_output = display.render_panel(&view.panel())?;
            let panel_lines: Vec<&str> = panel_output.lines().collect();

            execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0)).ok();

            let tab_label = match view.session().active_tab() {
                Tab::Aggregated => "Aggregated",
                Tab::PerPage => "Per page",
            };
            execute!(
                io::stdout(),
                SetForegroundColor(Color::Cyan),
                Print(format!(
                    "Task {} | Tab: {}",
                    view.session().task_id().unwrap_or("-"),
                    tab_label
                )),
                ResetColor,
                Print("\r\n"),
                SetForegroundColor(Color::Yellow),
                Print(display.render_page_strip(view.session())),
                ResetColor,
                Print("\r\n"),
                Print(display.render_preview(preview.as_deref())),
                Print("\r\n\r\n")
            )
            .ok();

            let total_lines = panel_lines.len();
            let start_line = scroll_offset.min(total_lines);
            let end_line = (start_line + available_height).min(total_lines);
            for line in &panel_lines[start_line..end_line] {
                println!("{}\r", line);
            }

            execute!(io::stdout(), Clear(ClearType::FromCursorDown)).ok();

            if let Some(message) = &status_message {
                execute!(
                    io::stdout(),
                    cursor::MoveTo(0, terminal_height.saturating_sub(3)),
                    SetForegroundColor(Color::Magenta),
                    Print(message),
                    ResetColor
                )
                .ok();
            }
            execute!(
                io::stdout(),
                cursor::MoveTo(0, terminal_height.saturating_sub(2)),
                SetForegroundColor(Color::Green),
                Print("Controls: n/p=page | g=aggregated | t=per-page | ↑↓/jk=scroll | d=download | q=quit | h=help"),
                ResetColor
            )
            .ok();

            io::stdout().flush().ok();

            if let Ok(Event::Key(KeyEvent {
                code, modifiers, ..
            })) = event::read()
            {
                status_message = None;
                match code {
                    // Exit
                    KeyCode::Char('q') | KeyCode::Char('Q') => break,
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Esc => break,

                    // Page navigation (saturating at both ends)
                    KeyCode::Char('n') | KeyCode::Right => {
                        view.next_page().await;
                        scroll_offset = 0;
                    }
                    KeyCode::Char('p') | KeyCode::Left => {
                        view.prev_page().await;
                        scroll_offset = 0;
                    }
                    KeyCode::Home => {
                        view.select_page(0).await;
                        scroll_offset = 0;
                    }
                    KeyCode::End => {
                        let last = view.session().page_list().len().saturating_sub(1);
                        view.select_page(last).await;
                        scroll_offset = 0;
                    }

                    // Tab switching
                    KeyCode::Char('g') => {
                        view.set_tab(Tab::Aggregated).await;
                        scroll_offset = 0;
                    }
                    KeyCode::Char('t') => {
                        view.set_tab(Tab::PerPage).await;
                        scroll_offset = 0;
                    }

                    // Scroll within the panel
                    KeyCode::Up | KeyCode::Char('k') => {
                        scroll_offset = scroll_offset.saturating_sub(1);
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        let max_offset = total_lines.saturating_sub(available_height);
                        scroll_offset = (scroll_offset + 1).min(max_offset);
                    }
                    KeyCode::PageUp => {
                        scroll_offset = scroll_offset.saturating_sub(available_height);
                    }
                    KeyCode::PageDown => {
                        let max_offset = total_lines.saturating_sub(available_height);
                        scroll_offset = (scroll_offset + available_height).min(max_offset);
                    }

                    // Mapping download for the current tab's scope
                    KeyCode::Char('d') => {
                        status_message = Some(match view.export_mapping().await {
                            Ok(export) => match std::fs::write(&export.file_name, &export.bytes) {
                                Ok(()) => format!("✅ Mapping saved to {}", export.file_name),
                                Err(e) => format!("❌ Could not write mapping file: {}", e),
                            },
                            Err(e) => format!("❌ {}", e.display_friendly()),
                        });
                    }

                    // Show help
                    KeyCode::Char('h') | KeyCode::Char('H') => {
                        execute!(
                            io::stdout(),
                            Clear(ClearType::All),
                            cursor::MoveTo(0, 0),
                            SetForegroundColor(Color::Cyan),
                            Print("Keyboard Navigation Help"),
                            ResetColor,
                            Print("\r\n\r\n"),
                            Print("Page Navigation:\r\n"),
                            Print("  n, →        : Next page\r\n"),
                            Print("  p, ←        : Previous page\r\n"),
                            Print("  Home        : First page\r\n"),
                            Print("  End         : Last page\r\n"),
                            Print("\r\n"),
                            Print("Tabs:\r\n"),
                            Print("  g           : Aggregated records (all pages)\r\n"),
                            Print("  t           : Per-page records (current page)\r\n"),
                            Print("\r\n"),
                            Print("Scroll Controls (within table):\r\n"),
                            Print("  ↑, k        : Scroll up (1 line)\r\n"),
                            Print("  ↓, j        : Scroll down (1 line)\r\n"),
                            Print("  Page Up     : Scroll up (page)\r\n"),
                            Print("  Page Down   : Scroll down (page)\r\n"),
                            Print("\r\n"),
                            Print("Other Controls:\r\n"),
                            Print("  d           : Download mapping (document or current page)\r\n"),
                            Print("  q, Q, Esc   : Quit\r\n"),
                            Print("  Ctrl+C      : Force quit\r\n"),
                            Print("\r\n"),
                            SetForegroundColor(Color::Yellow),
                            Print("Press any key to continue..."),
                            ResetColor
                        )
                        .ok();
                        io::stdout().flush().ok();
                        event::read().ok();
                    }

                    _ => {} // Ignore invalid keys
                }
            }
        }

        Ok(())
    }
}

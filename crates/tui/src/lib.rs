use std::io::{self, Stdout};
use std::path::PathBuf;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use pantry_adapters::export::{export_result, ExportFormat};
use pantry_core::dashboard::{Dashboard, Page};
use pantry_core::query_runner::QueryBackend;
use pantry_core::statement_guard::PlaygroundPolicy;
use pantry_core::view_renderer::RenderedView;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap};
use ratatui::{Frame, Terminal};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

const SCROLL_STEP: isize = 10;
const MAX_COLUMN_WIDTH: u16 = 24;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionKey {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    NextPage,
    PreviousPage,
    JumpTo(usize),
    Submit,
    Reload,
    Navigate(DirectionKey),
    Scroll(isize),
    CycleFilter { forward: bool },
    Export(ExportFormat),
    StartEditing,
    StopEditing,
    Input(char),
    Backspace,
}

struct TuiApp<B: QueryBackend> {
    dashboard: Dashboard<B>,
    runtime: Runtime,
    export_dir: PathBuf,
    show_help: bool,
    should_quit: bool,
    editing: bool,
    scroll: usize,
    status_line: String,
}

impl<B: QueryBackend> TuiApp<B> {
    fn new(dashboard: Dashboard<B>, export_dir: PathBuf) -> Result<Self, TuiError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            dashboard,
            runtime,
            export_dir,
            show_help: false,
            should_quit: false,
            editing: false,
            scroll: 0,
            status_line: "Connecting...".to_string(),
        })
    }

    fn start(&mut self) {
        self.runtime.block_on(self.dashboard.start());
        self.status_line = match self.dashboard.halted_banner() {
            Some(_) => "Session halted; press q to quit".to_string(),
            None => format!("Connected to {}", self.dashboard.config().connection.describe()),
        };
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::NextPage => {
                self.runtime.block_on(self.dashboard.next_page());
                self.page_changed();
            }
            Msg::PreviousPage => {
                self.runtime.block_on(self.dashboard.previous_page());
                self.page_changed();
            }
            Msg::JumpTo(index) => {
                match self.runtime.block_on(self.dashboard.navigate_index(index)) {
                    Ok(()) => self.page_changed(),
                    Err(error) => self.status_line = error.to_string(),
                }
            }
            Msg::Reload => {
                let active = self.dashboard.shell().active();
                if let Err(error) = self.runtime.block_on(self.dashboard.navigate(active)) {
                    self.status_line = error.to_string();
                } else {
                    self.page_changed();
                }
            }
            Msg::Submit => self.submit(),
            Msg::Navigate(direction) => self.navigate(direction),
            Msg::Scroll(delta) => {
                self.scroll = self.scroll.saturating_add_signed(delta);
            }
            Msg::CycleFilter { forward } => {
                self.dashboard.cycle_filter(forward);
                self.scroll = 0;
                self.status_line = match self.dashboard.visible_table().and_then(|t| t.filter) {
                    Some(filter) => format!(
                        "Filter {}: {}",
                        filter.column,
                        filter.options[filter.selected]
                    ),
                    None => "No categorical column to filter on this page".to_string(),
                };
            }
            Msg::Export(format) => self.export(format),
            Msg::StartEditing => {
                if self.dashboard.query_text_mut().is_some() {
                    self.editing = true;
                    self.status_line = "Editing query: Enter runs, Esc stops editing".to_string();
                } else {
                    self.status_line = "Only the SQL playground has an editor".to_string();
                }
            }
            Msg::StopEditing => {
                self.editing = false;
                self.status_line = "Stopped editing".to_string();
            }
            Msg::Input(ch) => {
                if let Some(text) = self.dashboard.query_text_mut() {
                    text.push(ch);
                }
            }
            Msg::Backspace => {
                if let Some(text) = self.dashboard.query_text_mut() {
                    text.pop();
                }
            }
        }
    }

    fn page_changed(&mut self) {
        self.scroll = 0;
        self.editing = false;
        self.status_line = match self.dashboard.halted_banner() {
            Some(_) => "Session halted; press q to quit".to_string(),
            None => self.dashboard.shell().active().heading().to_string(),
        };
    }

    fn submit(&mut self) {
        if !matches!(self.dashboard.page(), Page::Playground(_)) {
            self.status_line = "Nothing to submit on this page".to_string();
            return;
        }
        self.editing = false;
        self.scroll = 0;
        self.runtime.block_on(self.dashboard.run_playground());
        self.status_line = match (self.dashboard.page(), self.dashboard.primary_view()) {
            (Page::Playground(page), _) if page.notice.is_some() => {
                page.notice.clone().unwrap_or_default()
            }
            (_, Some(view)) => view.headline(),
            _ => "Query finished".to_string(),
        };
    }

    /// Up and down pick a table or view on browse pages and scroll rows
    /// everywhere else.
    fn navigate(&mut self, direction: DirectionKey) {
        let delta = match direction {
            DirectionKey::Up => -1,
            DirectionKey::Down => 1,
        };
        if !matches!(self.dashboard.page(), Page::Browse(_)) {
            self.handle(Msg::Scroll(delta));
            return;
        }
        self.runtime.block_on(self.dashboard.move_selection(delta));
        self.scroll = 0;
        if let Some(caption) = self.dashboard.caption() {
            self.status_line = caption;
        }
    }

    fn export(&mut self, format: ExportFormat) {
        let Some(result) = self.dashboard.visible_result() else {
            self.status_line = "Nothing to export on this page".to_string();
            return;
        };
        let stem = self.dashboard.source_label().unwrap_or("export");
        let path = self
            .export_dir
            .join(format!("{stem}.{}", format.extension()));
        self.status_line = match export_result(&path, &result, format) {
            Ok(rows) => format!("Exported {rows} rows to {}", path.display()),
            Err(error) => format!("Export failed: {error}"),
        };
    }
}

/// Takes over the terminal until the user quits.
pub fn run<B: QueryBackend>(dashboard: Dashboard<B>, export_dir: PathBuf) -> Result<(), TuiError> {
    let mut app = TuiApp::new(dashboard, export_dir)?;
    app.start();

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &mut app);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop<B: QueryBackend>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut TuiApp<B>,
) -> Result<(), TuiError> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                if let Some(message) = map_key_event(key, app.editing) {
                    app.handle(message);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn render<B: QueryBackend>(frame: &mut Frame<'_>, app: &TuiApp<B>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);
    render_tabs(frame, chunks[1], app);

    if let Some(banner) = app.dashboard.halted_banner() {
        let halted = Paragraph::new(vec![
            Line::from(Span::styled(
                banner.to_string(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Check the connection settings and restart the dashboard."),
        ])
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Connection"));
        frame.render_widget(halted, chunks[2]);
    } else {
        render_page(frame, chunks[2], app);
    }

    let footer = Paragraph::new(vec![
        Line::from(footer_hint(app)),
        Line::from(format!("Status: {}", app.status_line)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    frame.render_widget(footer, chunks[3]);

    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_header<B: QueryBackend>(frame: &mut Frame<'_>, area: Rect, app: &TuiApp<B>) {
    let config = app.dashboard.config();
    let playground = match config.playground {
        PlaygroundPolicy::Unrestricted => "unrestricted",
        PlaygroundPolicy::ReadOnly => "read-only",
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", app.dashboard.shell().active().heading()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(format!("DB: {}", config.connection.describe())),
        Span::raw(" | "),
        Span::raw(format!("Playground: {playground}")),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(config.title.as_str()),
    );
    frame.render_widget(header, area);
}

fn render_tabs<B: QueryBackend>(frame: &mut Frame<'_>, area: Rect, app: &TuiApp<B>) {
    let shell = app.dashboard.shell();
    let titles = shell
        .destinations()
        .iter()
        .enumerate()
        .map(|(index, destination)| format!("{} {}", index + 1, destination.label()))
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .select(shell.active_index())
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Navigation"));
    frame.render_widget(tabs, area);
}

fn render_page<B: QueryBackend>(frame: &mut Frame<'_>, area: Rect, app: &TuiApp<B>) {
    let caption = app.dashboard.caption().unwrap_or_default();
    match app.dashboard.page() {
        Page::Browse(page) => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(34), Constraint::Min(20)])
                .split(area);

            let names = app
                .dashboard
                .source_names(page.kind)
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let marker = if index == page.selected { ">" } else { " " };
                    Line::from(format!("{marker} {name}"))
                })
                .collect::<Vec<_>>();
            let list = if names.is_empty() {
                vec![Line::from(format!("No {}s configured", page.kind))]
            } else {
                names
            };
            frame.render_widget(
                Paragraph::new(list).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!("Select a {}", page.kind)),
                ),
                columns[0],
            );

            if let Some(view) = app.dashboard.primary_view() {
                render_view(frame, columns[1], &caption, &view, app.scroll);
            }
        }
        Page::Playground(page) => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(5), Constraint::Min(4)])
                .split(area);

            let title = if app.editing {
                "SQL (editing, Enter to run)"
            } else {
                "SQL (press i to edit)"
            };
            let editor_style = if app.editing {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            frame.render_widget(
                Paragraph::new(page.editor.as_str())
                    .wrap(Wrap { trim: false })
                    .style(editor_style)
                    .block(Block::default().borders(Borders::ALL).title(title)),
                rows[0],
            );

            if let Some(notice) = &page.notice {
                frame.render_widget(
                    Paragraph::new(Span::styled(
                        notice.as_str(),
                        Style::default().fg(Color::Yellow),
                    ))
                    .block(Block::default().borders(Borders::ALL)),
                    rows[1],
                );
            } else if let Some(view) = app.dashboard.primary_view() {
                render_view(frame, rows[1], &caption, &view, app.scroll);
            }
        }
        Page::Insights(_) => {
            let sections = app.dashboard.insight_views();
            if sections.is_empty() {
                frame.render_widget(
                    Paragraph::new("No insights configured")
                        .block(Block::default().borders(Borders::ALL)),
                    area,
                );
                return;
            }
            let share = u32::try_from(sections.len()).unwrap_or(1);
            let constraints = vec![Constraint::Ratio(1, share); sections.len()];
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints(constraints)
                .split(area);
            for ((title, view), row) in sections.iter().zip(rows.iter()) {
                render_view(frame, *row, title, view, 0);
            }
        }
        Page::Overview(_) => {
            if let Some(view) = app.dashboard.primary_view() {
                render_view(frame, area, &caption, &view, app.scroll);
            }
        }
    }
}

fn render_view(frame: &mut Frame<'_>, area: Rect, title: &str, view: &RenderedView, scroll: usize) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut summary = Vec::new();
    if !view.metrics().is_empty() {
        summary.push(metrics_line(view));
    }

    match view {
        RenderedView::Failed { .. } => {
            summary.push(Line::from(Span::styled(
                view.headline(),
                Style::default().fg(Color::Red),
            )));
            frame.render_widget(Paragraph::new(summary).wrap(Wrap { trim: false }), inner);
        }
        RenderedView::NoData { notice, .. } => {
            summary.push(Line::from(Span::styled(
                notice.as_str(),
                Style::default().fg(Color::Yellow),
            )));
            frame.render_widget(Paragraph::new(summary).wrap(Wrap { trim: false }), inner);
        }
        RenderedView::Table(table) => {
            if let Some(filter) = &table.filter {
                summary.push(Line::from(format!(
                    "Filter by {}: {}  (f / F to change)",
                    filter.column, filter.options[filter.selected]
                )));
            }
            summary.push(Line::from(view.headline()));

            let height = u16::try_from(summary.len()).unwrap_or(u16::MAX);
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(height), Constraint::Min(1)])
                .split(inner);
            frame.render_widget(Paragraph::new(summary), parts[0]);

            let widths = column_widths(&table.columns, &table.rows);
            let header = Row::new(table.columns.clone()).style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            );
            let rows = table.rows.iter().map(|row| Row::new(row.clone()));
            let widget = Table::new(rows, widths).header(header).column_spacing(2);
            let offset = scroll.min(table.rows.len().saturating_sub(1));
            let mut state = TableState::default().with_offset(offset);
            frame.render_stateful_widget(widget, parts[1], &mut state);
        }
    }
}

fn metrics_line(view: &RenderedView) -> Line<'static> {
    let mut spans = Vec::new();
    for (index, tile) in view.metrics().iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw("  |  "));
        }
        spans.push(Span::raw(format!("{}: ", tile.label)));
        spans.push(Span::styled(
            tile.value.to_string(),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn column_widths(columns: &[String], rows: &[Vec<String>]) -> Vec<Constraint> {
    columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let widest = rows
                .iter()
                .filter_map(|row| row.get(index))
                .map(|value| value.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            let width = u16::try_from(widest).unwrap_or(MAX_COLUMN_WIDTH);
            Constraint::Length(width.clamp(4, MAX_COLUMN_WIDTH))
        })
        .collect()
}

fn footer_hint<B: QueryBackend>(app: &TuiApp<B>) -> String {
    if app.editing {
        return "Type SQL | Enter: run | Backspace: delete | Esc: stop editing".to_string();
    }
    let hint = match app.dashboard.page() {
        Page::Browse(_) => {
            "Tab/Shift+Tab: page | j/k: select | f/F: filter | e/E: export CSV/JSON | ?: help | q: quit"
        }
        Page::Playground(_) => {
            "i: edit | Enter: run | f/F: filter | e/E: export CSV/JSON | ?: help | q: quit"
        }
        Page::Insights(_) => "Tab/Shift+Tab: page | r: reload | ?: help | q: quit",
        Page::Overview(_) => {
            "Tab/Shift+Tab: page | f/F: filter | PgUp/PgDn: scroll | e/E: export | q: quit"
        }
    };
    hint.to_string()
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("q / Ctrl+C: quit"),
        Line::from("?: toggle help"),
        Line::from("Tab or l: next page, Shift+Tab or h: previous page"),
        Line::from("1..9: jump to page"),
        Line::from("r: reload the current page"),
        Line::from("Arrows or j/k: select table or view, scroll elsewhere"),
        Line::from("PgUp / PgDn: scroll rows"),
        Line::from("f / F: next / previous filter value"),
        Line::from("e / E: export visible rows to CSV / JSON"),
        Line::from("i: edit SQL, Enter: run, Esc: stop editing"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"))
    .alignment(Alignment::Left);
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn map_key_event(key: KeyEvent, editing: bool) -> Option<Msg> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Msg::Quit);
    }

    if editing {
        return match key.code {
            KeyCode::Esc => Some(Msg::StopEditing),
            KeyCode::Enter => Some(Msg::Submit),
            KeyCode::Backspace => Some(Msg::Backspace),
            KeyCode::Tab => Some(Msg::Input(' ')),
            KeyCode::Char(ch) => Some(Msg::Input(ch)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') => Some(Msg::Quit),
        KeyCode::Char('?') => Some(Msg::ToggleHelp),
        KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => Some(Msg::NextPage),
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => Some(Msg::PreviousPage),
        KeyCode::Char(digit @ '1'..='9') => digit
            .to_digit(10)
            .and_then(|value| usize::try_from(value).ok())
            .map(|value| Msg::JumpTo(value - 1)),
        KeyCode::Enter => Some(Msg::Submit),
        KeyCode::Char('r') => Some(Msg::Reload),
        KeyCode::Up | KeyCode::Char('k') => Some(Msg::Navigate(DirectionKey::Up)),
        KeyCode::Down | KeyCode::Char('j') => Some(Msg::Navigate(DirectionKey::Down)),
        KeyCode::PageUp => Some(Msg::Scroll(-SCROLL_STEP)),
        KeyCode::PageDown => Some(Msg::Scroll(SCROLL_STEP)),
        KeyCode::Char('f') => Some(Msg::CycleFilter { forward: true }),
        KeyCode::Char('F') => Some(Msg::CycleFilter { forward: false }),
        KeyCode::Char('e') => Some(Msg::Export(ExportFormat::Csv)),
        KeyCode::Char('E') => Some(Msg::Export(ExportFormat::Json)),
        KeyCode::Char('i') => Some(Msg::StartEditing),
        _ => None,
    }
}

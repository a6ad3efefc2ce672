use crate::{
    client::{
        AppSnapshot,
        BetRow,
        Tab,
    },
    leaderboard::RankBadge,
    orchestrator::TxSlot,
};
use color_eyre::eyre::Result;
use crossterm::{
    event::{
        Event,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    NextTab,
    PrevTab,
    SelectNext,
    SelectPrev,
    NextPage,
    PrevPage,
    Act,
    NextToken,
    Refresh,
    Redraw,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    Help,
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // one Terminal for the whole session so buffers diff between draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let mode = state.mode;
        term.draw(|f| ui(f, mode, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Map a raw terminal event onto an app event. Modal keys are consumed
/// here and only surface as `Redraw`.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    match state.mode {
        Mode::QuitModal => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Help => {
            state.mode = Mode::Normal;
            return Some(UserEvent::Redraw);
        }
        Mode::Normal => {}
    }
    Some(match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Char('?') => {
            state.mode = Mode::Help;
            UserEvent::Redraw
        }
        KeyCode::Tab => UserEvent::NextTab,
        KeyCode::BackTab => UserEvent::PrevTab,
        KeyCode::Down | KeyCode::Char('j') => UserEvent::SelectNext,
        KeyCode::Up | KeyCode::Char('k') => UserEvent::SelectPrev,
        KeyCode::Right | KeyCode::Char('l') => UserEvent::NextPage,
        KeyCode::Left | KeyCode::Char('h') => UserEvent::PrevPage,
        KeyCode::Enter => UserEvent::Act,
        KeyCode::Char('t') => UserEvent::NextToken,
        KeyCode::Char('r') => UserEvent::Refresh,
        _ => return None,
    })
}

fn ui(f: &mut Frame, mode: Mode, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // wallet + network
            Constraint::Length(3),  // tabs
            Constraint::Min(10),    // active tab
            Constraint::Length(6),  // transactions
            Constraint::Length(12), // notifications
            Constraint::Length(7),  // status/errors
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_tabs(f, chunks[1], snap);
    match snap.tab {
        Tab::PendingBets => draw_pending(f, chunks[2], snap),
        Tab::AllBets => {
            let title = format!("All Bets ({})", snap.all_bets_range);
            draw_bet_rows(f, chunks[2], &title, &snap.all_bets, snap.empty_message)
        }
        Tab::Leaderboard => draw_leaderboard(f, chunks[2], snap),
        Tab::YourBets => {
            draw_bet_rows(f, chunks[2], "Your Bets", &snap.your_bets, snap.empty_message)
        }
    }
    draw_transactions(f, chunks[3], snap);
    draw_notifications(f, chunks[4], snap);
    draw_bottom(f, chunks[5], snap);
    draw_modals(f, mode);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wallet = snap
        .account
        .clone()
        .unwrap_or_else(|| String::from("not connected (read-only)"));
    let text = format!("Wallet: {} | Network: {}", wallet, snap.network);
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Flip Coin"));
    f.render_widget(widget, area);
}

fn draw_tabs(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let titles: Vec<_> = Tab::ALL.iter().map(|tab| tab.title()).collect();
    let tabs = Tabs::new(titles)
        .select(snap.tab.index())
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn empty_state(f: &mut Frame, area: Rect, title: &str, message: &str) {
    let widget = Paragraph::new(message)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(widget, area);
}

fn draw_pending(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let title = format!("Pending Bets ({})", snap.pending_page);
    if let Some(message) = snap.empty_message {
        empty_state(f, area, &title, message);
        return;
    }
    let header = Row::new(["ID", "Player", "Amount", "Token", "Face", "Timeout", "Left", "Action"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = snap.pending.iter().enumerate().map(|(idx, row)| {
        let action_style = if row.action.is_enabled() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let style = if idx == snap.selected_row {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(row.bet_id.to_string()),
            Cell::from(row.player1.clone()),
            Cell::from(row.amount.clone()),
            Cell::from(row.token.clone()),
            Cell::from(row.face.to_string()),
            Cell::from(row.timeout.clone()),
            Cell::from(row.time_left.clone()),
            Cell::from(Span::styled(row.action.label(), action_style)),
        ])
        .style(style)
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Min(12),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

fn draw_bet_rows(
    f: &mut Frame,
    area: Rect,
    title: &str,
    rows: &[BetRow],
    empty_message: Option<&str>,
) {
    if let Some(message) = empty_message {
        empty_state(f, area, title, message);
        return;
    }
    let header = Row::new(["Player", "Choice", "Outcome", "Profit", "Result"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let body = rows.iter().map(|row| {
        let (result, color) = if row.won {
            ("Won", Color::Green)
        } else {
            ("Lost", Color::Red)
        };
        Row::new(vec![
            Cell::from(row.player.clone()),
            Cell::from(row.choice.to_string()),
            Cell::from(row.outcome.to_string()),
            Cell::from(Span::styled(row.profit.clone(), Style::default().fg(color))),
            Cell::from(Span::styled(result, Style::default().fg(color))),
        ])
    });
    let table = Table::new(
        body,
        [
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Min(6),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(table, area);
}

fn badge_span(badge: RankBadge) -> Span<'static> {
    match badge {
        RankBadge::Gold => Span::styled("#1", Style::default().fg(Color::Yellow)),
        RankBadge::Silver => Span::styled("#2", Style::default().fg(Color::Gray)),
        RankBadge::Bronze => Span::styled("#3", Style::default().fg(Color::LightRed)),
        RankBadge::Position(_) => Span::raw(format!("#{}", badge.position())),
    }
}

fn draw_leaderboard(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let title = match &snap.leaderboard_token {
        Some(symbol) => format!("Payouts Leaderboard: {symbol} (t to switch token)"),
        None => String::from("Payouts Leaderboard"),
    };
    if let Some(message) = snap.empty_message {
        empty_state(f, area, &title, message);
        return;
    }
    let header = Row::new(["Rank", "Token", "Player", "Total Payout"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = snap.leaderboard.iter().map(|row| {
        Row::new(vec![
            Cell::from(badge_span(row.badge)),
            Cell::from(row.token.clone()),
            Cell::from(row.player.clone()),
            Cell::from(row.payout.clone()),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Min(14),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

fn draw_transactions(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = snap
        .transactions
        .iter()
        .map(|tx| {
            let label = match tx.slot {
                TxSlot::Approval => "Approve",
                TxSlot::Join => "Join",
                TxSlot::Cancel => "Cancel",
            };
            Line::from(format!("{label}: {} {}", tx.text, tx.hash))
        })
        .collect();
    if let Some(err) = &snap.last_tx_error {
        lines.push(Line::from(Span::styled(
            format!("Error: {err}"),
            Style::default().fg(Color::Red),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from("No transactions in flight"));
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Transactions"));
    f.render_widget(widget, area);
}

fn draw_notifications(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines: Vec<Line> = if snap.notifications.is_empty() {
        vec![Line::from("No notifications yet")]
    } else {
        snap.notifications
            .iter()
            .map(|n| {
                Line::from(format!("[{}] {} | Payout: {} ETH", n.time, n.message, n.payout))
            })
            .collect()
    };
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Notifications"));
    f.render_widget(widget, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(3)])
        .split(area);

    let status_widget = if snap.errors.is_empty() {
        let text = if snap.status.trim().is_empty() {
            "Ready"
        } else {
            snap.status.as_str()
        };
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, chunks[0]);

    let help = Paragraph::new(
        "Tab switch | ↑/↓ select | ←/→ page | Enter join/cancel | t token | r refresh | ? help | q quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[1]);
}

fn draw_modals(f: &mut Frame, mode: Mode) {
    match mode {
        Mode::Help => {
            let area = centered_rect(60, 50, f.area());
            let block = Block::default().borders(Borders::ALL).title("Help");
            let lines = vec![
                Line::from("Tab / Shift+Tab   switch tabs"),
                Line::from("Up / Down         select a pending bet"),
                Line::from("Left / Right      previous / next page"),
                Line::from("Enter             join, or cancel your expired bet"),
                Line::from("t                 next leaderboard token (or all tokens)"),
                Line::from("r                 refresh from chain and indexer"),
                Line::from("q / Esc           quit"),
                Line::from(""),
                Line::from("Press any key to close"),
            ];
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

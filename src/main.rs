//! panemux - split-pane terminal multiplexer
//!
//! # Quick Start
//!
//! ```text
//! panemux                  # Start with the login shell
//! panemux -s /bin/zsh      # Start with a specific shell
//! panemux -c my.toml       # Use another config file
//! ```
//!
//! # Keybindings (Ctrl+B prefix)
//!
//! | Key | Action |
//! |-----|--------|
//! | % | Split side by side |
//! | " | Split top/bottom |
//! | x | Close pane |
//! | o | Next pane |
//! | 0-9 | Focus pane by number |
//! | a | Ask the assistant for a command |
//! | y / n | Restart / remove an exited pane |
//! | q | Quit |

use std::collections::HashMap;
use std::env;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use panemux::assistant::Suggestion;
use panemux::config::Config;
use panemux::core::pty::PtySpawner;
use panemux::core::session::SessionId;
use panemux::ui::{InputModes, KeyMapper, PassthroughFactory, PrefixCommand, Screen, SharedScreen, Status};
use panemux::wm::{Axis, FocusTarget, Multiplexer, MuxEvent, PaneState, Position};
use panemux::MuxError;

/// Command line options
#[derive(Default)]
struct Args {
    shell: Option<String>,
    config: Option<PathBuf>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest event poll; also the frame cadence
const FRAME: Duration = Duration::from_millis(10);

const PREFIX_HELP: &str = r#"%:split " :split x:close o:next 0-9:focus a:ask q:quit"#;

fn print_version() {
    eprintln!("panemux {}", VERSION);
}

fn print_help() {
    eprintln!("panemux {} - split-pane terminal multiplexer", VERSION);
    eprintln!();
    eprintln!("Usage: panemux [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Shell for new panes (default: login shell)");
    eprintln!("  -c, --config <PATH>   Config file (default: ~/.panemux/config.toml)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keybindings (Ctrl+B prefix, configurable):");
    eprintln!("  Ctrl+B, %             Split pane side by side");
    eprintln!("  Ctrl+B, \"             Split pane top/bottom");
    eprintln!("  Ctrl+B, x             Close pane");
    eprintln!("  Ctrl+B, o             Next pane");
    eprintln!("  Ctrl+B, 0-9           Focus pane by number");
    eprintln!("  Ctrl+B, a             Ask the assistant for a command");
    eprintln!("  Ctrl+B, y / n         Restart / remove an exited pane");
    eprintln!("  Ctrl+B, Ctrl+B        Send Ctrl+B to the pane");
    eprintln!("  Ctrl+B, q             Quit");
    eprintln!();
    eprintln!("Log file: ~/.panemux/panemux.log (level via PANEMUX_LOG)");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-s" | "--shell" => {
                i += 1;
                let shell = args.get(i).ok_or("Missing shell argument")?;
                parsed.shell = Some(shell.clone());
            }
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).ok_or("Missing config path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to `~/.panemux/panemux.log`; nothing is logged if it cannot be opened
fn init_logging(config: &Config) {
    let log_path = Config::log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    else {
        return;
    };

    let filter = EnvFilter::try_from_env("PANEMUX_LOG")
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load(),
    };
    if args.shell.is_some() {
        config.shell = args.shell.clone();
    }

    init_logging(&config);
    info!(version = VERSION, shell = ?config.shell, "panemux starting");

    let (cols, rows) = terminal::size()?;
    info!(cols, rows, "terminal size");
    let screen = Screen::new(Box::new(io::stdout()), cols, rows).shared();
    screen.borrow_mut().enter()?;

    let result = run(&config, &screen);

    if let Err(e) = screen.borrow_mut().leave() {
        warn!(error = %e, "terminal restore failed");
    }
    if let Err(e) = &result {
        error!(error = %e, "panemux failed");
    }
    info!("panemux exiting");
    result
}

/// What keystrokes currently mean
enum Mode {
    Normal,
    Prefix,
    Asking(String),
    Suggesting(Suggestion),
}

struct App {
    mux: Multiplexer,
    screen: SharedScreen,
    mode: Mode,
    prefix: char,
    /// Per-session input modes, tracked from output
    input_modes: HashMap<SessionId, InputModes>,
    /// One-shot message for the status line
    message: Option<String>,
    status_dirty: bool,
    quit: bool,
}

fn run(config: &Config, screen: &SharedScreen) -> anyhow::Result<()> {
    let mux = Multiplexer::new(
        config.mux_options(env::current_dir().ok()),
        Box::new(PtySpawner),
        Box::new(PassthroughFactory::new(Rc::clone(screen))),
        config.translator(),
    );
    let mut app = App {
        mux,
        screen: Rc::clone(screen),
        mode: Mode::Normal,
        prefix: config.prefix_char(),
        input_modes: HashMap::new(),
        message: None,
        status_dirty: true,
        quit: false,
    };
    app.mux.start(Instant::now())?;
    app.run_loop()
}

impl App {
    fn run_loop(&mut self) -> anyhow::Result<()> {
        loop {
            self.drain_events();
            if self.mux.is_finished() {
                info!("last session ended");
                return Ok(());
            }

            let now = Instant::now();
            self.mux.tick(now);
            self.mux.frame(now);

            if self.status_dirty {
                let status = self.status();
                self.screen.borrow_mut().draw_status(&status)?;
                self.status_dirty = false;
            }

            // Wake early for a pending resize timer
            let timeout = self
                .mux
                .next_resize_deadline()
                .map_or(FRAME, |at| at.saturating_duration_since(now).min(FRAME));
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key);
                        self.status_dirty = true;
                    }
                    Event::Resize(cols, rows) => {
                        info!(cols, rows, "window resized");
                        self.screen.borrow_mut().set_size(cols, rows)?;
                        self.mux.window_resized(Instant::now());
                        self.status_dirty = true;
                    }
                    _ => {}
                }
            }

            if self.quit {
                info!("quit requested");
                return Ok(());
            }
        }
    }

    fn drain_events(&mut self) {
        for event in self.mux.pump() {
            match event {
                MuxEvent::SessionOutput { session, data, .. } => {
                    self.input_modes.entry(session).or_default().observe(&data);
                    // Output may have scrolled over the status line
                    self.status_dirty = true;
                }
                MuxEvent::SessionUnexpectedExit { session, pane, reason } => {
                    self.input_modes.remove(&session);
                    let number = pane
                        .and_then(|p| self.mux.layout().pane(p))
                        .map(|p| p.display_number);
                    if let Some(n) = number {
                        self.message = Some(format!("pane {} ended ({:?})", n, reason));
                    }
                    self.status_dirty = true;
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        self.mode = match mode {
            Mode::Normal => self.key_normal(key),
            Mode::Prefix => self.key_prefix(key),
            Mode::Asking(buffer) => self.key_asking(key, buffer),
            Mode::Suggesting(suggestion) => {
                if key.code == KeyCode::Enter && self.mux.accept_suggestion(&suggestion) {
                    info!(command = %suggestion.command, "suggestion typed");
                }
                Mode::Normal
            }
        };
    }

    fn key_normal(&mut self, key: KeyEvent) -> Mode {
        if KeyMapper::is_prefix(&key, self.prefix) {
            self.message = None;
            return Mode::Prefix;
        }
        let modes = self
            .mux
            .session_of(self.mux.active_pane())
            .and_then(|s| self.input_modes.get(&s))
            .cloned()
            .unwrap_or_default();
        if let Some(bytes) = KeyMapper::map(&key, &modes) {
            self.mux.send_bytes_to_active(&bytes);
        }
        Mode::Normal
    }

    fn key_prefix(&mut self, key: KeyEvent) -> Mode {
        let now = Instant::now();
        let Some(command) = KeyMapper::prefix_command(&key, self.prefix) else {
            return Mode::Normal;
        };
        if command == PrefixCommand::Ask {
            return Mode::Asking(String::new());
        }
        let active = self.mux.active_pane();
        let result = match command {
            PrefixCommand::SplitHorizontal => self
                .mux
                .split_active(Axis::Horizontal, Position::After, now)
                .map(|_| ()),
            PrefixCommand::SplitVertical => self
                .mux
                .split_active(Axis::Vertical, Position::After, now)
                .map(|_| ()),
            PrefixCommand::ClosePane => self.mux.close_pane(active, now),
            PrefixCommand::NextPane => {
                self.mux.focus_next(now);
                Ok(())
            }
            PrefixCommand::FocusNumber(n) => {
                self.mux.switch_focus(FocusTarget::Number(n), now).map(|_| ())
            }
            PrefixCommand::Ask => Ok(()),
            PrefixCommand::Quit => {
                self.quit = true;
                Ok(())
            }
            PrefixCommand::Yes => self.mux.respawn_pane(active, now).map(|_| ()),
            PrefixCommand::No => self.mux.remove_dead_pane(active, now),
            PrefixCommand::SendPrefix => {
                let ctrl = (self.prefix as u8) - b'a' + 1;
                self.mux.send_bytes_to_active(&[ctrl]);
                Ok(())
            }
        };
        if let Err(e) = result {
            self.report(e);
        }
        Mode::Normal
    }

    fn key_asking(&mut self, key: KeyEvent, mut buffer: String) -> Mode {
        match key.code {
            KeyCode::Esc => Mode::Normal,
            KeyCode::Enter if buffer.trim().is_empty() => Mode::Normal,
            KeyCode::Enter => Mode::Suggesting(self.mux.request_command(buffer.trim())),
            KeyCode::Backspace => {
                buffer.pop();
                Mode::Asking(buffer)
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                Mode::Asking(buffer)
            }
            _ => Mode::Asking(buffer),
        }
    }

    fn report(&mut self, error: MuxError) {
        warn!(error = %error, "command failed");
        self.message = Some(error.to_string());
    }

    fn status(&self) -> Status {
        let number = self.mux.active_number().unwrap_or(0);
        let base = format!("panemux {} [{}]", self.mux.summary(), number);
        let exited = self.mux.pane_state(self.mux.active_pane()) == Some(PaneState::ExternallyExited);

        match &self.mode {
            Mode::Prefix => Status {
                left: base,
                right: PREFIX_HELP.to_string(),
                highlighted: true,
            },
            Mode::Asking(buffer) => Status {
                left: format!("ask> {}", buffer),
                right: "Enter:ask Esc:cancel".to_string(),
                highlighted: true,
            },
            Mode::Suggesting(s) if s.executable => Status {
                left: if s.explanation.is_empty() {
                    s.command.clone()
                } else {
                    format!("{}  # {}", s.command, s.explanation.replace('\n', " "))
                },
                right: "Enter:type Esc:dismiss".to_string(),
                highlighted: true,
            },
            Mode::Suggesting(s) => Status {
                left: s.explanation.replace('\n', " "),
                right: "any key".to_string(),
                highlighted: true,
            },
            Mode::Normal if exited => Status {
                left: base,
                right: format!("pane exited: Ctrl+{0} y restart, Ctrl+{0} n remove", self.prefix),
                highlighted: true,
            },
            Mode::Normal => Status {
                left: base,
                right: self.message.clone().unwrap_or_default(),
                highlighted: false,
            },
        }
    }
}

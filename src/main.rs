#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use nu_ansi_term::Color;
use omcproxy::config::Settings;
use omcproxy::error::ProxyError;
use omcproxy::parser::parse_expression;
use omcproxy::proxy::{OmcProxy, StderrSink};
use reedline::{
    Prompt, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal,
};
use std::borrow::Cow;
use std::env;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut json_output = false;
    let mut one_shot: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => {
                json_output = true;
                i += 1;
            }
            "-c" if i + 1 < args.len() => {
                one_shot = Some(args[i + 1].clone());
                i += 2;
            }
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("omcsh: unknown argument '{}'", other);
                print_help();
                std::process::exit(2);
            }
        }
    }

    let settings = Settings::from_rc();
    let mut proxy = OmcProxy::new(settings, Box::new(StderrSink));

    // One-shot mode: send the expression and exit with the outcome
    if let Some(expression) = one_shot {
        match send_and_print(&mut proxy, &expression, json_output) {
            Ok(()) => {
                proxy.quit();
                return Ok(());
            }
            Err(error) => exit_fatal(error),
        }
    }

    run_repl(proxy, json_output)
}

/// Colored prompt, dimmed while the compiler session is not yet up
struct OmcPrompt;

impl Prompt for OmcPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Owned(Color::LightBlue.bold().paint("omc> ").to_string())
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

fn run_repl(mut proxy: OmcProxy, json_output: bool) -> Result<()> {
    println!(
        "{} v{} — expressions go straight to the compiler, Ctrl-D exits",
        Color::LightBlue.bold().paint("omcsh"),
        env!("CARGO_PKG_VERSION")
    );

    let mut line_editor = Reedline::create();
    let prompt = OmcPrompt;

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let line = buffer.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(error) = send_and_print(&mut proxy, line, json_output) {
                    exit_fatal(error);
                }
                if line == "quit()" {
                    break;
                }
            }
            Ok(Signal::CtrlC) => continue,
            Ok(Signal::CtrlD) => break,
            Err(error) => {
                if error.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                eprintln!("omcsh: error reading line: {}", error);
                break;
            }
        }
    }

    proxy.quit();
    Ok(())
}

/// Send one raw expression and print its reply
fn send_and_print(
    proxy: &mut OmcProxy,
    expression: &str,
    json_output: bool,
) -> Result<(), ProxyError> {
    proxy.send_command(expression)?;
    let result = proxy.result().to_string();
    if json_output {
        println!("{}", parse_expression(&result).to_json());
    } else if !result.is_empty() {
        println!("{}", result);
    }

    // keep the session's error stream visible after every expression
    if expression != "quit()" {
        let errors = proxy.error_string()?;
        if !errors.is_empty() {
            eprintln!("{}", errors);
        }
    }
    Ok(())
}

/// A lost session cannot be recovered, terminate with the reason
fn exit_fatal(error: ProxyError) -> ! {
    eprintln!("omcsh: {}", error);
    std::process::exit(1);
}

fn print_help() {
    println!("omcsh v{} - Interactive compiler console", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  omcsh                 Start the interactive console");
    println!("  omcsh -c <expr>       Send one expression and exit");
    println!("  omcsh --json          Print replies as JSON");
    println!("  omcsh -h, --help      Show this help message");
    println!();
    println!("Examples:");
    println!("  omcsh -c \"getVersion()\"");
    println!("  omcsh -c \"loadModel(Modelica,{{\\\"default\\\"}})\"");
    println!("  omcsh --json -c \"getClassNames()\"");
    println!();
    println!("Config File:");
    println!("  ~/.omcshrc            OMC_LOCALE, OMC_TMPDIR, OMC_LIBRARY_<Name>,");
    println!("                        OMC_FORCE_DEFAULT_LIBRARIES");
}

//! Built-in action handlers
//!
//! Each handler produces a sentence to speak. Handlers that touch the OS
//! (launching programs, opening a browser) spawn and return immediately.

use std::process::{Command, Stdio};

use anyhow::Context;
use chrono::Local;
use rand::seq::SliceRandom;

use crate::config::ActionsConfig;
use crate::dispatch::ActionRegistry;
use crate::patterns::JOKES;

const QUOTES: &[&str] = &[
    "The only way to do great work is to love what you do. - Steve Jobs",
    "Innovation distinguishes between a leader and a follower. - Steve Jobs",
    "Life is what happens to you while you're busy making other plans. - John Lennon",
    "The future belongs to those who believe in the beauty of their dreams. - Eleanor Roosevelt",
    "It is during our darkest moments that we must focus to see the light. - Aristotle",
];

/// Register every built-in action on `registry`
pub fn register_builtin(registry: &mut ActionRegistry, config: &ActionsConfig) {
    let location = config.default_location.clone();
    let allow_shutdown = config.allow_shutdown;

    registry
        .register_nullary("get_system_info", || Ok(system_info()))
        .register_unary("open_application", open_application)
        .register_nullary("get_weather", move || Ok(weather(&location)))
        .register_unary("web_search", web_search)
        .register_nullary("get_time", || Ok(current_time()))
        .register_nullary("tell_joke", || Ok(pick(JOKES)))
        .register_nullary("get_quote", || Ok(pick(QUOTES)))
        .register_unary("play_music", play_music)
        .register_nullary("shutdown_system", move || shutdown_system(allow_shutdown));
}

fn pick(items: &[&str]) -> String {
    items
        .choose(&mut rand::thread_rng())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn system_info() -> String {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut info = format!(
        "System Status: running {} on {} with {} logical CPUs",
        std::env::consts::OS,
        std::env::consts::ARCH,
        cpus
    );
    if let Some(uptime) = uptime_hours() {
        info.push_str(&format!(", up for {:.1} hours", uptime));
    }
    info
}

/// Only available where /proc exists
fn uptime_hours() -> Option<f64> {
    let text = std::fs::read_to_string("/proc/uptime").ok()?;
    let secs: f64 = text.split_whitespace().next()?.parse().ok()?;
    Some(secs / 3600.0)
}

/// Platform program for a spoken application name
fn resolve_application(name: &str) -> String {
    let program = if cfg!(target_os = "windows") {
        match name {
            "notepad" => "notepad.exe",
            "calculator" => "calc.exe",
            "chrome" => "chrome.exe",
            "firefox" => "firefox.exe",
            "explorer" => "explorer.exe",
            "cmd" | "terminal" => "cmd.exe",
            other => other,
        }
    } else if cfg!(target_os = "macos") {
        match name {
            "notepad" | "text editor" => "TextEdit",
            "calculator" => "Calculator",
            "chrome" => "Google Chrome",
            "firefox" => "Firefox",
            "explorer" | "finder" => "Finder",
            "terminal" | "cmd" => "Terminal",
            other => other,
        }
    } else {
        match name {
            "notepad" | "text editor" => "gedit",
            "calculator" => "gnome-calculator",
            "chrome" => "google-chrome",
            "explorer" | "files" => "nautilus",
            "terminal" | "cmd" => "x-terminal-emulator",
            other => other,
        }
    };
    program.to_string()
}

fn spawn_detached(mut command: Command) -> std::io::Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

fn open_application(name: &str) -> anyhow::Result<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Ok("Which application should I open?".to_string());
    }
    let program = resolve_application(&name);

    let command = if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.args(["-a", &program]);
        c
    } else {
        Command::new(&program)
    };

    match spawn_detached(command) {
        Ok(()) => Ok(format!("Opening {}", name)),
        Err(e) => {
            tracing::warn!("failed to launch '{}': {}", program, e);
            Ok(format!("Unable to open {}", name))
        }
    }
}

fn open_url(url: &str) -> anyhow::Result<()> {
    let command = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(url);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };
    spawn_detached(command).with_context(|| format!("opening {}", url))
}

pub fn search_url(query: &str) -> String {
    format!(
        "https://www.google.com/search?q={}",
        urlencoding::encode(query.trim())
    )
}

pub fn music_url(song: &str) -> String {
    let song = song.trim();
    if song.is_empty() {
        "https://www.youtube.com".to_string()
    } else {
        format!(
            "https://www.youtube.com/results?search_query={}",
            urlencoding::encode(&format!("play {}", song))
        )
    }
}

fn web_search(query: &str) -> anyhow::Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Ok("What would you like me to search for?".to_string());
    }
    open_url(&search_url(query))?;
    Ok(format!("I've opened a web search for '{}' in your browser.", query))
}

fn play_music(song: &str) -> anyhow::Result<String> {
    open_url(&music_url(song))?;
    Ok("Opening music in your browser.".to_string())
}

fn weather(location: &str) -> String {
    format!(
        "I'm unable to get weather data for {} right now. Please set up a weather service.",
        location
    )
}

fn current_time() -> String {
    format!("The current time is {}", Local::now().format("%I:%M %p"))
}

fn shutdown_system(allowed: bool) -> anyhow::Result<String> {
    if !allowed {
        return Ok("Shutdown is disabled in my configuration.".to_string());
    }
    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("shutdown");
        c.args(["/s", "/t", "60"]);
        c
    } else {
        let mut c = Command::new("shutdown");
        c.args(["-h", "+1"]);
        c
    };
    let status = command.status().context("running shutdown")?;
    anyhow::ensure!(status.success(), "shutdown exited with {}", status);
    Ok(if cfg!(target_os = "windows") {
        "System will shutdown in 60 seconds".to_string()
    } else {
        "System will shutdown in 1 minute".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::patterns::Reply;

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        register_builtin(&mut registry, &ActionsConfig::default());
        registry
    }

    #[test]
    fn test_all_default_actions_registered() {
        let registry = registry();
        for action in [
            "get_system_info",
            "open_application",
            "get_weather",
            "web_search",
            "get_time",
            "tell_joke",
            "get_quote",
            "play_music",
            "shutdown_system",
        ] {
            assert!(registry.contains(action), "missing {}", action);
        }
    }

    #[test]
    fn test_time_format() {
        let text = current_time();
        assert!(text.starts_with("The current time is "));
        assert!(text.ends_with("AM") || text.ends_with("PM"));
    }

    #[test]
    fn test_weather_mentions_location() {
        let d = Dispatcher::new(registry());
        let out = d.dispatch_reply("weather", &Reply::Action("get_weather".into()), &[]);
        assert!(out.contains("New York"));
    }

    #[test]
    fn test_empty_search_asks_for_query() {
        assert_eq!(
            web_search("  ").unwrap(),
            "What would you like me to search for?"
        );
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            search_url(" rust lifetimes "),
            "https://www.google.com/search?q=rust%20lifetimes"
        );
        assert_eq!(
            music_url("bohemian rhapsody"),
            "https://www.youtube.com/results?search_query=play%20bohemian%20rhapsody"
        );
        assert_eq!(music_url(""), "https://www.youtube.com");
    }

    #[test]
    fn test_urls_escape_query_syntax() {
        assert_eq!(
            search_url("c++ & rust"),
            "https://www.google.com/search?q=c%2B%2B%20%26%20rust"
        );
        assert_eq!(
            search_url("what is 50% of #1"),
            "https://www.google.com/search?q=what%20is%2050%25%20of%20%231"
        );
        assert_eq!(
            music_url("rock & roll"),
            "https://www.youtube.com/results?search_query=play%20rock%20%26%20roll"
        );
    }

    #[test]
    fn test_joke_and_quote_come_from_lists() {
        assert!(JOKES.contains(&pick(JOKES).as_str()));
        assert!(QUOTES.contains(&pick(QUOTES).as_str()));
    }

    #[test]
    fn test_shutdown_disabled_by_default() {
        let d = Dispatcher::new(registry());
        let out = d.dispatch_reply("shutdown", &Reply::Action("shutdown_system".into()), &[]);
        assert_eq!(out, "Shutdown is disabled in my configuration.");
    }

    #[test]
    fn test_open_application_without_name() {
        assert_eq!(
            open_application("").unwrap(),
            "Which application should I open?"
        );
    }

    #[test]
    fn test_system_info_shape() {
        assert!(system_info().starts_with("System Status: running "));
    }
}

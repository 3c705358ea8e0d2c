use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use workerpump_frame::{Event, CHILD_DIED, UNKNOWN_FRAME};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    code: u16,
    kind: &'a str,
    payload: &'a str,
    pid: u32,
    timestamp: String,
}

pub fn print_event(event: &Event, pid: u32, format: OutputFormat) {
    println!("{}", render_event(event, pid, format));
    let _ = std::io::stdout().flush();
}

pub fn render_event(event: &Event, pid: u32, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                code: event.code,
                kind: event_kind(event.code),
                payload: &event.payload,
                pid,
                timestamp: now_unix_seconds(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CODE", "KIND", "PID", "PAYLOAD"])
                .add_row(vec![
                    event.code.to_string(),
                    event_kind(event.code).to_string(),
                    pid.to_string(),
                    event.payload.clone(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "code={} ({}) pid={} payload={}",
            event.code,
            event_kind(event.code),
            pid,
            event.payload
        ),
        OutputFormat::Raw => event.to_string(),
    }
}

pub fn event_kind(code: u16) -> &'static str {
    match code {
        UNKNOWN_FRAME => "UNKNOWN",
        CHILD_DIED => "CHILD_DIED",
        _ => "EVENT",
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

//! helpline-cli: operator frontend for the Helpline conversation API
//!
//! # Subcommands
//! - `list [--agent <id>] [--status <s>] [--search <text>] [--page <n>] [--limit <n>] [--json]`
//! - `show <id> [--json]`                    : one conversation with its transcript
//! - `dashboard [--range 24h|7d|30d] [--agent <id>] [--json]`
//! - `log <payload.json>`                    : replay a stored webhook delivery
//! - `login <email>`                         : print a bearer token (password from HELPLINE_PASSWORD)
//! - `status`                                : show server health

use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_SERVER: &str = "http://127.0.0.1:3001";
const DEFAULT_LIMIT: u32 = 25;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "helpline-cli", version, about = "Helpline support conversation CLI")]
struct Cli {
    /// Helpline HTTP server URL (overrides HELPLINE_HTTP_URL env var)
    #[arg(long, env = "HELPLINE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Bearer token for servers running with the role gate
    #[arg(long, env = "HELPLINE_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List stored conversations, newest first
    List {
        #[arg(long)]
        agent: Option<String>,

        #[arg(long)]
        status: Option<String>,

        /// Only conversations whose summary or transcript contains this text
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Print the raw API response
        #[arg(long)]
        json: bool,
    },

    /// Show one conversation by its internal id
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Dashboard analytics for a time range
    Dashboard {
        #[arg(long, default_value = "7d", value_parser = ["24h", "7d", "30d"])]
        range: String,

        #[arg(long)]
        agent: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// POST a webhook payload file to /conversations/log
    Log { path: String },

    /// Log in and print the issued token
    Login {
        email: String,

        #[arg(long, env = "HELPLINE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show Helpline server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRow {
    pub id: String,
    pub agent_id: String,
    pub conversation_id: String,
    pub status: String,
    pub event_timestamp: String,
    pub call_duration_secs: Option<i64>,
    pub call_successful: Option<String>,
    pub turn_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPage {
    pub conversations: Vec<ConversationRow>,
    pub total_count: i64,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptLine {
    pub role: String,
    pub message: Option<String>,
    #[serde(rename = "timeInCallSecs")]
    pub time_in_call_secs: Option<i64>,
}

// ============================================================================
// Formatting
// ============================================================================

/// `m:ss` for a call length; `-` when unknown.
pub fn format_duration(secs: Option<i64>) -> String {
    match secs {
        Some(s) if s >= 0 => format!("{}:{:02}", s / 60, s % 60),
        _ => "-".to_string(),
    }
}

/// Cut `text` to at most `max` chars, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

pub fn format_row(row: &ConversationRow) -> String {
    format!(
        "{}  {:<20}  {:<8}  {:>6}  {:>3} turns  {:<8}  {}",
        row.id,
        truncate(&row.agent_id, 20),
        truncate(&row.status, 8),
        format_duration(row.call_duration_secs),
        row.turn_count,
        row.call_successful.as_deref().unwrap_or("-"),
        row.event_timestamp,
    )
}

pub fn format_transcript_line(line: &TranscriptLine) -> String {
    format!(
        "[{:>6}] {:<5} {}",
        format_duration(line.time_in_call_secs),
        line.role,
        line.message.as_deref().unwrap_or("")
    )
}

/// Pull the error message out of either response envelope.
pub fn error_message(body: &Value) -> String {
    body["error"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(Duration::from_secs(30)).build()?)
}

fn authorize(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(t) => req.bearer_auth(t),
        None => req,
    }
}

/// Send, exit on transport or HTTP failure, return the JSON body.
fn send(req: RequestBuilder, what: &str) -> Value {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("helpline-cli: {} failed: {}", what, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        eprintln!("helpline-cli: server returned {}: {}", status, error_message(&body));
        std::process::exit(1);
    }
    body
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn do_list(
    server: &str,
    token: Option<&str>,
    agent: Option<String>,
    status: Option<String>,
    search: Option<String>,
    page: u32,
    limit: u32,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
    for (key, value) in [("agentId", agent), ("status", status), ("search", search)] {
        if let Some(v) = value {
            query.push((key, v));
        }
    }

    let url = format!("{}/conversations", server);
    let body = send(authorize(client()?.get(&url).query(&query), token), "list");
    if json_output {
        return print_json(&body);
    }

    let page: ConversationPage = serde_json::from_value(body["data"].clone())?;
    if page.conversations.is_empty() {
        eprintln!("No conversations found");
        return Ok(());
    }
    for row in &page.conversations {
        println!("{}", format_row(row));
    }
    println!(
        "\nPage {}/{} ({} total)",
        page.pagination.page, page.pagination.total_pages, page.total_count
    );
    Ok(())
}

fn do_show(server: &str, token: Option<&str>, id: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/conversations/{}", server, id);
    let body = send(authorize(client()?.get(&url), token), "show");
    if json_output {
        return print_json(&body);
    }

    let data = &body["data"];
    println!("Conversation: {}", data["conversationId"].as_str().unwrap_or("?"));
    println!("Agent:        {}", data["agentId"].as_str().unwrap_or("?"));
    println!("Status:       {}", data["status"].as_str().unwrap_or("?"));
    println!("Duration:     {}", format_duration(data["callDurationSecs"].as_i64()));
    println!("Outcome:      {}", data["callSuccessful"].as_str().unwrap_or("-"));
    if let Some(summary) = data["transcriptSummary"].as_str() {
        println!("Summary:      {}", summary);
    }
    println!();

    let lines: Vec<TranscriptLine> = serde_json::from_value(data["transcripts"].clone())?;
    for line in &lines {
        println!("{}", format_transcript_line(line));
    }
    Ok(())
}

fn do_dashboard(
    server: &str,
    token: Option<&str>,
    range: &str,
    agent: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut query = vec![("timeRange", range.to_string())];
    if let Some(agent) = agent {
        query.push(("agentId", agent));
    }

    let url = format!("{}/conversations/analytics/dashboard", server);
    let body = send(authorize(client()?.get(&url).query(&query), token), "dashboard");
    if json_output {
        return print_json(&body);
    }

    let overview = &body["data"]["overview"];
    println!("Range:            {}", range);
    println!("Conversations:    {}", overview["totalConversations"]);
    println!("Average duration: {}", format_duration(overview["averageDuration"].as_i64()));
    println!("Success rate:     {}%", overview["successRate"]);
    println!("Satisfaction:     {}%", overview["customerSatisfaction"]);
    println!("SLA adherence:    {}%", overview["slaAdherence"]);

    if let Some(agents) = body["data"]["agentPerformance"].as_array() {
        println!("\nAgents:");
        for agent in agents {
            println!(
                "  {:<24} {:>5} conversations  {:>5}% success",
                agent["agentId"].as_str().unwrap_or("?"),
                agent["totalConversations"],
                agent["successRate"]
            );
        }
    }
    Ok(())
}

fn do_log(server: &str, path: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&raw)?;

    let url = format!("{}/conversations/log", server);
    let body = send(client()?.post(&url).json(&payload), "log");
    println!(
        "Stored {} as {}",
        body["data"]["conversationId"].as_str().unwrap_or("?"),
        body["data"]["id"].as_str().unwrap_or("?")
    );
    Ok(())
}

fn do_login(server: &str, email: &str, password: &str) -> anyhow::Result<()> {
    let url = format!("{}/auth/login", server);
    let body = send(
        client()?
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password })),
        "login",
    );
    eprintln!(
        "Logged in as {} ({})",
        body["user"]["email"].as_str().unwrap_or(email),
        body["user"]["role"].as_str().unwrap_or("?")
    );
    println!("{}", body["token"].as_str().unwrap_or_default());
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
    let url = format!("{}/health", server);

    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: Value = r.json().unwrap_or_default();
            println!("Helpline server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Service:         {}", body["service"].as_str().unwrap_or("?"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("Database:        {}", body["database"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            let body: Value = r.json().unwrap_or_default();
            eprintln!("helpline-cli: server unhealthy (HTTP {}): {}", status, error_message(&body));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("helpline-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let token = cli.token.as_deref();

    let result = match cli.command {
        Commands::List { agent, status, search, page, limit, json } => {
            do_list(&server, token, agent, status, search, page, limit, json)
        }
        Commands::Show { id, json } => do_show(&server, token, &id, json),
        Commands::Dashboard { range, agent, json } => do_dashboard(&server, token, &range, agent, json),
        Commands::Log { path } => do_log(&server, &path),
        Commands::Login { email, password } => do_login(&server, &email, &password),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("helpline-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

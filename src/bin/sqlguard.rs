//! sqlguard: run a SQL string through the query guard offline.
//!
//! Shows what the server would do with a generated statement for a given
//! role and caller: the sanitized text, the policy decision and the values
//! that would be bound.
//!
//! # Usage
//!
//! ```bash
//! sqlguard --role student --caller 42 "SELECT * FROM marks_student WHERE student_id = \$1"
//! echo "DELETE FROM student" | sqlguard --role admin -o json
//! sqlguard --strict --role admin "SELECT 1; SELECT 2"
//! ```

use std::io::{self, Read};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use campus_query::sql::{self, resolve_user_placeholder, SqlPolicy};
use campus_query::{CallerId, Role};

#[derive(Parser)]
#[command(name = "sqlguard")]
#[command(version)]
#[command(about = "Sanitize, validate and bind a SQL statement as the query server would")]
struct Cli {
    /// SQL text (reads stdin if not provided)
    sql: Option<String>,

    /// Caller role: student, faculty, admin, department
    #[arg(long, short, value_parser = parse_role)]
    role: Role,

    /// Caller id bound into $n placeholders for student and faculty
    #[arg(long, short, default_value = "0")]
    caller: String,

    /// Also require the statement to parse as exactly one query
    #[arg(long, env = "QUERY_STRICT_PARSE")]
    strict: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Serialize)]
struct Decision {
    accepted: bool,
    role: Role,
    sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    params: Vec<CallerId>,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse()
}

fn read_sql(arg: Option<String>) -> io::Result<String> {
    match arg {
        Some(sql) => Ok(sql),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let raw = match read_sql(cli.sql) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read SQL from stdin: {e}");
            return ExitCode::from(2);
        }
    };

    let policy = SqlPolicy {
        strict_parse: cli.strict,
    };
    let caller = CallerId::parse(&cli.caller);
    let resolved = resolve_user_placeholder(&raw, cli.role);

    let decision = match sql::guard(&resolved, cli.role, &caller, &policy) {
        Ok(guarded) => Decision {
            accepted: true,
            role: cli.role,
            sql: guarded.sql,
            reason: None,
            params: guarded.params,
        },
        Err(violation) => Decision {
            accepted: false,
            role: cli.role,
            sql: sql::sanitize(&resolved),
            reason: Some(violation.reason),
            params: Vec::new(),
        },
    };

    match cli.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&decision) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("failed to serialize decision: {e}");
                return ExitCode::from(2);
            }
        },
        OutputFormat::Text => {
            println!("{}", if decision.accepted { "ACCEPT" } else { "REJECT" });
            println!("{}", decision.sql);
            if let Some(reason) = &decision.reason {
                println!("{reason}");
            }
        }
        OutputFormat::Pretty => print_pretty(&decision),
    }

    if decision.accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_pretty(decision: &Decision) {
    if decision.accepted {
        println!("{} ({})", "✓ accepted".green().bold(), decision.role);
    } else {
        println!("{} ({})", "✗ rejected".red().bold(), decision.role);
    }
    println!("  {} {}", "sql:".dimmed(), decision.sql);
    if let Some(reason) = &decision.reason {
        println!("  {} {}", "reason:".dimmed(), reason.yellow());
    }
    for (i, param) in decision.params.iter().enumerate() {
        println!("  {} {}", format!("${}:", i + 1).dimmed(), param);
    }
}

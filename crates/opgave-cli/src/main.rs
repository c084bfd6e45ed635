use anyhow::Result;
use clap::{Parser, Subcommand};
use opgave_common::models::todo::{
    ListRequest, ListResponse, Pagination, Priority, Todo, TodoFilters,
};
use serde_json::json;
use std::path::PathBuf;

mod client;

use client::ApiClient;

#[derive(Parser)]
#[command(name = "opgave", version, about = "Opgave CLI - multi-user todo lists")]
struct Cli {
    /// Server URL
    #[arg(long, env = "OPGAVE_URL", default_value = "http://localhost:8080")]
    server: String,

    /// File holding the session cookies
    #[arg(long, env = "OPGAVE_SESSION", default_value = ".opgave-session.json")]
    session: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and start a session
    Signup { email: String, password: String },
    /// Sign in with an existing account
    Signin { email: String, password: String },
    /// End the current session
    Logout,
    /// Show the signed-in profile
    Me,
    /// Add a todo
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    /// List todos
    List {
        /// Substring match on the title
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long, default_value = "50")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: i64,
    },
    /// Mark a todo as completed
    Done {
        /// Todo ID
        id: String,
    },
    /// Update a todo's fields
    Update {
        /// Todo ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Delete a todo
    Rm {
        /// Todo ID
        id: String,
    },
}

fn print_todo(todo: &Todo) {
    let mark = if todo.completed { "x" } else { " " };
    println!("[{}] {}  {}  ({})", mark, todo.id, todo.title, todo.priority);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.server, cli.session.clone());

    match cli.command {
        Commands::Signup { email, password } => {
            client
                .post("/auth/signup", &json!({"email": email, "password": password}))
                .await?;
            println!("Signed up as {}", email);
        }
        Commands::Signin { email, password } => {
            client
                .post("/auth/signin", &json!({"email": email, "password": password}))
                .await?;
            println!("Signed in as {}", email);
        }
        Commands::Logout => {
            client.post("/auth/logout", &json!({})).await?;
            println!("Signed out");
        }
        Commands::Me => {
            let me = client.get("/user/me").await?;
            println!(
                "{} <{}> (since {})",
                me["name"].as_str().unwrap_or("-"),
                me["email"].as_str().unwrap_or("-"),
                me["created_at"].as_str().unwrap_or("-")
            );
        }
        Commands::Add {
            title,
            description,
            priority,
        } => {
            let body = json!({
                "title": title,
                "description": description,
                "priority": priority,
            });
            let created = client.post("/todo/bulk", &body).await?;
            let todo: Todo = serde_json::from_value(created)?;
            print_todo(&todo);
        }
        Commands::List {
            search,
            priority,
            completed,
            limit,
            offset,
        } => {
            let request = ListRequest {
                filters: TodoFilters {
                    ids: None,
                    search,
                    priority,
                    completed,
                },
                pagination: Pagination {
                    limit: Some(limit),
                    offset: Some(offset),
                },
            };
            let response = client
                .post("/todo/list", &serde_json::to_value(&request)?)
                .await?;
            let list: ListResponse<Todo> = serde_json::from_value(response)?;

            for todo in &list.results {
                print_todo(todo);
            }
            println!(
                "{} of {} (offset {})",
                list.results.len(),
                list.aggregation.count,
                list.pagination.offset
            );
        }
        Commands::Done { id } => {
            let updated = client
                .put("/todo/bulk", &json!({"id": id, "completed": true}))
                .await?;
            let todo: Todo = serde_json::from_value(updated)?;
            print_todo(&todo);
        }
        Commands::Update {
            id,
            title,
            description,
            priority,
            completed,
        } => {
            let mut body = serde_json::Map::new();
            body.insert("id".to_string(), json!(id));
            if let Some(title) = title {
                body.insert("title".to_string(), json!(title));
            }
            if let Some(description) = description {
                body.insert("description".to_string(), json!(description));
            }
            if let Some(priority) = priority {
                body.insert("priority".to_string(), json!(priority));
            }
            if let Some(completed) = completed {
                body.insert("completed".to_string(), json!(completed));
            }
            let updated = client.put("/todo/bulk", &body.into()).await?;
            let todo: Todo = serde_json::from_value(updated)?;
            print_todo(&todo);
        }
        Commands::Rm { id } => {
            client.delete(&format!("/todo/{}", id)).await?;
            println!("Deleted {}", id);
        }
    }

    Ok(())
}

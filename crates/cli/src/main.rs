//! Helpboard CLI - community help marketplace.

use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use helpboard_core::{
    suggested_budget, Availability, NotificationId, PaymentMethod, Task, TaskDraft, TaskId,
    TaskPatch, User, UserId, SERVICES,
};
use helpboard_market::{CardDetails, MarketConfig, Marketplace};
use helpboard_storage::{shared, JsonStorage};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "helpboard")]
#[command(about = "Community marketplace where students help elders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory the marketplace data lives in
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON file with marketplace settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Start from empty storage instead of demo data
    #[arg(long, global = true)]
    no_seed: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show who you are acting as
    Whoami,
    /// Log in by email, creating the account if needed
    Login {
        /// Email address
        email: String,
        /// Display name for a new account
        #[arg(long)]
        name: Option<String>,
    },
    /// Go back to the default user
    Logout,
    /// Toggle between the demo elder and the demo student
    Switch,
    /// Close your account and log out
    DeleteAccount,
    /// List users
    Users {
        /// Only students
        #[arg(long)]
        students: bool,
    },
    /// Show or edit your profile
    Profile {
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// Whether you take on work at all
        #[arg(long)]
        available: Option<bool>,
        /// Weekdays you never work, comma separated
        #[arg(long, value_delimiter = ',')]
        unavailable_days: Option<Vec<String>>,
    },
    /// List the service catalogue
    Services,
    /// Post a new task
    Post {
        /// Short title
        title: String,
        /// What needs doing
        #[arg(long)]
        description: String,
        /// Service type from the catalogue, or "Other"
        #[arg(long)]
        service: String,
        /// Where the work happens
        #[arg(long)]
        location: String,
        /// Offered amount; defaults to the service's suggested price
        #[arg(long)]
        budget: Option<f64>,
        /// cash or app
        #[arg(long, default_value = "cash")]
        payment: PaymentMethod,
        /// Dates as YYYY-MM-DD, repeatable
        #[arg(long = "date", required = true)]
        dates: Vec<NaiveDate>,
    },
    /// List the tasks you can see
    Tasks,
    /// Show task details
    Show {
        /// Task ID
        id: String,
    },
    /// Pay for an app-paid task
    Pay {
        /// Task ID
        id: String,
        /// Name on card
        #[arg(long)]
        card_name: String,
        /// Card number
        #[arg(long)]
        card_number: String,
        /// Expiry as MM/YY
        #[arg(long)]
        expiry: String,
        /// Security code
        #[arg(long)]
        cvc: String,
    },
    /// List students who could help with a task
    Helpers {
        /// Task ID
        id: String,
    },
    /// Hire a student for a task
    Assign {
        /// Task ID
        id: String,
        /// Student ID
        student: String,
    },
    /// Task chat
    Chat {
        #[command(subcommand)]
        command: ChatCommands,
    },
    /// Rate the helper and close the task
    Complete {
        /// Task ID
        id: String,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: u8,
    },
    /// Edit a task
    Edit {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New service type
        #[arg(long)]
        service: Option<String>,
        /// New location
        #[arg(long)]
        location: Option<String>,
        /// New budget
        #[arg(long)]
        budget: Option<f64>,
        /// New payment method
        #[arg(long)]
        payment: Option<PaymentMethod>,
        /// New dates as YYYY-MM-DD, repeatable
        #[arg(long = "date")]
        dates: Vec<NaiveDate>,
    },
    /// Delete a task nobody has been hired for
    Delete {
        /// Task ID
        id: String,
    },
    /// Your notifications
    Notifications {
        #[command(subcommand)]
        command: Option<NotificationCommands>,
    },
}

#[derive(Subcommand)]
enum ChatCommands {
    /// Print the conversation
    Show {
        /// Task ID
        id: String,
    },
    /// Send a message
    Send {
        /// Task ID
        id: String,
        /// Message text
        text: String,
    },
    /// Start a video call
    Video {
        /// Task ID
        id: String,
    },
}

#[derive(Subcommand)]
enum NotificationCommands {
    /// List notifications, newest first
    List {
        /// Only unread ones
        #[arg(long)]
        unread: bool,
    },
    /// Mark notifications as read
    Read {
        /// Notification ID
        id: Option<String>,
        /// Mark every notification as read
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

fn load_config(cli: &Cli) -> Result<MarketConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => MarketConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.no_seed {
        config.seed_demo_data = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let storage = JsonStorage::new(&config.data_dir).await?;
    debug!(root = %storage.root().display(), "opening marketplace");
    let mut market = Marketplace::open(shared(storage), config).await?;
    debug!(
        session = %market.session(),
        seeded = market.config().seed_demo_data,
        "session ready"
    );

    match cli.command {
        Commands::Whoami => match market.current_user() {
            Some(user) => print_user(user),
            None => println!("Not logged in"),
        },
        Commands::Login { email, name } => {
            let user = market.login(&email, name.as_deref()).await?;
            println!("Logged in as {} ({})", user.name, user.id);
        }
        Commands::Logout => match market.logout().await? {
            Some(user) => println!("Logged out, now acting as {} ({})", user.name, user.id),
            None => println!("Logged out"),
        },
        Commands::DeleteAccount => match market.delete_account().await? {
            Some(user) => println!("Account closed, now acting as {} ({})", user.name, user.id),
            None => println!("Account closed"),
        },
        Commands::Switch => match market.switch_user().await? {
            Some(user) => println!("Now acting as {} ({})", user.name, user.id),
            None => println!("Not logged in"),
        },
        Commands::Users { students } => {
            let users: Vec<&User> = if students {
                market.users().students().collect()
            } else {
                market.users().all().collect()
            };
            println!("Users ({})", users.len());
            for user in users {
                println!(
                    "  {} | {} | {} | {}",
                    user.id,
                    if user.is_student { "student" } else { "elder" },
                    user.name,
                    format_rating(user),
                );
            }
        }
        Commands::Profile { description, available, unavailable_days } => {
            let availability = if available.is_some() || unavailable_days.is_some() {
                let current = market
                    .current_user()
                    .and_then(|u| u.availability.clone())
                    .unwrap_or_else(Availability::always);
                Some(Availability {
                    is_available: available.unwrap_or(current.is_available),
                    unavailable_days: unavailable_days
                        .map(|days| days.iter().map(|d| d.trim().to_lowercase()).collect())
                        .unwrap_or(current.unavailable_days),
                })
            } else {
                None
            };

            if description.is_some() || availability.is_some() {
                let user = market.update_profile(description, availability).await?;
                println!("Profile updated");
                print_user(&user);
            } else {
                match market.current_user() {
                    Some(user) => print_user(user),
                    None => println!("Not logged in"),
                }
            }
        }
        Commands::Services => {
            for service in SERVICES {
                println!(
                    "  {} | ${:.0}/hr{} | {}",
                    service.title,
                    service.price,
                    service.price_suffix.map(|s| format!(" {s}")).unwrap_or_default(),
                    service.description,
                );
            }
        }
        Commands::Post { title, description, service, location, budget, payment, dates } => {
            let budget = match budget.or_else(|| suggested_budget(&service)) {
                Some(budget) => budget,
                None => bail!("--budget is required for service type {service:?}"),
            };
            let task = market
                .post_task(TaskDraft {
                    title,
                    description,
                    service_type: service,
                    location,
                    budget,
                    payment_method: payment,
                    task_dates: dates,
                })
                .await?;
            println!("Posted task: {} - {}", task.id, task.title);
            if task.awaiting_payment() {
                println!("  Pay with `helpboard pay {}` before hiring a helper", task.id);
            }
        }
        Commands::Tasks => {
            let tasks = market.visible_tasks()?;
            println!("Tasks ({})", tasks.len());
            for task in tasks {
                println!(
                    "  {} | {} | ${:.2} | {} | {}",
                    task.id, task.status, task.budget, task.task_date, task.title,
                );
            }
        }
        Commands::Show { id } => {
            let task_id = TaskId::from(id);
            let Some(task) = market.tasks().get(&task_id) else {
                println!("Task not found");
                return Ok(());
            };
            print_task(task, &market);
        }
        Commands::Pay { id, card_name, card_number, expiry, cvc } => {
            let card = CardDetails {
                card_name,
                card_number,
                expiry_date: expiry,
                cvc,
            };
            let task = market.pay_task(&TaskId::from(id), &card).await?;
            println!("Paid ${:.2} for {} with card {}", task.budget, task.id, card.masked_number());
        }
        Commands::Helpers { id } => {
            let helpers = market.available_helpers(&TaskId::from(id))?;
            println!("Helpers ({})", helpers.len());
            for helper in helpers {
                println!(
                    "  {} | {} | {} | {}",
                    helper.user.id,
                    if helper.available { "available" } else { "unavailable" },
                    helper.user.name,
                    format_rating(&helper.user),
                );
            }
        }
        Commands::Assign { id, student } => {
            let task = market.assign_helper(&TaskId::from(id), &UserId::from(student)).await?;
            let helper = task
                .applicant_id
                .as_ref()
                .and_then(|id| market.users().get(id))
                .map(|u| u.name.as_str())
                .unwrap_or("helper");
            println!("Hired {} for {} - {}", helper, task.id, task.title);
        }
        Commands::Chat { command } => match command {
            ChatCommands::Show { id } => {
                let messages = market.messages(&TaskId::from(id))?;
                if messages.is_empty() {
                    println!("No messages yet");
                }
                for message in messages {
                    let sender = market
                        .users()
                        .get(&message.sender_id)
                        .map(|u| u.name.clone())
                        .unwrap_or_else(|| message.sender_id.to_string());
                    let text = match message.video_call_link() {
                        Some(link) => format!("[video call] {link}"),
                        None => message.text.clone(),
                    };
                    let at = message.timestamp.format("%Y-%m-%d %H:%M");
                    println!("  [{at}] {sender}: {text}");
                }
            }
            ChatCommands::Send { id, text } => {
                let message = market.send_message(&TaskId::from(id), &text).await?;
                println!("Sent {}", message.id);
            }
            ChatCommands::Video { id } => {
                let link = market.start_video_call(&TaskId::from(id)).await?;
                println!("Video call started: {link}");
            }
        },
        Commands::Complete { id, rating } => {
            let task = market.complete_task(&TaskId::from(id), rating).await?;
            println!("Completed {} - {} (rated {rating})", task.id, task.title);
        }
        Commands::Edit { id, title, description, service, location, budget, payment, dates } => {
            let patch = TaskPatch {
                title,
                description,
                service_type: service,
                location,
                budget,
                payment_method: payment,
                task_dates: (!dates.is_empty()).then_some(dates),
                is_paid: None,
            };
            let task = market.edit_task(&TaskId::from(id), patch).await?;
            println!("Updated task: {} - {}", task.id, task.title);
        }
        Commands::Delete { id } => {
            let task = market.delete_task(&TaskId::from(id)).await?;
            println!("Deleted task: {} - {}", task.id, task.title);
        }
        Commands::Notifications { command } => {
            match command.unwrap_or(NotificationCommands::List { unread: false }) {
                NotificationCommands::List { unread } => {
                    let notifications = market.my_notifications()?;
                    println!("Notifications ({} unread)", market.unread_count()?);
                    for n in notifications.into_iter().filter(|n| !unread || !n.read) {
                        println!(
                            "  {} {} | {} | {}",
                            if n.read { " " } else { "*" },
                            n.id,
                            n.message,
                            n.link,
                        );
                    }
                }
                NotificationCommands::Read { id, all } => {
                    let ids: Vec<NotificationId> = if all {
                        market
                            .my_notifications()?
                            .into_iter()
                            .filter(|n| !n.read)
                            .map(|n| n.id.clone())
                            .collect()
                    } else {
                        match id {
                            Some(id) => vec![NotificationId::from(id)],
                            None => bail!("give a notification id or --all"),
                        }
                    };
                    for id in &ids {
                        market.mark_notification_read(id).await?;
                    }
                    println!("Marked {} notification(s) as read", ids.len());
                }
            }
        }
    }

    Ok(())
}

fn format_rating(user: &User) -> String {
    match (user.rating, user.rating_count) {
        (Some(rating), Some(count)) if count > 0 => format!("{rating:.1} ({count} ratings)"),
        _ if user.is_student => "unrated".to_string(),
        _ => "-".to_string(),
    }
}

fn print_user(user: &User) {
    println!("User: {}", user.id);
    println!("  Name: {}", user.name);
    println!("  Email: {}", user.email);
    println!("  Role: {}", if user.is_student { "student" } else { "elder" });
    if let Some(description) = &user.description {
        println!("  About: {description}");
    }
    if user.is_student {
        println!("  Rating: {}", format_rating(user));
    }
    if let Some(availability) = &user.availability {
        if !availability.is_available {
            println!("  Availability: not taking work");
        } else if availability.unavailable_days.is_empty() {
            println!("  Availability: any day");
        } else {
            println!("  Availability: not on {}", availability.unavailable_days.join(", "));
        }
    }
}

fn print_task<S: helpboard_storage::Storage>(task: &Task, market: &Marketplace<S>) {
    println!("Task: {}", task.id);
    println!("  Title: {}", task.title);
    println!("  Description: {}", task.description);
    println!("  Service: {}", task.service_type);
    println!("  Location: {}", task.location);
    println!("  Budget: ${:.2}", task.budget);
    println!("  Status: {}", task.status);
    let days: Vec<String> = task.days().iter().map(|d| d.to_string()).collect();
    println!("  Dates: {}", days.join(", "));
    println!("  Posted by: {} ({})", task.creator_name, task.creator_id);
    println!(
        "  Payment: {} ({})",
        task.payment_method,
        if task.is_paid { "paid" } else { "unpaid" },
    );
    if let Some(helper) = &task.applicant_id {
        let name = market.users().get(helper).map(|u| u.name.as_str()).unwrap_or("unknown");
        println!("  Helper: {name} ({helper})");
    }
    println!("  Messages: {}", task.messages.len());
}

//! CLI module for the timecaps application
//!
//! This module handles the command-line interface for interacting with the
//! capsule store.
use std::{
    fs::{read_to_string, OpenOptions},
    io::{stdin, stdout, Write},
    path::{Path, PathBuf},
    process::Command,
};

use chrono::NaiveDate;
use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use log::info;

use shell_words::split;
use tempfile::Builder;

use crate::{
    effective_state, today, Capsule, CapsuleColor, CapsuleDraft, CapsuleError, CapsuleId,
    CapsuleState, CapsuleStore, Commands, Config, Mood, Result, SyncStatus,
};

/// CLI application handler - processes CLI commands and interfaces with the
/// capsule store
pub struct App {
    /// The capsule store
    store: CapsuleStore,

    /// Application configuration
    config: Config,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application over the given store and config
    pub fn new(store: CapsuleStore, config: Config, verbose: bool) -> Self {
        Self {
            store,
            config,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Create {
                title,
                message,
                file,
                opens,
                mood,
                color,
            } => {
                self.handle_create(title, message, file, opens, mood, color)
                    .await?
            }

            Commands::List {
                query,
                limit,
                json,
                brief,
            } => self.handle_list(query, limit, json, brief)?,

            Commands::View { id, json } => self.handle_view(id, json)?,

            Commands::Open { id } => self.handle_open(id).await?,

            Commands::Delete { id, force } => self.handle_delete(id, force).await?,

            Commands::Config => self.handle_config(),
        }

        Ok(())
    }

    async fn handle_create(
        &mut self,
        title: String,
        message: Option<String>,
        file: Option<PathBuf>,
        opens: String,
        mood: String,
        color: String,
    ) -> Result<()> {
        // Get the message based on the provided options
        let message = match (message, file) {
            (Some(m), _) => m,
            (_, Some(file_path)) => {
                if !file_path.exists() {
                    return Err(CapsuleError::Validation {
                        message: format!("Message file not found: {}", file_path.display()),
                    });
                }
                read_to_string(file_path)?
            }
            (None, None) => self.open_editor_for_message(&title)?,
        };

        let draft = CapsuleDraft {
            title,
            message,
            open_date: opens,
            mood: Mood::parse(&mood),
            color: CapsuleColor::parse(&color),
        };

        let capsule = self.store.create(draft).await?;

        match effective_state(&capsule, today()) {
            CapsuleState::Sealed => println!(
                "Capsule {} sealed until {}.",
                capsule.id,
                format_long_date(capsule.open_date)
            ),
            _ => println!("Capsule {} created and already open.", capsule.id),
        }
        self.report_sync_status();
        Ok(())
    }

    fn open_editor_for_message(&self, title: &str) -> Result<String> {
        // Create a temporary file with .txt extension
        let temp_file = Builder::new().suffix(".txt").tempfile()?;
        let temp_path = temp_file.path().to_path_buf();

        // Get editor from config or environment
        let editor_cmd = self.config.get_editor_command();

        // Write template to the temp file
        self.write_editor_template(&temp_path, title)?;

        // Open editor
        info!("Opening editor to write the capsule message. Save and exit when done...");
        self.launch_editor(&editor_cmd, &temp_path)?;

        // Read and process the message
        let message = read_to_string(&temp_path)?;
        Ok(process_editor_content(message))
    }

    fn write_editor_template(&self, path: &Path, title: &str) -> Result<()> {
        let mut file = OpenOptions::new().write(true).open(path)?;

        // Write template with helpful comments
        writeln!(file, "<!-- Write the message for \"{}\" below. -->", title)?;
        writeln!(
            file,
            "<!-- It stays sealed until the capsule's open date arrives. -->"
        )?;
        writeln!(
            file,
            "<!-- Lines that start with <!-- and end with --> are comments and will be ignored. -->"
        )?;
        writeln!(file, "<!-- Save and exit the editor when you're done. -->")?;
        writeln!(file)?;

        Ok(())
    }

    fn launch_editor(&self, editor_cmd: &str, file_path: &Path) -> Result<()> {
        // Convert file path to string once
        let path_str = file_path.to_string_lossy();

        // Handle shell-like command parsing
        let args = split(editor_cmd).map_err(|e| CapsuleError::EditorError {
            message: format!("Failed to parse editor command: {}", e),
        })?;

        if args.is_empty() {
            return Err(CapsuleError::EditorError {
                message: "Empty editor command".to_string(),
            });
        }

        // First word is the program name, rest are arguments
        let program = &args[0];

        // Create command
        let mut command = Command::new(program);

        // Add any arguments from the original command
        if args.len() > 1 {
            command.args(&args[1..]);
        }

        // Add the file path as the final argument
        command.arg(path_str.as_ref());

        // Execute the command
        let status = command.status()?;

        if !status.success() {
            return Err(CapsuleError::EditorError {
                message: "Editor exited with non-zero status".to_string(),
            });
        }

        Ok(())
    }

    /// List capsules in insertion order, optionally fuzzy-filtered
    fn handle_list(
        &self,
        query: Option<String>,
        limit: usize,
        json: bool,
        brief: bool,
    ) -> Result<()> {
        // Step 1: Snapshot the collection in insertion order
        let mut capsules = self.store.list();

        // Step 2: Apply the fuzzy filter when a query was given
        if let Some(query) = query {
            capsules = filter_capsules(capsules, &query);
        }

        // Step 3: Apply limit (0 means no limit)
        if limit > 0 && capsules.len() > limit {
            capsules.truncate(limit);
        }

        if capsules.is_empty() {
            println!("No capsules found.");
            return Ok(());
        }

        // Step 4: Display in the requested format
        if json {
            println!("{}", serde_json::to_string_pretty(&capsules)?);
            return Ok(());
        }

        self.display_capsules_text(&capsules, brief)?;

        println!(
            "\n{} capsule{}",
            capsules.len(),
            if capsules.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }

    /// Display capsules in text format
    fn display_capsules_text(&self, capsules: &[Capsule], brief: bool) -> Result<()> {
        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        let today = today();

        for (i, capsule) in capsules.iter().enumerate() {
            // Separator between capsules (except before the first)
            if i > 0 && !brief {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let state = effective_state(capsule, today);
            let badge = state.style().apply_to(state.label());
            let title = capsule.color.style().bold().apply_to(&capsule.title);

            if brief {
                println!(
                    "{} [{}] {} {}",
                    capsule.id,
                    badge,
                    capsule.mood.emoji(),
                    title
                );
                continue;
            }

            println!(
                "ID: {} | Created: {}",
                capsule.id,
                capsule.created_at.format("%Y-%m-%d %H:%M")
            );
            println!("Title: {} {}", capsule.mood.emoji(), title);
            println!("State: {}", badge);

            match state {
                CapsuleState::Sealed => {
                    println!("Opens: {}", format_long_date(capsule.open_date));
                }
                CapsuleState::Openable => {
                    println!("Opens: {} (ready now)", format_long_date(capsule.open_date));
                }
                CapsuleState::Opened => {
                    if let Some(opened_at) = capsule.opened_at {
                        println!("Opened: {}", opened_at.format("%Y-%m-%d %H:%M"));
                    }
                    // Sealed messages stay hidden; opened ones get a preview
                    let preview = message_preview(&capsule.message, 100);
                    if !preview.is_empty() {
                        println!("\n{}", preview);
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_view(&self, id: CapsuleId, json: bool) -> Result<()> {
        let capsule = match self.store.get(id) {
            Some(capsule) => capsule,
            None => return Err(CapsuleError::CapsuleNotFound { id }),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(capsule)?);
            return Ok(());
        }

        let state = effective_state(capsule, today());
        let title = capsule.color.style().bold().apply_to(&capsule.title);
        println!("{} {}", capsule.mood.emoji(), title);
        println!("ID:      {}", capsule.id);
        println!("State:   {}", state.style().apply_to(state.label()));
        println!(
            "Created: {}",
            capsule.created_at.format("%Y-%m-%d %H:%M")
        );

        match state {
            CapsuleState::Sealed => {
                // The message stays hidden until the open date arrives
                println!("Opens:   {}", format_long_date(capsule.open_date));
                println!(
                    "\nThis capsule is sealed. Come back on {}.",
                    format_long_date(capsule.open_date)
                );
            }
            CapsuleState::Openable => {
                println!("Opens:   {}", format_long_date(capsule.open_date));
                println!(
                    "\nThis capsule is ready. Run `timecaps open {}` to unseal it.",
                    capsule.id
                );
            }
            CapsuleState::Opened => {
                if let Some(opened_at) = capsule.opened_at {
                    println!("Opened:  {}", opened_at.format("%Y-%m-%d %H:%M"));
                }
                println!("\n{}", capsule.message);
            }
        }

        Ok(())
    }

    async fn handle_open(&mut self, id: CapsuleId) -> Result<()> {
        let capsule = match self.store.open(id).await {
            Some(capsule) => capsule,
            None => {
                println!("No capsule with id {}. Nothing to open.", id);
                return Ok(());
            }
        };

        if effective_state(&capsule, today()) == CapsuleState::Sealed {
            println!(
                "Capsule {} is still sealed. Come back on {}.",
                capsule.id,
                format_long_date(capsule.open_date)
            );
            return Ok(());
        }

        let title = capsule.color.style().bold().apply_to(&capsule.title);
        println!("{} {}\n", capsule.mood.emoji(), title);
        println!("{}", capsule.message);
        self.report_sync_status();
        Ok(())
    }

    async fn handle_delete(&mut self, id: CapsuleId, force: bool) -> Result<()> {
        // Step 1: Fetch the capsule to show details in the prompt
        let capsule = match self.store.get(id) {
            Some(capsule) => capsule.clone(),
            None => {
                println!("No capsule with id {}. Nothing to delete.", id);
                return Ok(());
            }
        };

        // Step 2: Show capsule details and prompt for confirmation (unless
        // force flag is set)
        if !force {
            let state = effective_state(&capsule, today());
            println!("You are about to delete the following capsule:");
            println!("ID:      {}", capsule.id);
            println!("Title:   {}", capsule.title);
            println!("State:   {}", state.label());
            println!("Opens:   {}", format_long_date(capsule.open_date));
            println!(
                "Created: {}",
                capsule.created_at.format("%Y-%m-%d %H:%M:%S")
            );

            // Ask for confirmation
            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this capsule? [y/N]: ");
            stdout().flush().map_err(CapsuleError::Io)?;

            // Read user input
            let mut input = String::new();
            stdin().read_line(&mut input).map_err(CapsuleError::Io)?;

            // Check if user confirmed
            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        // Step 3: Delete the capsule
        if self.store.delete(id).await {
            println!(
                "Capsule '{}' ({}) has been permanently deleted.",
                capsule.title, capsule.id
            );
            self.report_sync_status();
        }

        Ok(())
    }

    fn handle_config(&self) {
        match &self.config.source {
            Some(path) => println!("Config file:      {}", path.display()),
            None => println!(
                "Config file:      {} (not present, defaults in use)",
                Config::default_path().display()
            ),
        }
        println!("Data directory:   {}", self.config.data_dir.display());
        println!("Capsule file:     {}", self.config.capsule_file().display());
        println!("Backend:          {}", self.store.backend_description());
        println!(
            "API URL:          {}",
            self.config.api_url.as_deref().unwrap_or("(none, local storage)")
        );
        println!("Editor:           {}", self.config.get_editor_command());
        println!("Auto backup:      {}", self.config.auto_backup);
        println!("Max backups:      {}", self.config.max_backups);
        if self.verbose {
            println!("Backup directory: {}", self.config.backup_dir().display());
        }
    }

    /// Prints the "not saved" warning after a mutation when the backing
    /// store could not be updated.
    fn report_sync_status(&self) {
        if let SyncStatus::Failed { detail } = self.store.sync_status() {
            eprintln!(
                "{} changes are kept for this run but could not be saved: {}",
                console::style("warning:").yellow().bold(),
                detail
            );
        }
    }
}

/// Removes HTML comment lines from edited content and trims the blank
/// padding around what remains.
fn process_editor_content(message: String) -> String {
    let kept: Vec<&str> = message
        .lines()
        .filter(|line| {
            !line.trim_start().starts_with("<!--") && !line.trim_end().ends_with("-->")
        })
        .collect();

    kept.join("\n").trim().to_string()
}

/// Filters capsules with fuzzy matching, best matches first; title matches
/// count double.
fn filter_capsules(capsules: Vec<Capsule>, query: &str) -> Vec<Capsule> {
    let matcher = SkimMatcherV2::default();

    // Structure to hold a capsule and its relevance score
    struct ScoredCapsule {
        capsule: Capsule,
        score: i64,
    }

    let mut matched: Vec<ScoredCapsule> = Vec::new();
    for capsule in capsules {
        // Try to match against title first (higher priority)
        let title_score = matcher.fuzzy_match(&capsule.title, query).unwrap_or(0);

        // Try to match against the message
        let message_score = matcher.fuzzy_match(&capsule.message, query).unwrap_or(0);

        // Title matches are weighted more heavily
        let final_score = title_score * 2 + message_score;

        if final_score > 0 {
            matched.push(ScoredCapsule {
                capsule,
                score: final_score,
            });
        }
    }

    // Sort matched capsules by score (highest first)
    matched.sort_by(|a, b| b.score.cmp(&a.score));

    matched.into_iter().map(|scored| scored.capsule).collect()
}

/// Renders a date the way the capsule cards do, e.g. "January 1, 2026".
fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// First non-empty line of the message, shortened to `max_len` characters.
fn message_preview(message: &str, max_len: usize) -> String {
    let first_line = message
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

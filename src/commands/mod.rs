//! Command handlers for the wordloop CLI

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::engine::models::StudyMode;
use crate::engine::progress::{study_streak, week_summary};
use crate::engine::scheduler::{is_new, level_name};
use crate::engine::session::StudySession;
use crate::engine::tasks::{generate_daily_tasks, get_today_stats};
use crate::engine::TracingSink;
use crate::storage::settings::{self, KNOWN_KEYS};
use crate::storage::{get_data_dir, Settings, SqliteStore, WordStore, DB_FILE};
use crate::sync::{self, SessionMirror, SyncConfig, PROGRESS_FILE, SYNC_CONFIG_FILE};

pub mod study;

/// Env var consulted when no passphrase is passed on the command line
pub const SYNC_KEY_ENV: &str = "WORDLOOP_SYNC_KEY";

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn open_store(data_dir: &Path) -> Result<SqliteStore> {
    let db_path = data_dir.join(DB_FILE);
    if !db_path.exists() {
        return Err(anyhow!(
            "wordloop is not initialized at {:?}. Run 'wordloop init' first",
            data_dir
        ));
    }
    Ok(SqliteStore::open_write(&db_path)?)
}

fn resolve_passphrase(passphrase: Option<String>) -> Option<String> {
    passphrase.or_else(|| std::env::var(SYNC_KEY_ENV).ok()).filter(|p| !p.is_empty())
}

/// Device label hashed into export metadata
fn device_label(data_dir: &Path) -> String {
    let user = std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_default();
    format!("{}:{}", user, data_dir.display())
}

pub async fn init() -> Result<()> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    let store = SqliteStore::open_write(&data_dir.join(DB_FILE))?;
    for (key, value) in Settings::default_rows() {
        if store.seed_setting(key, &value)? {
            debug!("Seeded setting {} = {}", key, value);
        }
    }

    let sync_path = data_dir.join(SYNC_CONFIG_FILE);
    if !sync_path.exists() {
        sync::save_sync_config(&SyncConfig::default(), &sync_path)?;
    }

    info!("wordloop initialized at {:?}", data_dir);
    println!("✅ Initialized wordloop at {}", data_dir.display());
    Ok(())
}

pub async fn show_today() -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    let settings = Settings::load(&store)?;
    let items = store.get_words_with_state(None)?;
    let today = today();
    let stats = get_today_stats(&items, &settings.task_config(), today);

    println!("Today ({})", today);
    println!("==================");
    println!("Reviews due: {}", stats.review_count);
    println!("New words: {}", stats.new_count);
    println!("Estimated time: {} min", stats.estimated_minutes);
    println!();
    println!("Learned: {} / {}", stats.total_learned, stats.total_words);
    println!("Mastered: {}", stats.mastered_count);
    let levels: Vec<String> = stats
        .level_distribution
        .iter()
        .enumerate()
        .map(|(level, count)| format!("{} {}", level_name(level as u8), count))
        .collect();
    println!("Levels: {}", levels.join(" | "));

    let sessions = store.all_sessions()?;
    let week = week_summary(&sessions, today);
    println!("Streak: {} days", study_streak(&sessions, today));
    println!(
        "This week: {} days, {} words, {}% accuracy",
        week.days_studied, week.words, week.average_accuracy
    );

    if let Some(active) = &settings.active_wordlist_id {
        if stats.active_list_exhausted {
            println!("⚠️  Wordlist '{}' has no new words left", active);
        }
        if stats.fallback_used {
            println!("   New words are coming from other wordlists");
        }
    }
    Ok(())
}

pub async fn show_queue(mode: &str) -> Result<()> {
    let mode: StudyMode = mode.parse()?;
    let store = open_store(&get_data_dir()?)?;
    let settings = Settings::load(&store)?;
    let items = store.get_words_with_state(None)?;
    let tasks = generate_daily_tasks(&items, &settings.task_config(), mode, today());

    println!(
        "{} words ({} review, {} new), about {} min",
        tasks.total_count, tasks.review_count, tasks.new_count, tasks.estimated_minutes
    );
    for (i, item) in tasks.queue.iter().enumerate() {
        let kind = if is_new(item.state.as_ref()) { "new" } else { "review" };
        let level = item.state.as_ref().map_or(0, |s| s.level);
        println!(
            "{:>3}. {:<20} {:<7} {:<11} [{}]",
            i + 1,
            item.word.text,
            kind,
            level_name(level),
            item.word.wordlist_id
        );
    }
    Ok(())
}

pub async fn study(mode: &str) -> Result<()> {
    let mode: StudyMode = mode.parse()?;
    let data_dir = get_data_dir()?;
    let store = open_store(&data_dir)?;
    let settings = Settings::load(&store)?;
    let items = store.get_words_with_state(None)?;
    let tasks = generate_daily_tasks(&items, &settings.task_config(), mode, today());

    if tasks.total_count == 0 {
        println!("🎉 Nothing to study right now");
        return Ok(());
    }
    println!(
        "Studying {} words ({} review, {} new). Enter q to stop.",
        tasks.total_count, tasks.review_count, tasks.new_count
    );

    let mut session = StudySession::new(tasks, mode, &store).with_events(Box::new(TracingSink));
    let sync_config = sync::load_sync_config(&data_dir.join(SYNC_CONFIG_FILE))?;
    if let Some(mirror_dir) = sync_config.active_mirror() {
        session = session.with_replicator(Box::new(SessionMirror::new(mirror_dir)));
    }
    session.init()?;

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let end = match study::run_loop(&mut session, stdin.lock(), &mut stdout) {
        Ok(end) => end,
        Err(e) => {
            // Flush what was studied before surfacing the failure
            if !session.is_saved() && session.abandon().is_some() {
                println!("Partial session saved");
            }
            return Err(e);
        }
    };

    match end {
        study::LoopEnd::Completed => {
            study::print_report(&mut stdout, &session.report())?;
            session
                .save_session()
                .context("Failed to save the session summary")?;
        }
        study::LoopEnd::Quit => {
            if session.abandon().is_some() {
                study::print_report(&mut stdout, &session.report())?;
                println!("Partial session saved");
            } else {
                println!("Session discarded");
            }
        }
    }
    Ok(())
}

pub async fn create_wordlist(id: &str, name: Option<&str>) -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    store.create_wordlist(id, name.unwrap_or(id))?;
    println!("✅ Wordlist '{}' ready", id);
    Ok(())
}

pub async fn list_wordlists() -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    let settings = Settings::load(&store)?;
    let lists = store.list_wordlists()?;
    if lists.is_empty() {
        println!("No wordlists yet. Create one with 'wordloop wordlist create <id>'");
        return Ok(());
    }

    for list in lists {
        let marker = if settings.active_wordlist_id.as_deref() == Some(list.id.as_str()) { "*" } else { " " };
        println!("{} {:<16} {:<24} {} words", marker, list.id, list.name, list.word_count);
    }
    Ok(())
}

pub async fn add_word(wordlist: &str, text: &str, meaning: &str, phonetic: Option<&str>) -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    match store.add_word(wordlist, text, meaning, phonetic)? {
        Some(_) => println!("✅ Added '{}' to {}", text.trim(), wordlist),
        None => println!("'{}' is already in {}", text.trim(), wordlist),
    }
    Ok(())
}

pub async fn config_list() -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    let stored = store.all_settings()?;
    let effective = Settings::load(&store)?;

    for key in KNOWN_KEYS {
        let value = match key {
            settings::DAILY_NEW_WORDS => effective.daily_new_words.to_string(),
            settings::DAILY_REVIEW_CAP => effective.daily_review_cap.to_string(),
            settings::RELAPSE_CAP => effective.relapse_cap.to_string(),
            _ => effective.active_wordlist_id.clone().unwrap_or_else(|| "(all wordlists)".to_string()),
        };
        let is_set = stored.iter().any(|(k, _)| k == key);
        println!("{} = {}{}", key, value, if is_set { "" } else { "  (default)" });
    }
    Ok(())
}

pub async fn config_get(key: &str) -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    match store.get_setting(key)? {
        Some(value) => println!("{}", value),
        None => return Err(anyhow!("Setting '{}' is not set", key)),
    }
    Ok(())
}

pub async fn config_set(key: &str, value: &str) -> Result<()> {
    settings::validate(key, value)?;
    let store = open_store(&get_data_dir()?)?;
    store.set_setting(key, value.trim())?;
    println!("✅ {} = {}", key, value.trim());
    Ok(())
}

pub async fn history(limit: usize) -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    let sessions = store.recent_sessions(limit)?;
    if sessions.is_empty() {
        println!("No sessions yet");
        return Ok(());
    }

    println!("{:<12} {:<7} {:>5} {:>5} {:>6} {:>8}  Hardest", "Date", "Mode", "Words", "New", "Acc", "Time");
    for s in sessions {
        println!(
            "{:<12} {:<7} {:>5} {:>5} {:>5}% {:>5}m{:02}  {}",
            s.date.to_string(),
            s.mode.as_str(),
            s.total_words,
            s.new_words,
            s.spelling_accuracy,
            s.duration_secs / 60,
            s.duration_secs % 60,
            s.hardest_word.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn export(output: &str, encrypted: bool, passphrase: Option<String>) -> Result<()> {
    let data_dir = get_data_dir()?;
    let store = open_store(&data_dir)?;

    let passphrase = if encrypted {
        Some(resolve_passphrase(passphrase).ok_or_else(|| {
            anyhow!("Encryption needs a passphrase: pass --passphrase or set {}", SYNC_KEY_ENV)
        })?)
    } else {
        None
    };

    let meta = sync::export_progress(&store, Path::new(output), &device_label(&data_dir), passphrase.as_deref())?;
    println!(
        "✅ Exported {} word states and {} sessions to {}",
        meta.state_count, meta.session_count, output
    );
    if meta.encrypted {
        println!("📦 Export is encrypted with AES-256-GCM");
    }
    Ok(())
}

pub async fn import(input: &str, passphrase: Option<String>) -> Result<()> {
    let store = open_store(&get_data_dir()?)?;
    let passphrase = resolve_passphrase(passphrase);
    let result = sync::import_progress(&store, Path::new(input), passphrase.as_deref())?;
    print_import_result(&result);
    Ok(())
}

fn print_import_result(result: &sync::ImportResult) {
    println!("✅ Import complete from {}", result.source_device);
    println!("   Word states: {}", result.total);
    println!("   New: {}", result.imported);
    println!("   Updated: {}", result.updated);
    println!("   Kept local: {}", result.kept);
    if result.skipped > 0 {
        println!("   Skipped (not in catalog): {}", result.skipped);
    }
    println!("   Sessions imported: {}", result.sessions_imported);
}

fn load_active_sync(data_dir: &Path) -> Result<(SyncConfig, PathBuf)> {
    let config = sync::load_sync_config(&data_dir.join(SYNC_CONFIG_FILE))?;
    let mirror = config
        .active_mirror()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Sync not configured. Run 'wordloop sync init --dir <path>' first"))?;
    Ok((config, mirror))
}

pub async fn sync_init(dir: &str, no_encrypt: bool) -> Result<()> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    let mirror_dir = PathBuf::from(dir);
    std::fs::create_dir_all(&mirror_dir)
        .with_context(|| format!("Cannot create mirror directory {:?}", mirror_dir))?;

    let config = SyncConfig {
        enabled: true,
        mirror_dir: Some(mirror_dir.clone()),
        encrypt: !no_encrypt,
    };
    sync::save_sync_config(&config, &data_dir.join(SYNC_CONFIG_FILE))?;

    println!("✅ Sync initialized");
    println!("   Mirror: {}", mirror_dir.display());
    println!("   Encryption: {}", if config.encrypt { "on" } else { "off" });
    Ok(())
}

pub async fn sync_push(passphrase: Option<String>) -> Result<()> {
    let data_dir = get_data_dir()?;
    let (config, mirror_dir) = load_active_sync(&data_dir)?;
    let store = open_store(&data_dir)?;

    let passphrase = if config.encrypt {
        Some(resolve_passphrase(passphrase).ok_or_else(|| {
            anyhow!("Sync is encrypted: pass --passphrase or set {}", SYNC_KEY_ENV)
        })?)
    } else {
        None
    };

    let target = mirror_dir.join(PROGRESS_FILE);
    let meta = sync::export_progress(&store, &target, &device_label(&data_dir), passphrase.as_deref())?;
    println!("✅ Pushed {} word states to {}", meta.state_count, target.display());
    Ok(())
}

pub async fn sync_pull(passphrase: Option<String>) -> Result<()> {
    let data_dir = get_data_dir()?;
    let (_, mirror_dir) = load_active_sync(&data_dir)?;
    let store = open_store(&data_dir)?;

    let source = mirror_dir.join(PROGRESS_FILE);
    if source.exists() {
        let passphrase = resolve_passphrase(passphrase);
        let result = sync::import_progress(&store, &source, passphrase.as_deref())?;
        print_import_result(&result);
    } else {
        println!("No progress file at {} yet", source.display());
    }

    let mut mirrored = 0;
    for summary in SessionMirror::new(&mirror_dir).read_sessions()? {
        if !store.session_exists(&summary.started_at)? {
            store.save_session(&summary)?;
            mirrored += 1;
        }
    }
    if mirrored > 0 {
        println!("   Mirrored sessions imported: {}", mirrored);
    }
    Ok(())
}

pub async fn sync_status() -> Result<()> {
    let data_dir = get_data_dir()?;
    let config = sync::load_sync_config(&data_dir.join(SYNC_CONFIG_FILE))?;

    println!("wordloop Sync Status");
    println!("====================");
    println!();

    let Some(mirror_dir) = config.active_mirror() else {
        println!("⚠️  Sync not configured");
        println!("   Run 'wordloop sync init --dir <path>' to set up synchronization");
        return Ok(());
    };

    println!("Mirror: {}", mirror_dir.display());
    println!("Encryption: {}", if config.encrypt { "on" } else { "off" });

    let progress = mirror_dir.join(PROGRESS_FILE);
    match std::fs::metadata(&progress) {
        Ok(meta) => {
            println!("Progress file: ✅ {} bytes", meta.len());
            if let Ok(modified) = meta.modified() {
                let modified: chrono::DateTime<Utc> = modified.into();
                println!("Last push: {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        Err(_) => println!("Progress file: ❌ Not found"),
    }

    let mirror = SessionMirror::new(mirror_dir);
    let mirrored = mirror.read_sessions()?.len();
    println!("Mirrored sessions: {} in {}", mirrored, mirror.dir().display());
    Ok(())
}

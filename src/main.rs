use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use rollcall::cli::{Cli, Commands};
use rollcall::config::Config;
use rollcall::coverage::coverage_report;
use rollcall::enroll::batch::commit_meetings;
use rollcall::enroll::{
    CommitOutcome, DiarizedSegment, EnrollmentWorkflow, LabelDecision, MeetingState,
};
use rollcall::error::RollcallError;
use rollcall::extractor::EmbeddingExtractor;
use rollcall::matcher::{ConfidenceTier, Matcher};
use rollcall::roster::RosterIndex;
use rollcall::store::ProfileStore;
use rollcall::Embedding;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => handle_init(&config, cli.quiet)?,
        Commands::Status => handle_status(&config)?,
        Commands::List => handle_list(&config)?,
        Commands::Show { slug } => handle_show(&config, &slug)?,
        Commands::Search { query } => handle_search(&config, &query)?,
        Commands::Committee { code } => handle_committee(&config, &code)?,
        Commands::Ingest {
            meeting_id,
            diarization,
            audio_ref,
            committee,
            date,
        } => handle_ingest(
            &config,
            &meeting_id,
            &diarization,
            &audio_ref,
            committee.as_deref(),
            date,
            cli.quiet,
        )?,
        Commands::Label {
            meeting_id,
            speaker,
            entity,
            skip,
        } => handle_label(&config, &meeting_id, &speaker, entity, skip, cli.quiet)?,
        Commands::Commit {
            meeting_ids,
            workers,
        } => handle_commit(&config, &meeting_ids, workers)?,
        Commands::Identify {
            embedding,
            committee,
            top,
        } => handle_identify(&config, &embedding, committee.as_deref(), top)?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "rollcall", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/rollcall/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };
    Ok(config.with_env_overrides())
}

fn open_store(config: &Config) -> Result<ProfileStore> {
    Ok(ProfileStore::open(
        &config.database_dir(),
        config.matching.embedding_dim,
    )?)
}

fn load_roster(config: &Config) -> Result<RosterIndex> {
    let path = &config.store.roster_path;
    RosterIndex::load(path)
        .with_context(|| format!("failed to load roster from {}", path.display()))
}

fn open_workflow(config: &Config) -> Result<EnrollmentWorkflow> {
    let workflow = EnrollmentWorkflow::open(&config.workdir())?.with_segment_policy(
        config.enrollment.min_segment_secs,
        config.enrollment.max_segments_per_speaker,
    );
    Ok(workflow)
}

/// Create empty profile shells for every roster entry.
fn handle_init(config: &Config, quiet: bool) -> Result<()> {
    let store = open_store(config)?;
    let roster = load_roster(config)?;
    let report = store.bootstrap_from_roster(&roster)?;

    if !quiet {
        println!(
            "Roster: {} entries ({} profiles created, {} already present)",
            report.total,
            report.created.green(),
            report.skipped.dimmed()
        );
        println!("Store: {}", config.database_dir().display());
    }
    Ok(())
}

/// Print the enrollment coverage table.
fn handle_status(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let roster = load_roster(config)?;
    let report = coverage_report(&store, &roster, config.coverage.min_samples)?;

    println!(
        "Enrollment: {}/{} legislators ({} below {} samples, {} missing)",
        report.enrolled,
        report.total,
        report.weak.yellow(),
        report.min_samples,
        report.unenrolled.red()
    );
    println!();
    println!(
        "  {:<28} {:>7} {:>9} {:>10}  {}",
        "SLUG", "SAMPLES", "MEETINGS", "SPEECH", "STATUS"
    );
    for entry in &report.entries {
        let status = if !entry.enrolled {
            "missing".red().to_string()
        } else if entry.below_minimum {
            "weak".yellow().to_string()
        } else {
            "ok".green().to_string()
        };
        println!(
            "  {:<28} {:>7} {:>9} {:>9.0}s  {}",
            entry.slug, entry.samples, entry.meetings, entry.total_speech_secs, status
        );
    }
    Ok(())
}

/// List every stored profile with its sample count.
fn handle_list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let mut shown = 0;
    for profile in store.list()? {
        let profile = profile?;
        let enrolled = if profile.is_enrolled() {
            format!("{} samples", profile.stats.total_samples)
        } else {
            "empty".dimmed().to_string()
        };
        println!("  {:<28} {:<26} {}", profile.entity.slug, profile.entity.name, enrolled);
        shown += 1;
    }
    if shown == 0 {
        println!("No profiles stored. Run `rollcall init` to bootstrap from the roster.");
    }
    Ok(())
}

/// Print one profile in detail.
fn handle_show(config: &Config, slug: &str) -> Result<()> {
    let store = open_store(config)?;
    let profile = match store.get(slug) {
        Ok(p) => p,
        Err(RollcallError::NotFound { .. }) => {
            eprintln!("No profile for '{slug}'. Try `rollcall search <name>`.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    println!("{} ({})", profile.entity.name.bold(), profile.entity.slug);
    println!(
        "  {} {} / district {} / {}",
        "Seat:".dimmed(),
        profile.entity.chamber,
        profile.entity.district,
        profile.entity.party
    );
    if !profile.entity.committees.is_empty() {
        let codes: Vec<&str> = profile.entity.committees.iter().map(String::as_str).collect();
        println!("  {} {}", "Committees:".dimmed(), codes.join(", "));
    }
    println!(
        "  {} {} samples across {} meetings, {:.0}s of speech",
        "Voice:".dimmed(),
        profile.stats.total_samples,
        profile.stats.meetings.len(),
        profile.stats.total_speech_secs
    );
    if let Some(first) = profile.stats.first_enrolled {
        println!("  {} {}", "Enrolled:".dimmed(), first.format("%Y-%m-%d"));
    }
    for sample in &profile.samples {
        println!(
            "    {} / {} ({} segments, {:.0}s, {})",
            sample.meeting_id,
            sample.speaker_label,
            sample.segments,
            sample.total_secs,
            sample.meeting_date
        );
    }
    Ok(())
}

/// Search the roster by name fragment.
fn handle_search(config: &Config, query: &str) -> Result<()> {
    let roster = load_roster(config)?;
    let hits = roster.search(query);
    if hits.is_empty() {
        println!("No roster entry matches '{query}'");
        return Ok(());
    }
    for entry in hits {
        let codes: Vec<&str> = entry.committees.iter().map(String::as_str).collect();
        println!(
            "  {:<28} {:<26} {} {} [{}]",
            entry.slug,
            entry.name,
            entry.chamber,
            entry.district,
            codes.join(", ")
        );
    }
    Ok(())
}

/// List members of one committee.
fn handle_committee(config: &Config, code: &str) -> Result<()> {
    let roster = load_roster(config)?;
    if !roster.has_committee(code) {
        eprintln!("Unknown committee code '{code}'");
        std::process::exit(1);
    }
    println!("{} members:", code.bold());
    for slug in roster.members_of(code) {
        match roster.descriptor_for(slug) {
            Some(d) => println!("  {:<28} {} ({} {})", slug, d.name, d.chamber, d.district),
            None => println!("  {slug}"),
        }
    }
    Ok(())
}

/// One segment of the diarization input file.
///
/// Embeddings ride along with the diarizer's output: the upstream pipeline
/// runs the embedding model next to the diarizer, and this tool ingests
/// both in one pass.
#[derive(Debug, Deserialize)]
struct IngestSegment {
    speaker: String,
    start_secs: f64,
    end_secs: f64,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

/// Extractor backed by the per-segment embeddings of the ingest file,
/// looked up by exact time window.
struct SegmentEmbeddings {
    by_window: HashMap<(u64, u64), Embedding>,
}

impl EmbeddingExtractor for SegmentEmbeddings {
    fn extract(
        &self,
        _audio_ref: &str,
        start_secs: f64,
        end_secs: f64,
    ) -> rollcall::Result<Embedding> {
        self.by_window
            .get(&(start_secs.to_bits(), end_secs.to_bits()))
            .cloned()
            .ok_or_else(|| RollcallError::Extraction {
                message: format!("no embedding supplied for window {start_secs}-{end_secs}"),
            })
    }

    fn model_name(&self) -> &str {
        "precomputed"
    }
}

/// Ingest a diarization file and, when it carries embeddings, advance the
/// meeting straight to the labeling stage.
fn handle_ingest(
    config: &Config,
    meeting_id: &str,
    diarization: &Path,
    audio_ref: &str,
    committee: Option<&str>,
    date: chrono::NaiveDate,
    quiet: bool,
) -> Result<()> {
    let raw = fs::read_to_string(diarization)
        .with_context(|| format!("failed to read {}", diarization.display()))?;
    let input: Vec<IngestSegment> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid diarization JSON in {}", diarization.display()))?;

    let segments: Vec<DiarizedSegment> = input
        .iter()
        .map(|s| DiarizedSegment {
            speaker_label: s.speaker.clone(),
            start_secs: s.start_secs,
            end_secs: s.end_secs,
        })
        .collect();

    let workflow = open_workflow(config)?;
    let record = workflow.ingest_diarization(meeting_id, audio_ref, committee, date, &segments)?;

    let by_window: HashMap<(u64, u64), Embedding> = input
        .iter()
        .filter_map(|s| {
            let values = s.embedding.clone()?;
            Some((
                (s.start_secs.to_bits(), s.end_secs.to_bits()),
                Embedding::new(values),
            ))
        })
        .collect();

    let record = if by_window.is_empty() {
        record
    } else {
        let extractor = SegmentEmbeddings { by_window };
        workflow.compute_embeddings(meeting_id, &extractor)?
    };

    if !quiet {
        println!(
            "Meeting {} ingested: {} speakers, state {:?}",
            meeting_id,
            record.speakers.len(),
            record.state
        );
        for (label, cluster) in &record.speakers {
            println!(
                "  {:<12} {} segments, {:.0}s total",
                label, cluster.segments, cluster.total_secs
            );
        }
        if record.state == MeetingState::Diarized {
            println!("No embeddings in the input file; supply them to reach the labeling stage.");
        }
    }
    Ok(())
}

/// Record one labeling decision for a meeting speaker.
fn handle_label(
    config: &Config,
    meeting_id: &str,
    speaker: &str,
    entity: Option<String>,
    skip: bool,
    quiet: bool,
) -> Result<()> {
    let decision = match (entity, skip) {
        (Some(slug), false) => LabelDecision::Assign { slug },
        (None, true) => LabelDecision::Skip,
        _ => {
            eprintln!("Provide either --entity <slug> or --skip");
            std::process::exit(1);
        }
    };

    let workflow = open_workflow(config)?;
    let record = workflow.label_speaker(meeting_id, speaker, decision)?;

    if !quiet {
        let unresolved = record.unresolved();
        if unresolved.is_empty() {
            println!(
                "{} fully labeled; commit with `rollcall commit {meeting_id}`",
                meeting_id.green()
            );
        } else {
            println!(
                "{} labeled; {} speaker(s) remaining: {}",
                speaker,
                unresolved.len(),
                unresolved.join(", ")
            );
        }
    }
    Ok(())
}

/// Commit labeled meetings in parallel and print the per-speaker report.
fn handle_commit(config: &Config, meeting_ids: &[String], workers: usize) -> Result<()> {
    let store = open_store(config)?;
    let roster = load_roster(config)?;
    let workflow = open_workflow(config)?;

    let outcomes = commit_meetings(&workflow, &store, &roster, meeting_ids, workers);

    let mut failures = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                let headline = if report.is_clean() {
                    "committed".green().to_string()
                } else {
                    failures += 1;
                    format!("{} mapping(s) failed", report.failed()).red().to_string()
                };
                println!("{}: {}", outcome.meeting_id.bold(), headline);
                for entry in &report.entries {
                    let line = match &entry.outcome {
                        CommitOutcome::Applied => "applied".green().to_string(),
                        CommitOutcome::AlreadyApplied => "already applied".dimmed().to_string(),
                        CommitOutcome::Skipped => "skipped".dimmed().to_string(),
                        CommitOutcome::Failed { reason } => {
                            format!("failed: {reason}").red().to_string()
                        }
                    };
                    let entity = entry.entity.as_deref().unwrap_or("-");
                    println!("    {:<12} -> {:<24} {}", entry.speaker_label, entity, line);
                }
            }
            Err(e) => {
                failures += 1;
                println!("{}: {}", outcome.meeting_id.bold(), format!("error: {e}").red());
            }
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Identify a speaker embedding against the enrolled profiles.
fn handle_identify(
    config: &Config,
    embedding_path: &Path,
    committee: Option<&str>,
    top: usize,
) -> Result<()> {
    let raw = fs::read_to_string(embedding_path)
        .with_context(|| format!("failed to read {}", embedding_path.display()))?;
    let values: Vec<f32> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid embedding JSON in {}", embedding_path.display()))?;
    let unknown = Embedding::new(values);

    let store = open_store(config)?;
    let roster = load_roster(config)?;
    let matcher = Matcher::from_store(&store, &roster, &config.matching)?;

    if matcher.candidate_count() == 0 {
        eprintln!("No enrolled profiles to match against");
        std::process::exit(1);
    }

    let result = matcher.identify(&unknown, committee)?;
    if result.used_fallback {
        println!(
            "{}",
            "No committee member matched; showing all candidates".yellow()
        );
    }
    for candidate in result.ranked.iter().take(top) {
        let tier = match candidate.tier {
            ConfidenceTier::High => "high".green().to_string(),
            ConfidenceTier::Medium => "medium".yellow().to_string(),
            ConfidenceTier::Unassigned => "unassigned".dimmed().to_string(),
        };
        let context_mark = if candidate.in_context { "*" } else { " " };
        println!(
            "  {:.4} ({:.4} raw) {:<10} {}{} ({} samples)",
            candidate.boosted_score,
            candidate.raw_similarity,
            tier,
            candidate.slug,
            context_mark,
            candidate.sample_count
        );
    }
    Ok(())
}

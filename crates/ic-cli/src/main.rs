//! Intercept CLI
//!
//! CLI tool for compiling, checking and previewing header/redirect profiles,
//! and for driving a file-backed rule store.

mod sync;

use std::fs;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};

use ic_compiler::{compile_with_stats, export_profiles, parse_import, RuleIdAllocator};
use ic_core::{
    classify, simulate, validate, CompileOptions, DisabledFiltersPolicy, PatternKind, Profile, ProfileSet,
};

#[derive(Parser)]
#[command(name = "ic-cli")]
#[command(about = "Intercept profile compiler and tools")]
struct Cli {
    /// Debug logging (otherwise RUST_LOG decides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a profile into native declarative rules (JSON on stdout)
    Compile {
        /// Profile file (export format)
        input: String,

        /// Profile id; defaults to the active profile
        #[arg(short, long)]
        profile: Option<String>,

        /// First rule id; defaults to the current Unix time
        #[arg(long)]
        seed: Option<i32>,

        /// Emit no header rules when every filter is disabled
        #[arg(long)]
        skip_headers: bool,

        /// Print per-kind counts to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Check a profile for problems
    Validate {
        /// Profile file (export format)
        input: String,

        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Show which rules would apply to a URL
    Simulate {
        /// Profile file (export format)
        input: String,

        /// URL to test
        url: String,

        #[arg(short, long)]
        profile: Option<String>,

        #[arg(long)]
        skip_headers: bool,
    },

    /// Tell whether patterns compile as globs or regexes
    Classify {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Convert an export (native or header editor) into a profile file
    Import {
        /// File to import
        input: String,

        /// Output profile file
        #[arg(short, long, default_value = "profiles.json")]
        output: String,
    },

    /// Install the active profile into a rule file
    Sync {
        /// Profile file (export format plus globalEnabled)
        #[arg(long)]
        profiles: String,

        /// Rule file standing in for the live rule store
        #[arg(long)]
        rules: String,

        /// Synchronizer settings (JSON)
        #[arg(long)]
        config: Option<String>,
    },

    /// Remove every rule from a rule file
    Clear {
        #[arg(long)]
        rules: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let mut logger = Builder::from_env(Env::default().default_filter_or(default_level));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let result = match cli.command {
        Commands::Compile {
            input,
            profile,
            seed,
            skip_headers,
            stats,
        } => cmd_compile(&input, profile.as_deref(), seed, skip_headers, stats),
        Commands::Validate { input, profile } => cmd_validate(&input, profile.as_deref()),
        Commands::Simulate {
            input,
            url,
            profile,
            skip_headers,
        } => cmd_simulate(&input, &url, profile.as_deref(), skip_headers),
        Commands::Classify { patterns } => cmd_classify(&patterns),
        Commands::Import { input, output } => cmd_import(&input, &output),
        Commands::Sync {
            profiles,
            rules,
            config,
        } => sync::cmd_sync(&profiles, &rules, config.as_deref()),
        Commands::Clear { rules } => sync::cmd_clear(&rules),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn load_profiles(path: &str) -> Result<ProfileSet, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    parse_import(&text).map_err(|e| format!("Invalid profile file '{}': {}", path, e))
}

fn select_profile<'a>(set: &'a ProfileSet, id: Option<&str>) -> Result<&'a Profile, String> {
    match id {
        Some(id) => set.get(id).ok_or_else(|| format!("No profile with id '{id}'")),
        None => set.active().ok_or_else(|| "No active profile".to_string()),
    }
}

fn compile_options(skip_headers: bool) -> CompileOptions {
    CompileOptions {
        disabled_filters: if skip_headers {
            DisabledFiltersPolicy::SkipHeaders
        } else {
            DisabledFiltersPolicy::MatchAll
        },
    }
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_compile(
    input: &str,
    profile_id: Option<&str>,
    seed: Option<i32>,
    skip_headers: bool,
    show_stats: bool,
) -> Result<(), String> {
    let set = load_profiles(input)?;
    let profile = select_profile(&set, profile_id)?;

    let mut ids = seed.map_or_else(RuleIdAllocator::from_clock, RuleIdAllocator::starting_at);
    let (rules, stats) = compile_with_stats(profile, &compile_options(skip_headers), &mut ids);

    let json = serde_json::to_string_pretty(&rules).map_err(|e| format!("Failed to encode rules: {}", e))?;
    println!("{json}");

    if show_stats {
        eprintln!("Compiled profile '{}'", profile.name);
        eprintln!("  Request headers:  {}", stats.request_header_rules);
        eprintln!("  Response headers: {}", stats.response_header_rules);
        eprintln!("  Redirects:        {}", stats.redirect_rules);
        eprintln!("  Blocks:           {}", stats.block_rules);
        eprintln!("  Scope patterns:   {}", stats.scope_patterns);
        eprintln!("  Skipped items:    {}", stats.skipped_items);
        eprintln!("  Total rules:      {}", stats.total());
    }

    Ok(())
}

fn cmd_validate(input: &str, profile_id: Option<&str>) -> Result<(), String> {
    let set = load_profiles(input)?;
    let profile = select_profile(&set, profile_id)?;
    let report = validate(profile);

    for issue in &report.errors {
        println!("error:   {}", issue.message);
    }
    for issue in &report.warnings {
        println!("warning: {}", issue.message);
    }

    if !report.valid {
        return Err(format!(
            "Profile '{}' has {} errors",
            profile.name,
            report.errors.len()
        ));
    }

    println!(
        "Profile '{}' is valid ({} active rules, {} warnings)",
        profile.name,
        profile.active_rule_count(),
        report.warnings.len()
    );
    Ok(())
}

fn cmd_simulate(input: &str, url: &str, profile_id: Option<&str>, skip_headers: bool) -> Result<(), String> {
    let set = load_profiles(input)?;
    let profile = select_profile(&set, profile_id)?;
    let report = simulate(profile, url, &compile_options(skip_headers));

    println!("URL: {}", report.url);
    if report.excluded_host {
        println!("  (host is excluded from all rules)");
    }
    if report.is_empty() {
        println!("  No rules match");
        return Ok(());
    }

    for filter in &report.matched_filters {
        println!("  filter:          {}", filter.pattern);
    }
    for header in &report.matched_headers {
        println!("  request header:  {}: {}", header.name, header.value);
    }
    for header in &report.matched_response_headers {
        println!("  response header: {}: {}", header.name, header.value);
    }
    for redirect in &report.matched_redirects {
        println!("  redirect:        {} -> {}", redirect.from, redirect.result);
    }
    for block in &report.matched_blocks {
        println!("  block:           {}", block.pattern);
    }

    Ok(())
}

fn cmd_classify(patterns: &[String]) -> Result<(), String> {
    for pattern in patterns {
        let kind = match classify(pattern) {
            PatternKind::Literal => "literal",
            PatternKind::Regex => "regex",
        };
        println!("{kind:<8} {pattern}");
    }
    Ok(())
}

fn cmd_import(input: &str, output: &str) -> Result<(), String> {
    let set = load_profiles(input)?;
    let text = export_profiles(&set).map_err(|e| format!("Failed to encode profiles: {}", e))?;
    fs::write(output, text).map_err(|e| format!("Failed to write '{}': {}", output, e))?;

    println!("Imported {} profiles to '{}'", set.profiles.len(), output);
    for profile in &set.profiles {
        let marker = if set.active_profile_id.as_deref() == Some(profile.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("  {marker} {} ({} active rules)", profile.name, profile.active_rule_count());
    }
    Ok(())
}

//! Read-only theme registry commands.

use std::time::Duration;

use clap::Subcommand;
use veille_core::AppConfig;

/// Sub-commands available under `themes`.
#[derive(Debug, Subcommand)]
pub enum ThemesCommands {
    /// List themes in scheduling order
    List,
    /// Show one theme and its keywords
    Show {
        /// Theme name (case-insensitive)
        name: String,
    },
}

/// Render a cadence the way it is written in the registry file.
pub(crate) fn fmt_cadence(cadence: Duration) -> String {
    let secs = cadence.as_secs();
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else {
        format!("{}m", secs / 60)
    }
}

/// # Errors
///
/// Returns an error if the registry file cannot be loaded or the theme is
/// unknown.
pub(crate) fn run_themes(config: &AppConfig, command: &ThemesCommands) -> anyhow::Result<()> {
    let themes = veille_core::load_themes(&config.themes_path)?;

    match command {
        ThemesCommands::List => {
            println!(
                "{:<28}{:<10}{:<9}{:<6}{:<10}MEMBER",
                "THEME", "PRIORITY", "CADENCE", "CAP", "KEYWORDS"
            );
            for theme in themes.by_priority() {
                println!(
                    "{:<28}{:<10}{:<9}{:<6}{:<10}{}",
                    theme.name,
                    theme.priority,
                    fmt_cadence(theme.refresh_cadence),
                    theme.max_items_per_keyword,
                    theme.keywords.len(),
                    theme.assigned_member.as_deref().unwrap_or("-")
                );
            }
            println!();
            println!("global keyword pool: {} keywords", themes.global_keywords.len());
        }
        ThemesCommands::Show { name } => {
            let theme = themes
                .find(name)
                .ok_or_else(|| anyhow::anyhow!("theme '{name}' not found in registry"))?;
            println!("Theme:    {}", theme.name);
            println!("Priority: {}", theme.priority);
            println!("Cadence:  {}", fmt_cadence(theme.refresh_cadence));
            println!("Cap:      {} items per keyword", theme.max_items_per_keyword);
            println!(
                "Member:   {}",
                theme.assigned_member.as_deref().unwrap_or("-")
            );
            println!();
            for keyword in &theme.keywords {
                println!("  {keyword}");
            }
        }
    }

    Ok(())
}

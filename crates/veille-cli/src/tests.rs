use super::*;

use veille_core::{ArticleStatus, SentimentLabel};

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["veille", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["veille", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["veille"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn scrape_without_flags_is_global() {
    let cli = Cli::try_parse_from(["veille", "scrape"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Scrape {
            theme: None,
            all_themes: false,
            dry_run: false
        })
    ));
}

#[test]
fn scrape_single_theme() {
    let cli = Cli::try_parse_from(["veille", "scrape", "--theme", "Agriculture"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Scrape {
            theme: Some(ref t),
            all_themes: false,
            ..
        }) if t == "Agriculture"
    ));
}

#[test]
fn scrape_all_themes_dry_run() {
    let cli = Cli::try_parse_from(["veille", "scrape", "--all-themes", "--dry-run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Scrape {
            theme: None,
            all_themes: true,
            dry_run: true
        })
    ));
}

#[test]
fn scrape_theme_and_all_themes_conflict() {
    let result = Cli::try_parse_from(["veille", "scrape", "--theme", "Santé", "--all-themes"]);
    assert!(result.is_err());
}

#[test]
fn parses_enrich_and_sync() {
    let enrich = Cli::try_parse_from(["veille", "enrich"]).unwrap();
    assert!(matches!(enrich.command, Some(Commands::Enrich)));

    let sync = Cli::try_parse_from(["veille", "sync"]).unwrap();
    assert!(matches!(sync.command, Some(Commands::Sync)));
}

#[test]
fn themes_show_takes_a_name() {
    let cli = Cli::try_parse_from(["veille", "themes", "show", "Santé"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Themes {
            command: ThemesCommands::Show { ref name }
        }) if name == "Santé"
    ));
}

#[test]
fn articles_list_defaults() {
    let cli = Cli::try_parse_from(["veille", "articles", "list"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Articles {
            command: ArticlesCommands::List {
                status: None,
                theme: None,
                unassigned: false,
                limit: 20
            }
        })
    ));
}

#[test]
fn articles_list_parses_status() {
    let cli = Cli::try_parse_from([
        "veille",
        "articles",
        "list",
        "--status",
        "pending_review",
        "--limit",
        "5",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Articles {
            command: ArticlesCommands::List {
                status: Some(ArticleStatus::PendingReview),
                limit: 5,
                ..
            }
        })
    ));
}

#[test]
fn articles_list_rejects_unknown_status() {
    let result = Cli::try_parse_from(["veille", "articles", "list", "--status", "archived"]);
    assert!(result.is_err());
}

#[test]
fn articles_list_theme_conflicts_with_unassigned() {
    let result = Cli::try_parse_from([
        "veille",
        "articles",
        "list",
        "--theme",
        "Santé",
        "--unassigned",
    ]);
    assert!(result.is_err());
}

#[test]
fn transition_as_member() {
    let cli = Cli::try_parse_from([
        "veille",
        "transition",
        "42",
        "validate",
        "--member",
        "awa",
        "--member-theme",
        "Santé",
        "--title",
        "Titre corrigé",
    ])
    .unwrap();
    let Some(Commands::Transition {
        id,
        action,
        title,
        actor,
        ..
    }) = cli.command
    else {
        panic!("expected transition command");
    };
    assert_eq!(id, 42);
    assert_eq!(action, TransitionAction::Validate);
    assert_eq!(title.as_deref(), Some("Titre corrigé"));
    assert_eq!(actor.member.as_deref(), Some("awa"));
    assert_eq!(actor.member_theme.as_deref(), Some("Santé"));
}

#[test]
fn transition_accepts_corrected_tonality() {
    let cli = Cli::try_parse_from([
        "veille",
        "transition",
        "42",
        "validate",
        "--member",
        "awa",
        "--member-theme",
        "Santé",
        "--sentiment",
        "Négatif",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Transition {
            sentiment: Some(SentimentLabel::Negative),
            ..
        })
    ));

    let unknown = Cli::try_parse_from([
        "veille", "transition", "42", "validate", "--admin", "root", "--sentiment", "mitigé",
    ]);
    assert!(unknown.is_err());
}

#[test]
fn articles_stats_trend_window() {
    let cli = Cli::try_parse_from(["veille", "articles", "stats"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Articles {
            command: ArticlesCommands::Stats { days: 7 }
        })
    ));

    let cli = Cli::try_parse_from(["veille", "articles", "stats", "--days", "30"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Articles {
            command: ArticlesCommands::Stats { days: 30 }
        })
    ));

    assert!(Cli::try_parse_from(["veille", "articles", "stats", "--days", "0"]).is_err());
}

#[test]
fn transition_reject_as_admin() {
    let cli = Cli::try_parse_from([
        "veille",
        "transition",
        "7",
        "reject",
        "--admin",
        "root",
        "--reason",
        "hors sujet",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Transition {
            id: 7,
            action: TransitionAction::Reject,
            reason: Some(ref r),
            ..
        }) if r == "hors sujet"
    ));
}

#[test]
fn transition_requires_an_actor() {
    let result = Cli::try_parse_from(["veille", "transition", "7", "certify"]);
    assert!(result.is_err());
}

#[test]
fn member_requires_member_theme() {
    let result = Cli::try_parse_from(["veille", "transition", "7", "validate", "--member", "awa"]);
    assert!(result.is_err());
}

#[test]
fn admin_and_member_conflict() {
    let result = Cli::try_parse_from([
        "veille",
        "transition",
        "7",
        "certify",
        "--admin",
        "root",
        "--member",
        "awa",
        "--member-theme",
        "Santé",
    ]);
    assert!(result.is_err());
}

#[test]
fn unknown_transition_action_is_rejected() {
    let result = Cli::try_parse_from(["veille", "transition", "7", "archive", "--admin", "root"]);
    assert!(result.is_err());
}

#[test]
fn parses_reassign() {
    let cli =
        Cli::try_parse_from(["veille", "reassign", "9", "Économie", "--admin", "root"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Reassign {
            id: 9,
            ref theme,
            ..
        }) if theme == "Économie"
    ));
}

#[test]
fn runs_list_default_limit() {
    let cli = Cli::try_parse_from(["veille", "runs", "list"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Runs {
            command: RunsCommands::List { limit: 20 }
        })
    ));
}

#[test]
fn runs_show_takes_an_id() {
    let cli = Cli::try_parse_from(["veille", "runs", "show", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Runs {
            command: RunsCommands::Show { id: 3 }
        })
    ));
}
